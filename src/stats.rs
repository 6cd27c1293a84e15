use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters collected across all pipeline stages
#[derive(Default)]
pub struct PipelineStats {
    pub lines_scanned: AtomicU64,
    pub lines_accepted: AtomicU64,
    pub lines_rejected: AtomicU64,
    pub pages_assigned: AtomicU64,
    pub categories_assigned: AtomicU64,
    pub links_encoded: AtomicU64,
    pub links_dropped: AtomicU64,
    pub memberships_encoded: AtomicU64,
    pub memberships_dropped: AtomicU64,
    pub rows_written: AtomicU64,
}

/// Plain copy of the counters for the run summary
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub lines_scanned: u64,
    pub lines_accepted: u64,
    pub lines_rejected: u64,
    pub pages_assigned: u64,
    pub categories_assigned: u64,
    pub links_encoded: u64,
    pub links_dropped: u64,
    pub memberships_encoded: u64,
    pub memberships_dropped: u64,
    pub rows_written: u64,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_lines(&self, scanned: u64, accepted: u64) {
        self.lines_scanned.fetch_add(scanned, Ordering::Relaxed);
        self.lines_accepted.fetch_add(accepted, Ordering::Relaxed);
        self.lines_rejected
            .fetch_add(scanned.saturating_sub(accepted), Ordering::Relaxed);
    }

    pub fn add_pages(&self, count: u64) {
        self.pages_assigned.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_categories(&self, count: u64) {
        self.categories_assigned.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_links(&self, encoded: u64, dropped: u64) {
        self.links_encoded.fetch_add(encoded, Ordering::Relaxed);
        self.links_dropped.fetch_add(dropped, Ordering::Relaxed);
    }

    pub fn add_memberships(&self, encoded: u64, dropped: u64) {
        self.memberships_encoded.fetch_add(encoded, Ordering::Relaxed);
        self.memberships_dropped.fetch_add(dropped, Ordering::Relaxed);
    }

    pub fn add_rows(&self, count: u64) {
        self.rows_written.fetch_add(count, Ordering::Relaxed);
    }

    pub fn scanned(&self) -> u64 {
        self.lines_scanned.load(Ordering::Relaxed)
    }

    pub fn accepted(&self) -> u64 {
        self.lines_accepted.load(Ordering::Relaxed)
    }

    pub fn rejected(&self) -> u64 {
        self.lines_rejected.load(Ordering::Relaxed)
    }

    pub fn pages(&self) -> u64 {
        self.pages_assigned.load(Ordering::Relaxed)
    }

    pub fn categories(&self) -> u64 {
        self.categories_assigned.load(Ordering::Relaxed)
    }

    pub fn links(&self) -> u64 {
        self.links_encoded.load(Ordering::Relaxed)
    }

    pub fn dropped_links(&self) -> u64 {
        self.links_dropped.load(Ordering::Relaxed)
    }

    pub fn memberships(&self) -> u64 {
        self.memberships_encoded.load(Ordering::Relaxed)
    }

    pub fn dropped_memberships(&self) -> u64 {
        self.memberships_dropped.load(Ordering::Relaxed)
    }

    pub fn rows(&self) -> u64 {
        self.rows_written.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            lines_scanned: self.scanned(),
            lines_accepted: self.accepted(),
            lines_rejected: self.rejected(),
            pages_assigned: self.pages(),
            categories_assigned: self.categories(),
            links_encoded: self.links(),
            links_dropped: self.dropped_links(),
            memberships_encoded: self.memberships(),
            memberships_dropped: self.dropped_memberships(),
            rows_written: self.rows(),
        }
    }
}
