use crate::checkpoint;
use crate::config::{
    PipelineConfig, SourcePaths, CATEGORY_TAG, LINK_RELATION, MEMBERSHIP_RELATION, PAGE_TAG,
};
use crate::emit::{emit_table, TableRow, TableSpec};
use crate::encode::{encode_links, encode_memberships};
use crate::identity::{assign_categories, assign_pages, IdentityMap};
use crate::join::join_by_key;
use crate::models::{CategoryNode, EncodedEdge, KeyedPair, PageNode};
use crate::parser::read_pairs;
use crate::stats::{PipelineStats, StatsSnapshot};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

pub const PAGES_TABLE: &str = "pages";
pub const LINKS_TABLE: &str = "links";
pub const CATEGORIES_TABLE: &str = "categories";
pub const MEMBERS_TABLE: &str = "category_members";

/// Per-run switches that are not part of the persisted configuration.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub output_dir: PathBuf,
    pub shards: u32,
    /// Maximum lines read from each source
    pub limit: Option<u64>,
    pub dry_run: bool,
    pub resume: bool,
}

impl RunOptions {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            shards: 1,
            limit: None,
            dry_run: false,
            resume: false,
        }
    }
}

/// Source locations after checking that every one was configured.
#[derive(Debug, Clone)]
pub struct ResolvedSources {
    pub link_targets: PathBuf,
    pub labels: PathBuf,
    pub page_links: PathBuf,
    pub categories: PathBuf,
}

impl ResolvedSources {
    pub fn from_paths(paths: &SourcePaths) -> Result<Self> {
        fn required(path: &Option<PathBuf>, name: &str) -> Result<PathBuf> {
            path.clone()
                .with_context(|| format!("No path configured for the {} source", name))
        }
        Ok(Self {
            link_targets: required(&paths.link_targets, "link-targets")?,
            labels: required(&paths.labels, "labels")?,
            page_links: required(&paths.page_links, "page-links")?,
            categories: required(&paths.categories, "categories")?,
        })
    }
}

/// Output of the page phase. The identity map is frozen from here on.
pub struct PagePhase {
    pub pages: Vec<PageNode>,
    pub identities: Arc<IdentityMap>,
    pub links: Vec<EncodedEdge>,
}

pub struct CategoryPhase {
    pub categories: Vec<CategoryNode>,
    pub identities: IdentityMap,
    pub memberships: Vec<EncodedEdge>,
}

/// Written to `summary.json` at the end of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    pub stats: StatsSnapshot,
    pub max_page_id: Option<u64>,
    pub first_category_id: Option<u64>,
    pub max_category_id: Option<u64>,
    pub duration_secs: f64,
}

struct Emitter<'a> {
    output_dir: &'a Path,
    shards: u32,
    dry_run: bool,
    stats: &'a PipelineStats,
}

impl Emitter<'_> {
    fn emit<R: TableRow>(&self, spec: TableSpec<'_>, rows: &[R]) -> Result<()> {
        if self.dry_run {
            info!(table = spec.name, rows = rows.len(), "Dry run, table not written");
            return Ok(());
        }
        let written = emit_table(self.output_dir, &spec, rows, self.shards)?;
        self.stats.add_rows(written);
        Ok(())
    }
}

fn page_profile_signature(config: &PipelineConfig) -> String {
    format!(
        "{}#{}",
        config.profiles.link_targets.signature(),
        config.profiles.labels.signature()
    )
}

/// Parse and join the page sources, then number the pages from zero.
/// Reuses a valid checkpoint when `options.resume` is set.
fn build_pages(
    config: &PipelineConfig,
    sources: &ResolvedSources,
    options: &RunOptions,
    stats: &PipelineStats,
) -> Result<Vec<PageNode>> {
    let inputs = [sources.link_targets.as_path(), sources.labels.as_path()];
    let signature = page_profile_signature(config);
    let stage_path = checkpoint::checkpoint_path(&options.output_dir);

    if options.resume && options.limit.is_none() {
        if let Some(pages) = checkpoint::try_load_pages(&stage_path, &inputs, &signature)? {
            info!(pages = pages.len(), "Resuming page phase from checkpoint");
            return Ok(pages);
        }
        info!("No valid checkpoint found, building pages");
    }

    let link_targets = read_pairs(
        &sources.link_targets,
        &config.profiles.link_targets,
        options.limit,
        stats,
    )?;
    let labels = read_pairs(&sources.labels, &config.profiles.labels, options.limit, stats)?;
    let joined = join_by_key(link_targets, labels);
    let pages = assign_pages(joined, 0);

    if !options.dry_run && options.limit.is_none() {
        checkpoint::save_pages(&pages, &inputs, &signature, &options.output_dir)?;
    }
    Ok(pages)
}

/// Phase one: pages, their identity map, and page-to-page links.
pub fn run_page_phase(
    config: &PipelineConfig,
    sources: &ResolvedSources,
    options: &RunOptions,
    stats: &PipelineStats,
) -> Result<PagePhase> {
    let pages = build_pages(config, sources, options, stats)?;
    stats.add_pages(pages.len() as u64);

    // Built to completion before any edge is encoded.
    let identities = Arc::new(IdentityMap::from_pages(&pages)?);

    let raw_links = read_pairs(
        &sources.page_links,
        &config.profiles.page_links,
        options.limit,
        stats,
    )?;
    let encoded = encode_links(&raw_links, &identities);
    stats.add_links(encoded.edges.len() as u64, encoded.dropped);

    info!(
        pages = pages.len(),
        links = encoded.edges.len(),
        max_page_id = ?identities.max_id(),
        "Page phase complete"
    );

    Ok(PagePhase {
        pages,
        identities,
        links: encoded.edges,
    })
}

/// Phase two: categories numbered past the frozen page space, plus memberships.
pub fn run_category_phase(
    config: &PipelineConfig,
    sources: &ResolvedSources,
    options: &RunOptions,
    pages: &IdentityMap,
    stats: &PipelineStats,
) -> Result<CategoryPhase> {
    let pairs = read_pairs(
        &sources.categories,
        &config.profiles.categories,
        options.limit,
        stats,
    )?;
    let joined = join_by_key(pairs, Vec::new());

    let categories = assign_categories(joined.iter().map(|c| c.key.as_str()), pages);
    let identities = IdentityMap::from_categories(&categories)?;
    stats.add_categories(categories.len() as u64);

    let memberships: Vec<KeyedPair> = joined
        .into_iter()
        .flat_map(|category| {
            let key = category.key;
            category
                .values
                .into_iter()
                .map(move |member| (member, key.clone()))
        })
        .collect();
    let encoded = encode_memberships(&memberships, pages, &identities);
    stats.add_memberships(encoded.edges.len() as u64, encoded.dropped);

    info!(
        categories = categories.len(),
        memberships = encoded.edges.len(),
        first_category_id = ?categories.first().map(|c| c.id),
        "Category phase complete"
    );

    Ok(CategoryPhase {
        categories,
        identities,
        memberships: encoded.edges,
    })
}

/// Runs both phases in order and writes all four tables plus `summary.json`.
pub fn run(config: &PipelineConfig, options: &RunOptions) -> Result<PipelineReport> {
    let start = Instant::now();
    let sources = ResolvedSources::from_paths(&config.sources)?;
    let stats = PipelineStats::new();

    if !options.dry_run {
        fs::create_dir_all(&options.output_dir).with_context(|| {
            format!(
                "Failed to create output directory: {}",
                options.output_dir.display()
            )
        })?;
    }

    let emitter = Emitter {
        output_dir: &options.output_dir,
        shards: options.shards,
        dry_run: options.dry_run,
        stats: &stats,
    };

    info!("Starting page phase");
    let PagePhase {
        pages,
        identities,
        links,
    } = run_page_phase(config, &sources, options, &stats)?;
    emitter.emit(
        TableSpec {
            name: PAGES_TABLE,
            header: &config.headers.pages,
            tag: PAGE_TAG,
        },
        &pages,
    )?;
    emitter.emit(
        TableSpec {
            name: LINKS_TABLE,
            header: &config.headers.links,
            tag: LINK_RELATION,
        },
        &links,
    )?;
    // Only the frozen identity map crosses into the category phase.
    drop(pages);
    drop(links);

    info!("Starting category phase");
    let category_phase = run_category_phase(config, &sources, options, &identities, &stats)?;
    emitter.emit(
        TableSpec {
            name: CATEGORIES_TABLE,
            header: &config.headers.categories,
            tag: CATEGORY_TAG,
        },
        &category_phase.categories,
    )?;
    emitter.emit(
        TableSpec {
            name: MEMBERS_TABLE,
            header: &config.headers.category_members,
            tag: MEMBERSHIP_RELATION,
        },
        &category_phase.memberships,
    )?;

    let report = PipelineReport {
        stats: stats.snapshot(),
        max_page_id: identities.max_id(),
        first_category_id: category_phase.categories.first().map(|c| c.id),
        max_category_id: category_phase.identities.max_id(),
        duration_secs: start.elapsed().as_secs_f64(),
    };

    if !options.dry_run {
        write_summary(&options.output_dir, &report)?;
        checkpoint::clear(&options.output_dir)?;
    }

    Ok(report)
}

fn write_summary(output_dir: &Path, report: &PipelineReport) -> Result<()> {
    let path = output_dir.join("summary.json");
    let file = File::create(&path)
        .with_context(|| format!("Failed to create summary: {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), report)
        .with_context(|| format!("Failed to write summary: {}", path.display()))?;
    Ok(())
}
