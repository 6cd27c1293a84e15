use crate::models::{CategoryNode, JoinedEntity, PageNode};
use anyhow::{bail, Result};
use rustc_hash::FxHashMap;
use tracing::info;

/// Write-once mapping from entity key to identifier.
///
/// Built to completion before any lookup and never mutated afterwards; share it
/// between workers behind an `Arc`.
#[derive(Debug, Default)]
pub struct IdentityMap {
    ids: FxHashMap<String, u64>,
    max_id: Option<u64>,
}

impl IdentityMap {
    /// Fails on a repeated key, since one key may only ever own one identifier.
    pub fn build<'a, I>(assignments: I, capacity: usize) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, u64)>,
    {
        let mut ids = FxHashMap::with_capacity_and_hasher(capacity, Default::default());
        let mut max_id: Option<u64> = None;

        for (key, id) in assignments {
            if ids.insert(key.to_string(), id).is_some() {
                bail!("Entity key assigned twice: {}", key);
            }
            max_id = Some(max_id.map_or(id, |m| m.max(id)));
        }

        info!(entries = ids.len(), max_id = ?max_id, "Identity map built");
        Ok(Self { ids, max_id })
    }

    pub fn from_pages(pages: &[PageNode]) -> Result<Self> {
        Self::build(pages.iter().map(|p| (p.key.as_str(), p.id)), pages.len())
    }

    pub fn from_categories(categories: &[CategoryNode]) -> Result<Self> {
        Self::build(
            categories.iter().map(|c| (c.key.as_str(), c.id)),
            categories.len(),
        )
    }

    pub fn resolve_id(&self, key: &str) -> Option<u64> {
        self.ids.get(key).copied()
    }

    /// Largest identifier actually present, not the entry count.
    pub fn max_id(&self) -> Option<u64> {
        self.max_id
    }

    /// First identifier of a space that must not collide with this one.
    pub fn next_free_id(&self) -> u64 {
        self.max_id.map_or(0, |m| m + 1)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Numbers pages densely from `base` in the order given (sorted by key after the join).
pub fn assign_pages(entities: Vec<JoinedEntity>, base: u64) -> Vec<PageNode> {
    entities
        .into_iter()
        .zip(base..)
        .map(|(entity, id)| PageNode {
            id,
            key: entity.key,
            values: entity.values,
        })
        .collect()
}

/// Numbers categories in the offset space that starts past the largest page id.
pub fn assign_categories<'a, I>(keys: I, pages: &IdentityMap) -> Vec<CategoryNode>
where
    I: IntoIterator<Item = &'a str>,
{
    let base = pages.next_free_id();
    keys.into_iter()
        .zip(base..)
        .map(|(key, id)| CategoryNode {
            id,
            key: key.to_string(),
        })
        .collect()
}
