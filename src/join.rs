use crate::models::{JoinedEntity, KeyedPair};
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use tracing::info;

type Groups = FxHashMap<String, Vec<String>>;

/// Groups two keyed datasets on their shared key.
///
/// Every value is kept, duplicates included; within a key, values from `left`
/// come before values from `right`, each in input order. Rows are sorted by key.
/// Empty keys are rejections and never form an entity.
pub fn join_by_key(left: Vec<KeyedPair>, right: Vec<KeyedPair>) -> Vec<JoinedEntity> {
    let input_pairs = left.len() + right.len();

    let groups = left
        .into_par_iter()
        .chain(right.into_par_iter())
        .filter(|(key, _)| !key.is_empty())
        .fold(Groups::default, |mut groups, (key, value)| {
            groups.entry(key).or_default().push(value);
            groups
        })
        .reduce(Groups::default, merge_groups);

    let mut joined: Vec<JoinedEntity> = groups
        .into_iter()
        .map(|(key, values)| JoinedEntity { key, values })
        .collect();
    joined.par_sort_unstable_by(|a, b| a.key.cmp(&b.key));

    info!(pairs = input_pairs, entities = joined.len(), "Join complete");
    joined
}

/// `left` precedes `right` in input order, so its values go first.
fn merge_groups(mut left: Groups, right: Groups) -> Groups {
    if left.is_empty() {
        return right;
    }
    for (key, values) in right {
        left.entry(key).or_default().extend(values);
    }
    left
}
