use crate::identity::IdentityMap;
use crate::models::{EncodedEdge, KeyedPair};
use rayon::prelude::*;
use tracing::{debug, info};

/// Result of rewriting a keyed edge list into identifiers.
#[derive(Debug, Default)]
pub struct EncodedEdges {
    pub edges: Vec<EncodedEdge>,
    pub dropped: u64,
}

/// Rewrites (source key, target key) edges using two frozen identity maps.
///
/// An edge survives only if both endpoints resolve; otherwise it is dropped whole.
/// Input order is preserved among surviving edges.
pub fn encode_edges(
    edges: &[KeyedPair],
    sources: &IdentityMap,
    targets: &IdentityMap,
) -> EncodedEdges {
    let encoded: Vec<EncodedEdge> = edges
        .par_iter()
        .filter_map(|(source, target)| {
            let source = sources.resolve_id(source)?;
            let target = targets.resolve_id(target)?;
            Some(EncodedEdge { source, target })
        })
        .collect();

    let dropped = (edges.len() - encoded.len()) as u64;
    debug!(input = edges.len(), encoded = encoded.len(), dropped, "Edges encoded");
    EncodedEdges {
        edges: encoded,
        dropped,
    }
}

/// Page-to-page links; both endpoints resolve against the page space only.
pub fn encode_links(links: &[KeyedPair], pages: &IdentityMap) -> EncodedEdges {
    let result = encode_edges(links, pages, pages);
    info!(
        links = result.edges.len(),
        dropped = result.dropped,
        "Page links encoded"
    );
    result
}

/// (member page key, category key) pairs into (page id, category id) edges.
pub fn encode_memberships(
    memberships: &[KeyedPair],
    pages: &IdentityMap,
    categories: &IdentityMap,
) -> EncodedEdges {
    let result = encode_edges(memberships, pages, categories);
    info!(
        memberships = result.edges.len(),
        dropped = result.dropped,
        "Category memberships encoded"
    );
    result
}
