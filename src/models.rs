use serde::{Deserialize, Serialize};

/// A raw (key, value) fragment pair as produced by the line parser.
pub type KeyedPair = (String, String);

/// One entity after the key join: its key and every value observed for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinedEntity {
    pub key: String,
    pub values: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageNode {
    pub id: u64,
    pub key: String,
    pub values: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryNode {
    pub id: u64,
    pub key: String,
}

/// A directed edge whose endpoints both resolved to identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EncodedEdge {
    pub source: u64,
    pub target: u64,
}
