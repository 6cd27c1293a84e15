use crate::profile::ProfileSet;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const PRIMARY_TOPIC_PREDICATE: &str = "http://xmlns.com/foaf/0.1/primaryTopic";
pub const LABEL_PREDICATE: &str = "http://www.w3.org/2000/01/rdf-schema#label";
pub const WIKI_LINK_PREDICATE: &str = "http://dbpedia.org/ontology/wikiPageWikiLink";
pub const CATEGORY_PREDICATE: &str = "http://purl.org/dc/terms/subject";

/// DBpedia marks disambiguation resources with this title suffix
pub const DISAMBIGUATION_MARKER: &str = "_(disambiguation)>";

pub const DEFAULT_LOCALE: &str = "en";

pub const PAGE_TAG: &str = "Page";
pub const CATEGORY_TAG: &str = "Category";
pub const LINK_RELATION: &str = "LINKS_TO";
pub const MEMBERSHIP_RELATION: &str = "BELONGS_TO";

pub const PAGES_HEADER: &str = "id:ID\t:LABEL\tvalues";
pub const CATEGORIES_HEADER: &str = "id:ID\t:LABEL\tkey";
pub const LINKS_HEADER: &str = ":START_ID\t:END_ID\t:TYPE";
pub const MEMBERS_HEADER: &str = ":START_ID\t:END_ID\t:TYPE";

/// Lines handed to the parser pool at once
pub const PARSE_BATCH_LINES: usize = 64 * 1024;

/// Rows rendered per parallel partition by the emitter
pub const EMIT_PARTITION_ROWS: usize = 16 * 1024;

pub const READ_BUFFER_BYTES: usize = 256 * 1024;
pub const WRITE_BUFFER_BYTES: usize = 128 * 1024;

/// Progress update interval (tick every N batches)
pub const PROGRESS_INTERVAL: u64 = 4;

pub const CHECKPOINT_VERSION: u32 = 1;

pub const TABLE_EXTENSION: &str = "tsv";

/// Locations of the four source files.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourcePaths {
    pub link_targets: Option<PathBuf>,
    pub labels: Option<PathBuf>,
    pub page_links: Option<PathBuf>,
    pub categories: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Headers {
    #[serde(default = "default_pages_header")]
    pub pages: String,
    #[serde(default = "default_links_header")]
    pub links: String,
    #[serde(default = "default_categories_header")]
    pub categories: String,
    #[serde(default = "default_members_header")]
    pub category_members: String,
}

fn default_pages_header() -> String {
    PAGES_HEADER.into()
}
fn default_links_header() -> String {
    LINKS_HEADER.into()
}
fn default_categories_header() -> String {
    CATEGORIES_HEADER.into()
}
fn default_members_header() -> String {
    MEMBERS_HEADER.into()
}

impl Default for Headers {
    fn default() -> Self {
        Self {
            pages: default_pages_header(),
            links: default_links_header(),
            categories: default_categories_header(),
            category_members: default_members_header(),
        }
    }
}

/// Everything the pipeline consumes as injected parameters, persisted as TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub sources: SourcePaths,
    #[serde(default)]
    pub profiles: ProfileSet,
    #[serde(default)]
    pub headers: Headers,
}

impl PipelineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }
}
