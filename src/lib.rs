//! dbgraph: DBpedia RDF dump resolution into dense-id graph tables
//!
//! This crate turns N-Triples dumps of an encyclopedic knowledge graph into node
//! and edge tables keyed by dense integer identifiers, ready for bulk import into
//! a graph database. The work happens in two sequential phases:
//!
//! 1. **Page Phase** -- Parse the link-target and label sources, join them on the
//!    subject key, number every page from zero, freeze the identity map, then
//!    encode page-to-page links and drop any link with an unresolved endpoint
//! 2. **Category Phase** -- Parse the category-membership source and number each
//!    category past the largest page id, so the two id spaces never collide;
//!    encode page-to-category memberships against both maps
//!
//! The category phase takes the frozen page map as input, so it cannot start
//! until page numbering is complete.
//!
//! # Architecture
//!
//! - **Declarative profiles** -- Each source file family is described by a
//!   [`profile::SourceProfile`] (predicate, exclusion, split rule, key order)
//! - **Batch-parallel parsing** -- Lines are read in fixed batches and parsed with rayon
//! - **Fold/reduce join** -- Partition-local grouping merged at the stage boundary
//! - **Write-once identity map** -- Shared read-only behind an `Arc`, no locks
//! - **Header-first emission** -- Rows rendered per partition, concatenated after the header
//! - **Resumable page phase** -- The numbered pages are checkpointed with bincode
//!
//! # Key Modules
//!
//! - [`profile`] -- Source profiles and split rules
//! - [`parser`] -- Triple line reader and parser
//! - [`join`] -- Key join engine
//! - [`identity`] -- Identity map and id assignment
//! - [`encode`] -- Edge encoding against frozen identity maps
//! - [`emit`] -- Tab-delimited table emitter with optional sharding
//! - [`merge`] -- Shard merging for neo4j-admin
//! - [`pipeline`] -- Two-phase orchestration
//! - [`checkpoint`] -- Page phase persistence
//! - [`stats`] -- Atomic counters for the run summary
//! - [`config`] -- Constants and TOML configuration
//!
//! # Example Usage
//!
//! ```bash
//! dbgraph encode \
//!     --link-targets wikipedia_links_en.nt.bz2 \
//!     --labels labels_en.nt.bz2 \
//!     --page-links page_links_en.nt.bz2 \
//!     --categories article_categories_en.nt.bz2 \
//!     -o output/ --shards 8
//!
//! dbgraph merge -o output/
//! ```

pub mod checkpoint;
pub mod config;
pub mod emit;
pub mod encode;
pub mod identity;
pub mod join;
pub mod merge;
pub mod models;
pub mod parser;
pub mod pipeline;
pub mod profile;
pub mod stats;
