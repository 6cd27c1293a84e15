use crate::config::{READ_BUFFER_BYTES, TABLE_EXTENSION};
use crate::emit::table_path;
use crate::pipeline::{CATEGORIES_TABLE, LINKS_TABLE, MEMBERS_TABLE, PAGES_TABLE};
use anyhow::{bail, Context, Result};
use csv::{Reader, ReaderBuilder, StringRecord, Writer, WriterBuilder};
use rustc_hash::FxHashSet;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tracing::info;

/// Merges sharded tables into single files suitable for neo4j-admin import
pub fn merge_table_shards(output_dir: &Path) -> Result<()> {
    info!(dir = %output_dir.display(), "Detecting table shards");

    let shard_count = detect_shard_count(output_dir)?;
    info!(shards = shard_count, "Found shards");

    merge_with_dedup(output_dir, PAGES_TABLE, shard_count)?;
    merge_simple(output_dir, LINKS_TABLE, shard_count)?;
    merge_with_dedup(output_dir, CATEGORIES_TABLE, shard_count)?;
    merge_simple(output_dir, MEMBERS_TABLE, shard_count)?;

    info!("Merge complete");
    Ok(())
}

/// Counts consecutive `pages_NNN.tsv` files
fn detect_shard_count(output_dir: &Path) -> Result<u32> {
    let mut count = 0u32;
    while table_path(output_dir, PAGES_TABLE, Some(count)).exists() {
        count += 1;
    }
    if count == 0 {
        bail!(
            "No sharded tables found in {} (expected {}_000.{})",
            output_dir.display(),
            PAGES_TABLE,
            TABLE_EXTENSION
        );
    }
    Ok(count)
}

fn shard_reader(path: &Path) -> Result<Reader<BufReader<File>>> {
    let file =
        File::open(path).with_context(|| format!("Failed to open shard: {}", path.display()))?;
    Ok(ReaderBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .from_reader(BufReader::with_capacity(READ_BUFFER_BYTES, file)))
}

fn merged_writer(output_dir: &Path, base_name: &str) -> Result<Writer<BufWriter<File>>> {
    let path = table_path(output_dir, base_name, None);
    let file = File::create(&path)
        .with_context(|| format!("Failed to create merged table: {}", path.display()))?;
    Ok(WriterBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .from_writer(BufWriter::with_capacity(READ_BUFFER_BYTES, file)))
}

/// Header taken from the first shard; every shard carries the same one.
fn first_header(output_dir: &Path, base_name: &str) -> Result<StringRecord> {
    let mut reader = shard_reader(&table_path(output_dir, base_name, Some(0)))?;
    Ok(reader.headers()?.clone())
}

/// Concatenation for edge tables
fn merge_simple(output_dir: &Path, base_name: &str, shard_count: u32) -> Result<()> {
    info!(table = base_name, "Merging");

    let mut writer = merged_writer(output_dir, base_name)?;
    writer.write_record(&first_header(output_dir, base_name)?)?;

    let mut rows = 0u64;
    for shard in 0..shard_count {
        let mut reader = shard_reader(&table_path(output_dir, base_name, Some(shard)))?;
        for result in reader.records() {
            writer.write_record(&result?)?;
            rows += 1;
        }
    }

    writer.flush()?;
    info!(table = base_name, rows, "Merged");
    Ok(())
}

/// Node tables skip any id already written (first column)
fn merge_with_dedup(output_dir: &Path, base_name: &str, shard_count: u32) -> Result<()> {
    info!(table = base_name, "Merging with deduplication");

    let mut writer = merged_writer(output_dir, base_name)?;
    writer.write_record(&first_header(output_dir, base_name)?)?;

    let mut seen_ids = FxHashSet::default();

    for shard in 0..shard_count {
        let mut reader = shard_reader(&table_path(output_dir, base_name, Some(shard)))?;
        for result in reader.records() {
            let record = result?;
            let node_id = record.get(0).context("Missing node id")?;
            if seen_ids.insert(node_id.to_string()) {
                writer.write_record(&record)?;
            }
        }
    }

    writer.flush()?;
    info!(table = base_name, unique = seen_ids.len(), "Merged");
    Ok(())
}
