use crate::config::{EMIT_PARTITION_ROWS, TABLE_EXTENSION, WRITE_BUFFER_BYTES};
use crate::models::{CategoryNode, EncodedEdge, PageNode};
use anyhow::{Context, Result};
use csv::{Writer, WriterBuilder};
use rayon::prelude::*;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

/// One output table: file stem, verbatim header line, and the tag column value.
#[derive(Debug, Clone, Copy)]
pub struct TableSpec<'a> {
    pub name: &'a str,
    pub header: &'a str,
    pub tag: &'a str,
}

/// A record that renders itself as one tab-delimited row.
pub trait TableRow: Sync {
    fn write_row<W: Write>(
        &self,
        writer: &mut Writer<W>,
        tag: &str,
        ids: &mut itoa::Buffer,
    ) -> csv::Result<()>;
}

/// `id, Page, values...`
impl TableRow for PageNode {
    fn write_row<W: Write>(
        &self,
        writer: &mut Writer<W>,
        tag: &str,
        ids: &mut itoa::Buffer,
    ) -> csv::Result<()> {
        writer.write_field(ids.format(self.id))?;
        writer.write_field(tag)?;
        for value in &self.values {
            writer.write_field(value)?;
        }
        writer.write_record(None::<&[u8]>)
    }
}

/// `id, Category, key`
impl TableRow for CategoryNode {
    fn write_row<W: Write>(
        &self,
        writer: &mut Writer<W>,
        tag: &str,
        ids: &mut itoa::Buffer,
    ) -> csv::Result<()> {
        writer.write_field(ids.format(self.id))?;
        writer.write_field(tag)?;
        writer.write_field(&self.key)?;
        writer.write_record(None::<&[u8]>)
    }
}

/// `source, target, relation`
impl TableRow for EncodedEdge {
    fn write_row<W: Write>(
        &self,
        writer: &mut Writer<W>,
        tag: &str,
        ids: &mut itoa::Buffer,
    ) -> csv::Result<()> {
        writer.write_field(ids.format(self.source))?;
        writer.write_field(ids.format(self.target))?;
        writer.write_field(tag)?;
        writer.write_record(None::<&[u8]>)
    }
}

pub fn table_path(output_dir: &Path, name: &str, shard: Option<u32>) -> PathBuf {
    match shard {
        Some(shard) => output_dir.join(format!("{}_{:03}.{}", name, shard, TABLE_EXTENSION)),
        None => output_dir.join(format!("{}.{}", name, TABLE_EXTENSION)),
    }
}

fn row_writer<W: Write>(out: W) -> Writer<W> {
    WriterBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .from_writer(out)
}

fn render_partition<R: TableRow>(rows: &[R], tag: &str) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(rows.len() * 32);
    {
        let mut writer = row_writer(&mut buf);
        let mut ids = itoa::Buffer::new();
        for row in rows {
            row.write_row(&mut writer, tag, &mut ids)?;
        }
        writer.flush()?;
    }
    Ok(buf)
}

/// Writes the header line, then every row. Partitions are rendered in parallel
/// and written in order, so the header is always the first record.
pub fn write_table<W: Write, R: TableRow>(
    out: &mut W,
    spec: &TableSpec<'_>,
    rows: &[R],
) -> Result<u64> {
    out.write_all(spec.header.as_bytes())?;
    out.write_all(b"\n")?;

    let partitions = rows
        .par_chunks(EMIT_PARTITION_ROWS)
        .map(|chunk| render_partition(chunk, spec.tag))
        .collect::<Result<Vec<_>>>()?;

    for partition in &partitions {
        out.write_all(partition)?;
    }
    Ok(rows.len() as u64)
}

fn write_table_file<R: TableRow>(path: &Path, spec: &TableSpec<'_>, rows: &[R]) -> Result<u64> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create table file: {}", path.display()))?;
    let mut out = BufWriter::with_capacity(WRITE_BUFFER_BYTES, file);
    let written = write_table(&mut out, spec, rows)
        .with_context(|| format!("Failed to write table: {}", path.display()))?;
    out.flush()
        .with_context(|| format!("Failed to flush table: {}", path.display()))?;
    Ok(written)
}

/// Emits `rows` as `name.tsv`, or as `shards` contiguous files `name_NNN.tsv`
/// that each carry the header. Returns the number of data rows written.
pub fn emit_table<R: TableRow>(
    output_dir: &Path,
    spec: &TableSpec<'_>,
    rows: &[R],
    shards: u32,
) -> Result<u64> {
    let written = if shards <= 1 {
        write_table_file(&table_path(output_dir, spec.name, None), spec, rows)?
    } else {
        let chunk_len = rows.len().div_ceil(shards as usize).max(1);
        (0..shards)
            .into_par_iter()
            .map(|shard| {
                let start = (shard as usize * chunk_len).min(rows.len());
                let end = (start + chunk_len).min(rows.len());
                let path = table_path(output_dir, spec.name, Some(shard));
                write_table_file(&path, spec, &rows[start..end])
            })
            .collect::<Result<Vec<_>>>()?
            .into_iter()
            .sum()
    };

    info!(table = spec.name, rows = written, shards, "Table emitted");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const PAGES: TableSpec<'static> = TableSpec {
        name: "pages",
        header: "id:ID\t:LABEL\tvalues",
        tag: "Page",
    };

    const LINKS: TableSpec<'static> = TableSpec {
        name: "links",
        header: ":START_ID\t:END_ID\t:TYPE",
        tag: "LINKS_TO",
    };

    fn render<R: TableRow>(spec: &TableSpec<'_>, rows: &[R]) -> String {
        let mut out = Vec::new();
        write_table(&mut out, spec, rows).unwrap();
        String::from_utf8(out).unwrap()
    }

    fn page(id: u64, values: &[&str]) -> PageNode {
        PageNode {
            id,
            key: format!("http://dbpedia.org/resource/P{id}"),
            values: values.iter().map(|v| v.to_string()).collect(),
        }
    }

    #[test]
    fn empty_table_is_header_only() {
        let text = render::<EncodedEdge>(&LINKS, &[]);
        assert_eq!(text, ":START_ID\t:END_ID\t:TYPE\n");
    }

    #[test]
    fn page_rows_carry_tag_and_values() {
        let text = render(&PAGES, &[page(0, &["http://en.wikipedia.org/wiki/A", "Alpha"])]);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], PAGES.header);
        assert_eq!(lines[1], "0\tPage\thttp://en.wikipedia.org/wiki/A\tAlpha");
    }

    #[test]
    fn category_rows_carry_key() {
        let spec = TableSpec {
            name: "categories",
            header: "id:ID\t:LABEL\tkey",
            tag: "Category",
        };
        let text = render(
            &spec,
            &[CategoryNode {
                id: 42,
                key: "http://dbpedia.org/resource/Category:Physics".to_string(),
            }],
        );
        assert_eq!(
            text.lines().nth(1),
            Some("42\tCategory\thttp://dbpedia.org/resource/Category:Physics")
        );
    }

    #[test]
    fn edge_rows_carry_relation() {
        let text = render(&LINKS, &[EncodedEdge { source: 0, target: 1 }]);
        assert_eq!(text.lines().nth(1), Some("0\t1\tLINKS_TO"));
    }

    #[test]
    fn header_stays_first_across_partitions() {
        let rows: Vec<EncodedEdge> = (0..(EMIT_PARTITION_ROWS as u64 * 3 + 7))
            .map(|i| EncodedEdge { source: i, target: i + 1 })
            .collect();
        let text = render(&LINKS, &rows);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], LINKS.header);
        assert_eq!(lines.len(), rows.len() + 1);
        assert_eq!(lines[1], "0\t1\tLINKS_TO");
        assert_eq!(
            lines[rows.len()],
            format!("{}\t{}\tLINKS_TO", rows.len() - 1, rows.len())
        );
    }

    #[test]
    fn single_table_file() {
        let dir = TempDir::new().unwrap();
        let rows = vec![EncodedEdge { source: 3, target: 4 }];
        let written = emit_table(dir.path(), &LINKS, &rows, 1).unwrap();
        assert_eq!(written, 1);

        let content = fs::read_to_string(dir.path().join("links.tsv")).unwrap();
        assert_eq!(content, ":START_ID\t:END_ID\t:TYPE\n3\t4\tLINKS_TO\n");
    }

    #[test]
    fn sharded_tables_each_have_header() {
        let dir = TempDir::new().unwrap();
        let rows: Vec<EncodedEdge> = (0..5)
            .map(|i| EncodedEdge { source: i, target: i })
            .collect();
        let written = emit_table(dir.path(), &LINKS, &rows, 3).unwrap();
        assert_eq!(written, 5);

        let mut data_rows = 0;
        for shard in 0..3 {
            let path = table_path(dir.path(), "links", Some(shard));
            let content = fs::read_to_string(&path).unwrap();
            let lines: Vec<&str> = content.lines().collect();
            assert_eq!(lines[0], LINKS.header);
            data_rows += lines.len() - 1;
        }
        assert_eq!(data_rows, 5);
        assert!(!dir.path().join("links.tsv").exists());
    }

    #[test]
    fn more_shards_than_rows_still_writes_headers() {
        let dir = TempDir::new().unwrap();
        emit_table::<EncodedEdge>(dir.path(), &LINKS, &[], 2).unwrap();
        for shard in 0..2 {
            let content = fs::read_to_string(table_path(dir.path(), "links", Some(shard))).unwrap();
            assert_eq!(content, ":START_ID\t:END_ID\t:TYPE\n");
        }
    }

    #[test]
    fn table_path_formats_shards() {
        let path = table_path(Path::new("/out"), "pages", Some(7));
        assert_eq!(path, PathBuf::from("/out/pages_007.tsv"));
        let path = table_path(Path::new("/out"), "pages", None);
        assert_eq!(path, PathBuf::from("/out/pages.tsv"));
    }
}
