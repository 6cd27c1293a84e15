use crate::config::{PARSE_BATCH_LINES, PROGRESS_INTERVAL, READ_BUFFER_BYTES};
use crate::models::KeyedPair;
use crate::profile::{KeyOrder, SourceProfile, SplitRule};
use crate::stats::PipelineStats;
use anyhow::{Context, Result};
use bzip2::read::MultiBzDecoder;
use indicatif::ProgressBar;
use memchr::memmem;
use once_cell::sync::Lazy;
use rayon::prelude::*;
use regex::Regex;
use std::borrow::Cow;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use tracing::{debug, info, warn};

static URI_TRIPLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^<([^<>\s]+)>\s+<([^<>\s]+)>\s+<([^<>\s]+)>\s*\.?\s*$").unwrap()
});

static LITERAL_TRIPLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"^<([^<>\s]+)>\s+<([^<>\s]+)>\s+"((?:[^"\\]|\\.)*)"(?:@([A-Za-z]+(?:-[A-Za-z0-9]+)*)|\^\^<[^<>\s]+>)?\s*\.?\s*$"#,
    )
    .unwrap()
});

/// Line iterator over a plain or `.bz2` triple file.
///
/// Invalid UTF-8 is replaced rather than failing the read; such lines simply
/// stop matching any profile.
pub struct TripleReader {
    reader: Box<dyn BufRead + Send>,
    buf: Vec<u8>,
}

impl TripleReader {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open source file: {}", path.display()))?;
        let compressed = path.extension().is_some_and(|ext| ext == "bz2");
        let reader: Box<dyn BufRead + Send> = if compressed {
            Box::new(BufReader::with_capacity(
                READ_BUFFER_BYTES,
                MultiBzDecoder::new(file),
            ))
        } else {
            Box::new(BufReader::with_capacity(READ_BUFFER_BYTES, file))
        };
        Ok(Self {
            reader,
            buf: Vec::with_capacity(1024),
        })
    }
}

impl Iterator for TripleReader {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.buf.clear();
        match self.reader.read_until(b'\n', &mut self.buf) {
            Ok(0) => None,
            Ok(_) => {
                while matches!(self.buf.last(), Some(b'\n' | b'\r')) {
                    self.buf.pop();
                }
                Some(Ok(String::from_utf8_lossy(&self.buf).into_owned()))
            }
            Err(e) => Some(Err(e)),
        }
    }
}

/// Applies `profile` to one raw line. `None` means the line was filtered out or
/// malformed; neither is an error.
pub fn parse_line(line: &str, profile: &SourceProfile) -> Option<KeyedPair> {
    let bytes = line.as_bytes();
    if memmem::find(bytes, profile.predicate.as_bytes()).is_none() {
        return None;
    }
    if let Some(exclude) = profile.exclude.as_deref() {
        if !exclude.is_empty() && memmem::find(bytes, exclude.as_bytes()).is_some() {
            return None;
        }
    }

    let (subject, predicate, object) = split_fragments(line.trim(), profile)?;
    if !predicate.contains(profile.predicate.as_str()) {
        return None;
    }
    if subject.is_empty() || object.is_empty() {
        return None;
    }

    Some(match profile.order {
        KeyOrder::SubjectObject => (subject.to_string(), object.into_owned()),
        KeyOrder::ObjectSubject => (object.into_owned(), subject.to_string()),
    })
}

fn split_fragments<'a>(
    line: &'a str,
    profile: &SourceProfile,
) -> Option<(&'a str, &'a str, Cow<'a, str>)> {
    match profile.split {
        SplitRule::UriTriple => {
            let caps = URI_TRIPLE.captures(line)?;
            Some((
                caps.get(1)?.as_str(),
                caps.get(2)?.as_str(),
                Cow::Borrowed(caps.get(3)?.as_str()),
            ))
        }
        SplitRule::LiteralTriple => {
            let caps = LITERAL_TRIPLE.captures(line)?;
            if let (Some(lang), Some(locale)) = (caps.get(4), profile.locale.as_deref()) {
                if !locale_matches(lang.as_str(), locale) {
                    return None;
                }
            }
            let lexical = unescape_literal(caps.get(3)?.as_str())?;
            Some((
                caps.get(1)?.as_str(),
                caps.get(2)?.as_str(),
                sanitize_field(lexical),
            ))
        }
    }
}

/// `en` accepts `en` and `en-GB`; `en-GB` accepts only `en-GB`.
fn locale_matches(tag: &str, locale: &str) -> bool {
    if tag.eq_ignore_ascii_case(locale) {
        return true;
    }
    !locale.contains('-')
        && tag
            .split('-')
            .next()
            .is_some_and(|primary| primary.eq_ignore_ascii_case(locale))
}

/// Decodes N-Triples string escapes. Returns `None` on an invalid escape.
fn unescape_literal(raw: &str) -> Option<Cow<'_, str>> {
    if !raw.contains('\\') {
        return Some(Cow::Borrowed(raw));
    }

    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next()? {
            't' => out.push('\t'),
            'b' => out.push('\u{8}'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            'f' => out.push('\u{c}'),
            '"' => out.push('"'),
            '\'' => out.push('\''),
            '\\' => out.push('\\'),
            'u' => out.push(decode_hex(&mut chars, 4)?),
            'U' => out.push(decode_hex(&mut chars, 8)?),
            _ => return None,
        }
    }
    Some(Cow::Owned(out))
}

fn decode_hex(chars: &mut std::str::Chars<'_>, digits: usize) -> Option<char> {
    let mut code = 0u32;
    for _ in 0..digits {
        code = code * 16 + chars.next()?.to_digit(16)?;
    }
    char::from_u32(code)
}

/// Collapses control whitespace into single spaces so a value stays in one field.
fn sanitize_field(s: Cow<'_, str>) -> Cow<'_, str> {
    if s.contains(['\n', '\r', '\t']) {
        Cow::Owned(s.split_whitespace().collect::<Vec<_>>().join(" "))
    } else {
        s
    }
}

/// Streams `path` through `profile`, parsing fixed-size batches in parallel.
/// Output order follows input order.
pub fn read_pairs(
    path: &Path,
    profile: &SourceProfile,
    limit: Option<u64>,
    stats: &PipelineStats,
) -> Result<Vec<KeyedPair>> {
    let reader = TripleReader::open(path)?;
    let max_lines = limit.map_or(usize::MAX, |n| usize::try_from(n).unwrap_or(usize::MAX));
    let pb = ProgressBar::new_spinner();

    info!(path = %path.display(), predicate = %profile.predicate, "Scanning source");

    let mut pairs = Vec::new();
    let mut batch = Vec::with_capacity(PARSE_BATCH_LINES);
    let mut scanned = 0u64;
    let mut batches = 0u64;

    for line in reader.take(max_lines) {
        let line =
            line.with_context(|| format!("Failed to read line from: {}", path.display()))?;
        batch.push(line);
        if batch.len() == PARSE_BATCH_LINES {
            scanned += parse_batch(&batch, profile, &mut pairs, stats);
            batch.clear();
            batches += 1;
            if batches % PROGRESS_INTERVAL == 0 {
                pb.tick();
            }
        }
    }
    if !batch.is_empty() {
        scanned += parse_batch(&batch, profile, &mut pairs, stats);
    }

    pb.finish_and_clear();

    let accepted = pairs.len() as u64;
    info!(
        path = %path.display(),
        scanned,
        accepted,
        rejected = scanned - accepted,
        "Source scanned"
    );
    if scanned > 0 && accepted == 0 {
        warn!(path = %path.display(), "No lines matched the source profile");
    }

    Ok(pairs)
}

fn parse_batch(
    batch: &[String],
    profile: &SourceProfile,
    out: &mut Vec<KeyedPair>,
    stats: &PipelineStats,
) -> u64 {
    let parsed: Vec<KeyedPair> = batch
        .par_iter()
        .filter_map(|line| parse_line(line, profile))
        .collect();
    let scanned = batch.len() as u64;
    stats.add_lines(scanned, parsed.len() as u64);
    debug!(lines = scanned, accepted = parsed.len(), "Parsed batch");
    out.extend(parsed);
    scanned
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const A: &str = "http://dbpedia.org/resource/A";
    const B: &str = "http://dbpedia.org/resource/B";

    fn link_line(s: &str, o: &str) -> String {
        format!("<{s}> <http://dbpedia.org/ontology/wikiPageWikiLink> <{o}> .")
    }

    #[test]
    fn page_link_emits_source_then_target() {
        let pair = parse_line(&link_line(A, B), &SourceProfile::page_links());
        assert_eq!(pair, Some((A.to_string(), B.to_string())));
    }

    #[test]
    fn forward_link_emits_target_then_source() {
        let line = format!(
            "<http://en.wikipedia.org/wiki/A> <http://xmlns.com/foaf/0.1/primaryTopic> <{A}> ."
        );
        let pair = parse_line(&line, &SourceProfile::link_targets());
        assert_eq!(
            pair,
            Some((A.to_string(), "http://en.wikipedia.org/wiki/A".to_string()))
        );
    }

    #[test]
    fn label_emits_subject_then_label() {
        let line = format!("<{A}> <http://www.w3.org/2000/01/rdf-schema#label> \"Alpha\"@en .");
        let pair = parse_line(&line, &SourceProfile::labels());
        assert_eq!(pair, Some((A.to_string(), "Alpha".to_string())));
    }

    #[test]
    fn label_with_other_locale_is_rejected() {
        let line = format!("<{A}> <http://www.w3.org/2000/01/rdf-schema#label> \"Alpha\"@de .");
        assert_eq!(parse_line(&line, &SourceProfile::labels()), None);
    }

    #[test]
    fn label_with_region_subtag_is_accepted() {
        let line =
            format!("<{A}> <http://www.w3.org/2000/01/rdf-schema#label> \"Colour\"@en-GB .");
        let pair = parse_line(&line, &SourceProfile::labels()).unwrap();
        assert_eq!(pair.1, "Colour");
    }

    #[test]
    fn label_with_datatype_keeps_plain_string() {
        let line = format!(
            "<{A}> <http://www.w3.org/2000/01/rdf-schema#label> \"Alpha\"^^<http://www.w3.org/2001/XMLSchema#string> ."
        );
        let pair = parse_line(&line, &SourceProfile::labels()).unwrap();
        assert_eq!(pair.1, "Alpha");
    }

    #[test]
    fn label_escapes_are_decoded() {
        let line = format!(
            r#"<{A}> <http://www.w3.org/2000/01/rdf-schema#label> "Say \"hi\" to Zürich"@en ."#
        );
        let pair = parse_line(&line, &SourceProfile::labels()).unwrap();
        assert_eq!(pair.1, "Say \"hi\" to Zürich");
    }

    #[test]
    fn label_control_whitespace_is_collapsed() {
        let line = format!(r#"<{A}> <http://www.w3.org/2000/01/rdf-schema#label> "One\nTwo\tThree"@en ."#);
        let pair = parse_line(&line, &SourceProfile::labels()).unwrap();
        assert_eq!(pair.1, "One Two Three");
    }

    #[test]
    fn label_with_invalid_escape_is_rejected() {
        let line = format!(r#"<{A}> <http://www.w3.org/2000/01/rdf-schema#label> "bad \q"@en ."#);
        assert_eq!(parse_line(&line, &SourceProfile::labels()), None);
    }

    #[test]
    fn line_without_predicate_is_rejected() {
        let line = format!("<{A}> <http://dbpedia.org/ontology/wikiPageRedirects> <{B}> .");
        assert_eq!(parse_line(&line, &SourceProfile::page_links()), None);
    }

    #[test]
    fn predicate_only_in_object_is_rejected() {
        let line = format!(
            "<{A}> <http://example.org/mentions> <http://dbpedia.org/ontology/wikiPageWikiLink> ."
        );
        assert_eq!(parse_line(&line, &SourceProfile::page_links()), None);
    }

    #[test]
    fn excluded_line_is_rejected() {
        let line = link_line(A, "http://dbpedia.org/resource/Mercury_(disambiguation)");
        assert_eq!(parse_line(&line, &SourceProfile::page_links()), None);
    }

    #[test]
    fn malformed_lines_are_rejected() {
        let profile = SourceProfile::page_links();
        let truncated = format!("<{A}> <http://dbpedia.org/ontology/wikiPageWikiLink>");
        assert_eq!(parse_line(&truncated, &profile), None);
        let literal_object =
            format!("<{A}> <http://dbpedia.org/ontology/wikiPageWikiLink> \"B\" .");
        assert_eq!(parse_line(&literal_object, &profile), None);
        assert_eq!(parse_line("", &profile), None);
        assert_eq!(
            parse_line("# http://dbpedia.org/ontology/wikiPageWikiLink", &profile),
            None
        );
    }

    #[test]
    fn trailing_period_is_optional() {
        let line = format!("<{A}> <http://dbpedia.org/ontology/wikiPageWikiLink> <{B}>");
        assert!(parse_line(&line, &SourceProfile::page_links()).is_some());
    }

    #[test]
    fn read_pairs_keeps_input_order_and_counts() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{}", link_line(A, B)).unwrap();
        writeln!(file, "garbage").unwrap();
        writeln!(file, "{}", link_line(B, A)).unwrap();
        file.flush().unwrap();

        let stats = PipelineStats::new();
        let pairs = read_pairs(file.path(), &SourceProfile::page_links(), None, &stats).unwrap();
        assert_eq!(
            pairs,
            vec![
                (A.to_string(), B.to_string()),
                (B.to_string(), A.to_string())
            ]
        );
        assert_eq!(stats.scanned(), 3);
        assert_eq!(stats.rejected(), 1);
    }

    #[test]
    fn read_pairs_respects_limit() {
        let mut file = NamedTempFile::new().unwrap();
        for _ in 0..5 {
            writeln!(file, "{}", link_line(A, B)).unwrap();
        }
        file.flush().unwrap();

        let stats = PipelineStats::new();
        let pairs =
            read_pairs(file.path(), &SourceProfile::page_links(), Some(2), &stats).unwrap();
        assert_eq!(pairs.len(), 2);
        assert_eq!(stats.scanned(), 2);
    }

    #[test]
    fn read_pairs_fails_for_missing_file() {
        let stats = PipelineStats::new();
        let result = read_pairs(
            Path::new("/nonexistent/page_links.nt"),
            &SourceProfile::page_links(),
            None,
            &stats,
        );
        assert!(result.is_err());
    }
}
