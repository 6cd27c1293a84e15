use crate::config::CHECKPOINT_VERSION;
use crate::models::PageNode;
use anyhow::{bail, Context, Result};
use bincode::Options;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{info, warn};

/// Identifies one input file as it was when the checkpoint was taken.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct InputFingerprint {
    pub path: String,
    pub mtime: u64,
    pub size: u64,
}

#[derive(Serialize, Deserialize)]
pub struct StageMetadata {
    pub version: u32,
    pub inputs: Vec<InputFingerprint>,
    pub profile_signature: String,
    pub page_count: usize,
}

#[derive(Deserialize)]
struct PageStageDe {
    metadata: StageMetadata,
    pages: Vec<PageNode>,
}

/// Borrows the pages to avoid cloning every key and value during serialization.
#[derive(Serialize)]
struct PageStageSer<'a> {
    metadata: StageMetadata,
    pages: &'a [PageNode],
}

pub fn checkpoint_path(output_dir: &Path) -> PathBuf {
    output_dir.join("pages.stage")
}

pub fn fingerprint(path: &Path) -> Result<InputFingerprint> {
    let metadata = fs::metadata(path)
        .with_context(|| format!("Failed to get metadata for: {}", path.display()))?;
    let mtime = metadata
        .modified()
        .context("Failed to get modification time")?
        .duration_since(SystemTime::UNIX_EPOCH)
        .context("Invalid modification time")?
        .as_secs();
    Ok(InputFingerprint {
        path: path.to_string_lossy().into_owned(),
        mtime,
        size: metadata.len(),
    })
}

fn fingerprints(inputs: &[&Path]) -> Result<Vec<InputFingerprint>> {
    inputs.iter().map(|p| fingerprint(p)).collect()
}

fn read_stage(path: &Path) -> Result<PageStageDe> {
    let file_size = fs::metadata(path).map(|m| m.len()).unwrap_or(0);
    let file = File::open(path)
        .with_context(|| format!("Failed to open checkpoint: {}", path.display()))?;
    let reader = BufReader::with_capacity(256 * 1024, file);
    let options = bincode::options().with_limit(file_size.saturating_add(1024));
    options
        .deserialize_from(reader)
        .context("Failed to deserialize page checkpoint")
}

/// Returns `Ok(Some(pages))` if the checkpoint matches the current inputs and
/// profiles, `Ok(None)` if it is missing, stale or corrupt.
pub fn try_load_pages(
    path: &Path,
    inputs: &[&Path],
    profile_signature: &str,
) -> Result<Option<Vec<PageNode>>> {
    if !path.exists() {
        return Ok(None);
    }

    let stage = match read_stage(path) {
        Ok(stage) => stage,
        Err(e) => {
            warn!(error = %e, "Checkpoint is corrupt or unreadable");
            return Ok(None);
        }
    };

    if stage.metadata.version != CHECKPOINT_VERSION {
        info!(
            cached = stage.metadata.version,
            current = CHECKPOINT_VERSION,
            "Checkpoint version mismatch"
        );
        return Ok(None);
    }

    if stage.metadata.profile_signature != profile_signature {
        info!("Source profiles changed since checkpoint was created");
        return Ok(None);
    }

    let current = fingerprints(inputs)?;
    if stage.metadata.inputs != current {
        info!(
            cached = ?stage.metadata.inputs,
            current = ?current,
            "Inputs changed since checkpoint was created"
        );
        return Ok(None);
    }

    info!(pages = stage.metadata.page_count, "Page stage loaded from checkpoint");
    Ok(Some(stage.pages))
}

/// Serializes the pages by reference and writes atomically via rename.
pub fn save_pages(
    pages: &[PageNode],
    inputs: &[&Path],
    profile_signature: &str,
    output_dir: &Path,
) -> Result<()> {
    let path = checkpoint_path(output_dir);

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {:?}", parent))?;
    }

    let stage = PageStageSer {
        metadata: StageMetadata {
            version: CHECKPOINT_VERSION,
            inputs: fingerprints(inputs)?,
            profile_signature: profile_signature.to_string(),
            page_count: pages.len(),
        },
        pages,
    };

    let tmp_path = path.with_extension("stage.tmp");
    let file = File::create(&tmp_path)
        .with_context(|| format!("Failed to create temp checkpoint: {:?}", tmp_path))?;
    let writer = BufWriter::new(file);

    bincode::DefaultOptions::new()
        .serialize_into(writer, &stage)
        .context("Failed to serialize page checkpoint")?;

    fs::rename(&tmp_path, &path)
        .with_context(|| format!("Failed to rename temp checkpoint to: {:?}", path))?;

    info!(pages = pages.len(), path = ?path, "Page checkpoint saved");
    Ok(())
}

/// Loads the checkpoint without validating staleness.
pub fn load_pages(path: &Path) -> Result<Vec<PageNode>> {
    if !path.exists() {
        bail!("Checkpoint does not exist: {:?}", path);
    }
    Ok(read_stage(path)?.pages)
}

pub fn clear(output_dir: &Path) -> Result<()> {
    let path = checkpoint_path(output_dir);
    if path.exists() {
        fs::remove_file(&path)
            .with_context(|| format!("Failed to remove checkpoint: {:?}", path))?;
        info!("Checkpoint cleared");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn create_test_input(dir: &TempDir, name: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = File::create(&path).unwrap();
        writeln!(file, "<a> <b> <c> .").unwrap();
        path
    }

    fn sample_pages() -> Vec<PageNode> {
        vec![
            PageNode {
                id: 0,
                key: "http://dbpedia.org/resource/A".to_string(),
                values: vec!["Alpha".to_string()],
            },
            PageNode {
                id: 1,
                key: "http://dbpedia.org/resource/B".to_string(),
                values: vec![],
            },
        ]
    }

    #[test]
    fn checkpoint_path_returns_correct_path() {
        let path = checkpoint_path(Path::new("/output/dir"));
        assert_eq!(path, PathBuf::from("/output/dir/pages.stage"));
    }

    #[test]
    fn missing_checkpoint_returns_none() {
        let dir = TempDir::new().unwrap();
        let input = create_test_input(&dir, "labels.nt");
        let loaded =
            try_load_pages(&checkpoint_path(dir.path()), &[input.as_path()], "sig").unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let input = create_test_input(&dir, "labels.nt");
        let pages = sample_pages();

        save_pages(&pages, &[input.as_path()], "sig", dir.path()).unwrap();
        let loaded =
            try_load_pages(&checkpoint_path(dir.path()), &[input.as_path()], "sig").unwrap();
        assert_eq!(loaded, Some(pages.clone()));
        assert_eq!(load_pages(&checkpoint_path(dir.path())).unwrap(), pages);
    }

    #[test]
    fn changed_signature_invalidates() {
        let dir = TempDir::new().unwrap();
        let input = create_test_input(&dir, "labels.nt");
        save_pages(&sample_pages(), &[input.as_path()], "sig", dir.path()).unwrap();

        let loaded =
            try_load_pages(&checkpoint_path(dir.path()), &[input.as_path()], "other").unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn changed_input_invalidates() {
        let dir = TempDir::new().unwrap();
        let input = create_test_input(&dir, "labels.nt");
        save_pages(&sample_pages(), &[input.as_path()], "sig", dir.path()).unwrap();

        let mut file = File::create(&input).unwrap();
        writeln!(file, "<a> <b> <c> .\n<d> <e> <f> .").unwrap();

        let loaded =
            try_load_pages(&checkpoint_path(dir.path()), &[input.as_path()], "sig").unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn different_input_set_invalidates() {
        let dir = TempDir::new().unwrap();
        let first = create_test_input(&dir, "labels.nt");
        let second = create_test_input(&dir, "links.nt");
        save_pages(&sample_pages(), &[first.as_path()], "sig", dir.path()).unwrap();

        let loaded = try_load_pages(
            &checkpoint_path(dir.path()),
            &[first.as_path(), second.as_path()],
            "sig",
        )
        .unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn corrupt_checkpoint_returns_none() {
        let dir = TempDir::new().unwrap();
        let input = create_test_input(&dir, "labels.nt");
        let path = checkpoint_path(dir.path());
        let mut file = File::create(&path).unwrap();
        file.write_all(b"not valid bincode data").unwrap();

        let loaded = try_load_pages(&path, &[input.as_path()], "sig").unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn load_pages_fails_for_nonexistent_file() {
        assert!(load_pages(Path::new("/nonexistent/pages.stage")).is_err());
    }

    #[test]
    fn clear_removes_checkpoint() {
        let dir = TempDir::new().unwrap();
        let input = create_test_input(&dir, "labels.nt");
        save_pages(&sample_pages(), &[input.as_path()], "sig", dir.path()).unwrap();
        assert!(checkpoint_path(dir.path()).exists());

        clear(dir.path()).unwrap();
        assert!(!checkpoint_path(dir.path()).exists());
        assert!(clear(dir.path()).is_ok());
    }
}
