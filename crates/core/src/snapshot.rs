//! Snapshot persistence and differential comparison by content hash.

use crate::error::{AssessmentError, Result};
use crate::registry::FileRegistry;
use base64::Engine;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersistedRecord {
    pub file_path: String,
    pub file_hash: String,
    pub license: Vec<String>,
    pub file_content_b64: String,
    pub file_content_is_text: bool,
}

fn compress_to_b64(text: &str) -> String {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(text.as_bytes()).expect("in-memory zlib write cannot fail");
    let compressed = encoder.finish().expect("in-memory zlib finish cannot fail");
    base64::engine::general_purpose::STANDARD.encode(compressed)
}

fn decompress_from_b64(b64: &str) -> Result<String> {
    let compressed = base64::engine::general_purpose::STANDARD
        .decode(b64)
        .map_err(|e| AssessmentError::invariant("Snapshot", format!("bad base64: {e}")))?;
    let mut decoder = ZlibDecoder::new(&compressed[..]);
    let mut out = String::new();
    decoder
        .read_to_string(&mut out)
        .map_err(|e| AssessmentError::invariant("Snapshot", format!("bad zlib stream: {e}")))?;
    Ok(out)
}

/// Converts the live registry into the persisted record shape.
pub fn to_persisted(registry: &FileRegistry) -> Vec<PersistedRecord> {
    registry
        .to_vec()
        .into_iter()
        .map(|rec| PersistedRecord {
            file_path: rec.relative_path.to_string_lossy().replace('\\', "/"),
            file_hash: rec.content_hash,
            license: rec.license_names,
            file_content_b64: compress_to_b64(&rec.text),
            file_content_is_text: !rec.is_empty,
        })
        .collect()
}

pub fn save(records: &[PersistedRecord], path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| AssessmentError::io(parent, e))?;
    }
    let json = serde_json::to_string_pretty(records)
        .map_err(|e| AssessmentError::invariant("Snapshot", format!("serialize failed: {e}")))?;
    std::fs::write(path, json).map_err(|e| AssessmentError::io(path, e))
}

/// Loads a snapshot; a missing file yields an empty registry rather than an error.
pub fn load(path: &Path) -> Result<Vec<PersistedRecord>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let text = std::fs::read_to_string(path).map_err(|e| AssessmentError::io(path, e))?;
    serde_json::from_str(&text).map_err(|e| AssessmentError::invariant("Snapshot", format!("malformed snapshot: {e}")))
}

/// Decodes one persisted record's content blob back to text.
pub fn decode_content(record: &PersistedRecord) -> Result<String> {
    decompress_from_b64(&record.file_content_b64)
}

pub struct DiffResult {
    pub new_or_changed: Vec<PersistedRecord>,
    pub removed: Vec<PersistedRecord>,
}

/// Computes new/changed and removed sets by content hash. Records with an empty or
/// missing hash are included unconditionally in both directions: an unreadable or
/// zero-length file is itself a signal worth surfacing on every comparison rather
/// than silently disappearing from the report.
pub fn diff(prior: &[PersistedRecord], current: &[PersistedRecord]) -> DiffResult {
    let prior_hashes: std::collections::HashSet<&str> =
        prior.iter().filter(|r| !r.file_hash.is_empty()).map(|r| r.file_hash.as_str()).collect();
    let current_hashes: std::collections::HashSet<&str> =
        current.iter().filter(|r| !r.file_hash.is_empty()).map(|r| r.file_hash.as_str()).collect();

    let new_or_changed = current
        .iter()
        .filter(|r| r.file_hash.is_empty() || !prior_hashes.contains(r.file_hash.as_str()))
        .cloned()
        .collect();

    let removed = prior
        .iter()
        .filter(|r| r.file_hash.is_empty() || !current_hashes.contains(r.file_hash.as_str()))
        .cloned()
        .collect();

    DiffResult { new_or_changed, removed }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(path: &str, hash: &str) -> PersistedRecord {
        PersistedRecord {
            file_path: path.to_string(),
            file_hash: hash.to_string(),
            license: vec![],
            file_content_b64: compress_to_b64("hello"),
            file_content_is_text: true,
        }
    }

    #[test]
    fn round_trips_compressed_content() {
        let p = rec("a.txt", "h1");
        assert_eq!(decode_content(&p).unwrap(), "hello");
    }

    #[test]
    fn diff_against_self_is_empty() {
        let a = vec![rec("A", "hA"), rec("B", "hB")];
        let d = diff(&a, &a);
        assert!(d.new_or_changed.is_empty());
        assert!(d.removed.is_empty());
    }

    #[test]
    fn detects_changed_and_new_files() {
        let prior = vec![rec("A", "hA"), rec("B", "hB")];
        let current = vec![rec("A", "hA"), rec("B", "hB2"), rec("C", "hC")];
        let d = diff(&prior, &current);
        let changed_paths: Vec<&str> = d.new_or_changed.iter().map(|r| r.file_path.as_str()).collect();
        assert_eq!(changed_paths, vec!["B", "C"]);
        assert!(d.removed.is_empty());
    }

    #[test]
    fn empty_hash_records_appear_on_both_sides() {
        let prior = vec![rec("A", "")];
        let current = vec![rec("A", "")];
        let d = diff(&prior, &current);
        assert_eq!(d.new_or_changed.len(), 1);
        assert_eq!(d.removed.len(), 1);
    }

    #[test]
    fn load_missing_file_yields_empty_vec() {
        let records = load(Path::new("/nonexistent/path/to/snapshot.json")).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snap.json");
        let records = vec![rec("A", "hA")];
        save(&records, &path).unwrap();
        let loaded = load(&path).unwrap();
        assert_eq!(loaded, records);
    }
}
