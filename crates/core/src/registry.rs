//! Shared pipeline state: the `FileRecord` data model and the `FileRegistry` that
//! holds one record per extracted file, keyed by absolute path.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchStrength {
    Exact,
    Fuzzy,
    None,
}

impl Default for MatchStrength {
    fn default() -> Self {
        MatchStrength::None
    }
}

/// A single token with its normalized form and character span in the owning text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub word: String,
    pub norm: String,
    pub start: usize,
    pub end: usize,
}

/// A 4-gram anchor key: four consecutive normalized tokens.
pub type AnchorKey = (String, String, String, String);

pub const ANCHOR_SIZE: usize = 4;

/// Per-file token index: full spans plus an anchor table for fuzzy alignment seeding.
#[derive(Debug, Clone, Default)]
pub struct TokenIndex {
    pub text: String,
    pub tokens: Vec<Token>,
    pub anchor_positions: BTreeMap<AnchorKey, Vec<usize>>,
}

/// Pattern (license/header) index: norm-only tokens plus an anchor key set for
/// O(1) intersection against a `TokenIndex`.
#[derive(Debug, Clone, Default)]
pub struct PatternIndex {
    pub source_name: String,
    pub text: String,
    pub tokens: Vec<String>,
    pub anchor_positions: BTreeMap<AnchorKey, Vec<usize>>,
}

impl PatternIndex {
    pub fn anchor_keys(&self) -> std::collections::HashSet<&AnchorKey> {
        self.anchor_positions.keys().collect()
    }
}

/// A single candidate or accepted license match, produced by the exact or fuzzy stage.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MatchResult {
    pub matched_substring: String,
    pub match_percent: f64,
    pub start_index: usize,
    pub end_index: usize,
    pub license_name: String,
    pub expected_versions: Vec<String>,
    pub found_versions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExactLicenseMatch {
    pub license_name: String,
    pub license_text: String,
}

/// One per extracted file, enriched in place by successive pipeline stages.
#[derive(Debug, Clone, Default)]
pub struct FileRecord {
    pub path: PathBuf,
    pub relative_path: PathBuf,
    pub raw_bytes: Option<Vec<u8>>,
    pub text: String,
    pub normalized_text: String,
    pub is_empty: bool,
    pub content_hash: String,
    pub extension: String,
    pub is_released: bool,
    pub license_names: Vec<String>,
    pub exact_license_matches: Vec<ExactLicenseMatch>,
    pub fuzzy_license_candidates: Vec<MatchResult>,
    pub best_fuzzy_match: Option<MatchResult>,
    pub license_match_strength: MatchStrength,
    pub keyword_matches: BTreeMap<String, Vec<String>>,
    pub token_index: Option<TokenIndex>,
}

impl FileRecord {
    pub fn new(path: PathBuf, relative_path: PathBuf) -> Self {
        let extension = derive_extension(&relative_path);
        FileRecord {
            path,
            relative_path,
            extension,
            is_released: true,
            license_match_strength: MatchStrength::None,
            ..Default::default()
        }
    }

    /// Drops the transient on-disk bytes once hashing and decoding are complete.
    pub fn release_bytes(&mut self) {
        self.raw_bytes = None;
    }
}

/// Lowercased final suffix with its leading dot kept (matching `os.path.splitext`,
/// e.g. `README.TXT` → `.txt`), or the whole filename if it is dot-prefixed with no
/// further extension (e.g. `.gitignore` stays `.gitignore`).
fn derive_extension(relative_path: &Path) -> String {
    let name = relative_path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    match relative_path.extension().and_then(|e| e.to_str()) {
        Some(ext) if !name.starts_with('.') || name.matches('.').count() > 1 => format!(".{}", ext.to_lowercase()),
        _ => name.to_lowercase(),
    }
}

/// Maps absolute path to `FileRecord`. The only cross-worker writer in the pipeline;
/// admits at-most-once insertion per key, after which stages mutate distinct records
/// without needing inter-record synchronization.
#[derive(Debug, Default)]
pub struct FileRegistry {
    records: DashMap<PathBuf, FileRecord>,
}

impl FileRegistry {
    pub fn new() -> Self {
        FileRegistry { records: DashMap::new() }
    }

    /// Inserts `record` iff its path is not already present. Returns false if a record
    /// for that path already existed (the insert was a no-op).
    pub fn insert_once(&self, record: FileRecord) -> bool {
        let key = record.path.clone();
        if self.records.contains_key(&key) {
            return false;
        }
        self.records.insert(key, record).is_none()
    }

    pub fn get(&self, path: &Path) -> Option<dashmap::mapref::one::Ref<'_, PathBuf, FileRecord>> {
        self.records.get(path)
    }

    pub fn get_mut(&self, path: &Path) -> Option<dashmap::mapref::one::RefMut<'_, PathBuf, FileRecord>> {
        self.records.get_mut(path)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> dashmap::iter::Iter<'_, PathBuf, FileRecord> {
        self.records.iter()
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.records.iter().map(|e| e.key().clone()).collect()
    }

    /// Snapshot of all records, cloned out for stages (Snapshot/Report) that need an
    /// owned, stably-ordered view.
    pub fn to_vec(&self) -> Vec<FileRecord> {
        let mut v: Vec<FileRecord> = self.records.iter().map(|e| e.value().clone()).collect();
        v.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_once_rejects_duplicate_path() {
        let reg = FileRegistry::new();
        let p = PathBuf::from("/a/b.txt");
        assert!(reg.insert_once(FileRecord::new(p.clone(), PathBuf::from("b.txt"))));
        assert!(!reg.insert_once(FileRecord::new(p, PathBuf::from("b.txt"))));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn extension_is_lowercased_suffix_with_dot() {
        let rec = FileRecord::new(PathBuf::from("/a/LICENSE.TXT"), PathBuf::from("LICENSE.TXT"));
        assert_eq!(rec.extension, ".txt");
    }

    #[test]
    fn dotfile_without_further_extension_keeps_whole_name() {
        let rec = FileRecord::new(PathBuf::from("/a/.gitignore"), PathBuf::from(".gitignore"));
        assert_eq!(rec.extension, ".gitignore");
    }
}
