//! `.properties`-style configuration loading.
//!
//! Keys split on the first `=` or `:`; lines starting with `#` or `;` are comments.
//! No escape processing is performed, matching the source format exactly.

use crate::error::{AssessmentError, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct AssessmentConfig {
    pub source_dir: PathBuf,
    pub dest_dir: PathBuf,
    pub source_project_name: String,
    pub assessment_name: String,
    pub source_dir_is_network: bool,
    pub dest_dir_is_network: bool,
    pub ignore_dirs: Vec<String>,
    pub spdx_licenses_dir: Option<PathBuf>,
    pub manual_licenses_dir: Option<PathBuf>,
    pub spdx_license_headers_dir: Option<PathBuf>,
    pub manual_license_headers_dir: Option<PathBuf>,
    pub file_hash_algorithm: String,
    pub output_dir: PathBuf,
    pub data_dir: PathBuf,
    pub review_file_dir: Option<PathBuf>,
}

const REQUIRED_KEYS: &[&str] = &["SOURCE_DIR", "DEST_DIR", "ASSESSMENT_NAME", "FILE_HASH_ALGORITHM"];

const KNOWN_KEYS: &[&str] = &[
    "SOURCE_DIR",
    "DEST_DIR",
    "SOURCE_PROJECT_NAME",
    "ASSESSMENT_NAME",
    "SOURCE_DIR_IS_NETWORK",
    "DEST_DIR_IS_NETWORK",
    "IGNORE_DIRS",
    "SPDX_LICENSES_DIR",
    "MANUAL_LICENSES_DIR",
    "SPDX_LICENSE_HEADERS_DIR",
    "MANUAL_LICENSE_HEADERS_DIR",
    "FILE_HASH_ALGORITHM",
    "OUTPUT_DIR",
    "DATA_DIR",
    "REVIEW_FILE_DIR",
];

/// Parses raw `.properties` text into an ordered key/value map, preserving first-wins
/// semantics on duplicate keys the way a naive line-by-line reader would.
fn parse_properties(text: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        let split = line.find('=').map(|i| (i, '=')).or_else(|| line.find(':').map(|i| (i, ':')));
        let Some((idx, _)) = split else { continue };
        let key = line[..idx].trim().to_string();
        let value = line[idx + 1..].trim().to_string();
        map.entry(key).or_insert(value);
    }
    map
}

fn join_path(root: &str, child: &str, is_network: bool) -> PathBuf {
    if is_network {
        let root = root.replace('/', "\\");
        PathBuf::from(format!("{}\\{}", root.trim_end_matches('\\'), child))
    } else {
        Path::new(root).join(child)
    }
}

impl AssessmentConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| AssessmentError::config(format!("cannot read {}: {e}", path.display())))?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self> {
        let map = parse_properties(text);

        for key in REQUIRED_KEYS {
            if !map.contains_key(*key) {
                return Err(AssessmentError::config(format!("missing required key {key}")));
            }
        }

        for key in map.keys() {
            if !KNOWN_KEYS.contains(&key.as_str()) {
                tracing::warn!(key = %key, "unrecognized configuration key");
            }
        }

        let get = |k: &str| map.get(k).cloned().unwrap_or_default();
        let is_true = |k: &str| map.get(k).map(|v| v.as_str()) == Some("True");

        let source_dir_is_network = is_true("SOURCE_DIR_IS_NETWORK");
        let dest_dir_is_network = is_true("DEST_DIR_IS_NETWORK");

        let raw_source_dir = get("SOURCE_DIR");
        let raw_dest_dir = get("DEST_DIR");
        let source_project_name = get("SOURCE_PROJECT_NAME");
        let assessment_name = get("ASSESSMENT_NAME");

        let source_dir = if source_project_name.is_empty() {
            PathBuf::from(&raw_source_dir)
        } else {
            join_path(&raw_source_dir, &source_project_name, source_dir_is_network)
        };
        let dest_dir = if assessment_name.is_empty() {
            PathBuf::from(&raw_dest_dir)
        } else {
            join_path(&raw_dest_dir, &assessment_name, dest_dir_is_network)
        };

        let ignore_dirs = get("IGNORE_DIRS")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let file_hash_algorithm = get("FILE_HASH_ALGORITHM").to_lowercase();
        if crate::hashing::resolve(&file_hash_algorithm).is_none() {
            return Err(AssessmentError::config(format!(
                "unsupported FILE_HASH_ALGORITHM: {file_hash_algorithm}"
            )));
        }

        let opt_path = |k: &str| map.get(k).filter(|v| !v.is_empty()).map(PathBuf::from);

        Ok(AssessmentConfig {
            source_dir,
            dest_dir,
            source_project_name,
            assessment_name,
            source_dir_is_network,
            dest_dir_is_network,
            ignore_dirs,
            spdx_licenses_dir: opt_path("SPDX_LICENSES_DIR"),
            manual_licenses_dir: opt_path("MANUAL_LICENSES_DIR"),
            spdx_license_headers_dir: opt_path("SPDX_LICENSE_HEADERS_DIR"),
            manual_license_headers_dir: opt_path("MANUAL_LICENSE_HEADERS_DIR"),
            file_hash_algorithm,
            output_dir: PathBuf::from(get("OUTPUT_DIR")),
            data_dir: PathBuf::from(get("DATA_DIR")),
            review_file_dir: opt_path("REVIEW_FILE_DIR"),
        })
    }

    /// Returns true when `path`'s string form contains any configured ignore segment.
    pub fn is_ignored(&self, path: &Path) -> bool {
        let s = path.to_string_lossy();
        self.ignore_dirs.iter().any(|seg| !seg.is_empty() && s.contains(seg.as_str()))
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.data_dir.join(format!("{}.json", self.assessment_name))
    }
}
