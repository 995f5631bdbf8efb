//! Parallel file walk: hashes and decodes every extracted file into the registry.

use crate::config::AssessmentConfig;
use crate::error::AssessmentError;
use crate::index::default_pool_size;
use crate::registry::{FileRecord, FileRegistry};
use ignore::WalkBuilder;
use rayon::prelude::*;
use std::path::{Path, PathBuf};

/// Walks every regular file under `root`, with gitignore/hidden-file filtering
/// disabled: the extracted tree is a raw artifact, not a source checkout, so every
/// file is a candidate for assessment regardless of dotfiles or `.gitignore` rules.
fn collect_files(root: &Path) -> Vec<PathBuf> {
    WalkBuilder::new(root)
        .standard_filters(false)
        .hidden(false)
        .build()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .map(|entry| entry.into_path())
        .collect()
}

fn read_one(path: &Path, root: &Path, config: &AssessmentConfig) -> Result<FileRecord, AssessmentError> {
    let relative = path.strip_prefix(root).unwrap_or(path).to_path_buf();
    let bytes = std::fs::read(path).map_err(|e| AssessmentError::io(path, e))?;
    let algo = crate::hashing::resolve(&config.file_hash_algorithm)
        .ok_or_else(|| AssessmentError::config(format!("unsupported hash algorithm: {}", config.file_hash_algorithm)))?;
    let content_hash = algo.digest(&bytes);
    let is_empty = bytes.is_empty();
    let text = crate::normalize::decode_lossy(&bytes);

    let mut record = FileRecord::new(path.to_path_buf(), relative);
    record.content_hash = content_hash;
    record.is_empty = is_empty;
    record.text = text;
    record.raw_bytes = Some(bytes);
    Ok(record)
}

/// Walks `root` in parallel (pool sized per [`default_pool_size`]), skipping any path
/// matching a configured ignore segment, and inserts one `FileRecord` per surviving
/// file into `registry`. Per-file I/O failures are logged and skipped rather than
/// aborting the whole walk.
pub fn read_tree(root: &Path, config: &AssessmentConfig, registry: &FileRegistry) {
    let files: Vec<PathBuf> = collect_files(root).into_iter().filter(|p| !config.is_ignored(p)).collect();

    let pool = rayon::ThreadPoolBuilder::new().num_threads(default_pool_size()).build();
    let run = || {
        files.par_iter().for_each(|path| match read_one(path, root, config) {
            Ok(mut record) => {
                record.release_bytes();
                registry.insert_once(record);
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping unreadable file");
            }
        });
    };

    match pool {
        Ok(pool) => pool.install(run),
        Err(_) => run(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(ignore: &[&str]) -> AssessmentConfig {
        AssessmentConfig::parse(&format!(
            "SOURCE_DIR=/s\nDEST_DIR=/d\nASSESSMENT_NAME=a\nFILE_HASH_ALGORITHM=sha256\nIGNORE_DIRS={}\nOUTPUT_DIR=/o\nDATA_DIR=/data\n",
            ignore.join(",")
        ))
        .unwrap()
    }

    #[test]
    fn reads_files_and_computes_hash() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"hello").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/b.txt"), b"").unwrap();

        let registry = FileRegistry::new();
        read_tree(dir.path(), &cfg(&[]), &registry);

        assert_eq!(registry.len(), 2);
        let a = registry.get(&dir.path().join("a.txt")).unwrap();
        assert_eq!(a.content_hash, crate::hashing::resolve("sha256").unwrap().digest(b"hello"));
        assert!(a.raw_bytes.is_none());

        let b = registry.get(&dir.path().join("sub/b.txt")).unwrap();
        assert!(b.is_empty);
    }

    #[test]
    fn ignored_segments_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("node_modules")).unwrap();
        std::fs::write(dir.path().join("node_modules/pkg.js"), b"x").unwrap();
        std::fs::write(dir.path().join("keep.txt"), b"y").unwrap();

        let registry = FileRegistry::new();
        read_tree(dir.path(), &cfg(&["node_modules"]), &registry);

        assert_eq!(registry.len(), 1);
        assert!(registry.get(&dir.path().join("keep.txt")).is_some());
    }
}
