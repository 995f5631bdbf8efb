//! Recursive archive extraction: classification, safe member extraction, archive
//! target-directory placement, and the two-phase (copy-then-fixed-point) algorithm
//! that guarantees no compressed or multi-file archive remains in the output tree.

use crate::config::AssessmentConfig;
use crate::error::{AssessmentError, Result};
use std::collections::HashSet;
use std::fs;
use std::io::{Read, Write};
use std::path::{Component, Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    MultiArchive,
    SingleCompressed,
    Plain,
}

const MULTI_COMPOUND_SUFFIXES: &[&str] = &[".tar.gz", ".tar.bz2", ".tar.xz"];
const MULTI_SINGLE_SUFFIXES: &[&str] = &[".zip", ".tar", ".jar", ".tgz", ".tbz2", ".txz"];
const SINGLE_COMPRESSED_SUFFIXES: &[&str] = &[".bz2", ".xz", ".lzma"];

fn lower_name(path: &Path) -> String {
    path.file_name().and_then(|n| n.to_str()).unwrap_or("").to_lowercase()
}

fn has_ancestor_dir_named(path: &Path, name: &str) -> bool {
    path.ancestors().skip(1).any(|a| a.file_name().and_then(|n| n.to_str()) == Some(name))
}

fn is_hex_hash_name(name: &str) -> bool {
    (32..=128).contains(&name.len()) && name.chars().all(|c| c.is_ascii_hexdigit())
}

/// Classifies a file purely by name (and, for the OCI layer-blob heuristic, by
/// whether an ancestor directory is literally named `sha256`).
pub fn classify(relative_path: &Path) -> Classification {
    let name = lower_name(relative_path);

    if MULTI_COMPOUND_SUFFIXES.iter().any(|s| name.ends_with(s)) {
        return Classification::MultiArchive;
    }
    if MULTI_SINGLE_SUFFIXES.iter().any(|s| name.ends_with(s)) {
        return Classification::MultiArchive;
    }
    if name.ends_with(".gz") {
        let stem = &name[..name.len() - 3];
        return if stem.contains('.') { Classification::SingleCompressed } else { Classification::MultiArchive };
    }
    if SINGLE_COMPRESSED_SUFFIXES.iter().any(|s| name.ends_with(s)) {
        return Classification::SingleCompressed;
    }
    if !name.contains('.') && is_hex_hash_name(&name) && has_ancestor_dir_named(relative_path, "sha256") {
        return Classification::MultiArchive;
    }
    Classification::Plain
}

/// Strips the archive suffix, preferring known compound suffixes before falling
/// back to a single-extension strip.
pub fn strip_archive_suffix(path: &Path) -> PathBuf {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("").to_string();
    let lower = name.to_lowercase();
    for suffix in MULTI_COMPOUND_SUFFIXES {
        if lower.ends_with(suffix) {
            let stripped = &name[..name.len() - suffix.len()];
            return path.with_file_name(stripped);
        }
    }
    match path.extension() {
        Some(_) => path.with_extension(""),
        None => path.to_path_buf(),
    }
}

fn single_compressed_target(path: &Path) -> PathBuf {
    path.with_extension("")
}

/// Lexically resolves `..`/`.` components without touching the filesystem, so a
/// not-yet-created extraction target can still be checked for traversal.
fn lexically_normalize(path: &Path) -> PathBuf {
    let mut stack: Vec<Component> = Vec::new();
    for comp in path.components() {
        match comp {
            Component::ParentDir => {
                stack.pop();
            }
            Component::CurDir => {}
            other => stack.push(other),
        }
    }
    stack.into_iter().collect()
}

fn is_within(root: &Path, candidate: &Path) -> bool {
    lexically_normalize(candidate).starts_with(lexically_normalize(root))
}

const WINDOWS_INVALID_CHARS: &[char] = &['<', '>', ':', '"', '|', '?', '*'];

fn has_invalid_chars(name: &str) -> bool {
    name.chars().any(|c| WINDOWS_INVALID_CHARS.contains(&c))
}

fn best_effort_chmod(_path: &Path, _mode: u32) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = fs::set_permissions(_path, fs::Permissions::from_mode(_mode & 0o777));
    }
}

/// Extracts a zip archive's members beneath `dest_root`. Aborts the whole archive
/// (returns `SecurityError`) on the first member whose resolved path escapes
/// `dest_root`.
fn extract_zip(archive_path: &Path, dest_root: &Path) -> Result<()> {
    let file = fs::File::open(archive_path).map_err(|e| AssessmentError::io(archive_path, e))?;
    let mut zip = zip::ZipArchive::new(file)
        .map_err(|e| AssessmentError::archive(archive_path, format!("invalid zip: {e}")))?;

    for i in 0..zip.len() {
        let mut entry = zip
            .by_index(i)
            .map_err(|e| AssessmentError::archive(archive_path, format!("bad zip member {i}: {e}")))?;
        let Some(enclosed) = entry.enclosed_name() else {
            return Err(AssessmentError::security(archive_path, entry.name().to_string()));
        };
        let target = dest_root.join(enclosed);
        if !is_within(dest_root, &target) {
            return Err(AssessmentError::security(archive_path, entry.name().to_string()));
        }
        if has_invalid_chars(&entry.name().to_string()) {
            continue;
        }

        if entry.is_dir() {
            fs::create_dir_all(&target).map_err(|e| AssessmentError::io(&target, e))?;
            continue;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| AssessmentError::io(parent, e))?;
        }
        let mut out = fs::File::create(&target).map_err(|e| AssessmentError::io(&target, e))?;
        std::io::copy(&mut entry, &mut out).map_err(|e| AssessmentError::io(&target, e))?;
        if let Some(mode) = entry.unix_mode() {
            best_effort_chmod(&target, mode);
        }
    }
    Ok(())
}

enum TarCompression {
    None,
    Gzip,
    Bzip2,
    Xz,
}

fn tar_reader(compression: TarCompression, raw: fs::File) -> Box<dyn Read> {
    match compression {
        TarCompression::None => Box::new(raw),
        TarCompression::Gzip => Box::new(flate2::read::GzDecoder::new(raw)),
        TarCompression::Bzip2 => Box::new(bzip2::read::BzDecoder::new(raw)),
        TarCompression::Xz => Box::new(xz2::read::XzDecoder::new(raw)),
    }
}

fn extract_tar(archive_path: &Path, dest_root: &Path, compression: TarCompression) -> Result<()> {
    let raw = fs::File::open(archive_path).map_err(|e| AssessmentError::io(archive_path, e))?;
    let reader = tar_reader(compression, raw);
    let mut archive = tar::Archive::new(reader);

    let entries = archive
        .entries()
        .map_err(|e| AssessmentError::archive(archive_path, format!("invalid tar: {e}")))?;

    for entry in entries {
        let mut entry = entry.map_err(|e| AssessmentError::archive(archive_path, format!("bad tar entry: {e}")))?;
        let kind = entry.header().entry_type();
        if !(kind.is_file() || kind.is_dir()) {
            continue; // symlinks, devices, FIFOs, hardlinks skipped
        }
        let entry_path = entry
            .path()
            .map_err(|e| AssessmentError::archive(archive_path, format!("bad tar path: {e}")))?
            .into_owned();
        let name = entry_path.to_string_lossy().to_string();
        let target = dest_root.join(&entry_path);
        if !is_within(dest_root, &target) {
            return Err(AssessmentError::security(archive_path, name));
        }
        if has_invalid_chars(&name) {
            continue;
        }

        if kind.is_dir() {
            fs::create_dir_all(&target).map_err(|e| AssessmentError::io(&target, e))?;
            continue;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| AssessmentError::io(parent, e))?;
        }
        let mode = entry.header().mode().unwrap_or(0o644);
        entry.unpack(&target).map_err(|e| AssessmentError::io(&target, e))?;
        best_effort_chmod(&target, mode);
    }
    Ok(())
}

/// Determines the tar layer's compression from the member name. Extensionless
/// names (OCI layer blobs) and bare dotless `.gz` archives default to gzip, the
/// overwhelmingly common case for both.
fn tar_compression_for(name: &str) -> TarCompression {
    if name.ends_with(".tar.bz2") || name.ends_with(".tbz2") {
        TarCompression::Bzip2
    } else if name.ends_with(".tar.xz") || name.ends_with(".txz") {
        TarCompression::Xz
    } else if name.ends_with(".tar") {
        TarCompression::None
    } else {
        TarCompression::Gzip
    }
}

/// Lists each archive's top-level entry names (first path component), for the
/// wrapper-flattening decision.
fn list_top_level_entries(archive_path: &Path, is_zip: bool, compression: TarCompression) -> Result<Vec<String>> {
    let mut names = Vec::new();
    if is_zip {
        let file = fs::File::open(archive_path).map_err(|e| AssessmentError::io(archive_path, e))?;
        let mut zip = zip::ZipArchive::new(file)
            .map_err(|e| AssessmentError::archive(archive_path, format!("invalid zip: {e}")))?;
        for i in 0..zip.len() {
            let entry = zip.by_index(i).map_err(|e| AssessmentError::archive(archive_path, e.to_string()))?;
            if let Some(enclosed) = entry.enclosed_name() {
                if let Some(Component::Normal(first)) = enclosed.components().next() {
                    names.push(first.to_string_lossy().to_string());
                }
            }
        }
    } else {
        let raw = fs::File::open(archive_path).map_err(|e| AssessmentError::io(archive_path, e))?;
        let reader = tar_reader(compression, raw);
        let mut archive = tar::Archive::new(reader);
        let entries = archive.entries().map_err(|e| AssessmentError::archive(archive_path, e.to_string()))?;
        for entry in entries {
            let entry = entry.map_err(|e| AssessmentError::archive(archive_path, e.to_string()))?;
            if let Ok(path) = entry.path() {
                if let Some(Component::Normal(first)) = path.components().next() {
                    names.push(first.to_string_lossy().to_string());
                }
            }
        }
    }
    names.sort();
    names.dedup();
    Ok(names)
}

fn archive_stem(relative_path: &Path) -> String {
    strip_archive_suffix(relative_path)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// Resolves the directory a multi-archive's members are extracted into, applying
/// the single-top-level-entry wrapper-flattening rule from §4.A.
fn archive_target_dir(src: &Path, relative_path: &Path, is_zip: bool, compression_name: &str) -> Result<PathBuf> {
    let default_target = strip_archive_suffix(relative_path);
    let compression = tar_compression_for(compression_name);
    let top_level = list_top_level_entries(src, is_zip, compression).unwrap_or_default();
    let stem = archive_stem(relative_path);
    if top_level.len() == 1 && top_level[0] == stem {
        Ok(relative_path.parent().map(Path::to_path_buf).unwrap_or_default())
    } else {
        Ok(default_target)
    }
}

fn decompress_single(src: &Path, dest: &Path) -> Result<()> {
    let name = lower_name(src);
    let file = fs::File::open(src).map_err(|e| AssessmentError::io(src, e))?;
    let mut reader: Box<dyn Read> = if name.ends_with(".gz") {
        Box::new(flate2::read::GzDecoder::new(file))
    } else if name.ends_with(".bz2") {
        Box::new(bzip2::read::BzDecoder::new(file))
    } else if name.ends_with(".xz") || name.ends_with(".lzma") {
        Box::new(xz2::read::XzDecoder::new(file))
    } else {
        return Err(AssessmentError::archive(src, "unknown single-file compression"));
    };
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|e| AssessmentError::io(parent, e))?;
    }
    let mut out = fs::File::create(dest).map_err(|e| AssessmentError::io(dest, e))?;
    std::io::copy(&mut reader, &mut out).map_err(|e| AssessmentError::io(dest, e))?;
    Ok(())
}

fn is_zip_name(name: &str) -> bool {
    name.ends_with(".zip") || name.ends_with(".jar")
}

/// Extracts a multi-file archive at `src` (whose relative path within the tree is
/// `relative_path`) into `dest_root`, honoring the target-directory and collision
/// rules from §4.A. On malformed-archive failure, the caller is told to fall back
/// to a plain copy.
fn extract_multi_archive(src: &Path, relative_path: &Path, dest_root: &Path) -> Result<()> {
    let name = lower_name(src);
    let is_zip = is_zip_name(&name);

    let target_rel = archive_target_dir(src, relative_path, is_zip, &name)?;
    let target = dest_root.join(&target_rel);
    let mirrored_source = dest_root.join(relative_path);

    let extract_to = if target == mirrored_source {
        target.with_file_name(format!("{}_extracted", target.file_name().and_then(|n| n.to_str()).unwrap_or("archive")))
    } else {
        target.clone()
    };
    fs::create_dir_all(&extract_to).map_err(|e| AssessmentError::io(&extract_to, e))?;

    if is_zip {
        extract_zip(src, &extract_to)?;
    } else {
        extract_tar(src, &extract_to, tar_compression_for(&name))?;
    }

    if extract_to != target {
        if target.exists() {
            if target.is_dir() {
                fs::remove_dir_all(&target).map_err(|e| AssessmentError::io(&target, e))?;
            } else {
                fs::remove_file(&target).map_err(|e| AssessmentError::io(&target, e))?;
            }
        }
        fs::rename(&extract_to, &target).map_err(|e| AssessmentError::io(&target, e))?;
    }
    Ok(())
}

fn copy_plain(src: &Path, dest: &Path) -> Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|e| AssessmentError::io(parent, e))?;
    }
    fs::copy(src, dest).map_err(|e| AssessmentError::io(dest, e))?;
    Ok(())
}

/// Phase 1: walks `source`, copying plain files, decompressing single-compressed
/// files, and extracting multi-archives into the mirrored destination tree.
fn copy_tree_with_extraction(source: &Path, destination: &Path) -> Vec<AssessmentError> {
    let mut errors = Vec::new();
    let mut stack = vec![source.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let entries = match fs::read_dir(&dir) {
            Ok(e) => e,
            Err(e) => {
                errors.push(AssessmentError::io(&dir, e));
                continue;
            }
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
                continue;
            }
            let relative = path.strip_prefix(source).unwrap_or(&path).to_path_buf();
            let dest_mirror = destination.join(&relative);

            match classify(&relative) {
                Classification::Plain => {
                    if let Err(e) = copy_plain(&path, &dest_mirror) {
                        errors.push(e);
                    }
                }
                Classification::SingleCompressed => {
                    let target = destination.join(single_compressed_target(&relative));
                    if let Err(e) = decompress_single(&path, &target) {
                        tracing::warn!(path = %path.display(), error = %e, "archive decompression failed, copying as plain file");
                        let _ = copy_plain(&path, &dest_mirror);
                    }
                }
                Classification::MultiArchive => match extract_multi_archive(&path, &relative, destination) {
                    Ok(()) => {}
                    Err(e @ AssessmentError::Security { .. }) => {
                        tracing::error!(path = %path.display(), error = %e, "path traversal detected, aborting archive");
                        errors.push(e);
                    }
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "archive extraction failed, copying as plain file");
                        let _ = copy_plain(&path, &dest_mirror);
                    }
                },
            }
        }
    }
    errors
}

/// Phase 2: repeatedly walks `destination` until a full pass extracts nothing new.
fn extract_nested_archives(destination: &Path) -> Vec<AssessmentError> {
    let mut errors = Vec::new();
    let mut processed: HashSet<PathBuf> = HashSet::new();

    loop {
        let mut changed = false;
        let mut stack = vec![destination.to_path_buf()];
        let mut files = Vec::new();
        while let Some(dir) = stack.pop() {
            let Ok(entries) = fs::read_dir(&dir) else { continue };
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_dir() {
                    stack.push(path);
                } else {
                    files.push(path);
                }
            }
        }

        for path in files {
            let canonical = path.canonicalize().unwrap_or_else(|_| path.clone());
            if processed.contains(&canonical) {
                continue;
            }
            let relative = path.strip_prefix(destination).unwrap_or(&path).to_path_buf();
            match classify(&relative) {
                Classification::Plain => {
                    processed.insert(canonical);
                }
                Classification::SingleCompressed => {
                    let target = path.with_extension("").to_path_buf();
                    match decompress_single(&path, &target) {
                        Ok(()) => {
                            let _ = fs::remove_file(&path);
                            changed = true;
                        }
                        Err(e) => {
                            tracing::warn!(path = %path.display(), error = %e, "in-place decompression failed");
                        }
                    }
                    processed.insert(canonical);
                }
                Classification::MultiArchive => {
                    match extract_multi_archive(&path, &relative, destination) {
                        Ok(()) => {
                            let _ = fs::remove_file(&path);
                            changed = true;
                        }
                        Err(e @ AssessmentError::Security { .. }) => {
                            tracing::error!(path = %path.display(), error = %e, "path traversal detected, aborting archive");
                            errors.push(e);
                        }
                        Err(e) => {
                            tracing::warn!(path = %path.display(), error = %e, "in-place archive extraction failed");
                        }
                    }
                    processed.insert(canonical);
                }
            }
        }

        if !changed {
            break;
        }
    }
    errors
}

/// Materializes `source` beneath `destination` such that no multi-file archive and
/// no single-file compressed file remain anywhere in the tree. Returns the
/// non-fatal errors accumulated along the way (per-archive/per-file failures are
/// confined, not propagated).
pub fn extract(source: &Path, destination: &Path, _config: &AssessmentConfig) -> Result<Vec<AssessmentError>> {
    if !source.exists() {
        return Err(AssessmentError::config(format!("source path does not exist: {}", source.display())));
    }
    fs::create_dir_all(destination).map_err(|e| AssessmentError::io(destination, e))?;

    let mut errors = copy_tree_with_extraction(source, destination);
    errors.extend(extract_nested_archives(destination));
    Ok(errors)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_common_multi_archives() {
        assert_eq!(classify(Path::new("a/b.zip")), Classification::MultiArchive);
        assert_eq!(classify(Path::new("a/b.tar.gz")), Classification::MultiArchive);
        assert_eq!(classify(Path::new("a/b.tgz")), Classification::MultiArchive);
        assert_eq!(classify(Path::new("a/b.jar")), Classification::MultiArchive);
    }

    #[test]
    fn bare_gz_with_dotless_stem_is_multi_archive() {
        assert_eq!(classify(Path::new("a/archive.gz")), Classification::MultiArchive);
    }

    #[test]
    fn gz_with_dotted_stem_is_single_compressed() {
        assert_eq!(classify(Path::new("a/README.txt.gz")), Classification::SingleCompressed);
    }

    #[test]
    fn plain_file_is_plain() {
        assert_eq!(classify(Path::new("a/main.rs")), Classification::Plain);
    }

    #[test]
    fn hex_name_under_sha256_dir_is_layer_blob() {
        let hex = "a".repeat(64);
        let p = PathBuf::from(format!("blobs/sha256/{hex}"));
        assert_eq!(classify(&p), Classification::MultiArchive);
    }

    #[test]
    fn hex_name_without_sha256_ancestor_is_plain() {
        let hex = "a".repeat(64);
        let p = PathBuf::from(format!("other/{hex}"));
        assert_eq!(classify(&p), Classification::Plain);
    }

    #[test]
    fn strip_archive_suffix_prefers_compound_suffix() {
        assert_eq!(strip_archive_suffix(Path::new("a/foo.tar.gz")), PathBuf::from("a/foo"));
        assert_eq!(strip_archive_suffix(Path::new("a/foo.zip")), PathBuf::from("a/foo"));
    }

    #[test]
    fn traversal_outside_root_is_rejected() {
        assert!(!is_within(Path::new("/dest"), Path::new("/dest/../evil.txt")));
        assert!(is_within(Path::new("/dest"), Path::new("/dest/sub/file.txt")));
    }

    #[test]
    fn extract_zip_with_traversal_member_aborts_as_security_error() {
        let dir = tempfile::tempdir().unwrap();
        let archive_path = dir.path().join("evil.zip");
        {
            let file = fs::File::create(&archive_path).unwrap();
            let mut writer = zip::ZipWriter::new(file);
            let opts = zip::write::FileOptions::default();
            writer.start_file("../evil.txt", opts).unwrap();
            writer.write_all(b"gotcha").unwrap();
            writer.finish().unwrap();
        }
        let dest = dir.path().join("dest");
        fs::create_dir_all(&dest).unwrap();
        let result = extract_zip(&archive_path, &dest);
        assert!(matches!(result, Err(AssessmentError::Security { .. })));
        assert!(!dir.path().join("evil.txt").exists());
    }

    #[test]
    fn extract_plain_zip_round_trips_content() {
        let dir = tempfile::tempdir().unwrap();
        let archive_path = dir.path().join("good.zip");
        {
            let file = fs::File::create(&archive_path).unwrap();
            let mut writer = zip::ZipWriter::new(file);
            let opts = zip::write::FileOptions::default();
            writer.start_file("hello.txt", opts).unwrap();
            writer.write_all(b"hi there").unwrap();
            writer.finish().unwrap();
        }
        let dest = dir.path().join("dest");
        fs::create_dir_all(&dest).unwrap();
        extract_zip(&archive_path, &dest).unwrap();
        let content = fs::read_to_string(dest.join("hello.txt")).unwrap();
        assert_eq!(content, "hi there");
    }
}
