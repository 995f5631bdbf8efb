//! Exact license detection via normalized substring containment.

use crate::registry::{ExactLicenseMatch, FileRecord, MatchStrength};

/// A license text corpus entry, already normalized at load time.
#[derive(Debug, Clone)]
pub struct LicenseCorpusEntry {
    pub license_name: String,
    pub normalized_text: String,
}

/// Scans one record against the corpus, mutating `license_match_strength`,
/// `exact_license_matches`, and appending matched names to `license_names`.
pub fn scan_record(record: &mut FileRecord, corpus: &[LicenseCorpusEntry]) {
    if record.normalized_text.is_empty() {
        return;
    }
    let file_text = &record.normalized_text;
    for entry in corpus {
        if entry.normalized_text.is_empty() {
            continue;
        }
        if entry.normalized_text.len() <= file_text.len() && file_text.contains(&entry.normalized_text) {
            record.exact_license_matches.push(ExactLicenseMatch {
                license_name: entry.license_name.clone(),
                license_text: entry.normalized_text.clone(),
            });
            record.license_names.push(entry.license_name.clone());
            record.license_match_strength = MatchStrength::Exact;
        }
    }
}

/// Scans every record in the registry against `corpus`.
pub fn scan_registry(registry: &crate::registry::FileRegistry, corpus: &[LicenseCorpusEntry]) {
    for path in registry.paths() {
        if let Some(mut rec) = registry.get_mut(&path) {
            scan_record(&mut rec, corpus);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn corpus() -> Vec<LicenseCorpusEntry> {
        vec![LicenseCorpusEntry {
            license_name: "MIT".to_string(),
            normalized_text: crate::normalize::normalize("Permission is hereby granted free of charge"),
        }]
    }

    #[test]
    fn detects_substring_containment() {
        let mut rec = FileRecord::new(PathBuf::from("/a/b.txt"), PathBuf::from("b.txt"));
        rec.normalized_text = crate::normalize::normalize(
            "some preamble permission is hereby granted free of charge trailing text",
        );
        scan_record(&mut rec, &corpus());
        assert_eq!(rec.license_names, vec!["MIT".to_string()]);
        assert_eq!(rec.license_match_strength, MatchStrength::Exact);
    }

    #[test]
    fn no_match_when_license_longer_than_file() {
        let mut rec = FileRecord::new(PathBuf::from("/a/b.txt"), PathBuf::from("b.txt"));
        rec.normalized_text = "short".to_string();
        scan_record(&mut rec, &corpus());
        assert!(rec.exact_license_matches.is_empty());
        assert_eq!(rec.license_match_strength, MatchStrength::None);
    }

    #[test]
    fn empty_normalized_text_is_skipped() {
        let mut rec = FileRecord::new(PathBuf::from("/a/b.txt"), PathBuf::from("b.txt"));
        scan_record(&mut rec, &corpus());
        assert!(rec.license_names.is_empty());
    }
}
