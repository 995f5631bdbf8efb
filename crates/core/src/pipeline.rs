//! Explicit pipeline context: wires Config → Extractor → Reader → Normalizer →
//! Indexer → {ExactMatcher, FuzzyMatcher → MatchArbiter, KeywordScanner} →
//! Snapshot → ReportWriter. Each stage receives an immutable configuration
//! snapshot and the shared, mutable registry handle.

use crate::config::AssessmentConfig;
use crate::error::{AssessmentError, Result};
use crate::exact_match::LicenseCorpusEntry;
use crate::index::build_pattern_index;
use crate::registry::{FileRegistry, PatternIndex};
use crate::snapshot::DiffResult;
use std::path::Path;

/// Owns the configuration for one assessment run and drives every stage against a
/// fresh `FileRegistry`.
pub struct Pipeline<'a> {
    pub config: &'a AssessmentConfig,
    pub registry: FileRegistry,
}

/// Loads every regular file directly under `dir` as a `(stem, normalized_text)`
/// pair; a missing or unconfigured directory yields an empty corpus rather than
/// an error, since exact/fuzzy corpora are optional.
fn load_corpus_dir(dir: Option<&Path>) -> Vec<(String, String)> {
    let Some(dir) = dir else { return Vec::new() };
    let Ok(entries) = std::fs::read_dir(dir) else {
        tracing::warn!(dir = %dir.display(), "corpus directory unreadable, skipping");
        return Vec::new();
    };
    let mut out = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Ok(bytes) = std::fs::read(&path) else { continue };
        let stem = path.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default();
        let text = crate::normalize::normalize(&crate::normalize::decode_lossy(&bytes));
        out.push((stem, text));
    }
    out
}

fn build_exact_corpus(config: &AssessmentConfig) -> Vec<LicenseCorpusEntry> {
    let mut corpus = Vec::new();
    for dir in [config.spdx_licenses_dir.as_deref(), config.manual_licenses_dir.as_deref()] {
        for (stem, text) in load_corpus_dir(dir) {
            corpus.push(LicenseCorpusEntry { license_name: stem, normalized_text: text });
        }
    }
    corpus
}

fn build_fuzzy_corpus(config: &AssessmentConfig) -> Vec<PatternIndex> {
    let mut patterns = Vec::new();
    for dir in [config.spdx_license_headers_dir.as_deref(), config.manual_license_headers_dir.as_deref()] {
        for (stem, text) in load_corpus_dir(dir) {
            patterns.push(build_pattern_index(&stem, &text));
        }
    }
    patterns
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a AssessmentConfig) -> Self {
        Pipeline { config, registry: FileRegistry::new() }
    }

    /// Runs extraction, reading, normalization, and indexing. Stages after this
    /// point only need `self.registry` and the loaded corpora.
    fn materialize(&self) -> Result<Vec<AssessmentError>> {
        if !self.config.source_dir.exists() {
            return Err(AssessmentError::config(format!(
                "source path does not exist: {}",
                self.config.source_dir.display()
            )));
        }
        let extraction_errors = crate::extractor::extract(&self.config.source_dir, &self.config.dest_dir, self.config)?;
        crate::reader::read_tree(&self.config.dest_dir, self.config, &self.registry);
        crate::index::index_registry_parallel(&self.registry);
        Ok(extraction_errors)
    }

    fn match_and_scan(&self) {
        let exact_corpus = build_exact_corpus(self.config);
        let fuzzy_corpus = build_fuzzy_corpus(self.config);
        let categories = crate::keyword::default_categories();

        crate::exact_match::scan_registry(&self.registry, &exact_corpus);

        for path in self.registry.paths() {
            let Some(mut record) = self.registry.get_mut(&path) else { continue };
            if let Some(idx) = record.token_index.clone() {
                record.fuzzy_license_candidates = crate::fuzzy_match::scan_file_against_patterns(&idx, &fuzzy_corpus);
            }
            crate::arbiter::arbitrate(&mut record);
            crate::keyword::scan_record(&mut record, &categories);
        }
    }

    /// Runs every stage and returns the final, sorted-by-path record set plus any
    /// non-fatal errors accumulated along the way.
    pub fn run(&self) -> Result<(Vec<crate::registry::FileRecord>, Vec<AssessmentError>)> {
        let errors = self.materialize()?;
        self.match_and_scan();
        Ok((self.registry.to_vec(), errors))
    }
}

/// Convenience entry point: runs the pipeline, writes the CSV report and snapshot
/// to their configured locations, and returns the accumulated non-fatal errors.
pub fn run(config: &AssessmentConfig) -> Result<Vec<AssessmentError>> {
    let pipeline = Pipeline::new(config);
    let (records, errors) = pipeline.run()?;

    let report_path = config.output_dir.join(format!("{}.csv", config.assessment_name));
    crate::report::write_report(&records, &report_path)?;

    let persisted = crate::snapshot::to_persisted(&pipeline.registry);
    crate::snapshot::save(&persisted, &config.snapshot_path())?;

    tracing::info!(
        files = records.len(),
        errors = errors.len(),
        report = %report_path.display(),
        "assessment complete"
    );
    Ok(errors)
}

/// Runs the pipeline and diffs the resulting snapshot against `prior_snapshot_path`,
/// without requiring a fresh CSV write.
pub fn run_diff(config: &AssessmentConfig, prior_snapshot_path: &Path) -> Result<DiffResult> {
    let pipeline = Pipeline::new(config);
    pipeline.run()?;

    let prior = crate::snapshot::load(prior_snapshot_path)?;
    let current = crate::snapshot::to_persisted(&pipeline.registry);
    Ok(crate::snapshot::diff(&prior, &current))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(dir: &Path, source: &Path, dest: &Path, output: &Path, data: &Path) -> AssessmentConfig {
        let text = format!(
            "SOURCE_DIR={}\nDEST_DIR={}\nASSESSMENT_NAME=demo\nFILE_HASH_ALGORITHM=sha256\nOUTPUT_DIR={}\nDATA_DIR={}\n",
            source.display(),
            dest.display(),
            output.display(),
            data.display()
        );
        let path = dir.join("assess.properties");
        std::fs::write(&path, text).unwrap();
        AssessmentConfig::load(&path).unwrap()
    }

    #[test]
    fn end_to_end_run_produces_report_and_snapshot() {
        let root = tempfile::tempdir().unwrap();
        let source = root.path().join("source");
        std::fs::create_dir_all(&source).unwrap();
        std::fs::write(source.join("README.md"), b"hello world, licensed under MIT").unwrap();
        let dest = root.path().join("dest");
        let output = root.path().join("out");
        let data = root.path().join("data");

        let config = write_config(root.path(), &source, &dest, &output, &data);
        let errors = run(&config).unwrap();
        assert!(errors.is_empty());

        let report_path = output.join("demo.csv");
        assert!(report_path.exists());
        let report = std::fs::read_to_string(&report_path).unwrap();
        assert!(report.contains("README.md"));

        assert!(config.snapshot_path().exists());
    }

    #[test]
    fn missing_source_dir_is_config_error() {
        let root = tempfile::tempdir().unwrap();
        let source = root.path().join("nope");
        let dest = root.path().join("dest");
        let output = root.path().join("out");
        let data = root.path().join("data");
        let config = write_config(root.path(), &source, &dest, &output, &data);

        assert!(matches!(run(&config), Err(AssessmentError::Config { .. })));
    }

    #[test]
    fn diff_reports_new_file_against_empty_prior() {
        let root = tempfile::tempdir().unwrap();
        let source = root.path().join("source");
        std::fs::create_dir_all(&source).unwrap();
        std::fs::write(source.join("a.txt"), b"content").unwrap();
        let dest = root.path().join("dest");
        let output = root.path().join("out");
        let data = root.path().join("data");
        let config = write_config(root.path(), &source, &dest, &output, &data);

        let prior_path = root.path().join("missing_snapshot.json");
        let mut diff = run_diff(&config, &prior_path).unwrap();
        diff.new_or_changed.sort_by(|a, b| a.file_path.cmp(&b.file_path));
        assert_eq!(diff.new_or_changed.len(), 1);
        assert!(diff.removed.is_empty());
    }

    #[test]
    fn corpus_loader_ignores_missing_directory() {
        let f = write_config_stub();
        assert!(build_exact_corpus(&f).is_empty());
        assert!(build_fuzzy_corpus(&f).is_empty());
    }

    fn write_config_stub() -> AssessmentConfig {
        AssessmentConfig::parse(
            "SOURCE_DIR=/s\nDEST_DIR=/d\nASSESSMENT_NAME=a\nFILE_HASH_ALGORITHM=sha256\nOUTPUT_DIR=/o\nDATA_DIR=/data\n",
        )
        .unwrap()
    }
}
