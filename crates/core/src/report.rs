//! CSV report generation: one row per `FileRecord`, in the shape a reviewer opens
//! directly in a spreadsheet.

use crate::error::{AssessmentError, Result};
use crate::registry::FileRecord;
use std::path::Path;

const COLUMNS: &[&str] =
    &["File Name", "License", "Match %", "Fuzzy Licenses", "Full License", "Is Released", "Is Empty", "Keywords", "Hash"];

fn join(values: impl IntoIterator<Item = String>) -> String {
    values.into_iter().collect::<Vec<_>>().join("; ")
}

fn hyperlink_formula(record: &FileRecord) -> String {
    let url = format!("file://{}", record.path.to_string_lossy());
    let label = record.relative_path.to_string_lossy();
    format!("=HYPERLINK(\"{url}\", \"{label}\")")
}

fn keyword_cell(record: &FileRecord) -> String {
    join(record.keyword_matches.iter().map(|(category, terms)| format!("{category}: {}", terms.join(", "))))
}

fn row_for(record: &FileRecord) -> [String; 9] {
    [
        hyperlink_formula(record),
        join(record.license_names.iter().cloned()),
        record.best_fuzzy_match.as_ref().map(|m| format!("{:.2}", m.match_percent)).unwrap_or_default(),
        join(record.fuzzy_license_candidates.iter().map(|c| c.license_name.clone())),
        join(record.exact_license_matches.iter().map(|m| m.license_name.clone())),
        record.is_released.to_string(),
        record.is_empty.to_string(),
        keyword_cell(record),
        record.content_hash.clone(),
    ]
}

/// Writes one CSV row per record, sorted by relative path, to `path`.
pub fn write_report(records: &[FileRecord], path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| AssessmentError::io(parent, e))?;
    }
    let mut writer =
        csv::Writer::from_path(path).map_err(|e| AssessmentError::invariant("ReportWriter", format!("cannot open {}: {e}", path.display())))?;

    writer
        .write_record(COLUMNS)
        .map_err(|e| AssessmentError::invariant("ReportWriter", format!("header write failed: {e}")))?;

    let mut sorted: Vec<&FileRecord> = records.iter().collect();
    sorted.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));

    for record in sorted {
        writer
            .write_record(row_for(record))
            .map_err(|e| AssessmentError::invariant("ReportWriter", format!("row write failed: {e}")))?;
    }
    writer.flush().map_err(|e| AssessmentError::io(path, e))?;
    Ok(())
}
