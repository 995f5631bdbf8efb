//! Anchor-seeded, bounded-gap fuzzy alignment of header templates against file text.
//!
//! Given a shared 4-gram anchor between a file and a pattern, the alignment is
//! extended greedily in both directions with a lookahead of 5 tokens, absorbing
//! small insertions/deletions on either side before falling back to treating a
//! stubborn mismatch as a substitution.

use crate::registry::{MatchResult, PatternIndex, TokenIndex};
use regex::Regex;
use std::sync::OnceLock;

const GAP_LOOKAHEAD: usize = 5;
const ACCEPT_THRESHOLD: f64 = 50.0;

static VERSION_RE: OnceLock<Regex> = OnceLock::new();
static NUMBER_RE: OnceLock<Regex> = OnceLock::new();

fn version_re() -> &'static Regex {
    VERSION_RE.get_or_init(|| {
        Regex::new(r"(?i)version\s+(\d+(?:\.\d+)?)|v\.?\s*(\d+(?:\.\d+)?)|license\s+(\d+(?:\.\d+)?)").unwrap()
    })
}

fn number_re() -> &'static Regex {
    NUMBER_RE.get_or_init(|| Regex::new(r"\d+(?:\.\d+)?").unwrap())
}

/// Normalizes a bare integer string to `"<n>.0"`; leaves already-decimal strings alone.
fn normalize_number_string(s: &str) -> String {
    if s.contains('.') {
        s.to_string()
    } else {
        format!("{s}.0")
    }
}

/// Extracts version tokens from a license label such as `GPL-2.0-or-later` or
/// `APL-2.0-GPL-3.0`, normalizing bare integers.
pub fn extract_versions_from_name(name: &str) -> Vec<String> {
    number_re().find_iter(name).map(|m| normalize_number_string(m.as_str())).collect()
}

/// Extracts versions mentioned in matched text via the three alternations in §4.F,
/// deduplicating while preserving first-seen order.
pub fn extract_found_versions(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    for caps in version_re().captures_iter(text) {
        let raw = caps.get(1).or_else(|| caps.get(2)).or_else(|| caps.get(3));
        if let Some(m) = raw {
            let v = normalize_number_string(m.as_str());
            if !out.contains(&v) {
                out.push(v);
            }
        }
    }
    out
}

/// License label derived from a pattern's source filename stem, with an `_v…` (or any
/// `_`-delimited) suffix stripped.
pub fn license_name_from_stem(stem: &str) -> String {
    stem.split('_').next().unwrap_or(stem).to_string()
}

/// Extends an alignment seeded at `(fi_start, pj_start)`, returning the number of
/// additional matched tokens and the last matched file-token index.
fn align_with_gaps(file_tokens: &[crate::registry::Token], pattern_tokens: &[String], fi_start: usize, pj_start: usize) -> (usize, usize) {
    let mut fi = fi_start;
    let mut pj = pj_start;
    let mut matches = 0usize;
    let mut last_match_idx = fi_start.wrapping_sub(1);

    while fi < file_tokens.len() && pj < pattern_tokens.len() {
        if file_tokens[fi].norm == pattern_tokens[pj] {
            matches += 1;
            last_match_idx = fi;
            fi += 1;
            pj += 1;
            continue;
        }

        let file_skip = (1..=GAP_LOOKAHEAD)
            .find(|&k| fi + k < file_tokens.len() && file_tokens[fi + k].norm == pattern_tokens[pj]);
        let pattern_skip = (1..=GAP_LOOKAHEAD)
            .find(|&k| pj + k < pattern_tokens.len() && pattern_tokens[pj + k] == file_tokens[fi].norm);

        match (file_skip, pattern_skip) {
            (Some(fs), Some(ps)) => {
                if fs <= ps {
                    fi += fs;
                } else {
                    pj += ps;
                }
            }
            (Some(fs), None) => fi += fs,
            (None, Some(ps)) => pj += ps,
            (None, None) => {
                fi += 1;
                pj += 1;
            }
        }
    }

    (matches, last_match_idx)
}

/// Finds the best alignment of `pattern` against `file`, or `None` if they share no
/// anchor or the best alignment does not clear the acceptance threshold.
pub fn best_match(file: &TokenIndex, pattern: &PatternIndex) -> Option<MatchResult> {
    if pattern.tokens.is_empty() || file.tokens.is_empty() {
        return None;
    }

    let mut best: Option<(usize, usize, usize)> = None; // (matches, seed_i, last_match_idx)

    for (anchor, file_positions) in &file.anchor_positions {
        let Some(pattern_positions) = pattern.anchor_positions.get(anchor) else { continue };
        for &i in file_positions {
            for &j in pattern_positions {
                let seed_last = i + 3;
                let (ext_matches, ext_last) = if i + 4 < file.tokens.len() || j + 4 < pattern.tokens.len() {
                    align_with_gaps(&file.tokens, &pattern.tokens, i + 4, j + 4)
                } else {
                    (0, seed_last)
                };
                let total_matches = 4 + ext_matches;
                let last_idx = if ext_matches > 0 { ext_last } else { seed_last };
                let better = match best {
                    None => true,
                    Some((m, _, _)) => total_matches > m,
                };
                if better {
                    best = Some((total_matches, i, last_idx));
                }
            }
        }
    }

    let (matches, start_idx, last_idx) = best?;
    let match_percent = matches as f64 / pattern.tokens.len() as f64 * 100.0;
    if match_percent <= ACCEPT_THRESHOLD {
        return None;
    }

    let start_index = file.tokens[start_idx].start;
    let end_index = file.tokens[last_idx].end;
    let matched_substring = file.text[start_index..end_index].to_string();
    let license_name = license_name_from_stem(&pattern.source_name);
    let expected_versions = extract_versions_from_name(&pattern.source_name);
    let found_versions = extract_found_versions(&matched_substring);

    Some(MatchResult {
        matched_substring,
        match_percent,
        start_index,
        end_index,
        license_name,
        expected_versions,
        found_versions,
    })
}

/// Runs every pattern against one file's index, collecting all accepted candidates.
pub fn scan_file_against_patterns(file: &TokenIndex, patterns: &[PatternIndex]) -> Vec<MatchResult> {
    patterns.iter().filter_map(|p| best_match(file, p)).collect()
}
