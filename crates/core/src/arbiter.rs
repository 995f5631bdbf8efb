//! Picks a single best fuzzy match per file from its candidate list, using
//! license-version agreement to break ties between overlapping header templates.
//!
//! Candidates partition into three classes, tried in priority order:
//! - **A** — `expected_versions` and `found_versions` agree as multisets.
//! - **C** — the two sets overlap but do not fully agree.
//! - **N** — no overlap at all.

use crate::registry::{FileRecord, MatchResult, MatchStrength};
use std::collections::HashMap;

fn multiset_eq(a: &[String], b: &[String]) -> bool {
    let mut a = a.to_vec();
    let mut b = b.to_vec();
    a.sort();
    b.sort();
    a == b
}

fn has_overlap(a: &[String], b: &[String]) -> bool {
    a.iter().any(|x| b.contains(x))
}

enum Partition {
    A,
    C,
    N,
}

fn classify(c: &MatchResult) -> Partition {
    if multiset_eq(&c.expected_versions, &c.found_versions) {
        Partition::A
    } else if has_overlap(&c.expected_versions, &c.found_versions) {
        Partition::C
    } else {
        Partition::N
    }
}

/// Picks the max-`match_percent` candidate, first-encountered wins ties.
fn pick_max<'a>(items: &[&'a MatchResult]) -> Option<&'a MatchResult> {
    let mut best: Option<&MatchResult> = None;
    for &c in items {
        match best {
            None => best = Some(c),
            Some(b) if c.match_percent > b.match_percent => best = Some(c),
            _ => {}
        }
    }
    best
}

fn resolve_a(candidates: &[&MatchResult]) -> Option<MatchResult> {
    let with_versions: Vec<&MatchResult> = candidates.iter().copied().filter(|c| !c.found_versions.is_empty()).collect();
    let pool = if !with_versions.is_empty() {
        with_versions
    } else {
        candidates.iter().copied().filter(|c| c.found_versions.is_empty()).collect()
    };
    pick_max(&pool).cloned()
}

/// Returns `(winners in encounter order, best_fuzzy_match)`.
fn resolve_c(candidates: &[&MatchResult]) -> (Vec<MatchResult>, Option<MatchResult>) {
    let mut covered: HashMap<String, (usize, f64)> = HashMap::new();
    for (i, c) in candidates.iter().enumerate() {
        let mut versions = c.found_versions.clone();
        versions.dedup();
        for v in versions {
            let should_adopt = match covered.get(&v) {
                None => true,
                Some(&(_, pct)) => c.match_percent > pct,
            };
            if should_adopt {
                covered.insert(v, (i, c.match_percent));
            }
        }
    }

    let mut winner_indices: Vec<usize> = covered.values().map(|&(i, _)| i).collect();
    winner_indices.sort_unstable();
    winner_indices.dedup();

    let winners: Vec<MatchResult> = winner_indices.iter().map(|&i| candidates[i].clone()).collect();
    let best = winner_indices.last().map(|&i| candidates[i].clone());
    (winners, best)
}

fn resolve_n(candidates: &[&MatchResult]) -> Option<MatchResult> {
    pick_max(candidates).cloned()
}

/// Arbitrates `record.fuzzy_license_candidates`, setting `best_fuzzy_match` and
/// appending only the arbitration winner(s) to `license_names`.
pub fn arbitrate(record: &mut FileRecord) {
    if record.fuzzy_license_candidates.is_empty() {
        return;
    }

    let mut a = Vec::new();
    let mut c = Vec::new();
    let mut n = Vec::new();
    for cand in &record.fuzzy_license_candidates {
        match classify(cand) {
            Partition::A => a.push(cand),
            Partition::C => c.push(cand),
            Partition::N => n.push(cand),
        }
    }

    let (winners, best) = if !a.is_empty() {
        let best = resolve_a(&a);
        (best.clone().into_iter().collect(), best)
    } else if !c.is_empty() {
        resolve_c(&c)
    } else {
        let best = resolve_n(&n);
        (best.clone().into_iter().collect(), best)
    };

    for w in &winners {
        record.license_names.push(w.license_name.clone());
    }
    if let Some(best) = best {
        record.best_fuzzy_match = Some(best);
        if matches!(record.license_match_strength, MatchStrength::None) {
            record.license_match_strength = MatchStrength::Fuzzy;
        }
    }
}
