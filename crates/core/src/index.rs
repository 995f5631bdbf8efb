//! Tokenization and 4-gram anchor indexing, shared by files and pattern corpora.

use crate::registry::{AnchorKey, FileRegistry, PatternIndex, Token, TokenIndex, ANCHOR_SIZE};
use rayon::prelude::*;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

static WORD_RE: OnceLock<Regex> = OnceLock::new();

fn word_re() -> &'static Regex {
    WORD_RE.get_or_init(|| Regex::new(r"\S+").unwrap())
}

/// Worker pool size for CPU-bound stages, mirroring the Reader/Indexer pool sizing rule.
pub fn default_pool_size() -> usize {
    let cpus = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
    (2 * cpus).min(32)
}

fn tokenize_with_spans(text: &str) -> Vec<Token> {
    word_re()
        .find_iter(text)
        .map(|m| Token { word: m.as_str().to_string(), norm: m.as_str().to_string(), start: m.start(), end: m.end() })
        .collect()
}

fn build_anchor_table<F: Fn(&[Token], usize) -> AnchorKey>(tokens: &[Token], key_at: F) -> BTreeMap<AnchorKey, Vec<usize>> {
    let mut table: BTreeMap<AnchorKey, Vec<usize>> = BTreeMap::new();
    if tokens.len() < ANCHOR_SIZE {
        return table;
    }
    for i in 0..=(tokens.len() - ANCHOR_SIZE) {
        let key = key_at(tokens, i);
        table.entry(key).or_default().push(i);
    }
    table
}

fn anchor_key(tokens: &[Token], i: usize) -> AnchorKey {
    (tokens[i].norm.clone(), tokens[i + 1].norm.clone(), tokens[i + 2].norm.clone(), tokens[i + 3].norm.clone())
}

/// Builds a file's `TokenIndex` from already-normalized text.
pub fn build_file_index(normalized_text: &str) -> TokenIndex {
    let tokens = tokenize_with_spans(normalized_text);
    let anchor_positions = build_anchor_table(&tokens, anchor_key);
    TokenIndex { text: normalized_text.to_string(), tokens, anchor_positions }
}

/// Builds a pattern's `PatternIndex` (license text or header template) from
/// already-normalized text, tagging it with a source label for reporting.
pub fn build_pattern_index(source_name: &str, normalized_text: &str) -> PatternIndex {
    let full_tokens = tokenize_with_spans(normalized_text);
    let tokens: Vec<String> = full_tokens.iter().map(|t| t.norm.clone()).collect();
    let mut anchor_positions: BTreeMap<AnchorKey, Vec<usize>> = BTreeMap::new();
    if tokens.len() >= ANCHOR_SIZE {
        for i in 0..=(tokens.len() - ANCHOR_SIZE) {
            let key = (tokens[i].clone(), tokens[i + 1].clone(), tokens[i + 2].clone(), tokens[i + 3].clone());
            anchor_positions.entry(key).or_default().push(i);
        }
    }
    PatternIndex { source_name: source_name.to_string(), text: normalized_text.to_string(), tokens, anchor_positions }
}

/// Indexes every record in the registry in parallel, reusing `normalized_text` if the
/// Normalizer has already populated it.
pub fn index_registry_parallel(registry: &FileRegistry) {
    let pool = rayon::ThreadPoolBuilder::new().num_threads(default_pool_size()).build();
    let run = |paths: &[std::path::PathBuf]| {
        paths.par_iter().for_each(|path| {
            let normalized = {
                let Some(mut rec) = registry.get_mut(path) else { return };
                if rec.normalized_text.is_empty() && !rec.text.is_empty() {
                    rec.normalized_text = crate::normalize::normalize(&rec.text);
                }
                rec.normalized_text.clone()
            };
            let idx = build_file_index(&normalized);
            if let Some(mut rec) = registry.get_mut(path) {
                rec.token_index = Some(idx);
            }
        });
    };

    let paths = registry.paths();
    match pool {
        Ok(pool) => pool.install(|| run(&paths)),
        Err(_) => run(&paths),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizes_on_whitespace_with_spans() {
        let idx = build_file_index("mit license here");
        assert_eq!(idx.tokens.len(), 3);
        assert_eq!(&idx.text[idx.tokens[1].start..idx.tokens[1].end], "license");
    }

    #[test]
    fn anchor_positions_are_ascending_and_match_tokens() {
        let idx = build_file_index("a b c d a b c d e");
        let key = ("a".to_string(), "b".to_string(), "c".to_string(), "d".to_string());
        let positions = idx.anchor_positions.get(&key).unwrap();
        assert_eq!(positions, &vec![0usize, 4]);
        for &p in positions {
            for k in 0..4 {
                assert_eq!(idx.tokens[p + k].norm, [&key.0, &key.1, &key.2, &key.3][k].to_string());
            }
        }
    }

    #[test]
    fn short_text_has_no_anchors() {
        let idx = build_file_index("a b c");
        assert!(idx.anchor_positions.is_empty());
    }

    #[test]
    fn pattern_index_exposes_anchor_keys() {
        let p = build_pattern_index("MIT", "permission is hereby granted free of charge");
        assert!(!p.anchor_keys().is_empty());
    }
}
