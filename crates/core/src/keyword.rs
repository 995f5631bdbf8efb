//! Categorized keyword scanning with whole-token boundaries, operating on the
//! normalized token stream rather than raw substring search.

use crate::registry::FileRecord;
use std::collections::{BTreeMap, HashSet};

/// A normalized, deduplicated (order-preserving) term list for one category.
#[derive(Debug, Clone, Default)]
pub struct KeywordCategory {
    pub name: String,
    /// Each term pre-split into its normalized tokens.
    pub terms: Vec<Vec<String>>,
}

impl KeywordCategory {
    pub fn new(name: impl Into<String>, raw_terms: &[&str]) -> Self {
        let mut seen = HashSet::new();
        let mut terms = Vec::new();
        for raw in raw_terms {
            let normalized = crate::normalize::normalize(raw);
            if normalized.is_empty() || seen.contains(&normalized) {
                continue;
            }
            seen.insert(normalized.clone());
            let tokens: Vec<String> = normalized.split_whitespace().map(|s| s.to_string()).collect();
            if !tokens.is_empty() {
                terms.push(tokens);
            }
        }
        KeywordCategory { name: name.into(), terms }
    }
}

/// Scans `tokens` (already-normalized, in file order) for every category's terms,
/// returning `{category -> [matched terms, original category order]}`.
pub fn scan_tokens(tokens: &[String], categories: &[KeywordCategory]) -> BTreeMap<String, Vec<String>> {
    let token_set: HashSet<&str> = tokens.iter().map(|s| s.as_str()).collect();
    let mut out = BTreeMap::new();

    for cat in categories {
        let mut found = Vec::new();
        for term in &cat.terms {
            let matched = if term.len() == 1 {
                token_set.contains(term[0].as_str())
            } else {
                tokens.windows(term.len()).any(|w| w == term.as_slice())
            };
            if matched {
                found.push(term.join(" "));
            }
        }
        if !found.is_empty() {
            out.insert(cat.name.clone(), found);
        }
    }

    out
}

/// Scans one record's token index against the category corpus.
pub fn scan_record(record: &mut FileRecord, categories: &[KeywordCategory]) {
    let Some(idx) = &record.token_index else { return };
    let tokens: Vec<String> = idx.tokens.iter().map(|t| t.norm.clone()).collect();
    let matches = scan_tokens(&tokens, categories);
    if !matches.is_empty() {
        record.keyword_matches = matches;
    }
}

/// The built-in category corpus, carried verbatim (modulo normalization) from the
/// original implementation's term lists: `copyright`, `license`, `prohibitive`,
/// `general`, `export`, `custom`, `license_name`, `license_abbreviation`, and
/// `license_urls`. `prohibitive` and `export` ship empty, as in the source.
pub fn default_categories() -> Vec<KeywordCategory> {
    vec![
        KeywordCategory::new("copyright", &["Free Software Foundation"]),
        KeywordCategory::new("license", &["license", "all rights reserved", "permission", "eula", "COPYING.LIB"]),
        KeywordCategory::new("prohibitive", &[]),
        KeywordCategory::new(
            "general",
            &[
                "open source",
                "proprietary",
                "Inc.",
                "Register",
                "Visual Studio",
                "Visual C++",
                "Visual Basic",
                "mysql",
                "oracle",
                "sybase",
                "perl",
            ],
        ),
        KeywordCategory::new("export", &[]),
        KeywordCategory::new(
            "custom",
            &[
                "SPDX-License-Identifier",
                "SPDX",
                "copyleft",
                "bison",
                "invariants",
                "Classpath exception",
                "Autoconf exception",
                "Autoconf",
                "Bison exception",
                "Font exception",
                "GCC runtime library exception",
            ],
        ),
        KeywordCategory::new(
            "license_name",
            &[
                "apache",
                "Apache License",
                "Apple Public Source",
                "BitTorrent Open Source",
                "berkeley software distribution",
                "academic free license",
                "affero",
                "business source license",
                "Common Public Attribution",
                "Office Public",
                "Educational Community",
                "GNU Free Documentation",
                "General Public",
                "GNU General Public",
                "Free Software Foundation",
                "Interbase Public",
                "GNU Library General Public",
                "GNU Lesser General Public",
                "LaTeX Project Public",
                "Mozilla Public",
                "Mulan PSL",
                "Online Computer Library Center",
                "Open Software",
                "RealNetworks Public Source",
                "Sony Computer Entertainment",
                "SCEA Shared Source",
                "SGI Free Software",
                "Silicon Graphics",
                "Solderpad Hardware",
                "Sun Standards",
                "Sun Industry Standards Source",
                "Sun Public",
                "Server Side Public",
                "Transitive Grace Period Public",
                "THOR Public",
                "Upstream Compatibility",
                "World Wide Web Consortium",
                "3D Slicer",
                "Attribution Assurance",
                "APREAMBL",
                "Adobe Systems Incorporated",
                "Amazon Digital Services",
                "Aladdin Free Public",
                "Advanced Micro Devices",
                "Apple Computer, Inc",
                "NVIDIA Corporation",
                "Academy of Motion Picture Arts and Sciences",
                "The Apache Group",
                "Apache Software Foundation",
                "ADAPTIVE PUBLIC",
                "ARPHIC PUBLIC",
                "ASWF Digital Assets",
                "Solar Designer",
                "BEER-WARE",
                "Blue Oak Model",
                "Brian Gladman",
                "Boost Software",
                "Computational Use of Data Agreement",
                "Python Software Foundation",
            ],
        ),
        KeywordCategory::new(
            "license_abbreviation",
            &[
                "AFL", "AGPL", "APL", "APSL", "BSD", "BSL", "BUSL", "CPAL", "CUA", "CUAPL", "ECL", "GFDL", "GPL",
                "IPL", "LGPL", "LPPL", "MPL", "PSL", "OCLC", "OSL", "RPSL", "SCEA", "SGI", "SHL", "SISSL", "SPL",
                "SSPL", "TGPPL", "TPL", "UCL", "W3C", "ASWF", "GPLv2", "GPLv2+", "GPLv3", "GPLv3+",
            ],
        ),
        KeywordCategory::new(
            "license_urls",
            &[
                "gridengine.sunsource.net/license.html",
                "http://www.mongodb.com/licensing/server-side-public-license",
                "http://www.w3.org/Consortium/Legal/copyright-software",
                "http://www.apache.org/licenses/LICENSE-2.0",
                "https://www.gnu.org/licenses/",
                "http://www.bittorrent.com/license/",
                "www.mariadb.com/bsl11",
                "http://www.osedu.org/licenses/ECL-2.0",
                "http://www.Interbase.com/IPL.html",
                "http://www.latex-project.org/lppl.txt",
                "http://www.mozilla.org/MPL/",
                "https://mozilla.org/MPL/2.0/",
                "http://license.coscl.org.cn/MulanPSL",
                "http://license.coscl.org.cn/MulanPSL2",
                "http://www.oclc.org/research/",
                "https://www.helixcommunity.org/content/rpsl",
                "http://research.scea.com/scea_shared_source_license.html",
                "http://oss.sgi.com/projects/FreeB",
                "http://solderpad.org/licenses/SHL-0.5",
                "http://solderpad.org/licenses/SHL-0.51",
                "http://www.sun.com/",
                "https://www.openssl.org/source/license.html",
                "http://www.opensource.org/licenses/alphabetical",
                "http://www.apache.org/",
                "http://www.apache.org/licenses/",
                "http://www.apple.com/publicsource",
                "http://www.opensource.apple.com/apsl/",
                "https://blueoakcouncil.org/license/1.0.0",
                "http://gnu.org/licenses/gpl.html",
            ],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedupes_terms_preserving_order() {
        let cat = KeywordCategory::new("license", &["MIT", "mit", "Apache-2.0"]);
        assert_eq!(cat.terms.len(), 2);
    }

    #[test]
    fn single_token_term_uses_set_membership() {
        let cat = KeywordCategory::new("license", &["MIT"]);
        let tokens = vec!["this".to_string(), "is".to_string(), "mit".to_string()];
        let out = scan_tokens(&tokens, &[cat]);
        assert_eq!(out.get("license").unwrap(), &vec!["mit".to_string()]);
    }

    #[test]
    fn multi_token_term_requires_contiguous_positional_match() {
        let cat = KeywordCategory::new("general", &["free software foundation"]);
        let tokens: Vec<String> = "copyright the free software foundation inc"
            .split_whitespace()
            .map(|s| s.to_string())
            .collect();
        let out = scan_tokens(&tokens, &[cat]);
        assert_eq!(out.get("general").unwrap(), &vec!["free software foundation".to_string()]);
    }

    #[test]
    fn no_match_when_tokens_not_adjacent() {
        let cat = KeywordCategory::new("general", &["free software foundation"]);
        let tokens: Vec<String> = "free standing software from the foundation"
            .split_whitespace()
            .map(|s| s.to_string())
            .collect();
        let out = scan_tokens(&tokens, &[cat]);
        assert!(out.is_empty());
    }

    #[test]
    fn empty_category_list_yields_empty_map() {
        let tokens = vec!["mit".to_string()];
        assert!(scan_tokens(&tokens, &[]).is_empty());
    }

    #[test]
    fn default_categories_cover_common_abbreviations() {
        let categories = default_categories();
        let tokens: Vec<String> = crate::normalize::normalize("licensed under the gpl license")
            .split_whitespace()
            .map(|s| s.to_string())
            .collect();
        let out = scan_tokens(&tokens, &categories);
        assert!(out.contains_key("license_abbreviation"));
    }

    #[test]
    fn default_categories_carry_the_original_custom_vocabulary() {
        let categories = default_categories();
        let custom = categories.iter().find(|c| c.name == "custom").unwrap();
        let flat: Vec<String> = custom.terms.iter().map(|t| t.join(" ")).collect();
        assert!(flat.contains(&crate::normalize::normalize("SPDX-License-Identifier")));
        assert!(flat.contains(&crate::normalize::normalize("Classpath exception")));
    }

    #[test]
    fn prohibitive_and_export_categories_are_empty_in_the_original() {
        let categories = default_categories();
        assert!(categories.iter().find(|c| c.name == "prohibitive").unwrap().terms.is_empty());
        assert!(categories.iter().find(|c| c.name == "export").unwrap().terms.is_empty());
    }
}
