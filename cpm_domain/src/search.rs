// /////////////////////////////////////////////////////////////////////////////
// cpm
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Search driver (C8)
//!
//! Walks a [`Document`]'s tree depth-first, projecting each configured
//! `(search_pattern, result_pattern)` pair against the accumulated path at
//! every node. A pattern that references a level deeper than the current
//! path simply does not apply there (§4.8) — it is not an error, the node
//! is skipped for that pair.

use regex::{Regex, RegexBuilder};

use crate::error::CpmError;
use crate::model::{labels_equal, Document, Node};
use crate::pattern::CompiledPattern;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    Literal,
    Regex,
}

pub struct SearchQuery<'a> {
    pub pairs: &'a [(CompiledPattern, CompiledPattern)],
    pub mode: MatchMode,
    pub case_sensitive: bool,
    pub text: &'a str,
}

/// Runs every configured pattern pair over the whole document and returns a
/// deduplicated, sorted list of projected result strings (§4.8).
pub fn search(document: &Document, query: &SearchQuery<'_>) -> Result<Vec<String>, CpmError> {
    let matcher = Matcher::new(query)?;
    let mut hits = Vec::new();
    let mut path = Vec::new();
    for node in &document.children {
        walk(node, &mut path, query.pairs, &matcher, &mut hits);
    }
    hits.sort_unstable();
    hits.dedup();
    Ok(hits)
}

fn walk(
    node: &Node,
    path: &mut Vec<String>,
    pairs: &[(CompiledPattern, CompiledPattern)],
    matcher: &Matcher,
    hits: &mut Vec<String>,
) {
    path.push(node.label.clone());

    for (search_pattern, result_pattern) in pairs {
        if let Some(projected) = search_pattern.project(path) {
            if matcher.is_match(&projected) {
                if let Some(result) = result_pattern.project(path) {
                    hits.push(result);
                }
            }
        }
    }

    for child in &node.children {
        walk(child, path, pairs, matcher, hits);
    }

    path.pop();
}

enum Matcher<'a> {
    Literal { text: &'a str, case_sensitive: bool },
    Regex(Regex),
}

impl<'a> Matcher<'a> {
    fn new(query: &SearchQuery<'a>) -> Result<Self, CpmError> {
        match query.mode {
            MatchMode::Literal => Ok(Matcher::Literal {
                text: query.text,
                case_sensitive: query.case_sensitive,
            }),
            MatchMode::Regex => {
                let re = RegexBuilder::new(query.text)
                    .case_insensitive(!query.case_sensitive)
                    .build()?;
                Ok(Matcher::Regex(re))
            }
        }
    }

    fn is_match(&self, candidate: &str) -> bool {
        match self {
            Matcher::Literal { text, case_sensitive } => labels_equal(candidate, text, *case_sensitive),
            Matcher::Regex(re) => re.is_match(candidate),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::compile;
    use chrono::Utc;

    fn sample_document() -> Document {
        let now = Utc::now();
        let mut doc = Document::new_empty(now);
        let mut email = Node::new("Email", 1, now);
        email.children.push(Node::new("GitHub", 1, now));
        email.children.push(Node::new("GitLab", 1, now));
        doc.children.push(email);
        let mut banking = Node::new("Banking", 1, now);
        banking.children.push(Node::new("MainBank", 1, now));
        doc.children.push(banking);
        doc
    }

    fn templates() -> Vec<String> {
        vec!["Category".into(), "Account".into()]
    }

    #[test]
    fn literal_search_matches_case_insensitively() {
        let doc = sample_document();
        let search_pattern = compile("<Account>", &templates()).unwrap();
        let result_pattern = compile("<Category>/<Account>", &templates()).unwrap();
        let pairs = vec![(search_pattern, result_pattern)];
        let query = SearchQuery {
            pairs: &pairs,
            mode: MatchMode::Literal,
            case_sensitive: false,
            text: "github",
        };
        let hits = search(&doc, &query).unwrap();
        assert_eq!(hits, vec!["Email/GitHub".to_string()]);
    }

    #[test]
    fn regex_search_is_case_insensitive_when_requested() {
        let doc = sample_document();
        let search_pattern = compile("<Account>", &templates()).unwrap();
        let result_pattern = compile("<Category>/<Account>", &templates()).unwrap();
        let pairs = vec![(search_pattern, result_pattern)];
        let query = SearchQuery {
            pairs: &pairs,
            mode: MatchMode::Regex,
            case_sensitive: false,
            text: "^git.*$",
        };
        let mut hits = search(&doc, &query).unwrap();
        hits.sort();
        assert_eq!(hits, vec!["Email/GitHub".to_string(), "Email/GitLab".to_string()]);
    }

    #[test]
    fn results_are_deduplicated_across_pairs() {
        let doc = sample_document();
        let search_pattern = compile("<Account>", &templates()).unwrap();
        let result_pattern = compile("<Category>/<Account>", &templates()).unwrap();
        let pairs = vec![
            (search_pattern.clone(), result_pattern.clone()),
            (search_pattern, result_pattern),
        ];
        let query = SearchQuery {
            pairs: &pairs,
            mode: MatchMode::Literal,
            case_sensitive: true,
            text: "GitHub",
        };
        let hits = search(&doc, &query).unwrap();
        assert_eq!(hits, vec!["Email/GitHub".to_string()]);
    }

    #[test]
    fn shallow_path_skips_pattern_referencing_deeper_level() {
        let now = Utc::now();
        let mut doc = Document::new_empty(now);
        doc.children.push(Node::new("Lonely", 1, now));
        let search_pattern = compile("<Account>", &templates()).unwrap();
        let result_pattern = compile("<Category>/<Account>", &templates()).unwrap();
        let pairs = vec![(search_pattern, result_pattern)];
        let query = SearchQuery {
            pairs: &pairs,
            mode: MatchMode::Literal,
            case_sensitive: true,
            text: "Lonely",
        };
        let hits = search(&doc, &query).unwrap();
        assert!(hits.is_empty());
    }
}
