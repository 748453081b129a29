// src/matcher.rs

//! Title keyword matching.
//!
//! A title matches when one of its whitespace-delimited tokens, with
//! non-letter characters trimmed from both ends and lowercased, equals a
//! configured keyword. Substrings never match: `golanguage` is not `golang`.

use std::collections::HashSet;

/// Classifies story titles against a fixed keyword set.
#[derive(Debug, Clone)]
pub struct TitleMatcher {
    keywords: HashSet<String>,
}

impl TitleMatcher {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            keywords: keywords
                .into_iter()
                .map(|k| k.as_ref().to_lowercase())
                .collect(),
        }
    }

    /// True iff any token of `title` is a keyword.
    pub fn is_match(&self, title: &str) -> bool {
        self.matching_keyword(title).is_some()
    }

    /// The first keyword hit in `title`, in token order.
    pub fn matching_keyword(&self, title: &str) -> Option<&str> {
        title
            .split_whitespace()
            .map(normalize_token)
            .filter(|token| !token.is_empty())
            .find_map(|token| self.keywords.get(&token).map(String::as_str))
    }
}

/// Convenience wrapper for one-off checks.
pub fn match_title<S: AsRef<str>>(title: &str, keywords: &[S]) -> bool {
    TitleMatcher::new(keywords).is_match(title)
}

fn normalize_token(token: &str) -> String {
    token
        .trim_matches(|c: char| !c.is_alphabetic())
        .to_lowercase()
}
