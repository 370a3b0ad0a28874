//! Matching of flat content keys against bucket key lists
//! (`lockedKeys`, `ignoredKeys`, `injectLocale`).

use crate::loaders::KEY_SEPARATOR;
use regex::Regex;

/// A single key pattern.
///
/// Matches the exact key, any key nested under it (`meta` matches
/// `meta/title`), and supports `*` (one segment) and `**` (any depth)
/// wildcards.
#[derive(Debug, Clone)]
pub struct KeyPattern {
    raw: String,
    wildcard: Option<Regex>,
}

impl KeyPattern {
    pub fn new(pattern: &str) -> Self {
        let wildcard = if pattern.contains('*') {
            Regex::new(&wildcard_to_regex(pattern)).ok()
        } else {
            None
        };
        Self {
            raw: pattern.to_string(),
            wildcard,
        }
    }

    pub fn matches(&self, key: &str) -> bool {
        if key == self.raw {
            return true;
        }
        if key
            .strip_prefix(self.raw.as_str())
            .is_some_and(|rest| rest.starts_with(KEY_SEPARATOR))
        {
            return true;
        }
        self.wildcard.as_ref().is_some_and(|re| re.is_match(key))
    }
}

fn wildcard_to_regex(pattern: &str) -> String {
    let mut out = String::from("^");
    let mut rest = pattern;
    while !rest.is_empty() {
        if let Some(tail) = rest.strip_prefix("**") {
            out.push_str(".*");
            rest = tail;
        } else if let Some(tail) = rest.strip_prefix('*') {
            out.push_str(&format!("[^{}]*", regex::escape(&KEY_SEPARATOR.to_string())));
            rest = tail;
        } else {
            let next = rest.find('*').unwrap_or(rest.len());
            out.push_str(&regex::escape(&rest[..next]));
            rest = &rest[next..];
        }
    }
    // Nested keys under a wildcard match are covered too
    out.push_str(&format!("(?:{}.*)?$", regex::escape(&KEY_SEPARATOR.to_string())));
    out
}

/// A list of key patterns; a key matches when any pattern does.
#[derive(Debug, Clone, Default)]
pub struct KeySet {
    patterns: Vec<KeyPattern>,
}

impl KeySet {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Self {
        Self {
            patterns: patterns.iter().map(|p| KeyPattern::new(p.as_ref())).collect(),
        }
    }

    pub fn matches(&self, key: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(key))
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}
