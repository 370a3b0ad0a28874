//! Per-bucket translation policy: locked keys and values, injected locale
//! codes, and the delta/merge rules built on them.

use super::lockfile::checksum;
use crate::config::{BucketConfig, KeySet};
use crate::loaders::FlatContent;
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::warn;

#[derive(Debug, Clone, Default)]
pub struct BucketPolicy {
    locked: KeySet,
    locked_patterns: Vec<Regex>,
    inject_locale: KeySet,
}

impl BucketPolicy {
    pub fn from_config(config: &BucketConfig) -> Self {
        let locked_patterns = config
            .locked_patterns
            .iter()
            .filter_map(|pattern| match Regex::new(pattern) {
                Ok(regex) => Some(regex),
                Err(e) => {
                    warn!("Ignoring invalid locked pattern {}: {}", pattern, e);
                    None
                }
            })
            .collect();

        Self {
            locked: KeySet::new(&config.locked_keys),
            locked_patterns,
            inject_locale: KeySet::new(&config.inject_locale),
        }
    }

    /// Locked by key, or by a pattern matching the value.
    pub fn is_locked(&self, key: &str, value: &Value) -> bool {
        if self.locked.matches(key) {
            return true;
        }
        match value {
            Value::String(text) => self.locked_patterns.iter().any(|re| re.is_match(text)),
            _ => false,
        }
    }

    pub fn is_injected(&self, key: &str) -> bool {
        self.inject_locale.matches(key)
    }

    /// The part of the source content that goes to the translator.
    pub fn processable(&self, source: &FlatContent) -> FlatContent {
        source
            .iter()
            .filter(|(key, value)| !self.is_locked(key, value) && !self.is_injected(key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    /// Build the target content, in source key order.
    ///
    /// Per key: injected keys get the target locale code, locked keys keep
    /// the source value, then the fresh translation, then the existing
    /// target value, then the untranslated source value.
    pub fn merge(
        &self,
        target_locale: &str,
        source: &FlatContent,
        translated: &FlatContent,
        existing: &FlatContent,
    ) -> FlatContent {
        source
            .iter()
            .map(|(key, source_value)| {
                let value = if self.is_injected(key) {
                    Value::String(target_locale.to_string())
                } else if self.is_locked(key, source_value) {
                    source_value.clone()
                } else if let Some(value) = translated.get(key) {
                    value.clone()
                } else if let Some(value) = existing.get(key) {
                    value.clone()
                } else {
                    source_value.clone()
                };
                (key.clone(), value)
            })
            .collect()
    }
}

/// Keys of `processable` that need translating for one target.
///
/// A key is stale when the target lacks it, when its source checksum differs
/// from the one recorded at the last translation, or always under `force`.
pub fn stale_keys(
    processable: &FlatContent,
    existing: &FlatContent,
    checksums: Option<&BTreeMap<String, String>>,
    force: bool,
) -> FlatContent {
    processable
        .iter()
        .filter(|(key, value)| {
            if force || !existing.contains_key(key.as_str()) {
                return true;
            }
            checksums
                .and_then(|sums| sums.get(key.as_str()))
                .is_some_and(|recorded| *recorded != checksum(value))
        })
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn content(value: Value) -> FlatContent {
        value.as_object().cloned().expect("object")
    }

    fn policy() -> BucketPolicy {
        BucketPolicy::from_config(&BucketConfig {
            locked_keys: vec!["brand".to_string()],
            locked_patterns: vec![r"^\{\{.*\}\}$".to_string()],
            inject_locale: vec!["meta/locale".to_string()],
            ..BucketConfig::default()
        })
    }

    // ==================== Policy Tests ====================

    #[test]
    fn test_processable_excludes_locked_and_injected() {
        let source = content(json!({
            "title": "Hello",
            "brand": "Acme",
            "template": "{{user_name}}",
            "meta/locale": "en"
        }));

        let processable = policy().processable(&source);
        assert_eq!(processable, content(json!({"title": "Hello"})));
    }

    #[test]
    fn test_merge_priorities_and_order() {
        let source = content(json!({
            "meta/locale": "en",
            "brand": "Acme",
            "title": "Hello",
            "subtitle": "World",
            "footer": "Bye"
        }));
        let translated = content(json!({"title": "Hola", "brand": "Acmé"}));
        let existing = content(json!({"subtitle": "Mundo", "brand": "Old"}));

        let merged = policy().merge("es", &source, &translated, &existing);

        assert_eq!(
            merged,
            content(json!({
                "meta/locale": "es",
                "brand": "Acme",
                "title": "Hola",
                "subtitle": "Mundo",
                "footer": "Bye"
            }))
        );
        assert_eq!(
            merged.keys().collect::<Vec<_>>(),
            vec!["meta/locale", "brand", "title", "subtitle", "footer"]
        );
    }

    #[test]
    fn test_merge_drops_keys_removed_from_source() {
        let source = content(json!({"a": "A"}));
        let existing = content(json!({"a": "x", "gone": "y"}));
        let merged = BucketPolicy::default().merge("es", &source, &FlatContent::new(), &existing);
        assert_eq!(merged, content(json!({"a": "x"})));
    }

    // ==================== Delta Tests ====================

    #[test]
    fn test_missing_keys_are_stale() {
        let processable = content(json!({"a": "A", "b": "B"}));
        let existing = content(json!({"a": "x"}));
        let stale = stale_keys(&processable, &existing, None, false);
        assert_eq!(stale, content(json!({"b": "B"})));
    }

    #[test]
    fn test_changed_checksums_are_stale() {
        let processable = content(json!({"a": "A2", "b": "B"}));
        let existing = content(json!({"a": "x", "b": "y"}));
        let mut sums = BTreeMap::new();
        sums.insert("a".to_string(), checksum(&json!("A")));
        sums.insert("b".to_string(), checksum(&json!("B")));

        let stale = stale_keys(&processable, &existing, Some(&sums), false);
        assert_eq!(stale, content(json!({"a": "A2"})));
    }

    #[test]
    fn test_force_marks_everything_stale() {
        let processable = content(json!({"a": "A"}));
        let existing = content(json!({"a": "x"}));
        assert_eq!(stale_keys(&processable, &existing, None, true), processable);
        assert!(stale_keys(&processable, &existing, None, false).is_empty());
    }
}
