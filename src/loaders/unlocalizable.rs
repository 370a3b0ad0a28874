//! Decorator keeping non-text values away from the translator.

use super::classify::partition;
use super::{FlatContent, Loader, LoaderError};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Side-channel key under which excluded values are reported by `pull`
/// when diagnostics are enabled.
pub const UNLOCALIZABLE_KEY: &str = "unlocalizable";

/// Values excluded from one locale's pull.
#[derive(Debug, Clone)]
struct CacheEntry {
    excluded: FlatContent,
    /// Key order of the full pulled content
    key_order: Vec<String>,
}

/// Wraps a loader, removing unlocalizable values on `pull` and putting them
/// back on `push`.
///
/// With `cache_restoration`, excluded values are cached per pulled locale and
/// only a locale that was pulled gets them back. Without it, `push` merges
/// the translated values over the full original content (the default
/// locale's pull, or the first pull if the default was never pulled).
///
/// Each instance owns its state; use one per file-locale unit.
pub struct UnlocalizableFilter<L> {
    inner: L,
    cache_restoration: bool,
    return_unlocalized_keys: bool,
    default_locale: Option<String>,
    original: Option<FlatContent>,
    cache: HashMap<String, CacheEntry>,
}

impl<L> UnlocalizableFilter<L> {
    pub fn new(inner: L, cache_restoration: bool, return_unlocalized_keys: bool) -> Self {
        Self {
            inner,
            cache_restoration,
            return_unlocalized_keys,
            default_locale: None,
            original: None,
            cache: HashMap::new(),
        }
    }

    fn restore_from_cache(entry: &CacheEntry, translated: FlatContent) -> FlatContent {
        let mut merged = FlatContent::new();
        let mut seen = HashSet::new();
        for key in &entry.key_order {
            if let Some(value) = entry.excluded.get(key) {
                merged.insert(key.clone(), value.clone());
                seen.insert(key.as_str());
            } else if let Some(value) = translated.get(key) {
                merged.insert(key.clone(), value.clone());
                seen.insert(key.as_str());
            }
        }
        for (key, value) in translated {
            if !seen.contains(key.as_str()) && !entry.excluded.contains_key(&key) {
                merged.insert(key, value);
            }
        }
        merged
    }

    fn merge_over_original(original: &FlatContent, translated: FlatContent) -> FlatContent {
        let mut merged = original.clone();
        for (key, value) in translated {
            merged.insert(key, value);
        }
        merged
    }
}

impl<L: Loader> Loader for UnlocalizableFilter<L> {
    type Input = L::Input;
    type Output = L::Output;

    fn set_default_locale(&mut self, locale: &str) {
        self.default_locale = Some(locale.to_string());
        self.inner.set_default_locale(locale);
    }

    fn pull(&mut self, locale: &str, input: L::Input) -> Result<FlatContent, LoaderError> {
        let content = self.inner.pull(locale, input)?;

        let is_default = self.default_locale.as_deref() == Some(locale);
        if is_default || self.original.is_none() {
            self.original = Some(content.clone());
        }

        let key_order: Vec<String> = content.keys().cloned().collect();
        let (mut localizable, excluded) = partition(content);
        debug!(
            "Pulled {} localizable and {} unlocalizable key(s) for locale {}",
            localizable.len(),
            excluded.len(),
            locale
        );

        if self.cache_restoration {
            self.cache.insert(
                locale.to_string(),
                CacheEntry {
                    excluded: excluded.clone(),
                    key_order,
                },
            );
        }
        if self.return_unlocalized_keys {
            localizable.insert(UNLOCALIZABLE_KEY.to_string(), Value::Object(excluded));
        }
        Ok(localizable)
    }

    fn push(&mut self, locale: &str, content: FlatContent) -> Result<L::Output, LoaderError> {
        // The side channel only exists when diagnostics are on; otherwise a
        // key with that name is ordinary content.
        let translated: FlatContent = if self.return_unlocalized_keys {
            content
                .into_iter()
                .filter(|(key, _)| key != UNLOCALIZABLE_KEY)
                .collect()
        } else {
            content
        };

        let merged = if self.cache_restoration {
            match self.cache.get(locale) {
                Some(entry) => Self::restore_from_cache(entry, translated),
                None => translated,
            }
        } else {
            match &self.original {
                Some(original) => Self::merge_over_original(original, translated),
                None => translated,
            }
        };

        self.inner.push(locale, merged)
    }

    fn supports_push(&self) -> bool {
        self.inner.supports_push()
    }
}
