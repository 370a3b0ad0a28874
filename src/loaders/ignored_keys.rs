use super::{FlatContent, Loader, LoaderError};
use crate::config::KeySet;
use tracing::debug;

/// Drops `ignoredKeys` on the way in and on the way out, so they are neither
/// translated nor written to any target file.
pub struct IgnoredKeysFilter<L> {
    inner: L,
    ignored: KeySet,
}

impl<L> IgnoredKeysFilter<L> {
    pub fn new(inner: L, ignored: KeySet) -> Self {
        Self { inner, ignored }
    }

    fn strip(&self, content: FlatContent) -> FlatContent {
        if self.ignored.is_empty() {
            return content;
        }
        content
            .into_iter()
            .filter(|(key, _)| !self.ignored.matches(key))
            .collect()
    }
}

impl<L: Loader> Loader for IgnoredKeysFilter<L> {
    type Input = L::Input;
    type Output = L::Output;

    fn set_default_locale(&mut self, locale: &str) {
        self.inner.set_default_locale(locale);
    }

    fn pull(&mut self, locale: &str, input: L::Input) -> Result<FlatContent, LoaderError> {
        let content = self.inner.pull(locale, input)?;
        let before = content.len();
        let kept = self.strip(content);
        if kept.len() != before {
            debug!("Ignored {} key(s) for locale {}", before - kept.len(), locale);
        }
        Ok(kept)
    }

    fn push(&mut self, locale: &str, content: FlatContent) -> Result<L::Output, LoaderError> {
        let kept = self.strip(content);
        self.inner.push(locale, kept)
    }

    fn supports_push(&self) -> bool {
        self.inner.supports_push()
    }
}
