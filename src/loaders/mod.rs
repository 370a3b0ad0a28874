//! Format loaders.
//!
//! A loader turns a file's native representation into [`FlatContent`]
//! (`pull`) and turns updated flat content back into the native
//! representation (`push`). Decorators such as [`UnlocalizableFilter`]
//! implement the same [`Loader`] trait over an inner loader, so chains are
//! built by composition.
//!
//! Every loader follows the same state discipline:
//! - `set_default_locale` must be called before the first `pull`
//! - the default locale's `pull` fixes the structural template that every
//!   later `push` renders into, so it has to happen before any `push`

mod classify;
mod dictionary;
mod extracted;
mod flat;
mod ignored_keys;
mod json;
mod properties;
mod unlocalizable;
mod yaml;

pub use classify::{is_unlocalizable, partition};
pub use dictionary::DictionaryLoader;
pub use extracted::ExtractedTextLoader;
pub use flat::{flatten, unflatten, Shape, KEY_SEPARATOR};
pub use ignored_keys::IgnoredKeysFilter;
pub use json::JsonLoader;
pub use properties::PropertiesLoader;
pub use unlocalizable::{UnlocalizableFilter, UNLOCALIZABLE_KEY};
pub use yaml::YamlLoader;

use crate::config::{BucketType, KeySet};
use serde_json::{Map, Value};
use std::path::PathBuf;
use thiserror::Error;

/// Ordered key/value interchange format between loaders and translators.
pub type FlatContent = Map<String, Value>;

/// A loader chain reading and writing file text.
pub type TextLoader = Box<dyn Loader<Input = String, Output = String>>;

#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("default locale must be set before pulling")]
    DefaultLocaleNotSet,

    #[error("cannot push locale '{0}' before the default locale has been pulled")]
    PushBeforePull(String),

    #[error("source file {0} does not exist")]
    Missing(PathBuf),

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("source content for locale '{0}' is empty")]
    Empty(String),

    #[error("failed to parse {format} content: {message}")]
    Parse {
        format: &'static str,
        message: String,
    },

    #[error("failed to serialize {format} content: {message}")]
    Serialize {
        format: &'static str,
        message: String,
    },

    #[error("the {0} format does not support push")]
    PushUnsupported(&'static str),
}

/// The uniform pull/push contract.
pub trait Loader: Send {
    type Input;
    type Output;

    /// Establish which locale is the authoritative source.
    fn set_default_locale(&mut self, locale: &str);

    fn pull(&mut self, locale: &str, input: Self::Input) -> Result<FlatContent, LoaderError>;

    fn push(&mut self, locale: &str, content: FlatContent) -> Result<Self::Output, LoaderError>;

    /// Whether `push` can succeed at all for this loader.
    fn supports_push(&self) -> bool {
        true
    }

    fn with_default_locale(mut self, locale: &str) -> Self
    where
        Self: Sized,
    {
        self.set_default_locale(locale);
        self
    }
}

impl<L: Loader + ?Sized> Loader for Box<L> {
    type Input = L::Input;
    type Output = L::Output;

    fn set_default_locale(&mut self, locale: &str) {
        (**self).set_default_locale(locale)
    }

    fn pull(&mut self, locale: &str, input: Self::Input) -> Result<FlatContent, LoaderError> {
        (**self).pull(locale, input)
    }

    fn push(&mut self, locale: &str, content: FlatContent) -> Result<Self::Output, LoaderError> {
        (**self).push(locale, content)
    }

    fn supports_push(&self) -> bool {
        (**self).supports_push()
    }
}

/// Default-locale bookkeeping shared by the format loaders.
#[derive(Debug, Clone, Default)]
pub(crate) struct LocaleState {
    default_locale: Option<String>,
}

impl LocaleState {
    pub(crate) fn set(&mut self, locale: &str) {
        self.default_locale = Some(locale.to_string());
    }

    /// Errors unless a default locale was set; returns whether `locale` is it.
    pub(crate) fn check(&self, locale: &str) -> Result<bool, LoaderError> {
        match &self.default_locale {
            Some(default) => Ok(default == locale),
            None => Err(LoaderError::DefaultLocaleNotSet),
        }
    }
}

/// Options for [`create_loader`].
#[derive(Debug, Clone, Default)]
pub struct LoaderOptions {
    pub cache_restoration: bool,
    pub return_unlocalized_keys: bool,
    pub ignored_keys: KeySet,
}

/// Build the loader chain for a bucket:
/// format loader, then ignored-keys filter, then unlocalizable filter.
pub fn create_loader(bucket: BucketType, options: &LoaderOptions) -> TextLoader {
    let format: TextLoader = match bucket {
        BucketType::Json => Box::new(JsonLoader::new()),
        BucketType::Yaml => Box::new(YamlLoader::new()),
        BucketType::YamlRootKey => Box::new(YamlLoader::with_root_key()),
        BucketType::Properties => Box::new(PropertiesLoader::new()),
        BucketType::Extracted => Box::new(ExtractedTextLoader::new()),
    };
    let ignored = IgnoredKeysFilter::new(format, options.ignored_keys.clone());
    Box::new(UnlocalizableFilter::new(
        ignored,
        options.cache_restoration,
        options.return_unlocalized_keys,
    ))
}
