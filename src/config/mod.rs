//! Project localization configuration (`i18n.json`).
//!
//! The raw document is first checked by [`validate`], which reports every
//! problem it finds together with a suggestion, and only then deserialized
//! into the typed [`I18nConfig`].

mod key_pattern;
mod validator;

pub use key_pattern::{KeyPattern, KeySet};
pub use validator::{validate, Validation, ValidationIssue, ValidationReport};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Placeholder substituted with a locale code in bucket paths.
pub const LOCALE_PLACEHOLDER: &str = "[locale]";

/// Conventional config file name at the project root.
pub const DEFAULT_CONFIG_FILE: &str = "i18n.json";

/// Errors raised while loading the project configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config file {path} is not valid JSON: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("configuration is invalid ({} problem(s) found)", .0.len())]
    Invalid(ValidationReport),
}

/// The whole project configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct I18nConfig {
    #[serde(rename = "$schema", default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    pub locale: LocaleConfig,

    #[serde(default)]
    pub buckets: BTreeMap<BucketType, BucketConfig>,

    /// Raw language-model provider. `None` means the managed backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<ProviderConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocaleConfig {
    /// Authoritative source locale (BCP-47)
    pub source: String,

    /// Target locales, in the order they were declared
    pub targets: Vec<String>,

    /// Locale whose files are read when the source locale's file is missing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_source: Option<String>,
}

/// Supported file formats, one per bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BucketType {
    Json,
    Yaml,
    YamlRootKey,
    Properties,
    Extracted,
}

impl BucketType {
    pub const ALL: [BucketType; 5] = [
        BucketType::Json,
        BucketType::Yaml,
        BucketType::YamlRootKey,
        BucketType::Properties,
        BucketType::Extracted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BucketType::Json => "json",
            BucketType::Yaml => "yaml",
            BucketType::YamlRootKey => "yaml-root-key",
            BucketType::Properties => "properties",
            BucketType::Extracted => "extracted",
        }
    }

    pub fn from_name(name: &str) -> Option<BucketType> {
        Self::ALL.into_iter().find(|b| b.as_str() == name)
    }
}

impl std::fmt::Display for BucketType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Translation policy and file patterns for one bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketConfig {
    #[serde(default)]
    pub include: Vec<BucketItem>,

    #[serde(default)]
    pub exclude: Vec<BucketItem>,

    /// Keys whose source value is copied through untouched
    #[serde(default)]
    pub locked_keys: Vec<String>,

    /// Regexes; any value matching one is copied through untouched
    #[serde(default)]
    pub locked_patterns: Vec<String>,

    /// Keys dropped from translation and from the written output
    #[serde(default)]
    pub ignored_keys: Vec<String>,

    /// Keys whose value is rewritten to the target locale code
    #[serde(default)]
    pub inject_locale: Vec<String>,
}

/// A path pattern, either a bare string or `{path, delimiter}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BucketItem {
    Path(String),
    Delimited {
        path: String,
        #[serde(default)]
        delimiter: Option<LocaleDelimiter>,
    },
}

impl BucketItem {
    pub fn path(&self) -> &str {
        match self {
            BucketItem::Path(path) => path,
            BucketItem::Delimited { path, .. } => path,
        }
    }

    pub fn delimiter(&self) -> Option<LocaleDelimiter> {
        match self {
            BucketItem::Path(_) => None,
            BucketItem::Delimited { delimiter, .. } => *delimiter,
        }
    }
}

/// Separator used between language and region when a locale code is
/// written into a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LocaleDelimiter {
    #[serde(rename = "-")]
    Dash,
    #[serde(rename = "_")]
    Underscore,
}

impl LocaleDelimiter {
    pub fn as_char(&self) -> char {
        match self {
            LocaleDelimiter::Dash => '-',
            LocaleDelimiter::Underscore => '_',
        }
    }
}

/// Write `locale` the way a path using `delimiter` expects it
/// (`en-US` becomes `en_US` with an underscore delimiter).
pub fn format_locale(locale: &str, delimiter: Option<LocaleDelimiter>) -> String {
    match delimiter {
        Some(d) => locale
            .chars()
            .map(|c| if c == '-' || c == '_' { d.as_char() } else { c })
            .collect(),
        None => locale.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    /// Backend identifier, resolved by the translation orchestrator
    pub id: String,
    pub model: String,
    /// System prompt template with `{source}` and `{target}` placeholders
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default)]
    pub settings: ProviderSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Maximum number of keys per backend request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,
}

impl I18nConfig {
    /// Validate and parse a raw JSON document.
    pub fn from_value(raw: &serde_json::Value) -> Result<Self, ConfigError> {
        match validate(raw) {
            Validation::Valid(config) => Ok(*config),
            Validation::Invalid(report) => Err(ConfigError::Invalid(report)),
        }
    }

    /// Every locale the project knows about, source first.
    pub fn all_locales(&self) -> Vec<&str> {
        std::iter::once(self.locale.source.as_str())
            .chain(self.locale.targets.iter().map(String::as_str))
            .collect()
    }
}

/// Read, validate and parse the config file at `path`.
pub fn load(path: &Path) -> Result<I18nConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let raw: serde_json::Value =
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    I18nConfig::from_value(&raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    // ==================== Deserialization Tests ====================

    #[test]
    fn test_bucket_item_accepts_string_and_object() {
        let items: Vec<BucketItem> = serde_json::from_value(json!([
            "locales/[locale].json",
            { "path": "data/[locale].json", "delimiter": "_" },
            { "path": "other/[locale].json", "delimiter": null }
        ]))
        .expect("Should deserialize");

        assert_eq!(items[0].path(), "locales/[locale].json");
        assert_eq!(items[0].delimiter(), None);
        assert_eq!(items[1].delimiter(), Some(LocaleDelimiter::Underscore));
        assert_eq!(items[2].delimiter(), None);
    }

    #[test]
    fn test_bucket_type_names_round_trip() {
        for bucket in BucketType::ALL {
            assert_eq!(BucketType::from_name(bucket.as_str()), Some(bucket));
            let json = serde_json::to_value(bucket).expect("Should serialize");
            assert_eq!(json, json!(bucket.as_str()));
        }
        assert_eq!(BucketType::from_name("xliff"), None);
    }

    // ==================== Locale Formatting Tests ====================

    #[test]
    fn test_format_locale_with_delimiter() {
        assert_eq!(format_locale("en-US", Some(LocaleDelimiter::Underscore)), "en_US");
        assert_eq!(format_locale("pt_BR", Some(LocaleDelimiter::Dash)), "pt-BR");
        assert_eq!(format_locale("en-US", None), "en-US");
        assert_eq!(format_locale("es", Some(LocaleDelimiter::Underscore)), "es");
    }

    #[test]
    fn test_all_locales_starts_with_source() {
        let config = I18nConfig::from_value(&json!({
            "locale": { "source": "en", "targets": ["es", "fr"] }
        }))
        .expect("Should be valid");

        assert_eq!(config.all_locales(), vec!["en", "es", "fr"]);
    }

    // ==================== Loading Tests ====================

    #[test]
    fn test_load_valid_file() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        std::fs::write(
            &path,
            r#"{
                "locale": { "source": "en", "targets": ["es"] },
                "buckets": { "json": { "include": ["locales/[locale].json"] } },
                "provider": {
                    "id": "openai",
                    "model": "gpt-4o-mini",
                    "prompt": "Translate from {source} to {target}",
                    "settings": { "temperature": 0.2, "batchSize": 25 }
                }
            }"#,
        )
        .expect("write config");

        let config = load(&path).expect("Should load");
        let provider = config.provider.expect("provider present");
        assert_eq!(provider.id, "openai");
        assert_eq!(provider.settings.batch_size, Some(25));
        assert!(config.buckets.contains_key(&BucketType::Json));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = TempDir::new().expect("temp dir");
        let result = load(&dir.path().join("missing.json"));
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_load_malformed_json() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        std::fs::write(&path, "{ not json").expect("write config");

        assert!(matches!(load(&path), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_load_invalid_config_reports_every_problem() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        std::fs::write(&path, r#"{ "locale": { "targets": [] } }"#).expect("write config");

        match load(&path) {
            Err(ConfigError::Invalid(report)) => assert!(report.len() >= 2),
            other => panic!("expected invalid config, got {:?}", other),
        }
    }
}
