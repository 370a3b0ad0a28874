//! Per-user settings: backend credentials and endpoints.
//!
//! Every value is looked up in the environment first and in the settings
//! file (`~/.l10n/settings.toml`) second.

use crate::translate::ProviderId;
use directories::BaseDirs;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Credential for the managed translation backend
pub const API_KEY_ENV: &str = "L10N_API_KEY";

/// Endpoint override for the managed translation backend
pub const API_URL_ENV: &str = "L10N_API_URL";

pub const DEFAULT_API_URL: &str = "https://engine.l10n.dev";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("settings file {path} is not valid TOML: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// On-disk layout of the settings file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SettingsFile {
    #[serde(default)]
    pub auth: AuthSection,

    /// Raw provider keys, by provider identifier
    #[serde(default)]
    pub llm: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AuthSection {
    pub api_key: Option<String>,
    pub api_url: Option<String>,
}

impl SettingsFile {
    /// Parse the settings file; a missing file is an empty one.
    pub fn read(path: &Path) -> Result<Self, SettingsError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No settings file at {}", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(SettingsError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        toml::from_str(&content).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Resolved settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub api_key: Option<String>,
    pub api_url: String,
    provider_keys: BTreeMap<ProviderId, String>,
}

impl Settings {
    /// Resolve from the process environment and the default settings file.
    pub fn load() -> Result<Self, SettingsError> {
        let file = match Self::default_path() {
            Some(path) => SettingsFile::read(&path)?,
            None => SettingsFile::default(),
        };
        Ok(Self::from_sources(|name| std::env::var(name).ok(), &file))
    }

    /// `~/.l10n/settings.toml`, if a home directory can be determined.
    pub fn default_path() -> Option<PathBuf> {
        BaseDirs::new().map(|dirs| dirs.home_dir().join(".l10n").join("settings.toml"))
    }

    /// Merge an environment lookup over a settings file; non-empty
    /// environment values win.
    pub fn from_sources<F>(env: F, file: &SettingsFile) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |name: &str| env(name).filter(|v| !v.trim().is_empty());

        let mut provider_keys = BTreeMap::new();
        for provider in ProviderId::ALL {
            let metadata = provider.metadata();
            let key = metadata
                .api_key_env_var
                .and_then(|var| lookup(var))
                .or_else(|| file.llm.get(metadata.settings_key).cloned());
            if let Some(key) = key {
                provider_keys.insert(provider, key);
            }
        }

        Self {
            api_key: lookup(API_KEY_ENV).or_else(|| file.auth.api_key.clone()),
            api_url: lookup(API_URL_ENV)
                .or_else(|| file.auth.api_url.clone())
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            provider_keys,
        }
    }

    /// Credential for a raw provider, if configured anywhere.
    pub fn provider_key(&self, provider: ProviderId) -> Option<&str> {
        self.provider_keys.get(&provider).map(String::as_str)
    }
}
