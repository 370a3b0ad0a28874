//! `i18n.lock`: checksums of the source values each target was last
//! translated from, per file template.

use crate::loaders::FlatContent;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

pub const LOCKFILE_NAME: &str = "i18n.lock";

const LOCKFILE_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum LockfileError {
    #[error("failed to read lockfile {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("lockfile {path} is malformed: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("failed to serialize lockfile: {0}")]
    Serialize(#[from] serde_yaml::Error),

    #[error("failed to write lockfile {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lockfile {
    pub version: u32,

    /// Template path -> key -> SHA-256 of the source value
    #[serde(default)]
    pub checksums: BTreeMap<String, BTreeMap<String, String>>,
}

impl Default for Lockfile {
    fn default() -> Self {
        Self {
            version: LOCKFILE_VERSION,
            checksums: BTreeMap::new(),
        }
    }
}

/// Hex SHA-256 of a value; strings hash their raw text.
pub fn checksum(value: &Value) -> String {
    let mut hasher = Sha256::new();
    match value {
        Value::String(text) => hasher.update(text.as_bytes()),
        other => hasher.update(other.to_string().as_bytes()),
    }
    hex::encode(hasher.finalize())
}

impl Lockfile {
    /// Load the lockfile; a missing file is an empty lockfile.
    pub fn load(path: &Path) -> Result<Self, LockfileError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No lockfile at {}, starting fresh", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(LockfileError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&content).map_err(|source| LockfileError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), LockfileError> {
        let content = serde_yaml::to_string(self)?;
        super::write_atomic(path, content.as_bytes()).map_err(|source| LockfileError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn file_checksums(&self, template: &str) -> Option<&BTreeMap<String, String>> {
        self.checksums.get(template)
    }

    /// Record the source values a file's targets are now translated from.
    pub fn record(&mut self, template: &str, source: &FlatContent) {
        let sums = source
            .iter()
            .map(|(key, value)| (key.clone(), checksum(value)))
            .collect();
        self.checksums.insert(template.to_string(), sums);
    }
}
