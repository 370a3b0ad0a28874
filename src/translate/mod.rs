//! Translation orchestrator.
//!
//! A [`Translator`] sends flat key/value batches to one backend, either the
//! managed translation service or a user-configured raw language-model
//! provider, and returns the translated values for the requested keys.

mod managed;
mod providers;
mod raw;
mod response;

pub use managed::ManagedClient;
pub use providers::{Dialect, ProviderId, ProviderMetadata, ProviderResolutionError};
pub use raw::RawProviderClient;
pub use response::{extract_data, extract_object, repair_json, ResponseParseError};

use crate::config::ProviderConfig;
use crate::loaders::FlatContent;
use crate::metrics::RunMetrics;
use crate::retry::{with_retry_if, RetryConfig};
use crate::settings::{Settings, API_KEY_ENV};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("{backend} API error ({status}): {body}")]
    Api {
        backend: String,
        status: u16,
        body: String,
    },

    #[error("failed to reach {backend}: {source}")]
    Transport {
        backend: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("unexpected response from {backend}: {message}")]
    InvalidResponse { backend: String, message: String },

    #[error("could not parse {backend} response: {source}")]
    Parse {
        backend: String,
        #[source]
        source: ResponseParseError,
    },

    #[error("{backend} left {} requested key(s) untranslated: {}", .missing.len(), .missing.join(", "))]
    Incomplete {
        backend: String,
        missing: Vec<String>,
    },
}

impl TranslateError {
    /// Network failures, rate limiting (429) and server errors (5xx).
    /// Other 4xx client errors are permanent.
    pub fn is_transient(&self) -> bool {
        match self {
            TranslateError::Transport { .. } => true,
            TranslateError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Send a request and decode a JSON body, mapping every failure to a
/// [`TranslateError`].
pub(crate) async fn send_json<R: DeserializeOwned>(
    backend: &str,
    request: reqwest::RequestBuilder,
) -> Result<R, TranslateError> {
    let response = request
        .send()
        .await
        .map_err(|source| TranslateError::Transport {
            backend: backend.to_string(),
            source,
        })?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|e| format!("<failed to read body: {}>", e));
        return Err(TranslateError::Api {
            backend: backend.to_string(),
            status: status.as_u16(),
            body,
        });
    }

    response
        .json::<R>()
        .await
        .map_err(|e| TranslateError::InvalidResponse {
            backend: backend.to_string(),
            message: e.to_string(),
        })
}

#[derive(Debug, Clone)]
pub struct TranslatorOptions {
    pub retry: RetryConfig,

    /// Also retry responses that could not be parsed
    pub retry_parse_errors: bool,
}

impl Default for TranslatorOptions {
    fn default() -> Self {
        Self {
            retry: RetryConfig::translation(),
            retry_parse_errors: false,
        }
    }
}

pub enum Backend {
    Managed(ManagedClient),
    Raw(RawProviderClient),
}

impl Backend {
    pub fn name(&self) -> &'static str {
        match self {
            Backend::Managed(_) => "managed backend",
            Backend::Raw(client) => client.provider().metadata().name,
        }
    }
}

pub struct Translator {
    backend: Backend,
    batch_size: Option<usize>,
    options: TranslatorOptions,
    metrics: Arc<RunMetrics>,
}

impl Translator {
    pub fn new(backend: Backend, options: TranslatorOptions) -> Self {
        Self {
            backend,
            batch_size: None,
            options,
            metrics: Arc::new(RunMetrics::new()),
        }
    }

    /// Maximum keys per request; `None` sends everything at once.
    pub fn with_batch_size(mut self, batch_size: Option<usize>) -> Self {
        self.batch_size = batch_size.filter(|size| *size > 0);
        self
    }

    pub fn metrics(&self) -> &Arc<RunMetrics> {
        &self.metrics
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Pick the backend for a project: the configured raw provider, or the
    /// managed backend when no provider is configured.
    pub fn resolve(
        provider: Option<&ProviderConfig>,
        settings: &Settings,
        options: TranslatorOptions,
    ) -> Result<Self, ProviderResolutionError> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        let Some(provider) = provider else {
            let api_key = settings
                .api_key
                .clone()
                .ok_or(ProviderResolutionError::ManagedCredentialMissing {
                    env_var: API_KEY_ENV,
                })?;
            info!("Using managed translation backend at {}", settings.api_url);
            let client = ManagedClient::new(http, &settings.api_url, api_key);
            return Ok(Self::new(Backend::Managed(client), options));
        };

        let id: ProviderId = provider.id.parse()?;
        let metadata = id.metadata();

        let api_key = match (metadata.api_key_env_var, settings.provider_key(id)) {
            (_, Some(key)) => Some(key.to_string()),
            (None, None) => None,
            (Some(env_var), None) => {
                return Err(ProviderResolutionError::MissingCredential {
                    provider: id,
                    env_var,
                    settings_key: metadata.settings_key,
                })
            }
        };

        let base_url = provider
            .base_url
            .clone()
            .unwrap_or_else(|| metadata.default_base_url.to_string());
        if let Err(e) = url::Url::parse(&base_url) {
            return Err(ProviderResolutionError::InvalidBaseUrl {
                provider: id,
                url: base_url,
                reason: e.to_string(),
            });
        }

        info!(
            "Using {} model {} at {}",
            metadata.name, provider.model, base_url
        );
        let client = RawProviderClient::new(http, id, provider, &base_url, api_key);
        Ok(Self::new(Backend::Raw(client), options).with_batch_size(provider.settings.batch_size))
    }

    /// Translate `data` from `source` to `target`.
    ///
    /// The result holds exactly the keys of `data`. A batch reply missing
    /// any requested key fails with [`TranslateError::Incomplete`]; extra
    /// keys are dropped.
    pub async fn translate(
        &self,
        source: &str,
        target: &str,
        data: &FlatContent,
    ) -> Result<FlatContent, TranslateError> {
        if data.is_empty() {
            return Ok(FlatContent::new());
        }

        let batches = split_batches(data, self.batch_size);
        let mut translated = FlatContent::new();

        for (index, batch) in batches.iter().enumerate() {
            let operation = format!(
                "{} {} -> {} (batch {}/{})",
                self.backend_name(),
                source,
                target,
                index + 1,
                batches.len()
            );
            let result = with_retry_if(
                &self.options.retry,
                &operation,
                || self.call_batch(source, target, batch),
                |e| self.should_retry(e),
            )
            .await?;

            debug!("{}: {} key(s) returned", operation, result.len());
            translated.extend(result);
        }

        self.metrics.record_keys_translated(translated.len());
        Ok(translated)
    }

    /// One backend call for one batch, keeping only requested keys.
    async fn call_batch(
        &self,
        source: &str,
        target: &str,
        batch: &FlatContent,
    ) -> Result<FlatContent, TranslateError> {
        let result = self.call(source, target, batch).await?;

        let missing: Vec<String> = batch
            .keys()
            .filter(|key| !result.contains_key(*key))
            .cloned()
            .collect();
        if !missing.is_empty() {
            warn!(
                "{} did not return {} of {} key(s) for {}",
                self.backend_name(),
                missing.len(),
                batch.len(),
                target
            );
            self.metrics.record_api_failure();
            return Err(TranslateError::Incomplete {
                backend: self.backend_name().to_string(),
                missing,
            });
        }

        Ok(result
            .into_iter()
            .filter(|(key, _)| batch.contains_key(key))
            .collect())
    }

    async fn call(
        &self,
        source: &str,
        target: &str,
        batch: &FlatContent,
    ) -> Result<FlatContent, TranslateError> {
        self.metrics.record_api_call();
        let result = match &self.backend {
            Backend::Managed(client) => client.translate(source, target, batch).await,
            Backend::Raw(client) => client.translate(source, target, batch).await,
        };
        if result.is_err() {
            self.metrics.record_api_failure();
        }
        result
    }

    fn should_retry(&self, error: &TranslateError) -> bool {
        error.is_transient()
            || (self.options.retry_parse_errors
                && matches!(
                    error,
                    TranslateError::Parse { .. } | TranslateError::Incomplete { .. }
                ))
    }
}

/// Split `data` into ordered batches of at most `size` keys.
fn split_batches(data: &FlatContent, size: Option<usize>) -> Vec<FlatContent> {
    let size = size.unwrap_or(data.len()).max(1);
    let mut batches = Vec::new();
    let mut current = FlatContent::new();
    for (key, value) in data {
        current.insert(key.clone(), value.clone());
        if current.len() == size {
            batches.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        batches.push(current);
    }
    batches
}
