use super::{send_json, TranslateError};
use crate::loaders::FlatContent;
use serde::{Deserialize, Serialize};
use tracing::debug;

const BACKEND: &str = "managed backend";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TranslationRequest<'a> {
    source_locale: &'a str,
    target_locale: &'a str,
    data: &'a FlatContent,
}

#[derive(Debug, Deserialize)]
struct TranslationResponse {
    data: FlatContent,
}

/// Client for the managed translation service (`POST {api_url}/i18n`).
pub struct ManagedClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl ManagedClient {
    pub fn new(http: reqwest::Client, api_url: &str, api_key: String) -> Self {
        Self {
            http,
            endpoint: format!("{}/i18n", api_url.trim_end_matches('/')),
            api_key,
        }
    }

    pub async fn translate(
        &self,
        source: &str,
        target: &str,
        data: &FlatContent,
    ) -> Result<FlatContent, TranslateError> {
        debug!(
            "Requesting {} key(s) from {} ({} -> {})",
            data.len(),
            BACKEND,
            source,
            target
        );
        let request = self
            .http
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&TranslationRequest {
                source_locale: source,
                target_locale: target,
                data,
            });

        let response: TranslationResponse = send_json(BACKEND, request).await?;
        Ok(response.data)
    }
}
