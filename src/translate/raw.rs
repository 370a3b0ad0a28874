//! Raw language-model providers driven by a prompt template.

use super::providers::{Dialect, ProviderId};
use super::response::extract_data;
use super::{send_json, TranslateError};
use crate::config::ProviderConfig;
use crate::loaders::FlatContent;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const ANTHROPIC_MAX_TOKENS: u32 = 8192;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

impl Message {
    fn new(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: content.into(),
        }
    }
}

// OpenAI-compatible chat completions

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

// Anthropic messages

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicBlock>,
}

#[derive(Debug, Deserialize)]
struct AnthropicBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

// Google generateContent

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GoogleRequest {
    system_instruction: GoogleContent,
    contents: Vec<GoogleContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GoogleContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GooglePart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GooglePart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GoogleResponse {
    #[serde(default)]
    candidates: Vec<GoogleCandidate>,
}

#[derive(Debug, Deserialize)]
struct GoogleCandidate {
    content: GoogleContent,
}

/// Client for a user-configured provider.
pub struct RawProviderClient {
    http: reqwest::Client,
    provider: ProviderId,
    model: String,
    prompt: String,
    base_url: String,
    api_key: Option<String>,
    temperature: Option<f32>,
}

impl RawProviderClient {
    pub fn new(
        http: reqwest::Client,
        provider: ProviderId,
        config: &ProviderConfig,
        base_url: &str,
        api_key: Option<String>,
    ) -> Self {
        Self {
            http,
            provider,
            model: config.model.clone(),
            prompt: config.prompt.clone(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            temperature: config.settings.temperature,
        }
    }

    pub fn provider(&self) -> ProviderId {
        self.provider
    }

    fn backend(&self) -> &'static str {
        self.provider.metadata().name
    }

    /// The prompt template with `{source}` and `{target}` filled in.
    pub fn system_prompt(&self, source: &str, target: &str) -> String {
        self.prompt
            .replace("{source}", source)
            .replace("{target}", target)
    }

    /// System prompt, one worked example, then the real payload.
    fn build_messages(&self, source: &str, target: &str, data: &FlatContent) -> Vec<Message> {
        let example_request = json!({
            "sourceLocale": "en",
            "targetLocale": "es",
            "data": { "message": "Hello, world!" }
        });
        let example_reply = json!({
            "sourceLocale": "en",
            "targetLocale": "es",
            "data": { "message": "Hola, mundo!" }
        });
        let payload = json!({
            "sourceLocale": source,
            "targetLocale": target,
            "data": data
        });

        vec![
            Message::new("system", self.system_prompt(source, target)),
            Message::new("user", "OK"),
            Message::new("user", example_request.to_string()),
            Message::new("assistant", example_reply.to_string()),
            Message::new("user", payload.to_string()),
        ]
    }

    pub async fn translate(
        &self,
        source: &str,
        target: &str,
        data: &FlatContent,
    ) -> Result<FlatContent, TranslateError> {
        let messages = self.build_messages(source, target, data);
        debug!(
            "Requesting {} key(s) from {} ({} -> {})",
            data.len(),
            self.backend(),
            source,
            target
        );

        let text = match self.provider.metadata().dialect {
            Dialect::OpenAiChat => self.chat_completion(&messages).await?,
            Dialect::AnthropicMessages => self.anthropic_messages(&messages).await?,
            Dialect::GoogleGenerate => self.google_generate(&messages).await?,
        };

        extract_data(&text).map_err(|source| TranslateError::Parse {
            backend: self.backend().to_string(),
            source,
        })
    }

    fn invalid(&self, message: &str) -> TranslateError {
        TranslateError::InvalidResponse {
            backend: self.backend().to_string(),
            message: message.to_string(),
        }
    }

    async fn chat_completion(&self, messages: &[Message]) -> Result<String, TranslateError> {
        let request = ChatRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
        };

        let mut builder = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {}", key));
        }

        let response: ChatResponse = send_json(self.backend(), builder).await?;
        response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| self.invalid("response contained no choices"))
    }

    async fn anthropic_messages(&self, messages: &[Message]) -> Result<String, TranslateError> {
        let (system, conversation) = split_system(messages);
        let request = AnthropicRequest {
            model: &self.model,
            max_tokens: ANTHROPIC_MAX_TOKENS,
            system: &system,
            messages: conversation,
            temperature: self.temperature,
        };

        let mut builder = self
            .http
            .post(format!("{}/messages", self.base_url))
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.header("x-api-key", key);
        }

        let response: AnthropicResponse = send_json(self.backend(), builder).await?;
        let text: String = response
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .map(|block| block.text)
            .collect();
        if text.is_empty() {
            return Err(self.invalid("response contained no text"));
        }
        Ok(text)
    }

    async fn google_generate(&self, messages: &[Message]) -> Result<String, TranslateError> {
        let (system, conversation) = split_system(messages);
        let request = GoogleRequest {
            system_instruction: GoogleContent {
                role: None,
                parts: vec![GooglePart { text: system }],
            },
            contents: conversation
                .into_iter()
                .map(|message| GoogleContent {
                    role: Some(if message.role == "assistant" {
                        "model".to_string()
                    } else {
                        message.role
                    }),
                    parts: vec![GooglePart {
                        text: message.content,
                    }],
                })
                .collect(),
            generation_config: self
                .temperature
                .map(|temperature| GenerationConfig { temperature }),
        };

        let mut builder = self
            .http
            .post(format!(
                "{}/models/{}:generateContent",
                self.base_url, self.model
            ))
            .json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.header("x-goog-api-key", key);
        }

        let response: GoogleResponse = send_json(self.backend(), builder).await?;
        let text: String = response
            .candidates
            .into_iter()
            .next()
            .map(|candidate| {
                candidate
                    .content
                    .parts
                    .into_iter()
                    .map(|part| part.text)
                    .collect()
            })
            .unwrap_or_default();
        if text.is_empty() {
            return Err(self.invalid("response contained no candidates"));
        }
        Ok(text)
    }
}

/// Pull the system prompt out and merge consecutive turns of the same role,
/// for APIs that require strictly alternating conversations.
fn split_system(messages: &[Message]) -> (String, Vec<Message>) {
    let mut system = Vec::new();
    let mut conversation: Vec<Message> = Vec::new();
    for message in messages {
        if message.role == "system" {
            system.push(message.content.as_str());
            continue;
        }
        match conversation.last_mut() {
            Some(last) if last.role == message.role => {
                last.content.push_str("\n\n");
                last.content.push_str(&message.content);
            }
            _ => conversation.push(message.clone()),
        }
    }
    (system.join("\n\n"), conversation)
}
