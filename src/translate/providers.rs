//! Provider registry: the closed set of raw language-model backends.
//!
//! Every provider carries static metadata (credential variable, settings
//! key, default endpoint and wire dialect), so resolving an identifier is a
//! lookup rather than a branch scattered across the code base.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Request/response shape spoken by a provider's HTTP API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// `POST {base}/chat/completions`
    OpenAiChat,
    /// `POST {base}/messages`
    AnthropicMessages,
    /// `POST {base}/models/{model}:generateContent`
    GoogleGenerate,
}

/// Static metadata for a raw provider.
#[derive(Debug, Clone)]
pub struct ProviderMetadata {
    /// Human-readable name used in messages
    pub name: &'static str,

    /// Environment variable holding the credential, if one is needed
    pub api_key_env_var: Option<&'static str>,

    /// Key under `[llm]` in the user settings file
    pub settings_key: &'static str,

    pub default_base_url: &'static str,

    pub dialect: Dialect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ProviderId {
    OpenAi,
    Anthropic,
    Google,
    OpenRouter,
    Mistral,
    Groq,
    Ollama,
}

static OPENAI: ProviderMetadata = ProviderMetadata {
    name: "OpenAI",
    api_key_env_var: Some("OPENAI_API_KEY"),
    settings_key: "openai",
    default_base_url: "https://api.openai.com/v1",
    dialect: Dialect::OpenAiChat,
};

static ANTHROPIC: ProviderMetadata = ProviderMetadata {
    name: "Anthropic",
    api_key_env_var: Some("ANTHROPIC_API_KEY"),
    settings_key: "anthropic",
    default_base_url: "https://api.anthropic.com/v1",
    dialect: Dialect::AnthropicMessages,
};

static GOOGLE: ProviderMetadata = ProviderMetadata {
    name: "Google",
    api_key_env_var: Some("GOOGLE_API_KEY"),
    settings_key: "google",
    default_base_url: "https://generativelanguage.googleapis.com/v1beta",
    dialect: Dialect::GoogleGenerate,
};

static OPENROUTER: ProviderMetadata = ProviderMetadata {
    name: "OpenRouter",
    api_key_env_var: Some("OPENROUTER_API_KEY"),
    settings_key: "openrouter",
    default_base_url: "https://openrouter.ai/api/v1",
    dialect: Dialect::OpenAiChat,
};

static MISTRAL: ProviderMetadata = ProviderMetadata {
    name: "Mistral",
    api_key_env_var: Some("MISTRAL_API_KEY"),
    settings_key: "mistral",
    default_base_url: "https://api.mistral.ai/v1",
    dialect: Dialect::OpenAiChat,
};

static GROQ: ProviderMetadata = ProviderMetadata {
    name: "Groq",
    api_key_env_var: Some("GROQ_API_KEY"),
    settings_key: "groq",
    default_base_url: "https://api.groq.com/openai/v1",
    dialect: Dialect::OpenAiChat,
};

static OLLAMA: ProviderMetadata = ProviderMetadata {
    name: "Ollama",
    api_key_env_var: None,
    settings_key: "ollama",
    default_base_url: "http://localhost:11434/v1",
    dialect: Dialect::OpenAiChat,
};

impl ProviderId {
    pub const ALL: [ProviderId; 7] = [
        ProviderId::OpenAi,
        ProviderId::Anthropic,
        ProviderId::Google,
        ProviderId::OpenRouter,
        ProviderId::Mistral,
        ProviderId::Groq,
        ProviderId::Ollama,
    ];

    /// Identifier as written in `i18n.json`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::OpenAi => "openai",
            ProviderId::Anthropic => "anthropic",
            ProviderId::Google => "google",
            ProviderId::OpenRouter => "openrouter",
            ProviderId::Mistral => "mistral",
            ProviderId::Groq => "groq",
            ProviderId::Ollama => "ollama",
        }
    }

    pub fn metadata(&self) -> &'static ProviderMetadata {
        match self {
            ProviderId::OpenAi => &OPENAI,
            ProviderId::Anthropic => &ANTHROPIC,
            ProviderId::Google => &GOOGLE,
            ProviderId::OpenRouter => &OPENROUTER,
            ProviderId::Mistral => &MISTRAL,
            ProviderId::Groq => &GROQ,
            ProviderId::Ollama => &OLLAMA,
        }
    }

    /// Local providers run without credentials.
    pub fn requires_auth(&self) -> bool {
        self.metadata().api_key_env_var.is_some()
    }

    /// Comma-separated list of every supported identifier.
    pub fn supported_list() -> String {
        Self::ALL
            .iter()
            .map(|p| p.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = ProviderResolutionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| ProviderResolutionError::Unsupported {
                id: s.to_string(),
                supported: Self::supported_list(),
            })
    }
}

/// Why a translation backend could not be constructed.
#[derive(Debug, Error)]
pub enum ProviderResolutionError {
    #[error(
        "You're trying to use unsupported provider: {id}.\n\
         To fix this issue:\n\
         1. Switch to one of the supported providers ({supported}), or\n\
         2. Remove the provider node from your i18n.json configuration to switch to the managed backend"
    )]
    Unsupported { id: String, supported: String },

    #[error(
        "You're trying to use the raw {provider} API for translation. However, {env_var} environment variable is not set.\n\
         To fix this issue:\n\
         1. Set {env_var} in your environment variables (or `{settings_key}` under [llm] in the settings file), or\n\
         2. Remove the provider node from your i18n.json configuration to switch to the managed backend"
    )]
    MissingCredential {
        provider: ProviderId,
        env_var: &'static str,
        settings_key: &'static str,
    },

    #[error(
        "No API key found for the managed translation backend.\n\
         To fix this issue:\n\
         1. Set {env_var} in your environment variables (or api_key under [auth] in the settings file), or\n\
         2. Add a provider node to your i18n.json configuration to use your own model"
    )]
    ManagedCredentialMissing { env_var: &'static str },

    #[error("invalid base URL '{url}' for provider {provider}: {reason}")]
    InvalidBaseUrl {
        provider: ProviderId,
        url: String,
        reason: String,
    },

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}
