//! LLM backend abstraction
//!
//! Supports OpenAI-compatible APIs (OpenAI, OpenRouter, a local Ollama) and
//! Anthropic Claude.

use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";
const OLLAMA_BASE_URL: &str = "http://localhost:11434/v1";
const ANTHROPIC_MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";

/// LLM backend errors
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("API error: {0}")]
    Api(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Empty response")]
    EmptyResponse,
}

/// Generic LLM backend trait
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Generate a completion with system prompt
    async fn generate(&self, system: &str, user: &str) -> Result<String, LlmError>;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// Thread-safe reference to an LLM backend
pub type SharedBackend = Arc<dyn LlmBackend>;

/// Supported model providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Provider {
    /// Local Ollama server through its OpenAI-compatible endpoint
    #[default]
    Ollama,
    OpenAI,
    OpenRouter,
    Anthropic,
}

impl FromStr for Provider {
    type Err = LlmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ollama" | "local" => Ok(Provider::Ollama),
            "openai" => Ok(Provider::OpenAI),
            "openrouter" => Ok(Provider::OpenRouter),
            "anthropic" | "claude" => Ok(Provider::Anthropic),
            other => Err(LlmError::Config(format!("unknown provider '{}'", other))),
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Provider::Ollama => "Ollama",
            Provider::OpenAI => "OpenAI",
            Provider::OpenRouter => "OpenRouter",
            Provider::Anthropic => "Anthropic",
        })
    }
}

/// Backend configuration
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub provider: Provider,
    /// API key (unused for Ollama)
    pub api_key: Option<String>,
    pub model: String,
    /// Override for the provider's default endpoint
    pub base_url: Option<String>,
    /// Temperature (0.0 - 2.0); planning wants deterministic output
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            provider: Provider::Ollama,
            api_key: None,
            model: "mistral".to_string(),
            base_url: None,
            temperature: 0.0,
            max_tokens: 2048,
        }
    }
}

impl BackendConfig {
    pub fn new(provider: Provider, model: &str) -> Self {
        Self {
            provider,
            model: model.to_string(),
            ..Default::default()
        }
    }

    pub fn with_api_key(mut self, key: Option<String>) -> Self {
        self.api_key = key;
        self
    }

    pub fn with_base_url(mut self, url: Option<String>) -> Self {
        self.base_url = url;
        self
    }

    fn require_key(&self) -> Result<&str, LlmError> {
        self.api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| LlmError::Config(format!("{} API key required", self.provider)))
    }
}

/// OpenAI-compatible chat completion backend
pub struct OpenAICompatBackend {
    client: Client<OpenAIConfig>,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAICompatBackend {
    pub fn new(config: &BackendConfig) -> Result<Self, LlmError> {
        let (key, default_base) = match config.provider {
            Provider::OpenAI => (config.require_key()?.to_string(), None),
            Provider::OpenRouter => (config.require_key()?.to_string(), Some(OPENROUTER_BASE_URL)),
            Provider::Ollama => ("ollama".to_string(), Some(OLLAMA_BASE_URL)),
            Provider::Anthropic => {
                return Err(LlmError::Config(
                    "Anthropic is not an OpenAI-compatible provider".to_string(),
                ))
            }
        };

        let mut openai_config = OpenAIConfig::new().with_api_key(key);
        if let Some(base) = config.base_url.as_deref().or(default_base) {
            openai_config = openai_config.with_api_base(base);
        }

        Ok(Self {
            client: Client::with_config(openai_config),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }
}

#[async_trait]
impl LlmBackend for OpenAICompatBackend {
    async fn generate(&self, system: &str, user: &str) -> Result<String, LlmError> {
        let messages = vec![
            ChatCompletionRequestMessage::System(
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(system)
                    .build()
                    .map_err(|e| LlmError::Api(e.to_string()))?,
            ),
            ChatCompletionRequestMessage::User(
                ChatCompletionRequestUserMessageArgs::default()
                    .content(user)
                    .build()
                    .map_err(|e| LlmError::Api(e.to_string()))?,
            ),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(self.temperature)
            .max_tokens(self.max_tokens)
            .build()
            .map_err(|e| LlmError::Api(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| LlmError::Api(e.to_string()))?;

        response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .filter(|c| !c.trim().is_empty())
            .ok_or(LlmError::EmptyResponse)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Anthropic Messages API backend
pub struct AnthropicBackend {
    client: reqwest::Client,
    api_key: String,
    url: String,
    model: String,
    max_tokens: u32,
}

impl AnthropicBackend {
    pub fn new(config: &BackendConfig) -> Result<Self, LlmError> {
        Ok(Self {
            client: reqwest::Client::new(),
            api_key: config.require_key()?.to_string(),
            url: config
                .base_url
                .clone()
                .unwrap_or_else(|| ANTHROPIC_MESSAGES_URL.to_string()),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        })
    }
}

#[async_trait]
impl LlmBackend for AnthropicBackend {
    async fn generate(&self, system: &str, user: &str) -> Result<String, LlmError> {
        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "system": system,
            "messages": [
                {"role": "user", "content": user}
            ]
        });

        let response = self
            .client
            .post(&self.url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Api(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(LlmError::Api(format!("Anthropic API error {}: {}", status, text)));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| LlmError::Api(e.to_string()))?;

        json["content"]
            .as_array()
            .and_then(|blocks| blocks.iter().find_map(|b| b["text"].as_str()))
            .map(str::to_string)
            .ok_or(LlmError::EmptyResponse)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Build the backend for the configured provider
pub fn create_backend(config: &BackendConfig) -> Result<SharedBackend, LlmError> {
    match config.provider {
        Provider::Anthropic => Ok(Arc::new(AnthropicBackend::new(config)?)),
        _ => Ok(Arc::new(OpenAICompatBackend::new(config)?)),
    }
}
