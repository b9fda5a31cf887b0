//! Async LLM client
//!
//! Model-agnostic HTTP client used by the order interpreter and the
//! narrator. Speaks the Anthropic messages API and the OpenAI-compatible
//! chat API (DeepSeek and friends).

use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::error::{BattleError, Result};

const DEFAULT_API_URL: &str = "https://api.anthropic.com/v1/messages";
const DEFAULT_MODEL: &str = "claude-3-haiku-20240307";
const DEFAULT_MAX_TOKENS: u32 = 2048;

/// API format type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiFormat {
    Anthropic,
    OpenAI,
}

impl ApiFormat {
    /// Detect API format from URL
    pub fn detect(url: &str) -> Self {
        if url.contains("anthropic.com") {
            ApiFormat::Anthropic
        } else {
            ApiFormat::OpenAI
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LlmConfig {
    pub api_key: String,
    pub api_url: String,
    pub model: String,
    pub max_tokens: u32,
}

impl LlmConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_url: DEFAULT_API_URL.into(),
            model: DEFAULT_MODEL.into(),
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    /// Read configuration from the environment
    ///
    /// Required: LLM_API_KEY
    /// Optional: LLM_API_URL, LLM_MODEL, LLM_MAX_TOKENS
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("LLM_API_KEY")
            .map_err(|_| BattleError::Llm("LLM_API_KEY not set".into()))?;
        let mut config = Self::new(api_key);
        if let Ok(url) = std::env::var("LLM_API_URL") {
            config.api_url = url;
        }
        if let Ok(model) = std::env::var("LLM_MODEL") {
            config.model = model;
        }
        if let Ok(raw) = std::env::var("LLM_MAX_TOKENS") {
            config.max_tokens = raw
                .parse()
                .map_err(|_| {
                    BattleError::Config(format!("LLM_MAX_TOKENS is not a number: {}", raw))
                })?;
        }
        Ok(config)
    }
}

/// Async LLM client for making API calls
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    config: LlmConfig,
    api_format: ApiFormat,
}

impl LlmClient {
    pub fn new(config: LlmConfig) -> Self {
        let api_format = ApiFormat::detect(&config.api_url);
        Self {
            client: Client::new(),
            config,
            api_format,
        }
    }

    pub fn from_env() -> Result<Self> {
        Ok(Self::new(LlmConfig::from_env()?))
    }

    pub fn api_format(&self) -> ApiFormat {
        self.api_format
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Send one system + user exchange and return the reply text
    pub async fn complete(&self, system: &str, user: &str) -> Result<String> {
        debug!(model = %self.config.model, format = ?self.api_format, "LLM request");
        match self.api_format {
            ApiFormat::Anthropic => {
                let request = AnthropicRequest {
                    model: &self.config.model,
                    max_tokens: self.config.max_tokens,
                    system,
                    messages: vec![Message { role: "user", content: user }],
                };
                let builder = self
                    .client
                    .post(&self.config.api_url)
                    .header("x-api-key", &self.config.api_key)
                    .header("anthropic-version", "2023-06-01");
                let reply: AnthropicResponse = self.send(builder, &request).await?;
                reply
                    .content
                    .into_iter()
                    .next()
                    .map(|c| c.text)
                    .ok_or_else(|| BattleError::Llm("Empty response".into()))
            }
            ApiFormat::OpenAI => {
                let request = OpenAIRequest {
                    model: &self.config.model,
                    max_tokens: self.config.max_tokens,
                    messages: vec![
                        Message { role: "system", content: system },
                        Message { role: "user", content: user },
                    ],
                };
                let builder = self
                    .client
                    .post(&self.config.api_url)
                    .header("Authorization", format!("Bearer {}", self.config.api_key));
                let reply: OpenAIResponse = self.send(builder, &request).await?;
                reply
                    .choices
                    .into_iter()
                    .next()
                    .map(|c| c.message.content)
                    .ok_or_else(|| BattleError::Llm("Empty response".into()))
            }
        }
    }

    async fn send<B: Serialize, R: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        body: &B,
    ) -> Result<R> {
        let response = builder
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| BattleError::Llm(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(BattleError::Llm(format!("API error {}: {}", status, error_text)));
        }

        response.json().await.map_err(|e| BattleError::Llm(e.to_string()))
    }
}

// Anthropic API format
#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<Message<'a>>,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    text: String,
}

// OpenAI-compatible API format
#[derive(Serialize)]
struct OpenAIRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Message<'a>>,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: String,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}
