//! LLM client for API communication

use crate::error::{Error, Result};
use crate::repo::{LlmSettings, LLM_API_KEY_ENV};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// One system + user exchange with a chat model
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    /// Fixed role instruction
    pub system: String,
    /// Task-specific prompt
    pub user: String,
    /// Sampling temperature
    pub temperature: f32,
}

impl ChatRequest {
    pub fn new(system: impl Into<String>, user: impl Into<String>, temperature: f32) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            temperature,
        }
    }
}

/// Response from LLM
#[derive(Debug, Clone)]
pub struct LlmResponse {
    /// The generated content
    pub content: String,
    /// Number of tokens used
    pub tokens_used: Option<usize>,
}

/// Anything that can answer a chat request
#[async_trait::async_trait]
pub trait TextGenerator: Send + Sync {
    /// Send one request and return the model's reply
    async fn chat(&self, request: &ChatRequest) -> Result<LlmResponse>;
}

/// Configuration for LLM client
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// API endpoint URL, without the `/v1/...` suffix
    pub endpoint: String,
    /// Model name
    pub model: String,
    /// API key
    pub api_key: Option<String>,
    /// Maximum tokens for response
    pub max_tokens: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self::from_settings(&LlmSettings::default())
    }
}

impl LlmConfig {
    /// Build from the `[llm]` config section, resolving the key from the
    /// environment when the file has none
    pub fn from_settings(settings: &LlmSettings) -> Self {
        Self {
            endpoint: settings.endpoint.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            api_key: settings.resolved_api_key(),
            max_tokens: settings.max_tokens,
        }
    }
}

/// Client for OpenAI-compatible chat completion endpoints (Groq by default)
pub struct LlmClient {
    config: LlmConfig,
    client: reqwest::Client,
}

impl LlmClient {
    /// Create a new LLM client
    pub fn new(config: LlmConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    /// Create with an explicit endpoint, model and key
    pub fn openai_compatible(endpoint: &str, model: &str, api_key: Option<&str>) -> Self {
        Self::new(LlmConfig {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.map(|s| s.to_string()),
            ..Default::default()
        })
    }

    fn api_key(&self) -> Result<&str> {
        match self.config.api_key.as_deref() {
            Some(key) if !key.is_empty() => Ok(key),
            _ => Err(Error::Configuration(format!(
                "no LLM API key configured; set `llm.api_key` or {}",
                LLM_API_KEY_ENV
            ))),
        }
    }
}

#[async_trait::async_trait]
impl TextGenerator for LlmClient {
    async fn chat(&self, request: &ChatRequest) -> Result<LlmResponse> {
        let key = self.api_key()?;
        let url = format!("{}/v1/chat/completions", self.config.endpoint);

        let body = OpenAIChatRequest {
            model: &self.config.model,
            messages: vec![
                OpenAIMessage {
                    role: "system".to_string(),
                    content: request.system.clone(),
                },
                OpenAIMessage {
                    role: "user".to_string(),
                    content: request.user.clone(),
                },
            ],
            max_tokens: Some(self.config.max_tokens),
            temperature: request.temperature,
        };

        tracing::debug!(
            "Chat request to {} (model {}, temperature {})",
            url,
            self.config.model,
            request.temperature
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(key)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::transport("Failed to send chat completion request", e))?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Provider {
                service: "Chat completion",
                status,
                body,
            });
        }

        let result: OpenAIChatResponse = response
            .json()
            .await
            .map_err(|e| Error::transport("Failed to parse chat completion response", e))?;

        let content = result
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| Error::Provider {
                service: "Chat completion",
                status,
                body: "response contained no choices".to_string(),
            })?;

        let tokens_used = result.usage.map(|u| u.total_tokens as usize);

        Ok(LlmResponse {
            content,
            tokens_used,
        })
    }
}

// OpenAI API types

#[derive(Debug, Serialize)]
struct OpenAIChatRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
    temperature: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAIMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct OpenAIChatResponse {
    choices: Vec<OpenAIChoice>,
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIUsage {
    total_tokens: i64,
}

/// Mock LLM client for testing and offline runs
///
/// Replies with the first registered response whose key occurs in the user
/// prompt, otherwise with the default response. Every request is recorded.
pub struct MockLlmClient {
    responses: Vec<(String, String)>,
    failures: Vec<String>,
    default_response: String,
    requests: Mutex<Vec<ChatRequest>>,
}

impl MockLlmClient {
    /// Create a new mock client
    pub fn new() -> Self {
        Self {
            responses: Vec::new(),
            failures: Vec::new(),
            default_response: "Mock documentation.".to_string(),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Add a mock response
    pub fn add_response(&mut self, prompt_contains: &str, response: &str) {
        self.responses
            .push((prompt_contains.to_string(), response.to_string()));
    }

    /// Fail any request whose user prompt contains `prompt_contains`
    pub fn add_failure(&mut self, prompt_contains: &str) {
        self.failures.push(prompt_contains.to_string());
    }

    /// Reply used when no registered key matches
    pub fn with_default(mut self, response: &str) -> Self {
        self.default_response = response.to_string();
        self
    }

    /// Requests received so far, in order
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }
}

impl Default for MockLlmClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl TextGenerator for MockLlmClient {
    async fn chat(&self, request: &ChatRequest) -> Result<LlmResponse> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        if self.failures.iter().any(|key| request.user.contains(key)) {
            return Err(Error::Provider {
                service: "Mock chat",
                status: 500,
                body: "injected failure".to_string(),
            });
        }

        let content = self
            .responses
            .iter()
            .find(|(key, _)| request.user.contains(key))
            .map(|(_, response)| response.clone())
            .unwrap_or_else(|| self.default_response.clone());

        Ok(LlmResponse {
            content,
            tokens_used: None,
        })
    }
}
