//! LLM client implementations
//!
//! Provides the generative backend adapters for OpenAI-compatible and
//! Ollama chat APIs. Response bodies are untrusted text and pass through
//! the defensive JSON parser before typed decoding.
//!
//! Author: hephaex@gmail.com

use async_trait::async_trait;
use forge_core::{safe_parse, ChatMessage, ConfigError, LlmClient, LlmConfig, LlmError, LlmProvider};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// OpenAI Client
// ============================================================================

/// OpenAI-compatible chat API client
#[derive(Debug)]
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
    timeout: Duration,
}

#[derive(Debug, Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: String,
}

impl OpenAiClient {
    /// Create a new OpenAI client
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        max_tokens: u32,
        temperature: f32,
    ) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: model.into(),
            max_tokens,
            temperature,
            timeout: Duration::from_secs(60),
        }
    }

    /// Create from config
    pub fn from_config(config: &LlmConfig) -> Result<Self, ConfigError> {
        let api_key = config
            .openai_api_key
            .as_ref()
            .ok_or_else(|| ConfigError::MissingRequired("OPENAI_API_KEY".to_string()))?;

        let base_url = config
            .openai_base_url
            .clone()
            .unwrap_or_else(|| "https://api.openai.com/v1".to_string());

        Ok(Self {
            client: Client::new(),
            api_key: api_key.clone(),
            base_url,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }

    /// Set custom base URL (for compatible APIs)
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn generate(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        let request = OpenAiRequest {
            model: &self.model,
            messages,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .timeout(self.timeout)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::Request(format!("request failed: {e}")))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(LlmError::Backend(format!("status {status}: {body}")));
        }

        let value = safe_parse(&body)
            .map_err(|e| LlmError::InvalidResponse(format!("unsafe response body: {e}")))?;

        let result: OpenAiResponse = serde_json::from_value(value)
            .map_err(|e| LlmError::InvalidResponse(format!("failed to parse response: {e}")))?;

        result
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or(LlmError::Empty)
    }
}

// ============================================================================
// Ollama Client
// ============================================================================

/// Ollama chat API client
pub struct OllamaClient {
    client: Client,
    base_url: String,
    model: String,
    timeout: Duration,
}

#[derive(Debug, Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    message: OllamaMessage,
}

#[derive(Debug, Deserialize)]
struct OllamaMessage {
    content: String,
}

impl OllamaClient {
    /// Create a new Ollama client
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            model: model.into(),
            timeout: Duration::from_secs(60),
        }
    }

    /// Create from config
    pub fn from_config(config: &LlmConfig) -> Self {
        let mut client = Self::new(config.ollama_url.clone(), config.model.clone());
        client.timeout = Duration::from_secs(config.timeout_secs);
        client
    }
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn generate(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        let request = OllamaRequest {
            model: &self.model,
            messages,
            stream: false,
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::Request(format!("Ollama request failed: {e}")))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(LlmError::Backend(format!("Ollama status {status}: {body}")));
        }

        let value = safe_parse(&body)
            .map_err(|e| LlmError::InvalidResponse(format!("unsafe response body: {e}")))?;

        let result: OllamaResponse = serde_json::from_value(value).map_err(|e| {
            LlmError::InvalidResponse(format!("failed to parse Ollama response: {e}"))
        })?;

        Ok(result.message.content)
    }
}

// ============================================================================
// Factory function
// ============================================================================

/// Create an LLM client from config
pub fn create_llm_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>, ConfigError> {
    match config.provider {
        LlmProvider::OpenAI => Ok(Arc::new(OpenAiClient::from_config(config)?)),
        LlmProvider::Ollama => Ok(Arc::new(OllamaClient::from_config(config))),
    }
}

// ============================================================================
// Tests
// ============================================================================
