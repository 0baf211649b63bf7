//! Embedding client for generating vector representations
//!
//! Two interchangeable backends speak the same wire format -
//! `POST {model, texts}` returning `{embeddings}` - one self-hosted with no
//! credential, one hosted behind a bearer key.
//!
//! Author: hephaex@gmail.com

use async_trait::async_trait;
use forge_core::{safe_parse, ConfigError, EmbeddingConfig, EmbeddingError, EmbeddingProvider};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Embedding Trait
// ============================================================================

/// Trait for embedding generation
#[async_trait]
pub trait EmbeddingClient: Send + Sync + std::fmt::Debug {
    /// Generate embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Generate embeddings for multiple texts (batch)
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Get embedding dimension
    fn dimension(&self) -> usize;
}

// ============================================================================
// Wire Format
// ============================================================================

#[derive(Debug, Serialize)]
struct EmbeddingRequest {
    model: String,
    texts: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Classify a non-success backend status into the fixed error vocabulary.
fn classify_status(status: StatusCode, detail: &str) -> EmbeddingError {
    match status {
        StatusCode::UNAUTHORIZED => EmbeddingError::Authentication,
        StatusCode::TOO_MANY_REQUESTS => EmbeddingError::RateLimited,
        StatusCode::BAD_REQUEST => EmbeddingError::InvalidRequest(detail.to_string()),
        s if s.is_server_error() => EmbeddingError::Server,
        s => EmbeddingError::Transport(format!("unexpected status {s}: {detail}")),
    }
}

/// POST the batch, run the body through the defensive parser, decode.
async fn request_embeddings(
    client: &Client,
    url: &str,
    bearer: Option<&str>,
    timeout: Duration,
    request: &EmbeddingRequest,
    expected_dimension: usize,
) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    let mut builder = client
        .post(url)
        .timeout(timeout)
        .header("Content-Type", "application/json")
        .json(request);

    if let Some(key) = bearer {
        builder = builder.header("Authorization", format!("Bearer {key}"));
    }

    let response = builder
        .send()
        .await
        .map_err(|e| EmbeddingError::Transport(format!("embedding request failed: {e}")))?;

    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    if !status.is_success() {
        return Err(classify_status(status, &body));
    }

    decode_embeddings(&body, expected_dimension)
}

/// Decode a success body: defensive parse, typed decode, then the
/// zero-embeddings and fixed-dimension checks.
fn decode_embeddings(
    body: &str,
    expected_dimension: usize,
) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    let value = safe_parse(body)
        .map_err(|e| EmbeddingError::Transport(format!("unsafe embedding response: {e}")))?;

    let parsed: EmbeddingResponse = serde_json::from_value(value)
        .map_err(|e| EmbeddingError::Transport(format!("failed to parse embedding response: {e}")))?;

    if parsed.embeddings.is_empty() {
        return Err(EmbeddingError::Empty);
    }

    for vector in &parsed.embeddings {
        if vector.len() != expected_dimension {
            return Err(EmbeddingError::Dimension {
                expected: expected_dimension,
                actual: vector.len(),
            });
        }
    }

    Ok(parsed.embeddings)
}

// ============================================================================
// Local Embedding Client
// ============================================================================

/// Self-hosted embedding backend, no credential required
#[derive(Debug)]
pub struct LocalEmbedding {
    client: Client,
    base_url: String,
    model: String,
    dimension: usize,
    timeout: Duration,
}

impl LocalEmbedding {
    /// Create a new local embedding client
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        let model = model.into();
        let dimension = match model.as_str() {
            "bge-base-en-v1.5" => 768,
            "bge-large-en-v1.5" => 1024,
            "all-minilm-l6-v2" => 384,
            _ => 768, // Default for most local models
        };

        Self {
            client: Client::new(),
            base_url: base_url.into(),
            model,
            dimension,
            timeout: Duration::from_secs(15),
        }
    }

    /// Create from config
    pub fn from_config(config: &EmbeddingConfig) -> Self {
        let mut client = Self::new(config.url.clone(), config.model.clone());
        client.timeout = Duration::from_secs(config.timeout_secs);
        client
    }
}

#[async_trait]
impl EmbeddingClient for LocalEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let results = self.embed_batch(&[text.to_string()]).await?;
        results.into_iter().next().ok_or(EmbeddingError::Empty)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbeddingRequest {
            model: self.model.clone(),
            texts: texts.to_vec(),
        };

        request_embeddings(
            &self.client,
            &format!("{}/embeddings", self.base_url),
            None,
            self.timeout,
            &request,
            self.dimension,
        )
        .await
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

// ============================================================================
// Hosted Embedding Client
// ============================================================================

/// Hosted embedding API behind a bearer credential.
///
/// Construction fails immediately when no key is available - there is no
/// fail-on-first-use path.
#[derive(Debug)]
pub struct HostedEmbedding {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    dimension: usize,
    timeout: Duration,
}

impl HostedEmbedding {
    /// Create a new hosted embedding client
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        let model = model.into();
        let dimension = match model.as_str() {
            "text-embedding-3-small" => 1536,
            "text-embedding-3-large" => 3072,
            "text-embedding-ada-002" => 1536,
            _ => 1536, // Default
        };

        Self {
            client: Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            model,
            dimension,
            timeout: Duration::from_secs(15),
        }
    }

    /// Create from config; the key may come from config or the
    /// `EMBEDDING_API_KEY` environment variable.
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self, ConfigError> {
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var("EMBEDDING_API_KEY").ok())
            .ok_or_else(|| {
                ConfigError::MissingRequired(
                    "EMBEDDING_API_KEY (hosted embedding backend credential)".to_string(),
                )
            })?;

        let mut client = Self::new(config.url.clone(), api_key, config.model.clone());
        client.timeout = Duration::from_secs(config.timeout_secs);
        Ok(client)
    }
}

#[async_trait]
impl EmbeddingClient for HostedEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let results = self.embed_batch(&[text.to_string()]).await?;
        results.into_iter().next().ok_or(EmbeddingError::Empty)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbeddingRequest {
            model: self.model.clone(),
            texts: texts.to_vec(),
        };

        request_embeddings(
            &self.client,
            &format!("{}/embeddings", self.base_url),
            Some(&self.api_key),
            self.timeout,
            &request,
            self.dimension,
        )
        .await
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

// ============================================================================
// Factory function
// ============================================================================

/// Create an embedding client from config
pub fn create_embedding_client(
    config: &EmbeddingConfig,
) -> Result<Arc<dyn EmbeddingClient>, ConfigError> {
    match config.provider {
        EmbeddingProvider::Local => Ok(Arc::new(LocalEmbedding::from_config(config))),
        EmbeddingProvider::Hosted => Ok(Arc::new(HostedEmbedding::from_config(config)?)),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_dimension() {
        let client = LocalEmbedding::new("http://localhost:8081", "bge-base-en-v1.5");
        assert_eq!(client.dimension(), 768);

        let client = LocalEmbedding::new("http://localhost:8081", "all-minilm-l6-v2");
        assert_eq!(client.dimension(), 384);
    }

    #[test]
    fn test_hosted_dimension() {
        let client =
            HostedEmbedding::new("https://api.example.com", "test-key", "text-embedding-3-small");
        assert_eq!(client.dimension(), 1536);

        let client =
            HostedEmbedding::new("https://api.example.com", "test-key", "text-embedding-3-large");
        assert_eq!(client.dimension(), 3072);
    }

    #[test]
    fn test_hosted_requires_credential_before_any_network_call() {
        std::env::remove_var("EMBEDDING_API_KEY");
        let config = EmbeddingConfig {
            provider: EmbeddingProvider::Hosted,
            api_key: None,
            ..Default::default()
        };

        let err = HostedEmbedding::from_config(&config).unwrap_err();
        assert!(err.to_string().contains("EMBEDDING_API_KEY"));
    }

    #[test]
    fn test_hosted_accepts_explicit_key() {
        let config = EmbeddingConfig {
            provider: EmbeddingProvider::Hosted,
            api_key: Some("sk-explicit".to_string()),
            model: "text-embedding-3-small".to_string(),
            ..Default::default()
        };

        let client = HostedEmbedding::from_config(&config).unwrap();
        assert_eq!(client.dimension(), 1536);
    }

    #[test]
    fn test_status_classification() {
        assert!(matches!(
            classify_status(StatusCode::UNAUTHORIZED, "bad key"),
            EmbeddingError::Authentication
        ));
        assert!(matches!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, "slow down"),
            EmbeddingError::RateLimited
        ));
        assert!(matches!(
            classify_status(StatusCode::INTERNAL_SERVER_ERROR, "oops"),
            EmbeddingError::Server
        ));
        assert!(matches!(
            classify_status(StatusCode::BAD_GATEWAY, "upstream"),
            EmbeddingError::Server
        ));

        match classify_status(StatusCode::BAD_REQUEST, "model not found") {
            EmbeddingError::InvalidRequest(detail) => {
                assert!(detail.contains("model not found"));
            }
            other => panic!("expected InvalidRequest, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_valid_body() {
        let body = r#"{"embeddings": [[0.1, 0.2, 0.3], [0.4, 0.5, 0.6]]}"#;
        let vectors = decode_embeddings(body, 3).unwrap();
        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[0].len(), 3);
    }

    #[test]
    fn test_decode_zero_embeddings_fails_distinctly() {
        let err = decode_embeddings(r#"{"embeddings": []}"#, 3).unwrap_err();
        assert!(matches!(err, EmbeddingError::Empty));
    }

    #[test]
    fn test_decode_wrong_dimension_fails_distinctly() {
        let body = r#"{"embeddings": [[0.1, 0.2]]}"#;
        match decode_embeddings(body, 3).unwrap_err() {
            EmbeddingError::Dimension { expected, actual } => {
                assert_eq!(expected, 3);
                assert_eq!(actual, 2);
            }
            other => panic!("expected Dimension, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_garbage_body_is_transport_error() {
        let err = decode_embeddings("not json", 3).unwrap_err();
        assert!(matches!(err, EmbeddingError::Transport(_)));
    }

    #[test]
    fn test_status_classification_fixed_phrases() {
        let auth = classify_status(StatusCode::UNAUTHORIZED, "").to_string();
        assert!(auth.contains("authentication failed"));

        let limited = classify_status(StatusCode::TOO_MANY_REQUESTS, "").to_string();
        assert!(limited.contains("rate limit exceeded"));

        let invalid = classify_status(StatusCode::BAD_REQUEST, "bad payload").to_string();
        assert!(invalid.contains("invalid request"));

        let server = classify_status(StatusCode::INTERNAL_SERVER_ERROR, "").to_string();
        assert!(server.contains("server error"));
    }
}
