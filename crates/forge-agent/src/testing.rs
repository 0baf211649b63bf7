//! Mock backends for agent and API tests
//!
//! Deterministic stand-ins for the embedding, search, and generative
//! backends. Compiled for unit tests and behind the `test-utils` feature
//! for dependent crates' integration suites.

use async_trait::async_trait;
use forge_core::{ChatMessage, EmbeddingError, LlmClient, LlmError, SearchHit, VectorDbError};
use forge_vector::{EmbeddingClient, SearchParams, VectorSearch};
use std::sync::Mutex;

/// Embedding backend returning a constant vector of the configured dimension
#[derive(Debug)]
pub struct MockEmbedding {
    dimension: usize,
}

impl MockEmbedding {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

#[async_trait]
impl EmbeddingClient for MockEmbedding {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Ok(vec![0.25; self.dimension])
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts.iter().map(|_| vec![0.25; self.dimension]).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Search backend returning a fixed hit list
pub struct MockSearch {
    hits: Vec<SearchHit>,
}

impl MockSearch {
    pub fn new(hits: Vec<SearchHit>) -> Self {
        Self { hits }
    }
}

#[async_trait]
impl VectorSearch for MockSearch {
    async fn search(
        &self,
        _collection: &str,
        params: SearchParams,
    ) -> Result<Vec<SearchHit>, VectorDbError> {
        Ok(self.hits.iter().take(params.limit).cloned().collect())
    }
}

/// Generative backend echoing a canned reply and recording the prompt
pub struct MockLlm {
    reply: String,
    seen: Mutex<Vec<ChatMessage>>,
}

impl MockLlm {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Messages from the most recent `generate` call
    pub fn last_messages(&self) -> Vec<ChatMessage> {
        self.seen.lock().expect("mock lock poisoned").clone()
    }
}

#[async_trait]
impl LlmClient for MockLlm {
    async fn generate(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        *self.seen.lock().expect("mock lock poisoned") = messages.to_vec();
        Ok(self.reply.clone())
    }
}
