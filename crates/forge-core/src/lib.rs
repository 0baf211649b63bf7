//! Forge Core - Domain models, traits, and shared types
//!
//! This crate defines the core abstractions used throughout IdeaForge:
//! - Project records and search hits read from the vector store
//! - The idea synthesis result type
//! - Typed error vocabulary per pipeline component
//! - The LLM client trait
//! - Configuration management
//! - Defensive JSON parsing for untrusted payloads
//!
//! Author: hephaex@gmail.com

pub mod config;
pub mod safe_json;

pub use config::{
    AgentConfig, AppConfig, ConfigError, EmbeddingConfig, EmbeddingProvider, LlmConfig,
    LlmProvider, LoggingConfig, RateLimitConfig, ServerConfig, VectorConfig,
};
pub use safe_json::{safe_parse, safe_parse_with, ParseError, ParseErrorKind, ParseOptions};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Failures from embedding backends, classified into a fixed vocabulary
/// so callers can react per class instead of parsing transport errors.
#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("embedding authentication failed: the API key was rejected")]
    Authentication,

    #[error("embedding rate limit exceeded: back off before retrying")]
    RateLimited,

    #[error("embedding invalid request: {0}")]
    InvalidRequest(String),

    #[error("embedding server error: backend-side fault, retry may succeed")]
    Server,

    #[error("embedding backend returned no vectors")]
    Empty,

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    Dimension { expected: usize, actual: usize },

    #[error("embedding request failed: {0}")]
    Transport(String),
}

impl EmbeddingError {
    /// Stable machine-readable code for the error class.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Authentication => "AUTHENTICATION",
            Self::RateLimited => "RATE_LIMITED",
            Self::InvalidRequest(_) => "INVALID_REQUEST",
            Self::Server => "SERVER_ERROR",
            Self::Empty => "EMPTY_RESPONSE",
            Self::Dimension { .. } => "DIMENSION_MISMATCH",
            Self::Transport(_) => "TRANSPORT",
        }
    }
}

/// Failures from the vector search backend. The original cause is carried
/// as text for diagnostics; transport internals stay out of API responses.
#[derive(Error, Debug)]
pub enum VectorDbError {
    #[error("vector database connection failed: {0}")]
    Connection(String),

    #[error("vector search failed: {0}")]
    Search(String),

    #[error("vector collection operation failed: {0}")]
    Admin(String),

    #[error("vector payload malformed: {0}")]
    Payload(String),
}

/// Failures from the generative backend.
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("generation request failed: {0}")]
    Request(String),

    #[error("generation backend error: {0}")]
    Backend(String),

    #[error("generation backend returned no choices")]
    Empty,

    #[error("generation response malformed: {0}")]
    InvalidResponse(String),
}

/// Top-level error for the synthesis pipeline.
///
/// Each component raises its own typed error; nothing is downgraded to a
/// generic variant on the way up. The HTTP boundary is the single place
/// that maps these onto statuses and user-safe messages.
#[derive(Error, Debug)]
pub enum ForgeError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("operation not permitted: {0}")]
    Authorization(String),

    #[error("{stage} timed out after {timeout_ms} ms")]
    Timeout { stage: &'static str, timeout_ms: u64 },

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error(transparent)]
    VectorDb(#[from] VectorDbError),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, ForgeError>;

// ============================================================================
// Project Records and Search Hits
// ============================================================================

/// A showcase project as stored in the vector collection payload.
///
/// Owned and persisted elsewhere; the pipeline only reads these back from
/// search results and cites them as grounding context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectRecord {
    /// Project title
    pub title: String,

    /// Short project description
    pub description: String,

    /// Showcase page link
    pub link: String,

    /// "How it's made" write-up, when the showcase had one
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub how_its_made: Option<String>,

    /// Source code link
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub source_code: Option<String>,

    /// Last time the record was refreshed from the showcase
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub last_updated: Option<DateTime<Utc>>,
}

impl ProjectRecord {
    /// Create a record with the required fields
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        link: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            link: link.into(),
            how_its_made: None,
            source_code: None,
            last_updated: None,
        }
    }

    /// Set the "how it's made" text
    pub fn with_how_its_made(mut self, text: impl Into<String>) -> Self {
        self.how_its_made = Some(text.into());
        self
    }

    /// Set the source code link
    pub fn with_source_code(mut self, link: impl Into<String>) -> Self {
        self.source_code = Some(link.into());
        self
    }
}

/// One scored result from a vector search.
///
/// Sequences of hits are always ordered descending by score. The store is
/// configured with cosine similarity, so scores are bounded and higher
/// means more similar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    /// Point identifier in the collection
    pub id: String,

    /// Similarity score (cosine; higher is more similar)
    pub score: f32,

    /// Stored project payload
    pub payload: ProjectRecord,
}

/// Result of one idea synthesis request. Created once, never mutated,
/// not persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdeaSynthesis {
    /// The synthesized idea text (trimmed backend output)
    pub content: String,

    /// The retrieved neighbors cited as grounding context, best first
    pub similar_projects: Vec<ProjectRecord>,
}

// ============================================================================
// Generative Backend
// ============================================================================

/// Role tag for a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// One message in a role-tagged prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

/// Trait for generative backends. The model is fixed at construction;
/// callers pass only the role-tagged message list.
#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    /// Generate a completion for the given messages
    async fn generate(&self, messages: &[ChatMessage]) -> std::result::Result<String, LlmError>;
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_error_codes() {
        assert_eq!(EmbeddingError::Authentication.code(), "AUTHENTICATION");
        assert_eq!(EmbeddingError::RateLimited.code(), "RATE_LIMITED");
        assert_eq!(
            EmbeddingError::InvalidRequest("bad input".into()).code(),
            "INVALID_REQUEST"
        );
        assert_eq!(EmbeddingError::Server.code(), "SERVER_ERROR");
        assert_eq!(EmbeddingError::Empty.code(), "EMPTY_RESPONSE");
    }

    #[test]
    fn test_embedding_error_messages() {
        assert!(EmbeddingError::Authentication
            .to_string()
            .contains("authentication failed"));
        assert!(EmbeddingError::RateLimited
            .to_string()
            .contains("rate limit exceeded"));
        assert!(EmbeddingError::InvalidRequest("model unknown".into())
            .to_string()
            .contains("model unknown"));
        assert!(EmbeddingError::Server.to_string().contains("server error"));
    }

    #[test]
    fn test_errors_stay_typed_through_forge_error() {
        let err: ForgeError = EmbeddingError::Server.into();
        assert!(matches!(err, ForgeError::Embedding(EmbeddingError::Server)));

        let err: ForgeError = VectorDbError::Search("grpc refused".into()).into();
        assert!(matches!(err, ForgeError::VectorDb(_)));

        let err: ForgeError = LlmError::Empty.into();
        assert!(matches!(err, ForgeError::Llm(LlmError::Empty)));
    }

    #[test]
    fn test_timeout_display_names_stage() {
        let err = ForgeError::Timeout {
            stage: "vector search",
            timeout_ms: 5000,
        };
        assert_eq!(err.to_string(), "vector search timed out after 5000 ms");
    }

    #[test]
    fn test_project_record_builder() {
        let record = ProjectRecord::new("Intent Router", "Routes user intents onchain", "https://showcase.example/intent-router")
            .with_how_its_made("Built on ERC-4337 bundlers")
            .with_source_code("https://github.com/example/intent-router");

        assert_eq!(record.title, "Intent Router");
        assert_eq!(
            record.source_code.as_deref(),
            Some("https://github.com/example/intent-router")
        );
        assert!(record.last_updated.is_none());
    }

    #[test]
    fn test_project_record_roundtrip() {
        let record = ProjectRecord::new("A", "B", "https://c.example");
        let json = serde_json::to_string(&record).unwrap();
        let back: ProjectRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(record, back);
    }

    #[test]
    fn test_chat_message_constructors() {
        let msg = ChatMessage::system("You generate hackathon ideas.");
        assert_eq!(msg.role, ChatRole::System);

        let msg = ChatMessage::user("prize text");
        assert_eq!(msg.role, ChatRole::User);
        assert_eq!(msg.content, "prize text");
    }
}
