//! IdeaForge Configuration Management
//!
//! Handles configuration from environment variables and config files
//! with sensible defaults for development.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Server configuration
    pub server: ServerConfig,

    /// Embedding backend configuration
    pub embedding: EmbeddingConfig,

    /// Vector store configuration
    pub vector: VectorConfig,

    /// Generative backend configuration
    pub llm: LlmConfig,

    /// Idea agent configuration
    pub agent: AgentConfig,

    /// Rate limiter configuration
    pub rate_limit: RateLimitConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        // Server
        if let Ok(host) = std::env::var("API_HOST") {
            config.server.host = host;
        }
        if let Ok(port) = std::env::var("API_PORT") {
            config.server.port = port.parse().map_err(|_| ConfigError::InvalidValue {
                key: "API_PORT".to_string(),
                value: port,
            })?;
        }
        if let Ok(env) = std::env::var("APP_ENV") {
            config.server.expose_error_details = env == "development";
        }
        if let Ok(enabled) = std::env::var("IDEAS_ENABLED") {
            config.server.ideas_enabled = enabled != "false" && enabled != "0";
        }

        // CORS origins from environment variable (comma-separated)
        if let Ok(origins) = std::env::var("CORS_ORIGINS") {
            config.server.cors_origins = origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        // Embedding backend
        if let Ok(provider) = std::env::var("EMBEDDING_PROVIDER") {
            config.embedding.provider = provider.parse()?;
        }
        if let Ok(url) = std::env::var("EMBEDDING_URL") {
            config.embedding.url = url;
        }
        if let Ok(key) = std::env::var("EMBEDDING_API_KEY") {
            config.embedding.api_key = Some(key);
        }
        if let Ok(model) = std::env::var("EMBEDDING_MODEL") {
            config.embedding.model = model;
        }

        // Qdrant
        if let Ok(url) = std::env::var("QDRANT_URL") {
            config.vector.qdrant_url = url;
        }
        if let Ok(collection) = std::env::var("QDRANT_COLLECTION") {
            config.vector.collection = collection;
        }
        if let Ok(dim) = std::env::var("VECTOR_DIMENSION") {
            config.vector.dimension = dim.parse().map_err(|_| ConfigError::InvalidValue {
                key: "VECTOR_DIMENSION".to_string(),
                value: dim,
            })?;
        }

        // LLM
        if let Ok(provider) = std::env::var("LLM_PROVIDER") {
            config.llm.provider = provider.parse()?;
        }
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            config.llm.openai_api_key = Some(key);
        }
        if let Ok(url) = std::env::var("OLLAMA_URL") {
            config.llm.ollama_url = url;
        }
        if let Ok(model) = std::env::var("LLM_MODEL") {
            config.llm.model = model;
        }

        // Agent
        if let Ok(top_k) = std::env::var("AGENT_TOP_K") {
            config.agent.top_k = top_k.parse().map_err(|_| ConfigError::InvalidValue {
                key: "AGENT_TOP_K".to_string(),
                value: top_k,
            })?;
        }

        // Rate limiter
        if let Ok(window) = std::env::var("RATE_LIMIT_WINDOW_MS") {
            config.rate_limit.window_ms = window.parse().map_err(|_| ConfigError::InvalidValue {
                key: "RATE_LIMIT_WINDOW_MS".to_string(),
                value: window,
            })?;
        }
        if let Ok(max) = std::env::var("RATE_LIMIT_MAX_REQUESTS") {
            config.rate_limit.max_requests = max.parse().map_err(|_| ConfigError::InvalidValue {
                key: "RATE_LIMIT_MAX_REQUESTS".to_string(),
                value: max,
            })?;
        }

        // Logging
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            config.logging.level = level;
        }

        Ok(config)
    }

    /// Load from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path,
            message: e.to_string(),
        })
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Maximum request body size in bytes
    pub max_body_size: usize,

    /// Enable CORS
    pub cors_enabled: bool,

    /// Allowed origins for CORS
    pub cors_origins: Vec<String>,

    /// Whether the idea endpoint is enabled in this environment
    pub ideas_enabled: bool,

    /// Include internal error text in failure responses (development only)
    pub expose_error_details: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            max_body_size: 64 * 1024, // requests are a single prize string
            cors_enabled: true,
            // Empty by default for security - set via CORS_ORIGINS env var
            cors_origins: vec![],
            ideas_enabled: true,
            expose_error_details: false,
        }
    }
}

/// Embedding backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Which backend to use
    pub provider: EmbeddingProvider,

    /// Endpoint base URL
    pub url: String,

    /// API key for the hosted backend
    pub api_key: Option<String>,

    /// Embedding model name
    pub model: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::Local,
            url: "http://localhost:8081".to_string(),
            api_key: None,
            model: "bge-base-en-v1.5".to_string(),
            timeout_secs: 15,
        }
    }
}

/// Supported embedding backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Self-hosted inference server, no credential
    Local,
    /// Hosted API, bearer credential required
    Hosted,
}

impl std::str::FromStr for EmbeddingProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "hosted" => Ok(Self::Hosted),
            _ => Err(ConfigError::InvalidValue {
                key: "EMBEDDING_PROVIDER".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Vector store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorConfig {
    /// Qdrant gRPC URL
    pub qdrant_url: String,

    /// Collection holding showcase project records
    pub collection: String,

    /// Vector dimension (must match the embedding model)
    pub dimension: usize,

    /// Search timeout in seconds
    pub timeout_secs: u64,
}

impl Default for VectorConfig {
    fn default() -> Self {
        Self {
            qdrant_url: "http://localhost:6334".to_string(),
            collection: "showcase_projects".to_string(),
            dimension: 768, // bge-base-en-v1.5
            timeout_secs: 10,
        }
    }
}

/// Generative backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Generative provider to use
    pub provider: LlmProvider,

    /// OpenAI API key
    pub openai_api_key: Option<String>,

    /// OpenAI API base URL (for compatible APIs)
    pub openai_base_url: Option<String>,

    /// Ollama server URL
    pub ollama_url: String,

    /// Model name to use
    pub model: String,

    /// Maximum tokens for completion
    pub max_tokens: u32,

    /// Temperature for generation
    pub temperature: f32,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::OpenAI,
            openai_api_key: None,
            openai_base_url: None,
            ollama_url: "http://localhost:11434".to_string(),
            model: "gpt-4o-mini".to_string(),
            max_tokens: 512,
            temperature: 0.7,
            timeout_secs: 60,
        }
    }
}

/// Supported generative providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    OpenAI,
    Ollama,
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "ollama" => Ok(Self::Ollama),
            _ => Err(ConfigError::InvalidValue {
                key: "LLM_PROVIDER".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Idea agent configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Number of neighbors retrieved as grounding context
    pub top_k: usize,

    /// Minimum similarity score for a neighbor to be cited
    pub score_threshold: Option<f32>,

    /// Maximum grounding context length fed to the prompt (characters)
    pub max_context_length: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            score_threshold: None,
            max_context_length: 6000,
        }
    }
}

/// Rate limiter configuration (fixed window per caller IP)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Window duration in milliseconds
    pub window_ms: u64,

    /// Maximum requests per key per window
    pub max_requests: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_ms: 60_000,
            max_requests: 30,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// JSON format for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}
