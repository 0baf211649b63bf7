//! Forge Vector - Embedding providers and vector search abstraction
//!
//! Provides the embedding client trait with local and hosted adapters,
//! and the vector search capability backed by Qdrant.
//!
//! Author: hephaex@gmail.com

use async_trait::async_trait;
use forge_core::{AppConfig, ForgeError, ProjectRecord, SearchHit, VectorDbError};
use std::sync::Arc;

pub mod embedding;
pub mod qdrant_store;

pub use embedding::{create_embedding_client, EmbeddingClient, HostedEmbedding, LocalEmbedding};
pub use qdrant_store::QdrantSearch;

// ============================================================================
// Search Capability
// ============================================================================

/// Parameters for one nearest-neighbor query.
#[derive(Debug, Clone)]
pub struct SearchParams {
    /// Query vector; length must match the collection dimension
    pub vector: Vec<f32>,

    /// Maximum number of hits to return
    pub limit: usize,

    /// Optional payload filter
    pub filter: Option<PayloadFilter>,

    /// Optional minimum similarity score
    pub score_threshold: Option<f32>,
}

impl SearchParams {
    pub fn new(vector: Vec<f32>, limit: usize) -> Self {
        Self {
            vector,
            limit,
            filter: None,
            score_threshold: None,
        }
    }

    pub fn with_score_threshold(mut self, threshold: f32) -> Self {
        self.score_threshold = Some(threshold);
        self
    }

    pub fn with_filter(mut self, filter: PayloadFilter) -> Self {
        self.filter = Some(filter);
        self
    }
}

/// Exact-match conditions on payload fields, ANDed together.
#[derive(Debug, Clone, Default)]
pub struct PayloadFilter {
    pub must_match: Vec<(String, String)>,
}

impl PayloadFilter {
    pub fn matching(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            must_match: vec![(field.into(), value.into())],
        }
    }
}

/// A record to upsert into a collection.
#[derive(Debug, Clone)]
pub struct RecordPoint {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: ProjectRecord,
}

/// Trait for vector search backends.
///
/// Administrative operations are an optional capability: callers must check
/// `admin()` for presence rather than assume it.
#[async_trait]
pub trait VectorSearch: Send + Sync {
    /// Nearest-neighbor search over a collection, best hits first
    async fn search(
        &self,
        collection: &str,
        params: SearchParams,
    ) -> Result<Vec<SearchHit>, VectorDbError>;

    /// Administrative capability, when the backend supports it
    fn admin(&self) -> Option<&dyn VectorAdmin> {
        None
    }
}

/// Optional administrative operations on a vector backend.
#[async_trait]
pub trait VectorAdmin: Send + Sync {
    /// Create a collection if it does not exist
    async fn create_collection(
        &self,
        collection: &str,
        dimension: usize,
    ) -> Result<(), VectorDbError>;

    /// Insert or replace records
    async fn upsert(
        &self,
        collection: &str,
        points: Vec<RecordPoint>,
    ) -> Result<(), VectorDbError>;

    /// Delete records by id
    async fn delete(&self, collection: &str, ids: &[String]) -> Result<(), VectorDbError>;
}

// ============================================================================
// Construction Factory
// ============================================================================

/// A ready-made embedding provider + vector search client pair.
///
/// Callers depend only on the capability traits, never on how the pair
/// was built.
pub struct SearchStack {
    pub embedder: Arc<dyn EmbeddingClient>,
    pub search: Arc<QdrantSearch>,
}

/// Build the embedding provider and vector search client from process
/// configuration.
pub async fn build_search_stack(config: &AppConfig) -> Result<SearchStack, ForgeError> {
    let embedder = create_embedding_client(&config.embedding)
        .map_err(|e| ForgeError::Config(e.to_string()))?;

    let search = QdrantSearch::connect(&config.vector).await?;

    tracing::info!(
        provider = ?config.embedding.provider,
        model = %config.embedding.model,
        collection = %config.vector.collection,
        "search stack ready"
    );

    Ok(SearchStack {
        embedder,
        search: Arc::new(search),
    })
}
