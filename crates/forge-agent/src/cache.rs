//! Caching layer for the synthesis pipeline
//!
//! Caches prize-text embeddings to avoid recomputing them for repeated
//! prompts. Uses the moka crate for thread-safe, async-compatible LRU
//! caching with TTL support. A cache hit is indistinguishable from a
//! backend call returning the same vector.
//!
//! Author: hephaex@gmail.com

use moka::future::Cache;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Cache Configuration
// ============================================================================

/// Configuration for cache behavior
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of cached embeddings
    pub max_capacity: u64,

    /// Time-to-live for cache entries (in seconds)
    pub ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            // 10k embeddings @ ~3KB each = ~30MB
            max_capacity: 10_000,
            // Embeddings are stable; an hour is plenty
            ttl_seconds: 3600,
        }
    }
}

// ============================================================================
// Embedding Cache
// ============================================================================

/// Cache for prize-text embeddings
#[derive(Clone)]
pub struct EmbeddingCache {
    cache: Cache<u64, Vec<f32>>,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
}

impl EmbeddingCache {
    /// Create a cache with default configuration
    pub fn new() -> Self {
        Self::with_config(&CacheConfig::default())
    }

    /// Create a cache with custom configuration
    pub fn with_config(config: &CacheConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.max_capacity)
            .time_to_live(Duration::from_secs(config.ttl_seconds))
            .build();

        Self {
            cache,
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Get a cached embedding for the text, if present
    pub async fn get(&self, text: &str) -> Option<Vec<f32>> {
        let result = self.cache.get(&hash_text(text)).await;

        if result.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }

        result
    }

    /// Store an embedding for the text
    pub async fn put(&self, text: &str, embedding: Vec<f32>) {
        self.cache.insert(hash_text(text), embedding).await;
    }

    /// Hit/miss counters
    pub fn stats(&self) -> CacheStatsReport {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;

        CacheStatsReport {
            hits,
            misses,
            hit_rate: if total > 0 {
                hits as f64 / total as f64
            } else {
                0.0
            },
        }
    }
}

impl Default for EmbeddingCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of cache counters
#[derive(Debug, Clone, Copy)]
pub struct CacheStatsReport {
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
}

/// Stable key for a text
fn hash_text(text: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    hasher.finish()
}

// ============================================================================
// Tests
// ============================================================================
