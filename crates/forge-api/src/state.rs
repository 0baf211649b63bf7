//! Application state management
//!
//! Author: hephaex@gmail.com

use crate::middleware::FixedWindowLimiter;
use forge_agent::IdeaAgent;
use forge_core::AppConfig;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

/// Application state shared across handlers
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,
    /// Server start time
    pub start_time: Instant,
    /// Request counter
    pub request_count: AtomicU64,
    /// Ready status
    pub is_ready: AtomicBool,
    /// Fixed-window rate limiter for the idea route
    pub limiter: FixedWindowLimiter,
    /// Idea agent (initialized once backends are connected)
    pub agent: RwLock<Option<Arc<IdeaAgent>>>,
}

impl AppState {
    /// Create new application state with config
    pub fn new(config: AppConfig) -> Self {
        let limiter = FixedWindowLimiter::new(config.rate_limit.clone());
        Self {
            config,
            start_time: Instant::now(),
            request_count: AtomicU64::new(0),
            is_ready: AtomicBool::new(false),
            limiter,
            agent: RwLock::new(None),
        }
    }

    /// Create state with an agent already installed
    pub fn with_agent(config: AppConfig, agent: Arc<IdeaAgent>) -> Self {
        let state = Self::new(config);
        state.is_ready.store(true, Ordering::SeqCst);
        // The lock is freshly constructed and uncontended.
        if let Ok(mut guard) = state.agent.try_write() {
            *guard = Some(agent);
        }
        state
    }

    /// Increment request counter
    pub fn increment_requests(&self) -> u64 {
        self.request_count.fetch_add(1, Ordering::SeqCst)
    }

    /// Get total request count
    pub fn get_request_count(&self) -> u64 {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Check if service is ready
    pub fn is_ready(&self) -> bool {
        self.is_ready.load(Ordering::SeqCst)
    }

    /// Install the agent once the backend stack is connected
    pub async fn initialize_agent(&self, agent: Arc<IdeaAgent>) {
        *self.agent.write().await = Some(agent);
        self.is_ready.store(true, Ordering::SeqCst);
    }

    /// Get the agent if initialized
    pub async fn get_agent(&self) -> Option<Arc<IdeaAgent>> {
        self.agent.read().await.clone()
    }

    /// Check if the agent is initialized
    pub async fn has_agent(&self) -> bool {
        self.agent.read().await.is_some()
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(AppConfig::default())
    }
}
