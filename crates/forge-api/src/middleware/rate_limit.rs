//! Fixed-window rate limiting for the idea endpoint
//!
//! Counts requests per caller IP inside a fixed window. The per-key
//! read-check-increment runs inside a single DashMap entry guard with no
//! suspension point, so two interleaved requests can never both be admitted
//! into the last slot. Standard `X-RateLimit-*` headers accompany every
//! response once the limiter has been consulted.
//!
//! Author: hephaex@gmail.com

use crate::error::{ErrorBody, ErrorKind};
use crate::state::AppState;
use axum::{
    body::Body,
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use dashmap::DashMap;
use forge_core::RateLimitConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Per-key window state
#[derive(Debug)]
struct Window {
    count: u32,
    window_start_ms: u64,
}

/// The outcome of one rate-limit check
#[derive(Debug, Clone, Copy)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Unix timestamp (milliseconds) when the window resets
    pub reset_at_ms: u64,
}

/// Fixed-window request limiter keyed by caller identity
pub struct FixedWindowLimiter {
    config: RateLimitConfig,
    windows: DashMap<String, Window>,
}

impl FixedWindowLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: DashMap::new(),
        }
    }

    /// Check and count one request for the key
    pub fn check(&self, key: &str) -> RateLimitDecision {
        self.check_at(key, unix_now_ms())
    }

    /// Check against an explicit clock; the entry guard makes the
    /// read-check-increment one atomic step per key.
    pub fn check_at(&self, key: &str, now_ms: u64) -> RateLimitDecision {
        let mut entry = self
            .windows
            .entry(key.to_string())
            .or_insert_with(|| Window {
                count: 0,
                window_start_ms: now_ms,
            });

        let window = entry.value_mut();
        if now_ms >= window.window_start_ms + self.config.window_ms {
            window.count = 0;
            window.window_start_ms = now_ms;
        }

        let reset_at_ms = window.window_start_ms + self.config.window_ms;

        if window.count < self.config.max_requests {
            window.count += 1;
            RateLimitDecision {
                allowed: true,
                limit: self.config.max_requests,
                remaining: self.config.max_requests - window.count,
                reset_at_ms,
            }
        } else {
            RateLimitDecision {
                allowed: false,
                limit: self.config.max_requests,
                remaining: 0,
                reset_at_ms,
            }
        }
    }

    /// Standard rate-limit headers for a decision
    pub fn headers(&self, decision: &RateLimitDecision) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            "X-RateLimit-Limit",
            HeaderValue::from_str(&decision.limit.to_string())
                .unwrap_or_else(|_| HeaderValue::from_static("0")),
        );
        headers.insert(
            "X-RateLimit-Remaining",
            HeaderValue::from_str(&decision.remaining.to_string())
                .unwrap_or_else(|_| HeaderValue::from_static("0")),
        );
        headers.insert(
            "X-RateLimit-Reset",
            HeaderValue::from_str(&(decision.reset_at_ms / 1000).to_string())
                .unwrap_or_else(|_| HeaderValue::from_static("0")),
        );
        headers
    }

    /// Structured 429 body for a rejected decision
    pub fn rejection(&self, decision: &RateLimitDecision) -> ErrorBody {
        let mut body = ErrorBody::new(
            ErrorKind::RateLimit,
            format!(
                "Rate limit exceeded: {} requests per {} seconds.",
                decision.limit,
                self.config.window_ms / 1000
            ),
        );
        body.suggestions = Some(vec![format!(
            "Retry after unix timestamp {}.",
            decision.reset_at_ms / 1000
        )]);
        body
    }
}

fn unix_now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Caller identity for rate limiting: forwarded header first, then the
/// connection address.
fn client_key(request: &Request<Body>) -> String {
    if let Some(forwarded) = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
    {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Axum middleware gating the idea route
pub async fn rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let key = client_key(&request);
    let decision = state.limiter.check(&key);
    let headers = state.limiter.headers(&decision);

    if !decision.allowed {
        tracing::warn!(client = %key, reset_at_ms = decision.reset_at_ms, "rate limit exceeded");
        let mut response = (
            StatusCode::TOO_MANY_REQUESTS,
            Json(state.limiter.rejection(&decision)),
        )
            .into_response();
        response.headers_mut().extend(headers);
        return response;
    }

    let mut response = next.run(request).await;
    response.headers_mut().extend(headers);
    response
}

// ============================================================================
// Tests
// ============================================================================
