//! Request-path middleware
//!
//! Author: hephaex@gmail.com

pub mod rate_limit;

pub use rate_limit::{rate_limit_middleware, FixedWindowLimiter, RateLimitDecision};
