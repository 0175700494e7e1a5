// crates/resilience/src/lib.rs
//! Resilient call layer for upstream dependencies
//!
//! This crate provides:
//! - Error classification into a fixed set of kinds
//! - Retry with exponential backoff and jitter
//! - Circuit breaker per operation family
//! - Quota gating from upstream rate-limit headers
//! - Per-attempt timeouts
//! - [`ResilientClient`], which composes all of the above
//!
//! # Example
//!
//! ```rust
//! use repolens_resilience::{CircuitBreakerConfig, ResilientClient, RetryOptions};
//! use std::time::Duration;
//!
//! let retry = RetryOptions::new(3).with_base_delay(Duration::from_millis(100));
//! let breaker = CircuitBreakerConfig::new(5, Duration::from_secs(60));
//! let client = ResilientClient::new(retry, breaker);
//! assert!(client.circuit_states().is_empty());
//! ```

mod backoff;
mod circuit_breaker;
mod classifier;
mod client;
mod error;
mod rate_limit_gate;
mod retry;
mod timeout;

pub use backoff::{capped_delay, next_delay};
pub use circuit_breaker::{
    CallPermit, CircuitBreaker, CircuitBreakerConfig, CircuitSnapshot, CircuitState,
};
pub use classifier::{
    classify, HttpFailure, NetworkFailure, NetworkFailureKind, RawError, DEFAULT_RATE_LIMIT_WAIT,
};
pub use client::ResilientClient;
pub use error::{ClassifiedError, ErrorContext, ErrorKind, ResilienceResult, RetryableError};
pub use rate_limit_gate::{
    QuotaFuture, QuotaSource, RateLimitGate, RateLimitGateConfig, RateLimitSnapshot,
};
pub use retry::{with_retry, RetryExecutor, RetryOptions};
pub use timeout::with_timeout;
