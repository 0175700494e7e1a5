// crates/resilience/src/error.rs
//! Error types for resilience operations
//!
//! Raw failures are normalized into a [`ClassifiedError`] exactly once, at the
//! boundary where they are first observed. Everything above that boundary
//! (retry loop, circuit breaker, callers) only sees classified errors.

use serde::Serialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Result type for resilience operations
pub type ResilienceResult<T> = Result<T, ClassifiedError>;

/// Closed taxonomy of upstream failure kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Credentials missing or rejected (401)
    Authentication,
    /// Credentials valid but access forbidden (403 without rate-limit signal)
    Authorization,
    /// Resource does not exist (404)
    NotFound,
    /// Request rejected as malformed (422)
    Validation,
    /// Upstream quota exhausted
    RateLimited,
    /// Attempt did not settle in time
    Timeout,
    /// Network-level blip (connection refused, reset, DNS)
    Transient,
    /// Rejected by an open circuit breaker before the call ran
    ServiceUnavailable,
    /// Anything else
    Unknown,
}

impl ErrorKind {
    /// Returns true for kinds caused by the request rather than the dependency.
    ///
    /// The dependency answered, so these do not count against its health.
    pub fn is_caller_fault(&self) -> bool {
        matches!(
            self,
            Self::Authentication | Self::Authorization | Self::NotFound | Self::Validation
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Authentication => "authentication",
            Self::Authorization => "authorization",
            Self::NotFound => "not found",
            Self::Validation => "validation",
            Self::RateLimited => "rate limited",
            Self::Timeout => "timeout",
            Self::Transient => "transient",
            Self::ServiceUnavailable => "service unavailable",
            Self::Unknown => "unknown",
        };
        write!(f, "{}", name)
    }
}

/// Where and when a failure was observed
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ErrorContext {
    /// Operation family name, e.g. `github-api`
    pub operation: String,
    /// 1-indexed attempt that produced the error
    pub attempt: u32,
    /// Wall-clock time spent across all attempts so far
    pub elapsed: Duration,
}

impl ErrorContext {
    /// Creates a context for the first attempt of an operation
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            attempt: 1,
            elapsed: Duration::ZERO,
        }
    }

    /// Sets the attempt number
    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = attempt;
        self
    }
}

/// A raw failure normalized into the closed [`ErrorKind`] taxonomy
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{kind} error in '{}' (attempt {}): {message}", .context.operation, .context.attempt)]
pub struct ClassifiedError {
    /// Failure kind
    pub kind: ErrorKind,
    /// Upstream HTTP status, when there was one
    pub status_code: Option<u16>,
    /// Whether retrying may succeed
    pub retryable: bool,
    /// Human-readable description
    pub message: String,
    /// Explicit delay hint that overrides computed backoff
    pub retry_after: Option<Duration>,
    /// Operation name and attempt history
    pub context: ErrorContext,
}

impl ClassifiedError {
    /// Creates an error whose retryability is derived from its kind
    pub fn new(kind: ErrorKind, message: impl Into<String>, context: ErrorContext) -> Self {
        Self {
            kind,
            status_code: None,
            retryable: matches!(
                kind,
                ErrorKind::RateLimited | ErrorKind::Transient | ErrorKind::Timeout
            ),
            message: message.into(),
            retry_after: None,
            context,
        }
    }

    /// Sets the upstream status code
    pub fn with_status(mut self, status: u16) -> Self {
        self.status_code = Some(status);
        self
    }

    /// Overrides the retryable flag
    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    /// Sets the retry-after hint
    pub fn with_retry_after(mut self, delay: Duration) -> Self {
        self.retry_after = Some(delay);
        self
    }

    /// Builds the rejection returned while a circuit is open
    pub fn service_unavailable(operation: impl Into<String>, wait: Duration) -> Self {
        let operation = operation.into();
        Self {
            kind: ErrorKind::ServiceUnavailable,
            status_code: None,
            retryable: false,
            message: format!(
                "circuit for '{}' is open, next probe in {}ms",
                operation,
                wait.as_millis()
            ),
            retry_after: Some(wait),
            context: ErrorContext::new(operation).with_attempt(0),
        }
    }

    /// Time until the rejected operation may be attempted again
    pub fn wait_time(&self) -> Option<Duration> {
        match self.kind {
            ErrorKind::ServiceUnavailable | ErrorKind::RateLimited => self.retry_after,
            _ => None,
        }
    }
}

/// Errors the [`RetryExecutor`](crate::RetryExecutor) knows how to drive
pub trait RetryableError: Sized {
    /// Whether another attempt may succeed
    fn is_retryable(&self) -> bool;

    /// Explicit delay that replaces computed backoff
    fn retry_after(&self) -> Option<Duration> {
        None
    }

    /// Builds the error used when an attempt exceeds its timeout
    fn timed_out(operation: &str, after: Duration) -> Self;

    /// Records attempt history on the final error
    fn annotate(self, _attempt: u32, _elapsed: Duration) -> Self {
        self
    }
}

impl RetryableError for ClassifiedError {
    fn is_retryable(&self) -> bool {
        self.retryable
    }

    fn retry_after(&self) -> Option<Duration> {
        self.retry_after
    }

    fn timed_out(operation: &str, after: Duration) -> Self {
        ClassifiedError::new(
            ErrorKind::Timeout,
            format!("attempt did not complete within {}ms", after.as_millis()),
            ErrorContext::new(operation),
        )
    }

    fn annotate(mut self, attempt: u32, elapsed: Duration) -> Self {
        self.context.attempt = attempt;
        self.context.elapsed = elapsed;
        self
    }
}
