// crates/resilience/src/classifier.rs
//! Classification of raw upstream failures
//!
//! Heterogeneous failure shapes (HTTP status responses, socket errors,
//! elapsed timers) are first captured as a tagged [`RawError`] and then mapped
//! by [`classify`] into one [`ClassifiedError`]. The mapping is pure: the same
//! input always produces the same output.

use crate::error::{ClassifiedError, ErrorContext, ErrorKind};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Wait applied to a rate-limited failure that carries no reset information
pub const DEFAULT_RATE_LIMIT_WAIT: Duration = Duration::from_secs(60 * 60);

/// An HTTP response that was not a success
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpFailure {
    /// Response status
    pub status: u16,
    /// Response body message, or the canonical reason
    pub message: String,
    /// Response headers, names lowercased
    pub headers: BTreeMap<String, String>,
    /// When the response was received
    pub observed_at: DateTime<Utc>,
}

impl HttpFailure {
    /// Creates a failure with no headers, observed now
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            headers: BTreeMap::new(),
            observed_at: Utc::now(),
        }
    }

    /// Adds a header (name is lowercased)
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Sets the observation time
    pub fn observed_at(mut self, at: DateTime<Utc>) -> Self {
        self.observed_at = at;
        self
    }

    /// Looks up a header by lowercase name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    fn signals_rate_limit(&self) -> bool {
        self.message.to_ascii_lowercase().contains("rate limit")
            || self.header("x-ratelimit-remaining").map(str::trim) == Some("0")
    }

    /// Delay until the upstream quota window resets
    fn rate_limit_wait(&self) -> Duration {
        if let Some(secs) = self
            .header("retry-after")
            .and_then(|v| v.trim().parse::<u64>().ok())
        {
            return Duration::from_secs(secs);
        }

        if let Some(reset) = self
            .header("x-ratelimit-reset")
            .and_then(|v| v.trim().parse::<i64>().ok())
        {
            let remaining = reset - self.observed_at.timestamp();
            return Duration::from_secs(remaining.max(0) as u64);
        }

        DEFAULT_RATE_LIMIT_WAIT
    }
}

/// Socket-level failure categories
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkFailureKind {
    ConnectionRefused,
    Dns,
    Reset,
    Timeout,
    Other,
}

/// A request that never produced a response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkFailure {
    pub kind: NetworkFailureKind,
    pub message: String,
}

impl NetworkFailure {
    pub fn new(kind: NetworkFailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// A failure as first observed, before classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawError {
    /// Upstream answered with a non-success status
    Http(HttpFailure),
    /// No response was received
    Network(NetworkFailure),
    /// A local timer expired first
    Timeout { after: Duration },
    /// Anything that does not fit the shapes above
    Other(String),
}

impl fmt::Display for RawError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawError::Http(h) => write!(f, "HTTP {}: {}", h.status, h.message),
            RawError::Network(n) => write!(f, "network error ({:?}): {}", n.kind, n.message),
            RawError::Timeout { after } => write!(f, "timed out after {}ms", after.as_millis()),
            RawError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for RawError {}

impl From<HttpFailure> for RawError {
    fn from(failure: HttpFailure) -> Self {
        RawError::Http(failure)
    }
}

impl From<NetworkFailure> for RawError {
    fn from(failure: NetworkFailure) -> Self {
        RawError::Network(failure)
    }
}

/// Maps a raw failure into the closed error taxonomy
pub fn classify(raw: &RawError, context: &ErrorContext) -> ClassifiedError {
    let context = context.clone();

    match raw {
        RawError::Http(failure) => classify_http(failure, context),
        RawError::Network(failure) => {
            let kind = match failure.kind {
                NetworkFailureKind::Timeout => ErrorKind::Timeout,
                _ => ErrorKind::Transient,
            };
            ClassifiedError::new(kind, failure.message.clone(), context)
        }
        RawError::Timeout { after } => ClassifiedError::new(
            ErrorKind::Timeout,
            format!("timed out after {}ms", after.as_millis()),
            context,
        ),
        RawError::Other(message) => {
            ClassifiedError::new(ErrorKind::Unknown, message.clone(), context)
        }
    }
}

fn classify_http(failure: &HttpFailure, context: ErrorContext) -> ClassifiedError {
    let status = failure.status;
    let message = failure.message.clone();

    let rate_limited = |context| {
        ClassifiedError::new(ErrorKind::RateLimited, message.clone(), context)
            .with_status(status)
            .with_retry_after(failure.rate_limit_wait())
    };

    match status {
        401 => ClassifiedError::new(ErrorKind::Authentication, message.clone(), context)
            .with_status(status),
        403 if failure.signals_rate_limit() => rate_limited(context),
        403 => ClassifiedError::new(ErrorKind::Authorization, message.clone(), context)
            .with_status(status),
        404 => ClassifiedError::new(ErrorKind::NotFound, message.clone(), context)
            .with_status(status),
        408 => ClassifiedError::new(ErrorKind::Timeout, message.clone(), context)
            .with_status(status),
        422 => ClassifiedError::new(ErrorKind::Validation, message.clone(), context)
            .with_status(status),
        429 => rate_limited(context),
        _ => ClassifiedError::new(ErrorKind::Unknown, message.clone(), context)
            .with_status(status)
            .with_retryable(status >= 500),
    }
}
