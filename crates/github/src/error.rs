// crates/github/src/error.rs
//! Error types for building the GitHub client
//!
//! Errors from API calls are `ClassifiedError`s from the resilience crate.
//! The types here only cover constructing a client.

use thiserror::Error;

/// Result type for client construction
pub type GithubResult<T> = Result<T, GithubError>;

/// Errors that can occur while setting up the GitHub client
#[derive(Debug, Error)]
pub enum GithubError {
    /// The underlying HTTP client could not be built
    #[error("HTTP client setup failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Base URL is not an absolute http(s) URL
    #[error("Invalid API base URL: {0}")]
    InvalidBaseUrl(String),

    /// Token contains characters not allowed in a header
    #[error("GitHub token is not a valid header value")]
    InvalidToken,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GithubError::InvalidBaseUrl("ftp://x".to_string());
        assert!(err.to_string().contains("Invalid API base URL"));
    }

    #[test]
    fn test_invalid_token_hides_value() {
        assert!(!GithubError::InvalidToken.to_string().contains("ghp_"));
    }
}
