//! Error types for domain values
//!
//! These errors come from parsing and validating domain types. They never
//! describe I/O; storage and upstream failures have their own error types in
//! the database and resilience crates.

use thiserror::Error;

/// Errors raised while building or parsing domain values
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Identifier is not a valid UUID
    #[error("Invalid identifier '{value}': {reason}")]
    InvalidId { value: String, reason: String },

    /// Repository name is not of the form `owner/name`
    #[error("Invalid repository name '{0}', expected 'owner/name'")]
    InvalidRepositoryName(String),

    /// Pattern category string is not recognised
    #[error("Unknown pattern category: {0}")]
    UnknownCategory(String),

    /// Pattern failed validation
    #[error("Invalid pattern: {}", .0.join("; "))]
    InvalidPattern(Vec<String>),
}

/// Result type alias for domain operations
pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::InvalidRepositoryName("nope".to_string());
        assert_eq!(
            err.to_string(),
            "Invalid repository name 'nope', expected 'owner/name'"
        );
    }

    #[test]
    fn test_invalid_pattern_joins_reasons() {
        let err = CoreError::InvalidPattern(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(err.to_string(), "Invalid pattern: a; b");
    }

    #[test]
    fn test_result_type_alias() {
        fn parse() -> Result<u8> {
            Err(CoreError::UnknownCategory("x".to_string()))
        }
        assert!(parse().is_err());
    }
}
