//! Typed datastore errors
//!
//! `sqlx` errors are classified once, when they are converted into
//! [`DbError`]. Code above the query layer only ever sees the kind.

use repolens_resilience::RetryableError;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Classification of a datastore failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DbErrorKind {
    /// Unique, foreign-key, not-null or check constraint violated
    Constraint,
    /// Database busy or locked by another connection
    Lock,
    /// Pool exhausted, closed, or I/O failure
    Connection,
    /// Malformed statement or other query failure
    Query,
    /// Expected row was not present
    NotFound,
    /// Column value or JSON payload could not be (de)serialised
    Serialization,
}

impl DbErrorKind {
    /// Contention and connectivity clear up on their own; everything else
    /// fails the same way again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Lock | Self::Connection)
    }
}

impl fmt::Display for DbErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Constraint => "constraint",
            Self::Lock => "lock",
            Self::Connection => "connection",
            Self::Query => "query",
            Self::NotFound => "not found",
            Self::Serialization => "serialization",
        };
        f.write_str(name)
    }
}

/// Datastore error with its classification
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} database error: {message}")]
pub struct DbError {
    pub kind: DbErrorKind,
    pub message: String,
    /// Attempts made before giving up, when run under a retry wrapper
    pub attempts: u32,
    /// Time spent across those attempts
    pub elapsed: Duration,
}

/// Result type for datastore operations
pub type DbResult<T> = Result<T, DbError>;

impl DbError {
    pub fn new(kind: DbErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            attempts: 1,
            elapsed: Duration::ZERO,
        }
    }

    pub fn not_found(entity: &str, identifier: impl fmt::Display) -> Self {
        Self::new(
            DbErrorKind::NotFound,
            format!("{} with id {} not found", entity, identifier),
        )
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

/// SQLite primary result codes for SQLITE_BUSY and SQLITE_LOCKED
const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;

fn classify_sqlx(err: &sqlx::Error) -> DbErrorKind {
    match err {
        sqlx::Error::RowNotFound => DbErrorKind::NotFound,
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            DbErrorKind::Connection
        }
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => DbErrorKind::Serialization,
        sqlx::Error::Database(db) => match db.kind() {
            sqlx::error::ErrorKind::UniqueViolation
            | sqlx::error::ErrorKind::ForeignKeyViolation
            | sqlx::error::ErrorKind::NotNullViolation
            | sqlx::error::ErrorKind::CheckViolation => DbErrorKind::Constraint,
            _ => {
                // Extended result codes keep the primary code in the low byte
                let primary = db
                    .code()
                    .and_then(|code| code.parse::<i32>().ok())
                    .map(|code| code & 0xff);
                match primary {
                    Some(SQLITE_BUSY) | Some(SQLITE_LOCKED) => DbErrorKind::Lock,
                    _ => DbErrorKind::Query,
                }
            }
        },
        _ => DbErrorKind::Query,
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        Self::new(classify_sqlx(&err), err.to_string())
    }
}

impl From<serde_json::Error> for DbError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(DbErrorKind::Serialization, err.to_string())
    }
}

impl From<repolens_core::CoreError> for DbError {
    fn from(err: repolens_core::CoreError) -> Self {
        Self::new(DbErrorKind::Serialization, err.to_string())
    }
}

impl RetryableError for DbError {
    fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    fn timed_out(operation_name: &str, after: Duration) -> Self {
        Self::new(
            DbErrorKind::Lock,
            format!("'{}' timed out after {:?}", operation_name, after),
        )
    }

    fn annotate(mut self, attempt: u32, elapsed: Duration) -> Self {
        self.attempts = attempt;
        self.elapsed = elapsed;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_kinds() {
        assert!(DbErrorKind::Lock.is_retryable());
        assert!(DbErrorKind::Connection.is_retryable());
        assert!(!DbErrorKind::Constraint.is_retryable());
        assert!(!DbErrorKind::Query.is_retryable());
        assert!(!DbErrorKind::NotFound.is_retryable());
        assert!(!DbErrorKind::Serialization.is_retryable());
    }

    #[test]
    fn test_row_not_found() {
        let err: DbError = sqlx::Error::RowNotFound.into();
        assert_eq!(err.kind, DbErrorKind::NotFound);
    }

    #[test]
    fn test_pool_errors_are_connection() {
        let err: DbError = sqlx::Error::PoolTimedOut.into();
        assert_eq!(err.kind, DbErrorKind::Connection);
        let err: DbError = sqlx::Error::PoolClosed.into();
        assert_eq!(err.kind, DbErrorKind::Connection);
    }

    #[test]
    fn test_json_error_is_serialization() {
        let err: DbError = serde_json::from_str::<Vec<String>>("{").unwrap_err().into();
        assert_eq!(err.kind, DbErrorKind::Serialization);
    }

    #[test]
    fn test_timeout_is_retryable_lock() {
        let err = DbError::timed_out("insert", Duration::from_secs(5));
        assert_eq!(err.kind, DbErrorKind::Lock);
        assert!(RetryableError::is_retryable(&err));
    }

    #[test]
    fn test_annotate_records_attempts() {
        let err = DbError::new(DbErrorKind::Lock, "busy").annotate(3, Duration::from_millis(120));
        assert_eq!(err.attempts, 3);
        assert_eq!(err.elapsed, Duration::from_millis(120));
    }

    #[test]
    fn test_display() {
        let err = DbError::not_found("Repository", "abc");
        assert_eq!(
            err.to_string(),
            "not found database error: Repository with id abc not found"
        );
    }
}
