pub mod error;
pub mod types;

// Re-export commonly used types
pub use error::{CoreError, Result};
pub use types::{
    CodePattern, PatternCategory, PatternSeverity, Repository, RepositoryId, Timestamp, Validator,
};
