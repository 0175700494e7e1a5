//! Domain types for repolens
//!
//! - `repository`: tracked GitHub repositories
//! - `pattern`: code patterns found in repositories
//! - `common`: shared traits and utilities

mod common;
mod pattern;
mod repository;

pub use common::{Timestamp, Validator};
pub use pattern::{CodePattern, PatternCategory, PatternSeverity};
pub use repository::{Repository, RepositoryId};
