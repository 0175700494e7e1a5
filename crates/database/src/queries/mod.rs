//! Database query operations organized by entity

pub mod patterns;
pub mod repositories;

// Re-export commonly used query functions
pub use patterns::{
    count_patterns, list_patterns, list_patterns_by_category, replace_patterns, save_patterns,
    StoredPattern,
};
pub use repositories::{
    delete_repository, find_repository, get_repository, list_repositories, mark_analyzed,
    upsert_repository,
};
