//! repolens database layer
//!
//! SQLite storage for tracked repositories and the code patterns found in
//! them, built on sqlx. Multi-statement writes go through
//! [`TransactionGuard`]; single statements that may hit lock contention can
//! be wrapped with [`with_db_retry`].

pub mod connection;
pub mod datastore;
pub mod error;
pub mod migrations;
pub mod queries;
pub mod retry;
pub mod transaction;

pub use connection::{connect, connect_in_memory, DatabaseConfig, DbPool};
pub use datastore::{Datastore, SqliteStore};
pub use error::{DbError, DbErrorKind, DbResult};
pub use migrations::{current_version, optimize, run_migrations, verify_integrity};
pub use retry::{default_db_retry, with_db_retry};
pub use transaction::{TransactionGuard, TransactionOutcome};
