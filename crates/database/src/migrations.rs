//! Database migrations

use crate::connection::DbPool;
use crate::datastore::SqliteStore;
use crate::error::{DbError, DbErrorKind, DbResult};
use crate::transaction::TransactionGuard;

/// Migration 001: Repositories and patterns
const MIGRATION_001: &str = include_str!("../migrations/001_initial_schema.sql");

/// Migration 002: Lookup indexes
const MIGRATION_002: &str = include_str!("../migrations/002_add_indexes.sql");

const MIGRATIONS: [(i64, &str); 2] = [(1, MIGRATION_001), (2, MIGRATION_002)];

/// Current database schema version
pub const CURRENT_VERSION: i64 = 2;

pub fn current_version() -> i64 {
    CURRENT_VERSION
}

/// Runs all pending migrations
///
/// Each migration and its bookkeeping row commit together, so a failed
/// migration leaves the schema at the previous version.
pub async fn run_migrations(pool: &DbPool) -> DbResult<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now') * 1000)
        )
        "#,
    )
    .execute(pool)
    .await?;

    let guard = TransactionGuard::new(SqliteStore::new(pool.clone()));
    for (version, sql) in MIGRATIONS {
        run_migration(pool, &guard, version, sql).await?;
    }

    Ok(())
}

async fn run_migration(
    pool: &DbPool,
    guard: &TransactionGuard<SqliteStore>,
    version: i64,
    sql: &'static str,
) -> DbResult<()> {
    let applied: Option<i64> =
        sqlx::query_scalar("SELECT version FROM schema_migrations WHERE version = ?")
            .bind(version)
            .fetch_optional(pool)
            .await?;

    if applied.is_some() {
        return Ok(());
    }

    guard
        .with_transaction(move |tx| {
            Box::pin(async move {
                sqlx::Executor::execute(&mut **tx, sqlx::raw_sql(sql)).await?;
                sqlx::query("INSERT INTO schema_migrations (version) VALUES (?)")
                    .bind(version)
                    .execute(&mut **tx)
                    .await?;
                Ok(())
            })
        })
        .await
        .into_result()
        .map_err(|e| DbError::new(e.kind, format!("migration {} failed: {}", version, e.message)))?;

    log::info!("Applied database migration {}", version);
    Ok(())
}

/// Highest applied migration version, 0 for a fresh database
pub async fn applied_version(pool: &DbPool) -> DbResult<i64> {
    let version: Option<i64> = sqlx::query_scalar("SELECT MAX(version) FROM schema_migrations")
        .fetch_one(pool)
        .await?;
    Ok(version.unwrap_or(0))
}

/// Verifies database integrity
pub async fn verify_integrity(pool: &DbPool) -> DbResult<()> {
    let result: String = sqlx::query_scalar("PRAGMA integrity_check")
        .fetch_one(pool)
        .await?;

    if result != "ok" {
        return Err(DbError::new(
            DbErrorKind::Query,
            format!("integrity check failed: {}", result),
        ));
    }

    Ok(())
}

/// Optimizes the database
pub async fn optimize(pool: &DbPool) -> DbResult<()> {
    sqlx::query("PRAGMA optimize").execute(pool).await?;
    Ok(())
}
