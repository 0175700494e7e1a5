//! Transaction-capable datastore abstraction

use crate::connection::DbPool;
use crate::error::DbResult;
use sqlx::{Sqlite, Transaction};
use std::future::Future;

/// A store that can open, commit and roll back transactions
///
/// A handle represents one open transaction. Commit and rollback consume it,
/// so a handle cannot be finished twice.
pub trait Datastore: Send + Sync {
    type Handle: Send;

    fn begin(&self) -> impl Future<Output = DbResult<Self::Handle>> + Send;

    fn commit(&self, handle: Self::Handle) -> impl Future<Output = DbResult<()>> + Send;

    fn rollback(&self, handle: Self::Handle) -> impl Future<Output = DbResult<()>> + Send;
}

/// SQLite datastore backed by a connection pool
///
/// Each transaction holds its own pooled connection.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: DbPool,
}

impl SqliteStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

impl Datastore for SqliteStore {
    type Handle = Transaction<'static, Sqlite>;

    async fn begin(&self) -> DbResult<Self::Handle> {
        Ok(self.pool.begin().await?)
    }

    async fn commit(&self, handle: Self::Handle) -> DbResult<()> {
        Ok(handle.commit().await?)
    }

    async fn rollback(&self, handle: Self::Handle) -> DbResult<()> {
        Ok(handle.rollback().await?)
    }
}
