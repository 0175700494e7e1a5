//! Begin/commit/rollback wrapper for a sequence of datastore operations

use crate::datastore::Datastore;
use crate::error::DbError;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::panic::{resume_unwind, AssertUnwindSafe};

/// Result of [`TransactionGuard::with_transaction`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionOutcome<T> {
    /// Operations succeeded and the commit went through
    Committed(T),
    /// Nothing was committed
    ///
    /// `rollback_error` is set when the rollback issued after a failed
    /// operation itself failed. A failed `BEGIN` or `COMMIT` never carries
    /// one.
    Failed {
        error: DbError,
        rollback_error: Option<DbError>,
    },
}

impl<T> TransactionOutcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Committed(_))
    }

    pub fn error(&self) -> Option<&DbError> {
        match self {
            Self::Committed(_) => None,
            Self::Failed { error, .. } => Some(error),
        }
    }

    /// Converts into a `Result`, dropping any rollback error
    pub fn into_result(self) -> Result<T, DbError> {
        match self {
            Self::Committed(value) => Ok(value),
            Self::Failed { error, .. } => Err(error),
        }
    }
}

/// Runs operations inside exactly one transaction
///
/// Every `BEGIN` is matched by exactly one `COMMIT` or `ROLLBACK`, including
/// when the operations panic. Operations receive `&mut` access to the open
/// handle, so they cannot start a second transaction on it.
#[derive(Debug, Clone)]
pub struct TransactionGuard<D> {
    store: D,
}

impl<D: Datastore> TransactionGuard<D> {
    pub fn new(store: D) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &D {
        &self.store
    }

    pub async fn with_transaction<T, F>(&self, operations: F) -> TransactionOutcome<T>
    where
        F: for<'c> FnOnce(&'c mut D::Handle) -> BoxFuture<'c, Result<T, DbError>>,
    {
        let mut handle = match self.store.begin().await {
            Ok(handle) => handle,
            Err(error) => {
                log::warn!("Failed to begin transaction: {}", error);
                return TransactionOutcome::Failed {
                    error,
                    rollback_error: None,
                };
            }
        };

        let result = AssertUnwindSafe(operations(&mut handle))
            .catch_unwind()
            .await;

        match result {
            Ok(Ok(value)) => match self.store.commit(handle).await {
                Ok(()) => TransactionOutcome::Committed(value),
                Err(error) => {
                    log::error!("Commit failed: {}", error);
                    TransactionOutcome::Failed {
                        error,
                        rollback_error: None,
                    }
                }
            },
            Ok(Err(error)) => {
                log::debug!("Rolling back after {} error: {}", error.kind, error);
                let rollback_error = self.rollback_logged(handle).await;
                TransactionOutcome::Failed {
                    error,
                    rollback_error,
                }
            }
            Err(panic) => {
                log::error!("Transaction operations panicked, rolling back");
                self.rollback_logged(handle).await;
                resume_unwind(panic)
            }
        }
    }

    async fn rollback_logged(&self, handle: D::Handle) -> Option<DbError> {
        match self.store.rollback(handle).await {
            Ok(()) => None,
            Err(error) => {
                log::error!("Rollback failed: {}", error);
                Some(error)
            }
        }
    }
}
