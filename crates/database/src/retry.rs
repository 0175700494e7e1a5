//! Retry wrapper for single datastore calls
//!
//! Only `Lock` and `Connection` errors are retried. Local contention
//! clears in milliseconds, so the bounds are much tighter than for network
//! calls. Wrap individual statements, not whole transactions.

use crate::error::DbResult;
use repolens_resilience::{with_retry, RetryOptions};
use std::future::Future;
use std::time::Duration;

/// Retry bounds for datastore calls
pub fn default_db_retry() -> RetryOptions {
    RetryOptions::new(3)
        .with_base_delay(Duration::from_millis(50))
        .with_max_delay(Duration::from_millis(500))
        .with_multiplier(2.0)
        .with_jitter(0.2)
        .with_attempt_timeout(Some(Duration::from_secs(5)))
}

/// Runs a datastore call, retrying lock and connection failures
pub async fn with_db_retry<F, Fut, T>(
    options: &RetryOptions,
    operation_name: &str,
    operation: F,
) -> DbResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = DbResult<T>>,
{
    with_retry(options, operation_name, operation).await
}
