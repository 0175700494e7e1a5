// crates/resilience/src/timeout.rs
//! Per-attempt timeout handling

use crate::error::RetryableError;
use std::future::Future;
use std::time::Duration;

/// Races `future` against `limit`
///
/// If the timer wins, the future is dropped (abandoned) and a timeout error
/// for `operation_name` is returned. With no limit the future runs to
/// completion.
pub async fn with_timeout<Fut, T, E>(
    limit: Option<Duration>,
    operation_name: &str,
    future: Fut,
) -> Result<T, E>
where
    Fut: Future<Output = Result<T, E>>,
    E: RetryableError,
{
    match limit {
        Some(limit) => match tokio::time::timeout(limit, future).await {
            Ok(result) => result,
            Err(_) => {
                log::debug!("'{}' attempt timed out after {:?}", operation_name, limit);
                Err(E::timed_out(operation_name, limit))
            }
        },
        None => future.await,
    }
}
