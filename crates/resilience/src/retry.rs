// crates/resilience/src/retry.rs
//! Retry options and the async retry executor

use crate::backoff::next_delay;
use crate::error::RetryableError;
use crate::timeout::with_timeout;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, Instant};

/// Retry configuration, immutable once built
///
/// The builders keep the invariants `max_attempts >= 1` and
/// `max_delay >= base_delay`.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryOptions {
    /// Maximum number of attempts (including the first attempt)
    max_attempts: u32,
    /// Delay after the first failed attempt
    base_delay: Duration,
    /// Upper bound for computed delays
    max_delay: Duration,
    /// Backoff multiplier
    multiplier: f64,
    /// Jitter width as a fraction of the delay, 0..=1
    jitter_fraction: f64,
    /// Deadline for a single attempt
    attempt_timeout: Option<Duration>,
}

impl RetryOptions {
    /// Creates retry options with the given attempt budget
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(30_000),
            multiplier: 2.0,
            jitter_fraction: 0.2,
            attempt_timeout: Some(Duration::from_secs(30)),
        }
    }

    /// Sets the attempt budget
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Sets the initial delay
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Sets the maximum delay
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the backoff multiplier (values below 1 are treated as 1)
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = if multiplier.is_finite() {
            multiplier.max(1.0)
        } else {
            1.0
        };
        self
    }

    /// Sets the jitter fraction, clamped to 0..=1
    pub fn with_jitter(mut self, fraction: f64) -> Self {
        self.jitter_fraction = if fraction.is_finite() {
            fraction.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self
    }

    /// Sets or clears the per-attempt timeout
    pub fn with_attempt_timeout(mut self, limit: Option<Duration>) -> Self {
        self.attempt_timeout = limit;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay.max(self.base_delay)
    }

    pub fn backoff_multiplier(&self) -> f64 {
        self.multiplier
    }

    pub fn jitter_fraction(&self) -> f64 {
        self.jitter_fraction
    }

    pub fn attempt_timeout(&self) -> Option<Duration> {
        self.attempt_timeout
    }
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self::new(3)
    }
}

/// Runs an async operation repeatedly until it succeeds, fails with a
/// non-retryable error, or exhausts its attempt budget
#[derive(Debug, Clone, Default)]
pub struct RetryExecutor {
    options: RetryOptions,
}

impl RetryExecutor {
    pub fn new(options: RetryOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &RetryOptions {
        &self.options
    }

    /// Executes `operation`, retrying per the configured options
    ///
    /// Each attempt races the per-attempt timeout; a timed-out attempt is
    /// abandoned and treated as a retryable timeout failure. The returned
    /// error is annotated with the attempt count and elapsed time.
    pub async fn run<F, Fut, T, E>(&self, operation_name: &str, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: RetryableError + Display,
    {
        let started = Instant::now();
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;

            let outcome =
                with_timeout(self.options.attempt_timeout, operation_name, operation()).await;

            let error = match outcome {
                Ok(value) => {
                    if attempt > 1 {
                        log::debug!(
                            "'{}' succeeded after {} attempts",
                            operation_name,
                            attempt
                        );
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            if !error.is_retryable() {
                log::debug!("'{}' failed with non-retryable error: {}", operation_name, error);
                return Err(error.annotate(attempt, started.elapsed()));
            }

            if attempt >= self.options.max_attempts {
                log::warn!(
                    "'{}' exhausted {} attempts. Last error: {}",
                    operation_name,
                    attempt,
                    error
                );
                return Err(error.annotate(attempt, started.elapsed()));
            }

            let delay = error
                .retry_after()
                .unwrap_or_else(|| next_delay(attempt, &self.options));

            log::warn!(
                "'{}' attempt {} failed: {}. Retrying in {:?}",
                operation_name,
                attempt,
                error,
                delay
            );

            sleep(delay).await;
        }
    }
}

/// Executes an operation with retry logic
pub async fn with_retry<F, Fut, T, E>(
    options: &RetryOptions,
    operation_name: &str,
    operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: RetryableError + Display,
{
    RetryExecutor::new(options.clone())
        .run(operation_name, operation)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ClassifiedError, ErrorContext, ErrorKind};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn transient() -> ClassifiedError {
        ClassifiedError::new(ErrorKind::Transient, "connection reset", ErrorContext::new("test"))
    }

    fn fast_options(max_attempts: u32) -> RetryOptions {
        RetryOptions::new(max_attempts)
            .with_base_delay(Duration::from_millis(10))
            .with_max_delay(Duration::from_millis(100))
            .with_jitter(0.0)
    }

    #[test]
    fn test_retry_options_default() {
        let options = RetryOptions::default();
        assert_eq!(options.max_attempts(), 3);
        assert_eq!(options.base_delay(), Duration::from_millis(1000));
        assert_eq!(options.max_delay(), Duration::from_millis(30_000));
        assert_eq!(options.backoff_multiplier(), 2.0);
    }

    #[test]
    fn test_retry_options_invariants() {
        let options = RetryOptions::new(0)
            .with_base_delay(Duration::from_secs(5))
            .with_max_delay(Duration::from_secs(1))
            .with_multiplier(0.5)
            .with_jitter(3.0);

        assert_eq!(options.max_attempts(), 1);
        assert_eq!(options.max_delay(), Duration::from_secs(5));
        assert_eq!(options.backoff_multiplier(), 1.0);
        assert_eq!(options.jitter_fraction(), 1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_first_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result = RetryExecutor::new(fast_options(3))
            .run("op", || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, ClassifiedError>(42)
                }
            })
            .await;

        assert_eq!(result, Ok(42));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_after_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result = RetryExecutor::new(fast_options(3))
            .run("op", || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(transient())
                    } else {
                        Ok(7)
                    }
                }
            })
            .await;

        assert_eq!(result, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_attempts_fail() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<(), _> = RetryExecutor::new(fast_options(3))
            .run("op", || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(transient())
                }
            })
            .await;

        let err = result.unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(err.kind, ErrorKind::Transient);
        assert_eq!(err.context.attempt, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_is_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<(), _> = RetryExecutor::new(fast_options(5))
            .run("op", || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(ClassifiedError::new(
                        ErrorKind::Validation,
                        "bad request",
                        ErrorContext::new("op"),
                    ))
                }
            })
            .await;

        assert_eq!(result.unwrap_err().kind, ErrorKind::Validation);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_timeout_is_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let options = fast_options(2).with_attempt_timeout(Some(Duration::from_millis(50)));

        let result: Result<(), ClassifiedError> = RetryExecutor::new(options)
            .run("slow", || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    sleep(Duration::from_secs(10)).await;
                    Ok(())
                }
            })
            .await;

        let err = result.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Timeout);
        assert_eq!(err.context.operation, "slow");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_after_overrides_backoff() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let started = Instant::now();

        let result = RetryExecutor::new(fast_options(2))
            .run("op", || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(transient().with_retry_after(Duration::from_secs(5)))
                    } else {
                        Ok(())
                    }
                }
            })
            .await;

        assert!(result.is_ok());
        assert!(started.elapsed() >= Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_retry_helper() {
        let result =
            with_retry(&fast_options(1), "op", || async { Err::<(), _>(transient()) }).await;
        assert_eq!(result.unwrap_err().context.attempt, 1);
    }
}
