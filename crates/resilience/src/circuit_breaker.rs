// crates/resilience/src/circuit_breaker.rs
//! Circuit breaker pattern implementation
//!
//! ```text
//! Closed   --(failure_threshold consecutive failures)--> Open
//! Open     --(call arrives after open_timeout)---------> HalfOpen
//! HalfOpen --(success_threshold probe successes)-------> Closed
//! HalfOpen --(any probe failure)-----------------------> Open
//! ```
//!
//! All transitions happen while holding the state lock and never across an
//! `.await`, so each read-modify-write is atomic with respect to other tasks.

use crate::error::{ClassifiedError, ResilienceResult};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Circuit is closed, requests flow normally
    Closed,
    /// Circuit is open, requests are rejected
    Open,
    /// Circuit is half-open, testing if service recovered
    HalfOpen,
}

/// Circuit breaker configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Number of consecutive failures before opening the circuit
    failure_threshold: u32,
    /// Duration to wait before probing after opening
    open_timeout: Duration,
    /// Number of probe successes needed to close from half-open
    success_threshold: u32,
    /// Probes allowed in flight while half-open
    half_open_max_calls: u32,
}

impl CircuitBreakerConfig {
    /// Creates a new configuration
    pub fn new(failure_threshold: u32, open_timeout: Duration) -> Self {
        Self {
            failure_threshold: failure_threshold.max(1),
            open_timeout,
            success_threshold: 3,
            half_open_max_calls: 1,
        }
    }

    /// Sets the success threshold
    pub fn with_success_threshold(mut self, threshold: u32) -> Self {
        self.success_threshold = threshold.max(1);
        self
    }

    /// Sets how many probes may run concurrently while half-open
    pub fn with_half_open_max_calls(mut self, calls: u32) -> Self {
        self.half_open_max_calls = calls.max(1);
        self
    }

    pub fn failure_threshold(&self) -> u32 {
        self.failure_threshold
    }

    pub fn success_threshold(&self) -> u32 {
        self.success_threshold
    }

    pub fn open_timeout(&self) -> Duration {
        self.open_timeout
    }

    pub fn half_open_max_calls(&self) -> u32 {
        self.half_open_max_calls
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self::new(5, Duration::from_secs(60))
    }
}

/// Point-in-time view of a breaker, for health checks
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CircuitSnapshot {
    pub name: String,
    pub state: CircuitState,
    pub failure_count: u32,
    pub success_count: u32,
    /// Earliest wall-clock time a probe is allowed, while open
    pub next_probe_at: Option<DateTime<Utc>>,
    /// Remaining wait until a probe is allowed, while open
    pub next_probe_in: Option<Duration>,
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    consecutive_failures: u32,
    half_open_successes: u32,
    probes_in_flight: u32,
    opened_at: Option<Instant>,
    opened_at_wall: Option<DateTime<Utc>>,
}

impl BreakerState {
    fn closed() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            half_open_successes: 0,
            probes_in_flight: 0,
            opened_at: None,
            opened_at_wall: None,
        }
    }
}

/// Circuit breaker for one operation family
///
/// Cloning is cheap and clones share state.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    name: Arc<str>,
    config: CircuitBreakerConfig,
    state: Arc<Mutex<BreakerState>>,
}

impl CircuitBreaker {
    /// Creates a new circuit breaker
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: Arc::from(name.into()),
            config,
            state: Arc::new(Mutex::new(BreakerState::closed())),
        }
    }

    /// Operation family this breaker guards
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Gets the current state
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    /// Reports counters and probe timing
    pub fn snapshot(&self) -> CircuitSnapshot {
        let state = self.lock();
        let open_timeout = self.config.open_timeout;

        let (next_probe_at, next_probe_in) = match (state.state, state.opened_at) {
            (CircuitState::Open, Some(opened_at)) => {
                let wait = (opened_at + open_timeout).saturating_duration_since(Instant::now());
                let at = state.opened_at_wall.and_then(|wall| {
                    chrono::Duration::from_std(open_timeout)
                        .ok()
                        .map(|timeout| wall + timeout)
                });
                (at, Some(wait))
            }
            _ => (None, None),
        };

        CircuitSnapshot {
            name: self.name.to_string(),
            state: state.state,
            failure_count: state.consecutive_failures,
            success_count: state.half_open_successes,
            next_probe_at,
            next_probe_in,
        }
    }

    /// Asks for admission of one call
    ///
    /// While open and before the timeout elapses, the call is rejected with a
    /// `ServiceUnavailable` error carrying the remaining wait. Rejections do
    /// not count as failures.
    pub fn try_acquire(&self) -> ResilienceResult<CallPermit> {
        let mut state = self.lock();
        let now = Instant::now();

        match state.state {
            CircuitState::Closed => Ok(self.permit(false)),
            CircuitState::Open => {
                let opened_at = state.opened_at.unwrap_or(now);
                let next_probe = opened_at + self.config.open_timeout;

                if now >= next_probe {
                    state.state = CircuitState::HalfOpen;
                    state.half_open_successes = 0;
                    state.probes_in_flight = 1;
                    log::info!("Circuit '{}' half-open, admitting probe", self.name);
                    Ok(self.permit(true))
                } else {
                    Err(ClassifiedError::service_unavailable(
                        self.name.as_ref(),
                        next_probe - now,
                    ))
                }
            }
            CircuitState::HalfOpen => {
                if state.probes_in_flight < self.config.half_open_max_calls {
                    state.probes_in_flight += 1;
                    Ok(self.permit(true))
                } else {
                    Err(ClassifiedError::service_unavailable(
                        self.name.as_ref(),
                        Duration::ZERO,
                    ))
                }
            }
        }
    }

    fn permit(&self, probe: bool) -> CallPermit {
        CallPermit {
            breaker: self.clone(),
            probe,
            settled: false,
        }
    }

    /// Records a successful operation made without a permit
    ///
    /// Only counts while closed; half-open outcomes go through [`CallPermit`].
    pub fn record_success(&self) {
        self.on_success(false);
    }

    /// Records a failed operation made without a permit
    ///
    /// Only counts while closed; half-open outcomes go through [`CallPermit`].
    pub fn record_failure(&self) {
        self.on_failure(false);
    }

    fn on_success(&self, probe: bool) {
        let mut state = self.lock();

        match state.state {
            CircuitState::Closed => {
                state.consecutive_failures = 0;
            }
            CircuitState::HalfOpen if probe => {
                state.probes_in_flight = state.probes_in_flight.saturating_sub(1);
                state.half_open_successes += 1;

                if state.half_open_successes >= self.config.success_threshold {
                    *state = BreakerState::closed();
                    log::info!("Circuit '{}' closed after successful probes", self.name);
                }
            }
            CircuitState::HalfOpen | CircuitState::Open => {}
        }
    }

    fn on_failure(&self, probe: bool) {
        let mut state = self.lock();

        match state.state {
            CircuitState::Closed => {
                state.consecutive_failures += 1;

                if state.consecutive_failures >= self.config.failure_threshold {
                    Self::open(&mut state);
                    log::warn!(
                        "Circuit '{}' opened after {} consecutive failures",
                        self.name,
                        state.consecutive_failures
                    );
                }
            }
            CircuitState::HalfOpen if probe => {
                Self::open(&mut state);
                log::warn!("Circuit '{}' probe failed, reopening", self.name);
            }
            CircuitState::HalfOpen | CircuitState::Open => {}
        }
    }

    fn release_probe(&self) {
        let mut state = self.lock();
        if state.state == CircuitState::HalfOpen {
            state.probes_in_flight = state.probes_in_flight.saturating_sub(1);
        }
    }

    fn open(state: &mut BreakerState) {
        state.state = CircuitState::Open;
        state.half_open_successes = 0;
        state.probes_in_flight = 0;
        state.opened_at = Some(Instant::now());
        state.opened_at_wall = Some(Utc::now());
    }

    /// Runs one call through the breaker
    ///
    /// Caller-fault errors (authentication, not found, ...) show the
    /// dependency is answering and are recorded as successes.
    pub async fn execute<F, Fut, T>(&self, operation: F) -> ResilienceResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ResilienceResult<T>>,
    {
        let permit = self.try_acquire()?;

        match operation().await {
            Ok(value) => {
                permit.record_success();
                Ok(value)
            }
            Err(error) => {
                if error.kind.is_caller_fault() {
                    permit.record_success();
                } else {
                    permit.record_failure();
                }
                Err(error)
            }
        }
    }

    /// Resets the circuit breaker to closed state
    pub fn reset(&self) {
        *self.lock() = BreakerState::closed();
        log::info!("Circuit '{}' reset", self.name);
    }
}

/// Admission granted by [`CircuitBreaker::try_acquire`]
///
/// Dropping a permit without recording an outcome (for example when the
/// caller's future is cancelled) frees its half-open probe slot.
#[must_use = "record the call outcome on the permit"]
#[derive(Debug)]
pub struct CallPermit {
    breaker: CircuitBreaker,
    probe: bool,
    settled: bool,
}

impl CallPermit {
    /// Whether this call is a half-open probe
    pub fn is_probe(&self) -> bool {
        self.probe
    }

    pub fn record_success(mut self) {
        self.settled = true;
        self.breaker.on_success(self.probe);
    }

    pub fn record_failure(mut self) {
        self.settled = true;
        self.breaker.on_failure(self.probe);
    }
}

impl Drop for CallPermit {
    fn drop(&mut self) {
        if !self.settled && self.probe {
            self.breaker.release_probe();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorContext, ErrorKind};

    fn breaker(failures: u32, timeout: Duration) -> CircuitBreaker {
        CircuitBreaker::new("test", CircuitBreakerConfig::new(failures, timeout))
    }

    fn transient() -> ClassifiedError {
        ClassifiedError::new(ErrorKind::Transient, "reset", ErrorContext::new("test"))
    }

    #[test]
    fn test_circuit_breaker_initial_state() {
        let cb = CircuitBreaker::new("test", CircuitBreakerConfig::default());
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.name(), "test");
    }

    #[test]
    fn test_circuit_opens_after_threshold() {
        let cb = breaker(3, Duration::from_secs(1));

        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Closed);

        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Closed);

        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[test]
    fn test_success_resets_failure_count() {
        let cb = breaker(3, Duration::from_secs(1));

        cb.record_failure();
        cb.record_failure();
        cb.record_success();
        cb.record_failure();
        cb.record_failure();

        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.snapshot().failure_count, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_circuit_rejects_when_open() {
        let cb = breaker(2, Duration::from_secs(10));

        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);

        tokio::time::advance(Duration::from_secs(4)).await;

        let err = cb.try_acquire().unwrap_err();
        assert_eq!(err.kind, ErrorKind::ServiceUnavailable);
        assert_eq!(err.wait_time(), Some(Duration::from_secs(6)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_circuit_half_open_after_timeout() {
        let cb = breaker(2, Duration::from_millis(50));

        cb.record_failure();
        cb.record_failure();

        tokio::time::advance(Duration::from_millis(60)).await;

        let permit = cb.try_acquire().unwrap();
        assert!(permit.is_probe());
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        permit.record_success();
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_limits_concurrent_probes() {
        let cb = breaker(1, Duration::from_millis(50));
        cb.record_failure();
        tokio::time::advance(Duration::from_millis(50)).await;

        let probe = cb.try_acquire().unwrap();
        assert!(cb.try_acquire().is_err());

        drop(probe);
        assert!(cb.try_acquire().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unpermitted_outcomes_leave_probe_slot_taken() {
        let cb = breaker(1, Duration::from_millis(50));
        cb.record_failure();
        tokio::time::advance(Duration::from_millis(50)).await;

        let probe = cb.try_acquire().unwrap();
        cb.record_success();
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        assert!(cb.try_acquire().is_err());

        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        probe.record_success();
        assert_eq!(cb.snapshot().success_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_circuit_closes_after_success_threshold() {
        let config =
            CircuitBreakerConfig::new(2, Duration::from_millis(50)).with_success_threshold(2);
        let cb = CircuitBreaker::new("test", config);

        cb.record_failure();
        cb.record_failure();
        tokio::time::advance(Duration::from_millis(60)).await;

        cb.try_acquire().unwrap().record_success();
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        cb.try_acquire().unwrap().record_success();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.snapshot().failure_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_failure_reopens_and_resets_timer() {
        let cb = breaker(1, Duration::from_millis(100));
        cb.record_failure();

        tokio::time::advance(Duration::from_millis(100)).await;
        cb.try_acquire().unwrap().record_failure();
        assert_eq!(cb.state(), CircuitState::Open);

        let err = cb.try_acquire().unwrap_err();
        assert_eq!(err.wait_time(), Some(Duration::from_millis(100)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_success_and_failure() {
        let cb = breaker(2, Duration::from_secs(1));

        assert_eq!(cb.execute(|| async { Ok(42) }).await, Ok(42));

        let _ = cb.execute(|| async { Err::<i32, _>(transient()) }).await;
        let _ = cb.execute(|| async { Err::<i32, _>(transient()) }).await;
        assert_eq!(cb.state(), CircuitState::Open);

        let result = cb.execute(|| async { Ok(42) }).await;
        assert_eq!(result.unwrap_err().kind, ErrorKind::ServiceUnavailable);
    }

    #[tokio::test(start_paused = true)]
    async fn test_caller_faults_do_not_open() {
        let cb = breaker(2, Duration::from_secs(1));

        for _ in 0..5 {
            let _ = cb
                .execute(|| async {
                    Err::<(), _>(ClassifiedError::new(
                        ErrorKind::NotFound,
                        "missing",
                        ErrorContext::new("test"),
                    ))
                })
                .await;
        }

        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_snapshot_reports_next_probe() {
        let cb = breaker(1, Duration::from_secs(60));
        assert_eq!(cb.snapshot().next_probe_in, None);

        cb.record_failure();
        tokio::time::advance(Duration::from_secs(15)).await;

        let snapshot = cb.snapshot();
        assert_eq!(snapshot.state, CircuitState::Open);
        assert_eq!(snapshot.next_probe_in, Some(Duration::from_secs(45)));
        assert!(snapshot.next_probe_at.is_some());
    }

    #[test]
    fn test_circuit_breaker_reset() {
        let cb = breaker(2, Duration::from_secs(1));

        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);

        cb.reset();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn test_clones_share_state() {
        let cb = breaker(1, Duration::from_secs(1));
        let other = cb.clone();

        other.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
    }
}
