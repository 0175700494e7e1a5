// crates/resilience/src/client.rs
//! Single entry point composing quota gate, circuit breaker and retries

use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitSnapshot};
use crate::classifier::{classify, RawError};
use crate::error::{ErrorContext, ResilienceResult};
use crate::rate_limit_gate::RateLimitGate;
use crate::retry::{RetryExecutor, RetryOptions};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug)]
struct Registry {
    breakers: HashMap<String, CircuitBreaker>,
    gates: HashMap<String, RateLimitGate>,
}

/// Runs named operations through their family's rate-limit gate, circuit
/// breaker and retry loop
///
/// Breakers are created on first use from the default breaker config, or
/// injected up front with [`ResilientClient::with_breaker`]. Clones share
/// the same breakers and gates.
#[derive(Debug, Clone)]
pub struct ResilientClient {
    retry_options: RetryOptions,
    breaker_config: CircuitBreakerConfig,
    registry: Arc<Mutex<Registry>>,
}

impl ResilientClient {
    pub fn new(retry_options: RetryOptions, breaker_config: CircuitBreakerConfig) -> Self {
        Self {
            retry_options,
            breaker_config,
            registry: Arc::new(Mutex::new(Registry {
                breakers: HashMap::new(),
                gates: HashMap::new(),
            })),
        }
    }

    /// Registers a pre-built breaker under its own name
    pub fn with_breaker(self, breaker: CircuitBreaker) -> Self {
        self.lock()
            .breakers
            .insert(breaker.name().to_string(), breaker);
        self
    }

    /// Registers a rate-limit gate under its own name
    pub fn with_rate_limit_gate(self, gate: RateLimitGate) -> Self {
        self.lock().gates.insert(gate.name().to_string(), gate);
        self
    }

    pub fn retry_options(&self) -> &RetryOptions {
        &self.retry_options
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Breaker guarding `operation_name`, created on first use
    pub fn breaker(&self, operation_name: &str) -> CircuitBreaker {
        self.lock()
            .breakers
            .entry(operation_name.to_string())
            .or_insert_with(|| CircuitBreaker::new(operation_name, self.breaker_config.clone()))
            .clone()
    }

    /// Gate registered for `operation_name`, if any
    pub fn rate_limit_gate(&self, operation_name: &str) -> Option<RateLimitGate> {
        self.lock().gates.get(operation_name).cloned()
    }

    /// Health view of one breaker
    pub fn circuit_state(&self, operation_name: &str) -> Option<CircuitSnapshot> {
        self.lock()
            .breakers
            .get(operation_name)
            .map(CircuitBreaker::snapshot)
    }

    /// Health view of every breaker, ordered by name
    pub fn circuit_states(&self) -> Vec<CircuitSnapshot> {
        let mut snapshots: Vec<_> = self
            .lock()
            .breakers
            .values()
            .map(CircuitBreaker::snapshot)
            .collect();
        snapshots.sort_by(|a, b| a.name.cmp(&b.name));
        snapshots
    }

    /// Runs `operation` with the default retry options
    pub async fn execute<F, Fut, T>(&self, operation_name: &str, operation: F) -> ResilienceResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RawError>>,
    {
        self.execute_with(operation_name, &self.retry_options, operation)
            .await
    }

    /// Runs `operation` with per-call retry options
    ///
    /// Order: quota gate (may sleep), breaker admission (may reject), then
    /// the retry loop. All retries happen inside one breaker admission and
    /// the breaker sees only the final outcome.
    pub async fn execute_with<F, Fut, T>(
        &self,
        operation_name: &str,
        options: &RetryOptions,
        mut operation: F,
    ) -> ResilienceResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RawError>>,
    {
        if let Some(gate) = self.rate_limit_gate(operation_name) {
            gate.acquire(1).await;
        }

        let breaker = self.breaker(operation_name);
        let permit = breaker.try_acquire().map_err(|e| {
            log::debug!("'{}' rejected by open circuit", operation_name);
            e
        })?;

        let mut attempt = 0;
        let result = RetryExecutor::new(options.clone())
            .run(operation_name, || {
                attempt += 1;
                let context = ErrorContext::new(operation_name).with_attempt(attempt);
                let call = operation();
                async move { call.await.map_err(|raw| classify(&raw, &context)) }
            })
            .await;

        match &result {
            Ok(_) => permit.record_success(),
            Err(error) if error.kind.is_caller_fault() => permit.record_success(),
            Err(_) => permit.record_failure(),
        }

        result
    }
}

impl Default for ResilientClient {
    fn default() -> Self {
        Self::new(RetryOptions::default(), CircuitBreakerConfig::default())
    }
}
