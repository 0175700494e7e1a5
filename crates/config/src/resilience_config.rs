//! Retry and circuit breaker sections
//!
//! The same [`RetrySettings`] shape is used for network calls (`[retry]`)
//! and for datastore calls (`[database.retry]`), with tighter defaults for
//! the latter.

use crate::validation::{ConfigSection, ValidationError, Validator};
use repolens_resilience::{CircuitBreakerConfig, RetryOptions};
use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;

/// Retry policy for one class of calls
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrySettings {
    /// Total attempts including the first
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
    /// Fraction of each delay randomised, 0 disables jitter
    pub jitter_fraction: f64,
    /// Per-attempt limit; 0 disables it
    pub attempt_timeout_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
            backoff_multiplier: 2.0,
            jitter_fraction: 0.2,
            attempt_timeout_ms: 30_000,
        }
    }
}

impl RetrySettings {
    /// Defaults for local datastore contention
    pub fn database_default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 50,
            max_delay_ms: 500,
            backoff_multiplier: 2.0,
            jitter_fraction: 0.2,
            attempt_timeout_ms: 5_000,
        }
    }

    pub fn to_retry_options(&self) -> RetryOptions {
        let attempt_timeout =
            (self.attempt_timeout_ms > 0).then(|| Duration::from_millis(self.attempt_timeout_ms));

        RetryOptions::new(self.max_attempts)
            .with_base_delay(Duration::from_millis(self.base_delay_ms))
            .with_max_delay(Duration::from_millis(self.max_delay_ms))
            .with_multiplier(self.backoff_multiplier)
            .with_jitter(self.jitter_fraction)
            .with_attempt_timeout(attempt_timeout)
    }

    /// Validates with field names under `prefix`
    pub(crate) fn validate_as(&self, prefix: &str) -> Result<(), Vec<ValidationError>> {
        let field = |name: &str| format!("{}.{}", prefix, name);
        let mut results = vec![
            Validator::at_least(self.max_attempts, 1, &field("max_attempts")),
            Validator::at_least(self.backoff_multiplier, 1.0, &field("backoff_multiplier")),
            Validator::in_range(self.jitter_fraction, 0.0, 1.0, &field("jitter_fraction")),
        ];

        if self.max_delay_ms < self.base_delay_ms {
            results.push(Err(ValidationError::with_value(
                field("max_delay_ms"),
                format!("must be at least base_delay_ms ({})", self.base_delay_ms),
                self.max_delay_ms,
            )));
        }

        Validator::collect_errors(results)
    }

    fn overlay(mut self, table: RetryTable) -> Self {
        if let Some(v) = table.max_attempts {
            self.max_attempts = v;
        }
        if let Some(v) = table.base_delay_ms {
            self.base_delay_ms = v;
        }
        if let Some(v) = table.max_delay_ms {
            self.max_delay_ms = v;
        }
        if let Some(v) = table.backoff_multiplier {
            self.backoff_multiplier = v;
        }
        if let Some(v) = table.jitter_fraction {
            self.jitter_fraction = v;
        }
        if let Some(v) = table.attempt_timeout_ms {
            self.attempt_timeout_ms = v;
        }
        self
    }
}

impl From<&RetrySettings> for RetryOptions {
    fn from(settings: &RetrySettings) -> Self {
        settings.to_retry_options()
    }
}

impl ConfigSection for RetrySettings {
    fn validate(&self) -> Result<(), Vec<ValidationError>> {
        self.validate_as(self.section_name())
    }

    fn merge(&mut self, other: Self) {
        *self = other;
    }

    fn section_name(&self) -> &'static str {
        "retry"
    }
}

/// A partially written retry table
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RetryTable {
    max_attempts: Option<u32>,
    base_delay_ms: Option<u64>,
    max_delay_ms: Option<u64>,
    backoff_multiplier: Option<f64>,
    jitter_fraction: Option<f64>,
    attempt_timeout_ms: Option<u64>,
}

/// Fills fields missing from `[database.retry]` with datastore defaults
/// rather than network ones
pub(crate) fn database_retry<'de, D>(deserializer: D) -> Result<RetrySettings, D::Error>
where
    D: Deserializer<'de>,
{
    let table = RetryTable::deserialize(deserializer)?;
    Ok(RetrySettings::database_default().overlay(table))
}

/// Circuit breaker thresholds shared by every operation family
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CircuitBreakerSettings {
    /// Consecutive failures that open the circuit
    pub failure_threshold: u32,
    /// Consecutive half-open successes that close it again
    pub success_threshold: u32,
    pub open_timeout_ms: u64,
    pub half_open_max_calls: u32,
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 3,
            open_timeout_ms: 60_000,
            half_open_max_calls: 1,
        }
    }
}

impl CircuitBreakerSettings {
    pub fn to_breaker_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig::new(
            self.failure_threshold,
            Duration::from_millis(self.open_timeout_ms),
        )
        .with_success_threshold(self.success_threshold)
        .with_half_open_max_calls(self.half_open_max_calls)
    }
}

impl From<&CircuitBreakerSettings> for CircuitBreakerConfig {
    fn from(settings: &CircuitBreakerSettings) -> Self {
        settings.to_breaker_config()
    }
}

impl ConfigSection for CircuitBreakerSettings {
    fn validate(&self) -> Result<(), Vec<ValidationError>> {
        Validator::collect_errors(vec![
            Validator::at_least(self.failure_threshold, 1, "circuit_breaker.failure_threshold"),
            Validator::at_least(self.success_threshold, 1, "circuit_breaker.success_threshold"),
            Validator::at_least(self.half_open_max_calls, 1, "circuit_breaker.half_open_max_calls"),
            Validator::at_least(self.open_timeout_ms, 1, "circuit_breaker.open_timeout_ms"),
        ])
    }

    fn merge(&mut self, other: Self) {
        *self = other;
    }

    fn section_name(&self) -> &'static str {
        "circuit_breaker"
    }
}
