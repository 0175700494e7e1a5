// crates/resilience/src/backoff.rs
//! Exponential backoff with jitter

use crate::retry::RetryOptions;
use rand::Rng;
use std::time::Duration;

/// Un-jittered delay after the given failed attempt, capped at `max_delay`
///
/// `attempt` is 1-indexed: the delay after the first failure is `base_delay`.
pub fn capped_delay(attempt: u32, options: &RetryOptions) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let base_ms = options.base_delay().as_millis() as f64;
    let max_ms = options.max_delay().as_millis() as f64;
    let exponent = (attempt - 1).min(i32::MAX as u32) as i32;

    let delay_ms = base_ms * options.backoff_multiplier().powi(exponent);
    let capped = if delay_ms.is_finite() {
        delay_ms.min(max_ms)
    } else {
        max_ms
    };

    Duration::from_millis(capped as u64)
}

/// Delay to sleep after the given failed attempt
///
/// The capped delay is scaled by a uniform factor in
/// `[1 - jitter/2, 1 + jitter/2]` and never exceeds `max_delay`.
pub fn next_delay(attempt: u32, options: &RetryOptions) -> Duration {
    let delay = capped_delay(attempt, options);
    let jitter = options.jitter_fraction();

    if jitter <= 0.0 || delay.is_zero() {
        return delay;
    }

    let factor = rand::thread_rng().gen_range((1.0 - jitter / 2.0)..=(1.0 + jitter / 2.0));
    let jittered = Duration::from_secs_f64(delay.as_secs_f64() * factor);

    jittered.min(options.max_delay())
}
