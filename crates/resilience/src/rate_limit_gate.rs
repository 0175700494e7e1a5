// crates/resilience/src/rate_limit_gate.rs
//! Upstream quota tracking
//!
//! The gate caches the last known quota snapshot for an operation family and
//! pauses callers until the quota window resets once the snapshot shows the
//! quota is spent. When no usable snapshot exists and refreshing it fails,
//! the gate lets calls through: an over-quota call is itself classified as
//! `RateLimited` by the upstream response.

use crate::error::ResilienceResult;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// Quota state reported by the upstream service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateLimitSnapshot {
    pub limit: u32,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
    pub used: u32,
}

impl RateLimitSnapshot {
    /// Creates a snapshot, clamping `remaining` to `limit`
    pub fn new(limit: u32, remaining: u32, reset_at: DateTime<Utc>, used: u32) -> Self {
        Self {
            limit,
            remaining: remaining.min(limit),
            reset_at,
            used,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }

    /// Time left until the quota window resets
    pub fn until_reset(&self, now: DateTime<Utc>) -> Duration {
        (self.reset_at - now).to_std().unwrap_or(Duration::ZERO)
    }
}

/// Boxed future returned by [`QuotaSource::fetch_quota`]
pub type QuotaFuture<'a> =
    Pin<Box<dyn Future<Output = ResilienceResult<RateLimitSnapshot>> + Send + 'a>>;

/// Something that can report the current upstream quota
pub trait QuotaSource: Send + Sync {
    fn fetch_quota(&self) -> QuotaFuture<'_>;
}

/// Rate-limit gate configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitGateConfig {
    /// How long a fetched snapshot is trusted
    pub cache_ttl: Duration,
    /// Calls held back from the remaining quota
    pub reserve: u32,
}

impl Default for RateLimitGateConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(60),
            reserve: 0,
        }
    }
}

#[derive(Debug, Default)]
struct GateState {
    snapshot: Option<RateLimitSnapshot>,
    fetched_at: Option<Instant>,
}

/// Quota gate for one upstream call family
#[derive(Clone)]
pub struct RateLimitGate {
    name: Arc<str>,
    config: RateLimitGateConfig,
    state: Arc<Mutex<GateState>>,
    source: Option<Arc<dyn QuotaSource>>,
}

impl fmt::Debug for RateLimitGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimitGate")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("has_source", &self.source.is_some())
            .finish()
    }
}

impl RateLimitGate {
    /// Creates a gate with no quota source
    pub fn new(name: impl Into<String>, config: RateLimitGateConfig) -> Self {
        Self {
            name: Arc::from(name.into()),
            config,
            state: Arc::new(Mutex::new(GateState::default())),
            source: None,
        }
    }

    /// Sets the source used to refresh a stale snapshot
    pub fn with_source(mut self, source: Arc<dyn QuotaSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores a snapshot observed from an upstream response
    pub fn record(&self, snapshot: RateLimitSnapshot) {
        let mut state = self.lock();
        state.snapshot = Some(snapshot);
        state.fetched_at = Some(Instant::now());
    }

    /// Last snapshot recorded, fresh or not
    pub fn cached(&self) -> Option<RateLimitSnapshot> {
        self.lock().snapshot
    }

    /// Snapshot that may still be relied on
    ///
    /// A snapshot is usable within the cache TTL. An exhausted snapshot stays
    /// usable until its reset time regardless of TTL.
    pub fn usable_snapshot(&self) -> Option<RateLimitSnapshot> {
        let state = self.lock();
        let snapshot = state.snapshot?;

        let within_ttl = state
            .fetched_at
            .map(|at| at.elapsed() < self.config.cache_ttl)
            .unwrap_or(false);
        let exhausted_window = snapshot.remaining <= self.config.reserve
            && Utc::now() < snapshot.reset_at;

        (within_ttl || exhausted_window).then_some(snapshot)
    }

    /// Whether `required` calls fit in the known quota
    ///
    /// Returns true when no usable snapshot exists or its window has reset.
    pub fn check_capacity(&self, required: u32) -> bool {
        match self.usable_snapshot() {
            None => true,
            Some(snapshot) if Utc::now() >= snapshot.reset_at => true,
            Some(snapshot) => snapshot.remaining >= required.saturating_add(self.config.reserve),
        }
    }

    /// Sleeps until the quota window resets when the known quota is spent
    pub async fn wait_for_reset(&self) {
        match self.usable_snapshot() {
            Some(snapshot) if snapshot.remaining <= self.config.reserve => {
                self.sleep_until_reset(snapshot).await
            }
            _ => {}
        }
    }

    async fn sleep_until_reset(&self, snapshot: RateLimitSnapshot) {
        let wait = snapshot.until_reset(Utc::now());
        if wait.is_zero() {
            return;
        }

        log::info!(
            "Quota for '{}' too low ({} left), waiting {}s for reset",
            self.name,
            snapshot.remaining,
            wait.as_secs()
        );
        tokio::time::sleep(wait).await;
    }

    /// Fetches a fresh snapshot from the quota source
    ///
    /// Failures are logged and swallowed; the gate then stays permissive.
    pub async fn refresh(&self) -> Option<RateLimitSnapshot> {
        let source = self.source.as_ref()?;

        match source.fetch_quota().await {
            Ok(snapshot) => {
                self.record(snapshot);
                Some(snapshot)
            }
            Err(e) => {
                log::warn!(
                    "Quota refresh for '{}' failed, assuming capacity: {}",
                    self.name,
                    e
                );
                None
            }
        }
    }

    /// Waits until `required` calls may be made
    ///
    /// Sleeps until the reset whenever the known quota cannot cover
    /// `required` on top of the reserve.
    pub async fn acquire(&self, required: u32) {
        if self.usable_snapshot().is_none() {
            self.refresh().await;
        }

        if self.check_capacity(required) {
            return;
        }
        if let Some(snapshot) = self.usable_snapshot() {
            self.sleep_until_reset(snapshot).await;
        }
    }
}
