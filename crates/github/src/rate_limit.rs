// crates/github/src/rate_limit.rs
//! Quota parsing from `x-ratelimit-*` headers and the `/rate_limit` body

use chrono::{DateTime, TimeZone, Utc};
use reqwest::header::HeaderMap;
use repolens_resilience::RateLimitSnapshot;
use serde::Deserialize;

fn header_u64(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers.get(name)?.to_str().ok()?.trim().parse().ok()
}

fn epoch_to_utc(seconds: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(seconds, 0).single()
}

/// Builds a snapshot from response headers
///
/// Returns `None` unless limit, remaining and reset are all present.
/// `x-ratelimit-used` defaults to `limit - remaining`.
pub fn snapshot_from_headers(headers: &HeaderMap) -> Option<RateLimitSnapshot> {
    let limit = u32::try_from(header_u64(headers, "x-ratelimit-limit")?).ok()?;
    let remaining = u32::try_from(header_u64(headers, "x-ratelimit-remaining")?).ok()?;
    let reset = i64::try_from(header_u64(headers, "x-ratelimit-reset")?).ok()?;
    let used = header_u64(headers, "x-ratelimit-used")
        .and_then(|u| u32::try_from(u).ok())
        .unwrap_or_else(|| limit.saturating_sub(remaining));

    Some(RateLimitSnapshot::new(
        limit,
        remaining,
        epoch_to_utc(reset)?,
        used,
    ))
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub(crate) struct QuotaWindow {
    pub limit: u32,
    pub remaining: u32,
    pub reset: i64,
    #[serde(default)]
    pub used: u32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct QuotaResources {
    pub core: QuotaWindow,
}

/// `GET /rate_limit`
#[derive(Debug, Deserialize)]
pub(crate) struct RateLimitResponse {
    pub resources: QuotaResources,
}

impl RateLimitResponse {
    /// Snapshot of the core REST quota
    pub(crate) fn core_snapshot(&self) -> Option<RateLimitSnapshot> {
        let core = self.resources.core;
        Some(RateLimitSnapshot::new(
            core.limit,
            core.remaining,
            epoch_to_utc(core.reset)?,
            core.used,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn test_snapshot_from_complete_headers() {
        let snapshot = snapshot_from_headers(&headers(&[
            ("x-ratelimit-limit", "5000"),
            ("x-ratelimit-remaining", "4990"),
            ("x-ratelimit-reset", "1700000000"),
            ("x-ratelimit-used", "10"),
        ]))
        .unwrap();

        assert_eq!(snapshot.limit, 5000);
        assert_eq!(snapshot.remaining, 4990);
        assert_eq!(snapshot.used, 10);
        assert_eq!(snapshot.reset_at.timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_used_defaults_from_remaining() {
        let snapshot = snapshot_from_headers(&headers(&[
            ("x-ratelimit-limit", "60"),
            ("x-ratelimit-remaining", "0"),
            ("x-ratelimit-reset", "1700000000"),
        ]))
        .unwrap();

        assert_eq!(snapshot.used, 60);
        assert!(snapshot.is_exhausted());
    }

    #[test]
    fn test_missing_or_garbled_headers() {
        assert!(snapshot_from_headers(&HeaderMap::new()).is_none());
        assert!(snapshot_from_headers(&headers(&[
            ("x-ratelimit-limit", "5000"),
            ("x-ratelimit-remaining", "lots"),
            ("x-ratelimit-reset", "1700000000"),
        ]))
        .is_none());
    }

    #[test]
    fn test_rate_limit_body() {
        let body: RateLimitResponse = serde_json::from_str(
            r#"{
                "resources": {
                    "core": {"limit": 5000, "remaining": 4999, "reset": 1700000000, "used": 1},
                    "search": {"limit": 30, "remaining": 30, "reset": 1700000060, "used": 0}
                },
                "rate": {"limit": 5000, "remaining": 4999, "reset": 1700000000, "used": 1}
            }"#,
        )
        .unwrap();

        let snapshot = body.core_snapshot().unwrap();
        assert_eq!(snapshot.remaining, 4999);
        assert_eq!(snapshot.used, 1);
    }
}
