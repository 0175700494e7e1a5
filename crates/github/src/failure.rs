// crates/github/src/failure.rs
//! Shapes reqwest failures and error responses into classifier input

use crate::models::ErrorBody;
use chrono::Utc;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use repolens_resilience::{HttpFailure, NetworkFailure, NetworkFailureKind, RawError};

/// Headers the classifier reads from error responses
const CLASSIFIER_HEADERS: [&str; 3] = ["retry-after", "x-ratelimit-remaining", "x-ratelimit-reset"];

/// Maps a transport-level reqwest error
pub fn raw_from_reqwest(err: &reqwest::Error) -> RawError {
    let message = err.to_string();

    let kind = if err.is_timeout() {
        NetworkFailureKind::Timeout
    } else if err.is_connect() {
        if message.to_lowercase().contains("dns") {
            NetworkFailureKind::Dns
        } else {
            NetworkFailureKind::ConnectionRefused
        }
    } else if err.is_decode() || err.is_builder() {
        return RawError::Other(message);
    } else {
        NetworkFailureKind::Other
    };

    RawError::Network(NetworkFailure::new(kind, message))
}

/// Builds the classifier input for a non-success response
///
/// `body` is the raw response text; GitHub's JSON `message` is used when
/// present, the canonical status text otherwise.
pub fn raw_from_response(status: StatusCode, headers: &HeaderMap, body: &str) -> RawError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.message)
        .unwrap_or_else(|_| {
            status
                .canonical_reason()
                .unwrap_or("Unknown status")
                .to_string()
        });

    let mut failure = HttpFailure::new(status.as_u16(), message).observed_at(Utc::now());
    for name in CLASSIFIER_HEADERS {
        if let Some(value) = headers.get(name).and_then(|v| v.to_str().ok()) {
            failure = failure.with_header(name, value);
        }
    }

    RawError::Http(failure)
}
