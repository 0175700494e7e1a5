// crates/github/tests/github_tests.rs
//! Integration tests for the GitHub client

use repolens_github::{Credentials, GithubClient, GithubConfig, GITHUB_API_FAMILY};
use repolens_resilience::{
    CircuitBreakerConfig, CircuitState, ErrorKind, ResilientClient, RetryOptions,
};
use std::time::Duration;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Points at a port nothing listens on
fn unreachable_config() -> GithubConfig {
    GithubConfig {
        api_base_url: "http://127.0.0.1:1".to_string(),
        request_timeout: Duration::from_secs(2),
        ..Default::default()
    }
}

fn single_attempt(failure_threshold: u32) -> ResilientClient {
    ResilientClient::new(
        RetryOptions::new(1),
        CircuitBreakerConfig::new(failure_threshold, Duration::from_secs(60)),
    )
}

#[tokio::test]
async fn test_unconfigured_client_reports_authentication() {
    init_logging();
    let client = GithubClient::new(GithubConfig::default(), None, single_attempt(5)).unwrap();

    let err = client.list_languages("octocat", "hello").await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Authentication);

    let err = client.rate_limit().await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Authentication);
}

#[tokio::test]
async fn test_connection_refused_is_transient() {
    init_logging();
    let client = GithubClient::new(
        unreachable_config(),
        Some(Credentials::new("ghp_test")),
        single_attempt(5),
    )
    .unwrap();

    let err = client.get_repository("octocat", "hello").await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Transient);
    assert!(err.retryable);

    let state = client.circuit_state().unwrap();
    assert_eq!(state.name, GITHUB_API_FAMILY);
    assert_eq!(state.failure_count, 1);
}

#[tokio::test]
async fn test_repeated_failures_open_circuit() {
    init_logging();
    let client = GithubClient::new(
        unreachable_config(),
        Some(Credentials::new("ghp_test")),
        single_attempt(2),
    )
    .unwrap();

    for _ in 0..2 {
        let _ = client.get_contents("octocat", "hello", "src").await;
    }
    assert_eq!(client.circuit_state().unwrap().state, CircuitState::Open);

    let err = client.get_contents("octocat", "hello", "src").await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::ServiceUnavailable);
    assert!(err.wait_time().is_some());
}

#[tokio::test]
async fn test_invalid_repository_name_is_not_sent() {
    init_logging();
    let client = GithubClient::new(
        unreachable_config(),
        Some(Credentials::new("ghp_test")),
        single_attempt(1),
    )
    .unwrap();

    let err = client.get_repository("octo cat", "hello").await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);
    assert!(client.circuit_state().is_none());
}

#[test]
fn test_config_defaults() {
    let config = GithubConfig::default();
    assert_eq!(config.api_base_url, "https://api.github.com");
    assert_eq!(config.rate_limit_cache_ttl, Duration::from_secs(60));
    assert!(config.user_agent.starts_with("repolens/"));
}
