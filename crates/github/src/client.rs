// crates/github/src/client.rs
//! GitHub REST client with resilience

use crate::error::{GithubError, GithubResult};
use crate::failure::{raw_from_reqwest, raw_from_response};
use crate::models::{ContentEntry, ContentsResponse, RepositoryInfo};
use crate::rate_limit::{snapshot_from_headers, RateLimitResponse};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Client as ReqwestClient, Response};
use repolens_resilience::{
    classify, CircuitSnapshot, ClassifiedError, ErrorContext, ErrorKind, QuotaFuture, QuotaSource,
    RateLimitGate, RateLimitGateConfig, RateLimitSnapshot, RawError, ResilienceResult,
    ResilientClient,
};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Operation family shared by every GitHub API call
pub const GITHUB_API_FAMILY: &str = "github-api";

const API_VERSION: &str = "2022-11-28";

/// GitHub client configuration
#[derive(Debug, Clone)]
pub struct GithubConfig {
    /// REST API root, without trailing slash
    pub api_base_url: String,
    /// Environment variable holding the token
    pub token_env: String,
    /// User agent string
    pub user_agent: String,
    /// Transport-level request timeout
    pub request_timeout: Duration,
    /// How long a quota snapshot is trusted
    pub rate_limit_cache_ttl: Duration,
    /// Remaining calls held back before pausing for the reset
    pub low_quota_threshold: u32,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.github.com".to_string(),
            token_env: "GITHUB_TOKEN".to_string(),
            user_agent: format!("repolens/{}", env!("CARGO_PKG_VERSION")),
            request_timeout: Duration::from_secs(30),
            rate_limit_cache_ttl: Duration::from_secs(60),
            low_quota_threshold: 10,
        }
    }
}

/// API token; never printed
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    token: String,
}

impl Credentials {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    /// Reads the token from `var`, treating unset and blank the same
    pub fn from_env(var: &str) -> Option<Self> {
        std::env::var(var)
            .ok()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .map(Self::new)
    }

    fn header_value(&self) -> GithubResult<HeaderValue> {
        let mut value = HeaderValue::from_str(&format!("Bearer {}", self.token))
            .map_err(|_| GithubError::InvalidToken)?;
        value.set_sensitive(true);
        Ok(value)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credentials(***)")
    }
}

/// Authenticated HTTP transport, shared with the quota source
#[derive(Debug)]
struct Transport {
    http: ReqwestClient,
    base_url: String,
}

impl Transport {
    async fn get(&self, path: &str) -> Result<Response, RawError> {
        let url = format!("{}{}", self.base_url, path);
        log::debug!("GET {}", url);
        self.http
            .get(&url)
            .send()
            .await
            .map_err(|e| raw_from_reqwest(&e))
    }

    async fn fetch_rate_limit(&self) -> Result<RateLimitSnapshot, RawError> {
        let response = self.get("/rate_limit").await?;
        let body: RateLimitResponse = decode(response).await?;
        body.core_snapshot()
            .ok_or_else(|| RawError::Other("rate limit reset out of range".to_string()))
    }
}

impl QuotaSource for Transport {
    fn fetch_quota(&self) -> QuotaFuture<'_> {
        Box::pin(async move {
            self.fetch_rate_limit()
                .await
                .map_err(|raw| classify(&raw, &ErrorContext::new("github-rate-limit")))
        })
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, RawError> {
    let status = response.status();
    if !status.is_success() {
        let headers = response.headers().clone();
        let body = response.text().await.unwrap_or_default();
        return Err(raw_from_response(status, &headers, &body));
    }

    response
        .json::<T>()
        .await
        .map_err(|e| RawError::Other(format!("invalid response body: {}", e)))
}

/// Client for the GitHub REST API
///
/// Built without credentials, the client stays usable but every call fails
/// with an Authentication error before any request is sent.
#[derive(Clone)]
pub struct GithubClient {
    transport: Option<Arc<Transport>>,
    config: GithubConfig,
    resilient: ResilientClient,
    gate: RateLimitGate,
}

impl fmt::Debug for GithubClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GithubClient")
            .field("base_url", &self.config.api_base_url)
            .field("configured", &self.is_configured())
            .finish()
    }
}

impl GithubClient {
    /// Creates a client, reading the token from `config.token_env`
    pub fn from_env(config: GithubConfig, resilient: ResilientClient) -> GithubResult<Self> {
        let credentials = Credentials::from_env(&config.token_env);
        if credentials.is_none() {
            log::warn!(
                "{} is not set; GitHub calls will fail until a token is provided",
                config.token_env
            );
        }
        Self::new(config, credentials, resilient)
    }

    /// Creates a client with explicit credentials
    pub fn new(
        config: GithubConfig,
        credentials: Option<Credentials>,
        resilient: ResilientClient,
    ) -> GithubResult<Self> {
        let base_url = config.api_base_url.trim_end_matches('/').to_string();
        if !(base_url.starts_with("https://") || base_url.starts_with("http://")) {
            return Err(GithubError::InvalidBaseUrl(config.api_base_url.clone()));
        }

        let gate_config = RateLimitGateConfig {
            cache_ttl: config.rate_limit_cache_ttl,
            reserve: config.low_quota_threshold,
        };
        let mut gate = RateLimitGate::new(GITHUB_API_FAMILY, gate_config);

        let transport = match credentials {
            Some(credentials) => {
                let mut headers = HeaderMap::new();
                headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
                headers.insert("x-github-api-version", HeaderValue::from_static(API_VERSION));
                headers.insert(AUTHORIZATION, credentials.header_value()?);

                let http = ReqwestClient::builder()
                    .timeout(config.request_timeout)
                    .user_agent(&config.user_agent)
                    .default_headers(headers)
                    .build()?;

                let transport = Arc::new(Transport { http, base_url });
                gate = gate.with_source(transport.clone());
                Some(transport)
            }
            None => None,
        };

        let resilient = resilient.with_rate_limit_gate(gate.clone());

        Ok(Self {
            transport,
            config,
            resilient,
            gate,
        })
    }

    /// Whether a token was supplied
    pub fn is_configured(&self) -> bool {
        self.transport.is_some()
    }

    pub fn config(&self) -> &GithubConfig {
        &self.config
    }

    /// Breaker health for the GitHub family
    pub fn circuit_state(&self) -> Option<CircuitSnapshot> {
        self.resilient.circuit_state(GITHUB_API_FAMILY)
    }

    /// Last quota snapshot seen in a response
    pub fn cached_rate_limit(&self) -> Option<RateLimitSnapshot> {
        self.gate.cached()
    }

    fn transport(&self) -> ResilienceResult<&Transport> {
        self.transport.as_deref().ok_or_else(|| {
            ClassifiedError::new(
                ErrorKind::Authentication,
                format!("no GitHub token configured (set {})", self.config.token_env),
                ErrorContext::new(GITHUB_API_FAMILY),
            )
            .with_retryable(false)
        })
    }

    /// One GET attempt; records any quota headers on the way through
    async fn fetch<T: DeserializeOwned>(
        &self,
        transport: &Transport,
        path: &str,
    ) -> Result<T, RawError> {
        let response = transport.get(path).await?;
        if let Some(snapshot) = snapshot_from_headers(response.headers()) {
            self.gate.record(snapshot);
        }
        decode(response).await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> ResilienceResult<T> {
        let transport = self.transport()?;
        self.resilient
            .execute(GITHUB_API_FAMILY, || self.fetch(transport, path))
            .await
    }

    /// `GET /repos/{owner}/{repo}`
    pub async fn get_repository(&self, owner: &str, repo: &str) -> ResilienceResult<RepositoryInfo> {
        let path = repo_path(owner, repo, "")?;
        self.get_json(&path).await
    }

    /// `GET /repos/{owner}/{repo}/languages`, bytes of code per language
    pub async fn list_languages(
        &self,
        owner: &str,
        repo: &str,
    ) -> ResilienceResult<BTreeMap<String, u64>> {
        let path = repo_path(owner, repo, "/languages")?;
        self.get_json(&path).await
    }

    /// `GET /repos/{owner}/{repo}/contents/{path}`
    ///
    /// A file path yields a single entry; a directory yields its listing.
    pub async fn get_contents(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
    ) -> ResilienceResult<Vec<ContentEntry>> {
        let suffix = format!("/contents/{}", path.trim_start_matches('/'));
        let path = repo_path(owner, repo, &suffix)?;
        let contents: ContentsResponse = self.get_json(&path).await?;
        Ok(contents.into_entries())
    }

    /// `GET /rate_limit`; the result also refreshes the gate
    pub async fn rate_limit(&self) -> ResilienceResult<RateLimitSnapshot> {
        let transport = self.transport()?;
        let snapshot = self
            .resilient
            .execute(GITHUB_API_FAMILY, || transport.fetch_rate_limit())
            .await?;
        self.gate.record(snapshot);
        Ok(snapshot)
    }
}

/// Validates `owner`/`repo` and builds the request path
fn repo_path(owner: &str, repo: &str, suffix: &str) -> ResilienceResult<String> {
    let valid = |s: &str| !s.is_empty() && !s.contains('/') && !s.contains(char::is_whitespace);
    if !valid(owner) || !valid(repo) {
        return Err(ClassifiedError::new(
            ErrorKind::Validation,
            format!("invalid repository '{}/{}'", owner, repo),
            ErrorContext::new(GITHUB_API_FAMILY),
        ));
    }
    Ok(format!("/repos/{}/{}{}", owner, repo, suffix))
}
