//! GitHub API section
//!
//! The token itself never lives in the file; only the name of the
//! environment variable that holds it.

use crate::validation::{ConfigSection, ValidationError, Validator};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GithubSettings {
    pub api_base_url: String,
    pub token_env: String,
    pub user_agent: String,
    pub request_timeout_secs: u64,
    pub rate_limit_cache_ttl_secs: u64,
    /// Calls held back from the quota before pausing for the reset
    pub low_quota_threshold: u32,
}

impl Default for GithubSettings {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.github.com".to_string(),
            token_env: "GITHUB_TOKEN".to_string(),
            user_agent: format!("repolens/{}", env!("CARGO_PKG_VERSION")),
            request_timeout_secs: 30,
            rate_limit_cache_ttl_secs: 60,
            low_quota_threshold: 10,
        }
    }
}

impl GithubSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn rate_limit_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.rate_limit_cache_ttl_secs)
    }
}

impl ConfigSection for GithubSettings {
    fn validate(&self) -> Result<(), Vec<ValidationError>> {
        Validator::collect_errors(vec![
            Validator::http_url(&self.api_base_url, "github.api_base_url"),
            Validator::not_empty(&self.token_env, "github.token_env"),
            Validator::not_empty(&self.user_agent, "github.user_agent"),
            Validator::in_range(self.request_timeout_secs, 1, 600, "github.request_timeout_secs"),
        ])
    }

    fn merge(&mut self, other: Self) {
        *self = other;
    }

    fn section_name(&self) -> &'static str {
        "github"
    }
}
