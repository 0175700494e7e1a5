//! Repolens configuration
//!
//! A single TOML file with one table per concern. Every section implements
//! [`ConfigSection`] so it can validate and merge itself; missing tables and
//! fields fall back to defaults.
//!
//! # Example
//!
//! ```rust,no_run
//! use repolens_config::{init_logging, Config, ConfigManager};
//! use repolens_resilience::ResilientClient;
//!
//! let manager = ConfigManager::new().expect("config directory");
//! let config = manager.load_with_env_overrides().unwrap_or_else(|e| {
//!     eprintln!("Config error: {}, using defaults", e);
//!     Config::default()
//! });
//!
//! init_logging(&config.app);
//! let client = ResilientClient::new(
//!     config.retry.to_retry_options(),
//!     config.circuit_breaker.to_breaker_config(),
//! );
//! # let _ = client;
//! ```

mod error;
mod logging;
mod manager;
mod persistence;
mod validation;

pub mod app_config;
mod database_config;
mod github_config;
mod resilience_config;

pub use error::{ConfigError, ConfigResult, ValidationError};
pub use logging::init_logging;
pub use manager::{apply_env_overrides, ConfigManager, ENV_PREFIX};
pub use validation::{ConfigSection, Validator};

pub use app_config::{AppConfig, LogLevel};
pub use database_config::DatabaseSettings;
pub use github_config::GithubSettings;
pub use resilience_config::{CircuitBreakerSettings, RetrySettings};

use serde::{Deserialize, Serialize};

/// Root configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub app: AppConfig,
    pub github: GithubSettings,
    /// Network retry policy
    pub retry: RetrySettings,
    pub circuit_breaker: CircuitBreakerSettings,
    pub database: DatabaseSettings,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates every section, returning all errors found
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        let results = [
            self.app.validate(),
            self.github.validate(),
            self.retry.validate(),
            self.circuit_breaker.validate(),
            self.database.validate(),
        ];
        for result in results {
            if let Err(mut e) = result {
                errors.append(&mut e);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Merges `other` over this config, section by section
    pub fn merge(&mut self, other: Config) {
        self.app.merge(other.app);
        self.github.merge(other.github);
        self.retry.merge(other.retry);
        self.circuit_breaker.merge(other.circuit_breaker);
        self.database.merge(other.database);
    }
}
