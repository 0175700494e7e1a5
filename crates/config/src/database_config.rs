//! Database section

use crate::resilience_config::{database_retry, RetrySettings};
use crate::validation::{ConfigSection, ValidationError, Validator};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DatabaseSettings {
    pub max_connections: u32,
    pub enable_wal: bool,
    pub busy_timeout_ms: u64,
    /// Retry policy for single lock/connection failures
    #[serde(deserialize_with = "database_retry")]
    pub retry: RetrySettings,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            max_connections: 10,
            enable_wal: true,
            busy_timeout_ms: 5_000,
            retry: RetrySettings::database_default(),
        }
    }
}

impl DatabaseSettings {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

impl ConfigSection for DatabaseSettings {
    fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Err(e) =
            Validator::in_range(self.max_connections, 1, 100, "database.max_connections")
        {
            errors.push(e);
        }

        if let Err(mut e) = self.retry.validate_as("database.retry") {
            errors.append(&mut e);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn merge(&mut self, other: Self) {
        *self = other;
    }

    fn section_name(&self) -> &'static str {
        "database"
    }
}
