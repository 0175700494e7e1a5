//! Configuration manager - main API for config operations

use crate::persistence::ConfigPersistence;
use crate::{Config, ConfigError, ConfigResult};
use directories::ProjectDirs;
use std::path::PathBuf;
use std::str::FromStr;

/// Prefix for environment overrides, e.g. `REPOLENS_RETRY_MAX_ATTEMPTS`
pub const ENV_PREFIX: &str = "REPOLENS";

/// Loads, saves and overrides the repolens configuration file
pub struct ConfigManager {
    persistence: ConfigPersistence,
    config_dir: PathBuf,
}

impl ConfigManager {
    /// Uses the platform config directory
    ///
    /// - Linux: `~/.config/repolens/`
    /// - macOS: `~/Library/Application Support/repolens/`
    /// - Windows: `%APPDATA%\repolens\`
    pub fn new() -> ConfigResult<Self> {
        let config_dir = Self::default_config_dir()?;
        Self::with_directory(config_dir)
    }

    pub fn with_directory(config_dir: PathBuf) -> ConfigResult<Self> {
        let persistence = ConfigPersistence::new(config_dir.join("config.toml"));

        Ok(Self {
            persistence,
            config_dir,
        })
    }

    fn default_config_dir() -> ConfigResult<PathBuf> {
        ProjectDirs::from("", "", "repolens")
            .map(|proj_dirs| proj_dirs.config_dir().to_path_buf())
            .ok_or_else(|| ConfigError::PathResolutionError {
                reason: "Could not determine user config directory".to_string(),
            })
    }

    pub fn config_dir(&self) -> &PathBuf {
        &self.config_dir
    }

    pub fn config_path(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }

    /// Loads the file, or the defaults when there is none
    pub fn load(&self) -> ConfigResult<Config> {
        self.persistence.load()
    }

    /// Like [`load`](Self::load) but never fails
    pub fn load_or_default(&self) -> Config {
        match self.load() {
            Ok(config) => config,
            Err(e) => {
                log::warn!("Failed to load config: {}, using defaults", e);
                Config::default()
            }
        }
    }

    pub fn save(&self, config: &Config) -> ConfigResult<()> {
        self.persistence.save(config)
    }

    /// Load, modify, save
    pub fn update<F>(&self, update_fn: F) -> ConfigResult<()>
    where
        F: FnOnce(&mut Config),
    {
        let mut config = self.load()?;
        update_fn(&mut config);
        self.save(&config)
    }

    /// Writes a default file unless one exists; returns whether it wrote
    pub fn initialize(&self) -> ConfigResult<bool> {
        if self.config_path().exists() {
            log::info!(
                "Config file already exists at {}",
                self.config_path().display()
            );
            return Ok(false);
        }

        self.save(&Config::default())?;
        log::info!("Generated default config at {}", self.config_path().display());
        Ok(true)
    }

    pub fn reset(&self) -> ConfigResult<()> {
        self.save(&Config::default())
    }

    /// Validation messages for the file on disk; empty when valid
    pub fn validate(&self) -> ConfigResult<Vec<String>> {
        let config = self.load()?;

        match config.validate() {
            Ok(()) => Ok(Vec::new()),
            Err(errors) => Ok(errors.iter().map(|e| e.to_string()).collect()),
        }
    }

    /// Loads the file and applies `REPOLENS_*` environment overrides
    pub fn load_with_env_overrides(&self) -> ConfigResult<Config> {
        let mut config = self.load()?;
        apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;

        if let Err(errors) = config.validate() {
            log::warn!(
                "Config validation warnings after env overrides: {:?}",
                errors
            );
        }

        Ok(config)
    }
}

/// Applies overrides read through `lookup`
///
/// Supported: `REPOLENS_APP_LOG_LEVEL`, `REPOLENS_APP_DATABASE_PATH`,
/// `REPOLENS_GITHUB_API_BASE_URL`, `REPOLENS_RETRY_MAX_ATTEMPTS` and
/// `REPOLENS_CIRCUIT_BREAKER_FAILURE_THRESHOLD`.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F) -> ConfigResult<()>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |suffix: &str| {
        let name = format!("{}_{}", ENV_PREFIX, suffix);
        lookup(&name).map(|value| (name, value))
    };

    if let Some((name, value)) = var("APP_LOG_LEVEL") {
        config.app.log_level = parse_override(&name, &value)?;
    }

    if let Some((_, value)) = var("APP_DATABASE_PATH") {
        config.app.database_path = PathBuf::from(value);
    }

    if let Some((_, value)) = var("GITHUB_API_BASE_URL") {
        config.github.api_base_url = value;
    }

    if let Some((name, value)) = var("RETRY_MAX_ATTEMPTS") {
        config.retry.max_attempts = parse_override(&name, &value)?;
    }

    if let Some((name, value)) = var("CIRCUIT_BREAKER_FAILURE_THRESHOLD") {
        config.circuit_breaker.failure_threshold = parse_override(&name, &value)?;
    }

    Ok(())
}

fn parse_override<T: FromStr>(variable: &str, value: &str) -> ConfigResult<T> {
    log::info!("Config override from {}", variable);
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidOverride {
            variable: variable.to_string(),
            value: value.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_config::LogLevel;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn setup_test_manager() -> (TempDir, ConfigManager) {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let manager = ConfigManager::with_directory(temp_dir.path().to_path_buf())
            .expect("Failed to create manager");
        (temp_dir, manager)
    }

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_load_or_default_with_missing_file() {
        let (_temp_dir, manager) = setup_test_manager();
        assert_eq!(manager.load_or_default(), Config::default());
    }

    #[test]
    fn test_update() {
        let (_temp_dir, manager) = setup_test_manager();
        manager.save(&Config::default()).expect("Should save");

        manager
            .update(|config| config.circuit_breaker.failure_threshold = 8)
            .expect("Should update");

        let loaded = manager.load().expect("Should load");
        assert_eq!(loaded.circuit_breaker.failure_threshold, 8);
    }

    #[test]
    fn test_initialize_once() {
        let (_temp_dir, manager) = setup_test_manager();

        assert!(manager.initialize().expect("first"));
        assert!(manager.config_path().exists());
        assert!(!manager.initialize().expect("second"));
    }

    #[test]
    fn test_reset() {
        let (_temp_dir, manager) = setup_test_manager();

        let mut config = Config::default();
        config.retry.max_attempts = 9;
        manager.save(&config).expect("Should save");
        manager.reset().expect("Should reset");

        assert_eq!(manager.load().expect("Should load"), Config::default());
    }

    #[test]
    fn test_validate_reports_file_problems() {
        let (_temp_dir, manager) = setup_test_manager();
        std::fs::write(
            manager.config_path(),
            "[circuit_breaker]\nfailure_threshold = 0\n",
        )
        .expect("write");

        let errors = manager.validate().expect("Should validate");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("circuit_breaker.failure_threshold"));
    }

    #[test]
    fn test_env_overrides() {
        let vars = env(&[
            ("REPOLENS_APP_LOG_LEVEL", "debug"),
            ("REPOLENS_APP_DATABASE_PATH", "/tmp/lens.db"),
            ("REPOLENS_GITHUB_API_BASE_URL", "http://localhost:9000"),
            ("REPOLENS_RETRY_MAX_ATTEMPTS", "5"),
            ("REPOLENS_CIRCUIT_BREAKER_FAILURE_THRESHOLD", " 2 "),
        ]);

        let mut config = Config::default();
        apply_env_overrides(&mut config, |name| vars.get(name).cloned()).expect("apply");

        assert_eq!(config.app.log_level, LogLevel::Debug);
        assert_eq!(config.app.database_path, PathBuf::from("/tmp/lens.db"));
        assert_eq!(config.github.api_base_url, "http://localhost:9000");
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.circuit_breaker.failure_threshold, 2);
    }

    #[test]
    fn test_unparseable_override() {
        let vars = env(&[("REPOLENS_RETRY_MAX_ATTEMPTS", "lots")]);

        let mut config = Config::default();
        let err = apply_env_overrides(&mut config, |name| vars.get(name).cloned()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidOverride { .. }));
        assert_eq!(config.retry.max_attempts, 3);
    }

    #[test]
    fn test_config_file_path() {
        let (_temp_dir, manager) = setup_test_manager();
        assert!(manager.config_path().ends_with("config.toml"));
    }
}
