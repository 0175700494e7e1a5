//! Logger setup for binaries embedding repolens

use crate::app_config::AppConfig;

/// Initialises `env_logger` at the configured level
///
/// `RUST_LOG`, when set, takes precedence. Calling this more than once is
/// harmless; later calls return `false`.
pub fn init_logging(app: &AppConfig) -> bool {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(app.log_level.to_level_filter());

    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }

    builder.try_init().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_harmless() {
        let app = AppConfig::default();
        let _ = init_logging(&app);
        assert!(!init_logging(&app));
    }
}
