//! Post-merge configuration validation.

use crate::error::{ConfigError, ConfigResult};
use crate::types::Config;

/// Upper bound for `sync.concurrency`.
pub const MAX_CONCURRENCY: usize = 64;

/// Validate a fully-merged and deserialized configuration.
///
/// # Errors
///
/// Returns the first validation error found.
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_sync(config)?;
    validate_logging(config)?;
    validate_storage(config)?;
    Ok(())
}

fn validate_sync(config: &Config) -> ConfigResult<()> {
    let s = &config.sync;

    if !matches!(s.mode.as_str(), "incremental" | "full") {
        return Err(ConfigError::Invalid {
            field: "sync.mode".to_owned(),
            message: format!(
                "unsupported mode '{}'; expected one of: incremental, full",
                s.mode
            ),
        });
    }

    if s.concurrency == 0 || s.concurrency > MAX_CONCURRENCY {
        return Err(ConfigError::Invalid {
            field: "sync.concurrency".to_owned(),
            message: format!("concurrency must be between 1 and {MAX_CONCURRENCY}"),
        });
    }

    if let Some(ext) = s
        .binary_extensions
        .iter()
        .find(|e| e.is_empty() || e.contains(['.', '/', '\\']))
    {
        return Err(ConfigError::Invalid {
            field: "sync.binary_extensions".to_owned(),
            message: format!("'{ext}' must be a bare extension such as 'png'"),
        });
    }

    Ok(())
}

fn validate_logging(config: &Config) -> ConfigResult<()> {
    let l = &config.logging;

    if !matches!(
        l.level.to_lowercase().as_str(),
        "trace" | "debug" | "info" | "warn" | "error"
    ) {
        return Err(ConfigError::Invalid {
            field: "logging.level".to_owned(),
            message: format!(
                "unknown level '{}'; expected one of: trace, debug, info, warn, error",
                l.level
            ),
        });
    }

    if !matches!(l.format.as_str(), "pretty" | "compact" | "json" | "full") {
        return Err(ConfigError::Invalid {
            field: "logging.format".to_owned(),
            message: format!(
                "unknown format '{}'; expected one of: pretty, compact, json, full",
                l.format
            ),
        });
    }

    Ok(())
}

fn validate_storage(config: &Config) -> ConfigResult<()> {
    if !matches!(config.storage.backend.as_str(), "json" | "memory") {
        return Err(ConfigError::Invalid {
            field: "storage.backend".to_owned(),
            message: format!(
                "unknown backend '{}'; expected one of: json, memory",
                config.storage.backend
            ),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_of(result: ConfigResult<()>) -> String {
        match result {
            Err(ConfigError::Invalid { field, .. }) => field,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_defaults_are_valid() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_rejects_unknown_mode() {
        let mut config = Config::default();
        config.sync.mode = "mirror".to_owned();
        assert_eq!(field_of(validate(&config)), "sync.mode");
    }

    #[test]
    fn test_concurrency_bounds() {
        let mut config = Config::default();
        config.sync.concurrency = 0;
        assert_eq!(field_of(validate(&config)), "sync.concurrency");
        config.sync.concurrency = MAX_CONCURRENCY;
        assert!(validate(&config).is_ok());
        config.sync.concurrency = MAX_CONCURRENCY + 1;
        assert_eq!(field_of(validate(&config)), "sync.concurrency");
    }

    #[test]
    fn test_rejects_dotted_binary_extension() {
        let mut config = Config::default();
        config.sync.binary_extensions = vec![".psd".to_owned()];
        assert_eq!(field_of(validate(&config)), "sync.binary_extensions");
    }

    #[test]
    fn test_logging_level_and_format() {
        let mut config = Config::default();
        config.logging.level = "DEBUG".to_owned();
        assert!(validate(&config).is_ok());
        config.logging.level = "loud".to_owned();
        assert_eq!(field_of(validate(&config)), "logging.level");

        let mut config = Config::default();
        config.logging.format = "xml".to_owned();
        assert_eq!(field_of(validate(&config)), "logging.format");
    }

    #[test]
    fn test_rejects_unknown_backend() {
        let mut config = Config::default();
        config.storage.backend = "sqlite".to_owned();
        assert_eq!(field_of(validate(&config)), "storage.backend");
    }
}
