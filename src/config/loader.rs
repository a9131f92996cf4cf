use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::types::Config;

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    ParseError {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Config validation failed: {message}")]
    ValidationError { message: String },
}

impl Config {
    /// Returns the path to the configuration file.
    ///
    /// Uses `~/.config/clientsync/config.toml` on Unix/macOS,
    /// or equivalent on other platforms via `dirs::config_dir()`.
    /// Falls back to current directory if config_dir is unavailable.
    pub fn config_path() -> PathBuf {
        let config_dir = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        config_dir.join("clientsync").join("config.toml")
    }

    /// Loads configuration from the default config file.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Loads configuration from `path`.
    ///
    /// - If the file doesn't exist, returns `Config::default()`.
    /// - If the file exists, parses it as TOML and validates.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        Self::parse(&content).map_err(|e| match e {
            ConfigError::ParseError { source, .. } => ConfigError::ParseError {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })
    }

    /// Parses and validates TOML text.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content).map_err(|e| ConfigError::ParseError {
            path: PathBuf::from("<inline>"),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// Checks:
    /// - The API base URL is set
    /// - `0 < page_size <= max_items`
    /// - The cache schema version is set
    /// - The default locale is one of the supported locales
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api.base_url.trim().is_empty() {
            return Err(invalid("api.base_url must not be empty"));
        }

        let n = &self.notifications;
        if n.page_size == 0 {
            return Err(invalid("notifications.page_size must be greater than 0"));
        }
        if (n.page_size as usize) > n.max_items {
            return Err(invalid(format!(
                "notifications.max_items ({}) must be at least page_size ({})",
                n.max_items, n.page_size
            )));
        }

        if self.cache.schema_version.trim().is_empty() {
            return Err(invalid("cache.schema_version must not be empty"));
        }

        let locale = &self.locale;
        if !locale
            .locales
            .iter()
            .any(|l| l.eq_ignore_ascii_case(&locale.default_locale))
        {
            return Err(invalid(format!(
                "Default locale '{}' not found in configured locales",
                locale.default_locale
            )));
        }

        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preference::PrefixMode;
    use std::time::Duration;

    #[test]
    fn empty_file_gives_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.api.base_url, "http://127.0.0.1:8000/api/v1");
        assert_eq!(config.notifications.poll_interval_seconds, 30);
        assert_eq!(config.cache.ttl(), Duration::from_secs(86_400));
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = Config::parse(
            r#"
            [retry]
            max_attempts = 5
            max_delay_ms = 8000

            [locale]
            locales = ["en", "fr"]
            prefix = "as_needed"
            "#,
        )
        .unwrap();
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.base_delay_ms, 1000);
        assert_eq!(config.locale.prefix, PrefixMode::AsNeeded);

        let policy = config.retry.policy();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.delay_for(10), Duration::from_secs(8));
    }

    #[test]
    fn policy_only_retries_transient_errors() {
        let policy = Config::default().retry.policy();
        assert!(policy.is_retryable(&crate::error::SyncError::from_status(503, "x")));
        assert!(!policy.is_retryable(&crate::error::SyncError::from_status(422, "x")));
    }

    #[test]
    fn rejects_unknown_default_locale() {
        let err = Config::parse(
            r#"
            [locale]
            locales = ["en"]
            default_locale = "fr"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { .. }));
    }

    #[test]
    fn rejects_page_larger_than_cap() {
        let err = Config::parse(
            r#"
            [notifications]
            page_size = 100
            max_items = 50
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("max_items"));
    }

    #[test]
    fn rejects_malformed_toml() {
        let err = Config::parse("[api\nbase_url = 1").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn parse_error_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "not = [valid").unwrap();
        match Config::load_from(&path).unwrap_err() {
            ConfigError::ParseError { path: p, .. } => assert_eq!(p, path),
            other => panic!("Expected ParseError, got {other:?}"),
        }
    }
}
