//! Configuration validation rules.
//!
//! Applied to `GrabConfig` values after they have been loaded from
//! environment, files, defaults, and CLI flags.

use crate::config::GrabConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

impl GrabConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `url_paths` is empty
    /// - `parallel` or `records_per_file` is 0
    /// - `timeout_secs` is 0
    /// - `max_retries` is 0 (the retry loop would never run)
    /// - `format` is not a known output format
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.url_paths.is_empty() {
            return Err(ConfigError::Invalid {
                field: "url_paths".into(),
                reason: "at least one URL path is required".into(),
            });
        }

        if self.parallel == 0 {
            return Err(ConfigError::Invalid { field: "parallel".into(), reason: "must be greater than 0".into() });
        }

        if self.records_per_file == 0 {
            return Err(ConfigError::Invalid {
                field: "records_per_file".into(),
                reason: "must be greater than 0".into(),
            });
        }

        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid { field: "timeout_secs".into(), reason: "must be at least 1".into() });
        }

        if self.max_retries == 0 {
            return Err(ConfigError::Invalid { field: "max_retries".into(), reason: "must be at least 1".into() });
        }

        if self.output_format().is_err() {
            return Err(ConfigError::Invalid {
                field: "format".into(),
                reason: format!("unknown output format {:?}", self.format),
            });
        }

        if self.skip_newer_than_min > 0 && self.records_per_file != 1 {
            tracing::debug!(
                records_per_file = self.records_per_file,
                "skip_newer_than_min only applies with one record per file"
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_default_config() {
        let config = GrabConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_empty_url_paths() {
        let config = GrabConfig { url_paths: Vec::new(), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "url_paths"));
    }

    #[test]
    fn test_validate_zero_parallel() {
        let config = GrabConfig { parallel: 0, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "parallel"));
    }

    #[test]
    fn test_validate_zero_records_per_file() {
        let config = GrabConfig { records_per_file: 0, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "records_per_file"));
    }

    #[test]
    fn test_validate_zero_timeout() {
        let config = GrabConfig { timeout_secs: 0, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "timeout_secs"));
    }

    #[test]
    fn test_validate_unknown_format() {
        let config = GrabConfig { format: "xml".into(), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "format"));
    }

    #[test]
    fn test_validate_minimum_values() {
        let config = GrabConfig {
            parallel: 1,
            records_per_file: 1,
            timeout_secs: 1,
            max_retries: 1,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }
}
