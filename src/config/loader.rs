//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::DispatcherConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", format_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn format_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<DispatcherConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: DispatcherConfig = toml::from_str(&content)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::BackoffStrategy;

    #[test]
    fn test_parse_partial_config() {
        let toml = r#"
            [circuit_breaker]
            failure_threshold = 2

            [retry]
            max_attempts = 5
            strategy = { kind = "linear" }

            [router]
            queue_capacity = 64
        "#;
        let config: DispatcherConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.circuit_breaker.failure_threshold, 2);
        assert_eq!(config.circuit_breaker.success_threshold, 3);
        assert_eq!(config.retry.max_attempts, 5);
        assert!(matches!(config.retry.strategy, BackoffStrategy::Linear));
        assert_eq!(config.router.queue_capacity, 64);
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let toml = r#"
            [router]
            load_decay = 0.0
        "#;
        let config: DispatcherConfig = toml::from_str(toml).unwrap();
        assert!(validate_config(&config).is_err());
    }
}
