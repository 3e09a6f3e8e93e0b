//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::Settings;
use crate::config::validation::{validate_config, ValidationError};

/// Configuration errors. All of them are fatal at startup and never retried.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),

    /// The key-value store was built without a table name.
    #[error("Table name is not specified")]
    MissingTableName,

    /// The key-value store was built without a backend while the breaker is enabled.
    #[error("No key-value backend configured and circuit breaker is not disabled")]
    MissingBackend,

    /// A shared breaker was requested before one was installed.
    #[error("Circuit breaker is not configured, install one before first use")]
    NotConfigured,
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<Settings, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: Settings = toml::from_str(&content)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_valid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[breaker]\nexpiration_secs = 60\n\n[store]\ntable_name = \"breakers\"\nsort_key_attr = \"sk\""
        )
        .unwrap();

        let settings = load_config(file.path()).unwrap();
        assert_eq!(settings.breaker.expiration_secs, 60);
        assert_eq!(settings.store.table_name, "breakers");
        assert_eq!(settings.store.sort_key_attr, "sk");
    }

    #[test]
    fn test_load_reports_validation_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[breaker]\nexpiration_secs = 0").unwrap();

        let err = load_config(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(ref e) if e.len() == 1));
        assert_eq!(
            err.to_string(),
            "Validation failed: breaker.expiration_secs must be greater than zero"
        );
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_config(Path::new("/nonexistent/breaker.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
