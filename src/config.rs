use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Parse error for {field}: {value} - {source}")]
    Parse {
        field: String,
        value: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Library configuration.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Whether labels and column names are checked against the SQL identifier
    /// grammar before being interpolated into statement text. Disabling this
    /// is the escape hatch for quoted or schema-qualified table names the
    /// caller has already vetted.
    pub validate_identifiers: bool,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            validate_identifiers: true,
        }
    }
}

impl GraphConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            validate_identifiers: parse_env_var("POSTGRAPH_VALIDATE_IDENTIFIERS", "true")?,
        })
    }
}

/// Parse an environment variable with a default value
fn parse_env_var<T: std::str::FromStr>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let value = env::var(key).unwrap_or_else(|_| default.to_string());
    value.parse().map_err(|e| ConfigError::Parse {
        field: key.to_string(),
        value,
        source: Box::new(e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GraphConfig::default();
        assert!(config.validate_identifiers);
    }

    #[test]
    fn test_parse_env_var_default() {
        // Variable is unset in the test environment, so the default applies.
        let parsed: bool = parse_env_var("POSTGRAPH_TEST_UNSET_FLAG", "false").unwrap();
        assert!(!parsed);
    }
}
