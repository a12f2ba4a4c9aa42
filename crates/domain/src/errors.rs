//! Error types used throughout the application

use apiq_common::ConfigError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for apiq
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum ApiqError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ConfigError> for ApiqError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Invalid { message } => ApiqError::Config(message),
        }
    }
}

/// Result type alias for apiq operations
pub type Result<T> = std::result::Result<T, ApiqError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_conversion() {
        let err: ApiqError = ConfigError::invalid("max_calls must be greater than 0").into();
        assert_eq!(err, ApiqError::Config("max_calls must be greater than 0".into()));
        assert_eq!(err.to_string(), "Configuration error: max_calls must be greater than 0");
    }

    #[test]
    fn test_serialized_shape() {
        let json = serde_json::to_value(ApiqError::Network("connection refused".into()))
            .expect("serialize");
        assert_eq!(json, serde_json::json!({"type": "Network", "message": "connection refused"}));
    }
}
