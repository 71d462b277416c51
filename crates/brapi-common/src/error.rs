//! Error types shared across the workspace

use thiserror::Error;

/// Result type alias for shared operations
pub type Result<T> = std::result::Result<T, BrapiError>;

/// Errors raised by shared plumbing (configuration, logging, serialization)
#[derive(Error, Debug)]
pub enum BrapiError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid value '{value}' for {key}")]
    InvalidValue { key: String, value: String },
}

impl BrapiError {
    /// Create an invalid value error for a named setting
    pub fn invalid_value(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.into(),
            value: value.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_value_message() {
        let err = BrapiError::invalid_value("BRAPI_BACKEND", "oracle");
        assert_eq!(err.to_string(), "Invalid value 'oracle' for BRAPI_BACKEND");
    }
}
