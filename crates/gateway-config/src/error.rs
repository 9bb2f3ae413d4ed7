//! Error types for policy loading and validation.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors that can occur while reading or validating policies
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The policy file could not be read
    #[error("Failed to read policy file {path}: {source}")]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The document is not valid YAML or does not match the policy schema
    #[error("Failed to parse {document} policy: {message}")]
    Parse {
        /// Which policy document
        document: &'static str,
        /// Parser message
        message: String,
    },

    /// The document parsed but holds an out-of-range value
    #[error("Invalid {document} policy: field '{field}' {message}")]
    Invalid {
        /// Which policy document
        document: &'static str,
        /// Offending field path
        field: String,
        /// What is wrong with it
        message: String,
    },
}

impl ConfigError {
    /// Create a validation error
    pub fn invalid(
        document: &'static str,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Invalid {
            document,
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a parse error
    pub fn parse(document: &'static str, message: impl ToString) -> Self {
        Self::Parse {
            document,
            message: message.to_string(),
        }
    }
}

impl From<ConfigError> for gateway_core::GatewayError {
    fn from(err: ConfigError) -> Self {
        Self::InvalidPolicy(err.to_string())
    }
}
