//! Cache error types

use gateway_core::GatewayError;
use thiserror::Error;

/// Errors raised by cache operations
#[derive(Debug, Error)]
pub enum CacheError {
    /// Value could not be serialized or deserialized
    #[error("Cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Embedding backend failed
    #[error("Embedding failed: {0}")]
    Embedding(String),
}

impl CacheError {
    /// Create an embedding error
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding(message.into())
    }
}

/// Result type for cache operations
pub type CacheResult<T> = Result<T, CacheError>;

impl From<CacheError> for GatewayError {
    fn from(err: CacheError) -> Self {
        Self::Cache(err.to_string())
    }
}
