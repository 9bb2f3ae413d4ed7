//! Cache key derivation.

use sha2::{Digest, Sha256};

/// Model segment used when no model was selected
pub const DEFAULT_MODEL_SEGMENT: &str = "default";

/// The request attributes that identify a cached response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheKey<'a> {
    /// Query text
    pub query: &'a str,
    /// Calling agent
    pub agent: &'a str,
    /// Routed provider
    pub provider: &'a str,
    /// Routed model
    pub model: Option<&'a str>,
    /// Endpoint
    pub endpoint: &'a str,
}

impl<'a> CacheKey<'a> {
    /// Create a key
    #[must_use]
    pub fn new(
        query: &'a str,
        agent: &'a str,
        provider: &'a str,
        model: Option<&'a str>,
        endpoint: &'a str,
    ) -> Self {
        Self {
            query,
            agent,
            provider,
            model,
            endpoint,
        }
    }

    /// Everything except the query; semantic matches never cross scopes
    #[must_use]
    pub fn scope(&self) -> String {
        format!(
            "{}|{}|{}|{}",
            self.endpoint,
            self.agent,
            self.provider,
            self.model.unwrap_or(DEFAULT_MODEL_SEGMENT)
        )
    }

    /// SHA-256 hex digest of `scope|query`
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.scope().as_bytes());
        hasher.update(b"|");
        hasher.update(self.query.as_bytes());
        hex::encode(hasher.finalize())
    }
}
