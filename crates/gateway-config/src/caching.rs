//! Caching policy document.

use crate::error::{ConfigError, ConfigResult};
use crate::serde_helpers::{default_true, default_version};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Victim selection when the exact-match store is full
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvictionPolicy {
    /// Least recently accessed
    #[default]
    Lru,
    /// Least frequently accessed, oldest first on ties
    Lfu,
    /// Oldest inserted
    Fifo,
}

impl fmt::Display for EvictionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Lru => "lru",
            Self::Lfu => "lfu",
            Self::Fifo => "fifo",
        })
    }
}

/// TTL resolution table, in seconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TtlConfig {
    /// TTL when no override applies
    #[serde(default = "default_ttl_seconds", alias = "default_ttl_seconds")]
    pub default_seconds: u64,

    /// Overrides per agent (highest precedence)
    #[serde(default, alias = "per_agent_ttl")]
    pub per_agent: HashMap<String, u64>,

    /// Overrides per endpoint
    #[serde(default, alias = "per_endpoint_ttl")]
    pub per_endpoint: HashMap<String, u64>,
}

fn default_ttl_seconds() -> u64 {
    3600
}

impl Default for TtlConfig {
    fn default() -> Self {
        Self {
            default_seconds: default_ttl_seconds(),
            per_agent: HashMap::new(),
            per_endpoint: HashMap::new(),
        }
    }
}

impl TtlConfig {
    /// Resolve the TTL for an agent/endpoint pair
    #[must_use]
    pub fn resolve(&self, agent: &str, endpoint: &str) -> u64 {
        self.per_agent
            .get(agent)
            .or_else(|| self.per_endpoint.get(endpoint))
            .copied()
            .unwrap_or(self.default_seconds)
    }
}

/// Semantic similarity matching
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticSimilarityConfig {
    /// Enable semantic lookups
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Minimum cosine similarity for a hit (0.0 - 1.0)
    #[serde(default = "default_threshold", alias = "similarity_threshold")]
    pub threshold: f32,

    /// Embedding model identifier handed to the embedder
    #[serde(default = "default_embedding_model", alias = "embedding_model")]
    pub embedding_model_id: String,

    /// Maximum semantic entries
    #[serde(default = "default_max_entries", alias = "max_cache_entries")]
    pub max_entries: usize,
}

fn default_threshold() -> f32 {
    0.85
}

fn default_embedding_model() -> String {
    "sentence-transformers/all-MiniLM-L6-v2".to_string()
}

fn default_max_entries() -> usize {
    10_000
}

impl Default for SemanticSimilarityConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: default_threshold(),
            embedding_model_id: default_embedding_model(),
            max_entries: default_max_entries(),
        }
    }
}

/// Exact-match store bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeLimits {
    /// Byte budget for stored values
    #[serde(default = "default_max_size_bytes")]
    pub max_size_bytes: u64,

    /// Entry budget
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,

    /// Victim selection
    #[serde(default)]
    pub eviction_policy: EvictionPolicy,
}

fn default_max_size_bytes() -> u64 {
    500 * 1024 * 1024
}

impl Default for SizeLimits {
    fn default() -> Self {
        Self {
            max_size_bytes: default_max_size_bytes(),
            max_entries: default_max_entries(),
            eviction_policy: EvictionPolicy::Lru,
        }
    }
}

/// Caching policy snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachingPolicy {
    /// Policy version
    #[serde(default = "default_version")]
    pub version: String,

    /// Master switch
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// TTL table
    #[serde(default)]
    pub ttl: TtlConfig,

    /// Semantic matching
    #[serde(default)]
    pub semantic_similarity: SemanticSimilarityConfig,

    /// Exact-match store bounds
    #[serde(default)]
    pub size_limits: SizeLimits,
}

impl Default for CachingPolicy {
    fn default() -> Self {
        Self {
            version: default_version(),
            enabled: true,
            ttl: TtlConfig::default(),
            semantic_similarity: SemanticSimilarityConfig::default(),
            size_limits: SizeLimits::default(),
        }
    }
}

impl CachingPolicy {
    /// Validate the policy
    ///
    /// # Errors
    /// Returns error if the similarity threshold is outside 0..=1 or an
    /// entry budget is zero
    pub fn validate(&self) -> ConfigResult<()> {
        let threshold = self.semantic_similarity.threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigError::invalid(
                "caching",
                "semantic_similarity.threshold",
                format!("must be between 0.0 and 1.0, got {threshold}"),
            ));
        }
        if self.semantic_similarity.max_entries == 0 {
            return Err(ConfigError::invalid(
                "caching",
                "semantic_similarity.max_entries",
                "must be at least 1",
            ));
        }
        if self.size_limits.max_entries == 0 {
            return Err(ConfigError::invalid(
                "caching",
                "size_limits.max_entries",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}
