//! Cache manager.
//!
//! Fronts the exact and semantic stores with the live caching policy. The
//! stores are rebuilt by [`CacheManager::reconfigure`] after the policy is
//! replaced; until then lookups keep using the limits they were built with.

use crate::error::CacheResult;
use crate::key::CacheKey;
use crate::semantic::{Embedder, SemanticCache, SemanticStats};
use crate::store::{ExactStats, ExactStore};
use arc_swap::ArcSwap;
use bytes::Bytes;
use gateway_config::{CachingPolicy, SharedPolicy};
use gateway_core::{Clock, SystemClock};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Where a hit came from
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CacheSource {
    /// Fingerprint match
    Exact,
    /// Similarity match
    Semantic {
        /// Cosine similarity to the stored query
        similarity: f32,
    },
}

/// A cached value
#[derive(Debug, Clone)]
pub struct CacheHit<V> {
    /// Deserialized value
    pub value: V,
    /// Match kind
    pub source: CacheSource,
    /// Fingerprint of the stored entry
    pub key: String,
}

/// Cache statistics
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    /// Whether caching is enabled
    pub enabled: bool,
    /// Exact store
    pub exact: ExactStats,
    /// Semantic store
    pub semantic: SemanticStats,
    /// Lookups made while enabled
    pub lookups: u64,
    /// Lookups answered from either store
    pub hits: u64,
    /// `hits / lookups`, 0 when there were no lookups
    pub hit_rate: f64,
}

struct Stores {
    exact: ExactStore,
    semantic: SemanticCache,
}

impl Stores {
    fn build(policy: &CachingPolicy, clock: &Arc<dyn Clock>) -> Self {
        Self {
            exact: ExactStore::new(policy.size_limits, Arc::clone(clock)),
            semantic: SemanticCache::new(
                policy.semantic_similarity.threshold,
                policy.semantic_similarity.max_entries,
                Arc::clone(clock),
            ),
        }
    }
}

/// Response cache driven by the caching policy
pub struct CacheManager {
    policy: SharedPolicy<CachingPolicy>,
    clock: Arc<dyn Clock>,
    embedder: Option<Arc<dyn Embedder>>,
    stores: ArcSwap<Stores>,
    lookups: AtomicU64,
    hits: AtomicU64,
}

impl fmt::Debug for CacheManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheManager")
            .field("embedder", &self.embedder.as_ref().map(|e| e.model_id().to_string()))
            .field("lookups", &self.lookups.load(Ordering::Relaxed))
            .field("hits", &self.hits.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl CacheManager {
    /// Create a manager reading time from the system clock
    #[must_use]
    pub fn new(policy: SharedPolicy<CachingPolicy>) -> Self {
        Self::with_clock(policy, Arc::new(SystemClock))
    }

    /// Create a manager with an explicit clock
    #[must_use]
    pub fn with_clock(policy: SharedPolicy<CachingPolicy>, clock: Arc<dyn Clock>) -> Self {
        let stores = Stores::build(&policy.load(), &clock);
        Self {
            policy,
            clock,
            embedder: None,
            stores: ArcSwap::from_pointee(stores),
            lookups: AtomicU64::new(0),
            hits: AtomicU64::new(0),
        }
    }

    /// Enable semantic lookups through `embedder`
    #[must_use]
    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Embedder used for semantic lookups
    #[must_use]
    pub fn embedder(&self) -> Option<&Arc<dyn Embedder>> {
        self.embedder.as_ref()
    }

    /// Rebuild both stores from the current policy, dropping their entries
    pub fn reconfigure(&self) {
        let policy = self.policy.load();
        self.stores.store(Arc::new(Stores::build(&policy, &self.clock)));
        info!(
            enabled = policy.enabled,
            max_entries = policy.size_limits.max_entries,
            eviction = %policy.size_limits.eviction_policy,
            semantic = policy.semantic_similarity.enabled,
            "Cache reconfigured"
        );
    }

    fn semantic_embedder(&self, policy: &CachingPolicy) -> Option<&Arc<dyn Embedder>> {
        if policy.semantic_similarity.enabled {
            self.embedder.as_ref()
        } else {
            None
        }
    }

    /// Look up a cached value.
    ///
    /// Tries the exact store, then the semantic store when enabled. A value
    /// that no longer deserializes is dropped and treated as a miss.
    pub async fn get<V: DeserializeOwned>(&self, key: &CacheKey<'_>) -> Option<CacheHit<V>> {
        let policy = self.policy.load_full();
        if !policy.enabled {
            return None;
        }
        let stores = self.stores.load_full();
        self.lookups.fetch_add(1, Ordering::Relaxed);

        let fingerprint = key.fingerprint();
        if let Some(bytes) = stores.exact.get(&fingerprint) {
            if let Some(value) = decode::<V>(&fingerprint, &bytes) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(key = %fingerprint, provider = key.provider, "Exact cache hit");
                return Some(CacheHit {
                    value,
                    source: CacheSource::Exact,
                    key: fingerprint,
                });
            }
            stores.exact.discard(&fingerprint);
        }

        let embedder = self.semantic_embedder(&policy)?;
        let embedding = match embedder.embed(key.query).await {
            Ok(embedding) => embedding,
            Err(err) => {
                warn!(error = %err, model = embedder.model_id(), "Embedding failed, treating as miss");
                return None;
            }
        };

        let found = stores.semantic.find(&key.scope(), &embedding)?;
        let Some(value) = decode::<V>(&found.cache_key, &found.value) else {
            stores.semantic.remove(&found.cache_key);
            return None;
        };
        stores.semantic.record_hit();
        self.hits.fetch_add(1, Ordering::Relaxed);
        Some(CacheHit {
            value,
            source: CacheSource::Semantic {
                similarity: found.similarity,
            },
            key: found.cache_key,
        })
    }

    /// Store a value under `key` in both stores.
    ///
    /// # Errors
    /// Returns `CacheError::Serialization` if the value cannot be encoded.
    /// Embedding failures are logged and only skip the semantic store.
    pub async fn set<V: Serialize>(&self, key: &CacheKey<'_>, value: &V) -> CacheResult<()> {
        let policy = self.policy.load_full();
        if !policy.enabled {
            return Ok(());
        }
        let stores = self.stores.load_full();

        let bytes = Bytes::from(serde_json::to_vec(value)?);
        let ttl = policy.ttl.resolve(key.agent, key.endpoint);
        let fingerprint = key.fingerprint();
        if !stores.exact.insert(&fingerprint, bytes.clone(), ttl) {
            return Ok(());
        }
        debug!(key = %fingerprint, ttl_seconds = ttl, size = bytes.len(), "Cached response");

        if let Some(embedder) = self.semantic_embedder(&policy) {
            match embedder.embed(key.query).await {
                Ok(embedding) => {
                    stores
                        .semantic
                        .insert(&fingerprint, &key.scope(), embedding, bytes, ttl);
                }
                Err(err) => {
                    warn!(error = %err, model = embedder.model_id(), "Embedding failed, skipping semantic store");
                }
            }
        }
        Ok(())
    }

    /// Drop every entry from both stores
    pub fn clear(&self) {
        let stores = self.stores.load();
        stores.exact.clear();
        stores.semantic.clear();
        info!("Cache cleared");
    }

    /// Sweep expired entries from both stores, returning how many were removed
    pub fn clear_expired(&self) -> usize {
        let stores = self.stores.load();
        let removed = stores.exact.clear_expired() + stores.semantic.clear_expired();
        if removed > 0 {
            debug!(removed, "Swept expired cache entries");
        }
        removed
    }

    /// Snapshot of counters
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let stores = self.stores.load();
        let lookups = self.lookups.load(Ordering::Relaxed);
        let hits = self.hits.load(Ordering::Relaxed);
        CacheStats {
            enabled: self.policy.load().enabled,
            exact: stores.exact.stats(),
            semantic: stores.semantic.stats(),
            lookups,
            hits,
            hit_rate: if lookups == 0 {
                0.0
            } else {
                hits as f64 / lookups as f64
            },
        }
    }
}

fn decode<V: DeserializeOwned>(key: &str, bytes: &[u8]) -> Option<V> {
    match serde_json::from_slice(bytes) {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(key, error = %err, "Cached value failed to deserialize");
            None
        }
    }
}
