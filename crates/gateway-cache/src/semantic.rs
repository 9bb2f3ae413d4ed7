//! Similarity-matched cache.
//!
//! Queries are embedded by an [`Embedder`] and compared by cosine similarity
//! against earlier queries in the same scope. Embeddings are unit-normalized
//! on insert, so similarity is a dot product.

use crate::entry::expires_at;
use crate::error::{CacheError, CacheResult};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use gateway_core::Clock;
use parking_lot::Mutex;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::debug;

/// Turns text into a vector
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed `text`
    async fn embed(&self, text: &str) -> CacheResult<Vec<f32>>;

    /// Identifier of the embedding model
    fn model_id(&self) -> &str;
}

/// Feature-hashed bag-of-words embedder.
///
/// Deterministic and dependency free. Queries sharing most of their words
/// land close together, which is enough for local runs and tests.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimensions: usize,
    model_id: String,
}

impl HashingEmbedder {
    /// Default vector width
    pub const DEFAULT_DIMENSIONS: usize = 256;

    /// Create an embedder with `dimensions` buckets
    #[must_use]
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
            model_id: format!("hashing-{}", dimensions.max(1)),
        }
    }

    /// Synchronous embedding
    #[must_use]
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0_f32; self.dimensions];
        let lowered = text.to_lowercase();
        for token in lowered.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()) {
            let digest = Sha256::digest(token.as_bytes());
            let mut raw = [0_u8; 8];
            raw.copy_from_slice(&digest[..8]);
            let hash = u64::from_le_bytes(raw);
            let index = (hash % self.dimensions as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            vector[index] += sign;
        }
        normalize(&mut vector);
        vector
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DIMENSIONS)
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    async fn embed(&self, text: &str) -> CacheResult<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(CacheError::embedding("cannot embed empty text"));
        }
        Ok(self.embed_text(text))
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

/// Scale `vector` to unit length; a zero vector is left alone
pub fn normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for v in vector.iter_mut() {
            *v /= norm;
        }
    }
}

/// Dot product of two unit vectors; mismatched lengths score zero
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Semantic store statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SemanticStats {
    /// Entries held
    pub entries: usize,
    /// Entry limit
    pub max_entries: usize,
    /// Similarity threshold
    pub threshold: f32,
    /// Matches served
    pub hits: u64,
}

#[derive(Debug)]
struct SemanticEntry {
    cache_key: String,
    scope: String,
    embedding: Vec<f32>,
    value: Bytes,
    expires_at: DateTime<Utc>,
    seq: u64,
}

#[derive(Debug, Default)]
struct SemanticInner {
    entries: VecDeque<SemanticEntry>,
    seq: u64,
    hits: u64,
}

/// A similarity match
#[derive(Debug, Clone, PartialEq)]
pub struct SemanticMatch {
    /// Fingerprint of the matched entry
    pub cache_key: String,
    /// Serialized value
    pub value: Bytes,
    /// Cosine similarity
    pub similarity: f32,
}

/// Bounded similarity cache, oldest entry evicted first
#[derive(Debug)]
pub struct SemanticCache {
    threshold: f32,
    max_entries: usize,
    clock: Arc<dyn Clock>,
    inner: Mutex<SemanticInner>,
}

impl SemanticCache {
    /// Create an empty cache
    #[must_use]
    pub fn new(threshold: f32, max_entries: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            threshold,
            max_entries: max_entries.max(1),
            clock,
            inner: Mutex::new(SemanticInner::default()),
        }
    }

    /// Similarity threshold
    #[must_use]
    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Best live entry in `scope` at or above the threshold.
    ///
    /// Equal similarities prefer the most recently stored entry.
    pub fn find(&self, scope: &str, embedding: &[f32]) -> Option<SemanticMatch> {
        let mut query = embedding.to_vec();
        normalize(&mut query);
        let now = self.clock.now();

        let mut inner = self.inner.lock();
        let best = inner
            .entries
            .iter()
            .filter(|e| e.scope == scope && now < e.expires_at)
            .map(|e| (cosine_similarity(&query, &e.embedding), e))
            .filter(|(similarity, _)| *similarity >= self.threshold)
            .max_by(|(sa, ea), (sb, eb)| sa.total_cmp(sb).then(ea.seq.cmp(&eb.seq)))
            .map(|(similarity, e)| SemanticMatch {
                cache_key: e.cache_key.clone(),
                value: e.value.clone(),
                similarity,
            });

        if let Some(found) = &best {
            debug!(scope, similarity = found.similarity, "Semantic cache match");
        }
        best
    }

    /// Count a match that was served
    pub fn record_hit(&self) {
        self.inner.lock().hits += 1;
    }

    /// Drop the entry stored under `cache_key`
    pub fn remove(&self, cache_key: &str) -> bool {
        let mut inner = self.inner.lock();
        let before = inner.entries.len();
        inner.entries.retain(|e| e.cache_key != cache_key);
        before != inner.entries.len()
    }

    /// Store an embedding with its value
    pub fn insert(&self, cache_key: &str, scope: &str, embedding: Vec<f32>, value: Bytes, ttl_seconds: u64) {
        let mut embedding = embedding;
        normalize(&mut embedding);
        let now = self.clock.now();

        let mut inner = self.inner.lock();
        inner.entries.retain(|e| e.cache_key != cache_key);
        while inner.entries.len() >= self.max_entries {
            inner.entries.pop_front();
        }
        inner.seq += 1;
        let seq = inner.seq;
        inner.entries.push_back(SemanticEntry {
            cache_key: cache_key.to_string(),
            scope: scope.to_string(),
            embedding,
            value,
            expires_at: expires_at(now, ttl_seconds),
            seq,
        });
    }

    /// Drop all entries
    pub fn clear(&self) {
        self.inner.lock().entries.clear();
    }

    /// Drop expired entries, returning how many were removed
    pub fn clear_expired(&self) -> usize {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        let before = inner.entries.len();
        inner.entries.retain(|e| now < e.expires_at);
        before - inner.entries.len()
    }

    /// Entries held
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Whether the cache is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of counters
    #[must_use]
    pub fn stats(&self) -> SemanticStats {
        let inner = self.inner.lock();
        SemanticStats {
            entries: inner.entries.len(),
            max_entries: self.max_entries,
            threshold: self.threshold,
            hits: inner.hits,
        }
    }
}
