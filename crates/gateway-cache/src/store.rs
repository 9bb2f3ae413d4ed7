//! Bounded exact-match store.
//!
//! One map guarded by a single lock; the eviction victim is chosen by the
//! configured [`EvictionPolicy`] whenever an insert would overflow either the
//! entry count or the byte budget.

use crate::entry::CacheEntry;
use bytes::Bytes;
use gateway_config::{EvictionPolicy, SizeLimits};
use gateway_core::Clock;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Exact store statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExactStats {
    /// Entries held
    pub entries: usize,
    /// Bytes held
    pub size_bytes: u64,
    /// Entry limit
    pub max_entries: usize,
    /// Byte limit
    pub max_size_bytes: u64,
    /// Eviction policy
    pub eviction_policy: String,
    /// Hits
    pub hits: u64,
    /// Misses, including expired entries
    pub misses: u64,
    /// Entries evicted to make room
    pub evictions: u64,
}

#[derive(Debug, Default)]
struct StoreInner {
    entries: HashMap<String, CacheEntry>,
    size_bytes: u64,
    seq: u64,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl StoreInner {
    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    fn remove(&mut self, key: &str) -> Option<CacheEntry> {
        let entry = self.entries.remove(key)?;
        self.size_bytes = self.size_bytes.saturating_sub(entry.size_bytes);
        Some(entry)
    }

    fn victim(&self, policy: EvictionPolicy) -> Option<String> {
        let entries = self.entries.values();
        let victim = match policy {
            EvictionPolicy::Lru => entries.min_by_key(|e| e.accessed_seq),
            EvictionPolicy::Lfu => entries.min_by_key(|e| (e.access_count, e.inserted_seq)),
            EvictionPolicy::Fifo => entries.min_by_key(|e| e.inserted_seq),
        };
        victim.map(|e| e.key.clone())
    }
}

/// Exact-match response store
#[derive(Debug)]
pub struct ExactStore {
    limits: SizeLimits,
    clock: Arc<dyn Clock>,
    inner: Mutex<StoreInner>,
}

impl ExactStore {
    /// Create an empty store
    #[must_use]
    pub fn new(limits: SizeLimits, clock: Arc<dyn Clock>) -> Self {
        Self {
            limits,
            clock,
            inner: Mutex::new(StoreInner::default()),
        }
    }

    /// Limits in force
    #[must_use]
    pub fn limits(&self) -> SizeLimits {
        self.limits
    }

    /// Look up a value, refreshing its recency and frequency.
    ///
    /// An expired entry is removed and counted as a miss.
    pub fn get(&self, key: &str) -> Option<Bytes> {
        let now = self.clock.now();
        let mut inner = self.inner.lock();

        let expired = match inner.entries.get(key) {
            None => {
                inner.misses += 1;
                return None;
            }
            Some(entry) => entry.is_expired(now),
        };
        if expired {
            inner.remove(key);
            inner.misses += 1;
            debug!(key, "Cache entry expired");
            return None;
        }

        let seq = inner.next_seq();
        inner.hits += 1;
        let entry = inner.entries.get_mut(key)?;
        entry.access_count += 1;
        entry.accessed_seq = seq;
        entry.last_accessed = now;
        Some(entry.value.clone())
    }

    /// Store a value under `key`, evicting as needed.
    ///
    /// Returns `false` when the value alone exceeds the byte budget.
    pub fn insert(&self, key: &str, value: Bytes, ttl_seconds: u64) -> bool {
        let size = value.len() as u64;
        if size > self.limits.max_size_bytes {
            debug!(key, size, limit = self.limits.max_size_bytes, "Value exceeds cache size limit");
            return false;
        }

        let now = self.clock.now();
        let mut inner = self.inner.lock();
        inner.remove(key);

        while !inner.entries.is_empty()
            && (inner.entries.len() >= self.limits.max_entries
                || inner.size_bytes + size > self.limits.max_size_bytes)
        {
            let Some(victim) = inner.victim(self.limits.eviction_policy) else {
                break;
            };
            inner.remove(&victim);
            inner.evictions += 1;
            debug!(
                key = %victim,
                policy = %self.limits.eviction_policy,
                "Evicted cache entry"
            );
        }

        let seq = inner.next_seq();
        let mut entry = CacheEntry::new(key, value, now, ttl_seconds);
        entry.inserted_seq = seq;
        entry.accessed_seq = seq;
        inner.size_bytes += size;
        inner.entries.insert(key.to_string(), entry);
        true
    }

    /// Remove one key
    pub fn remove(&self, key: &str) -> bool {
        self.inner.lock().remove(key).is_some()
    }

    /// Drop an entry whose value could not be used, turning the hit that
    /// returned it into a miss
    pub fn discard(&self, key: &str) {
        let mut inner = self.inner.lock();
        if inner.remove(key).is_some() {
            inner.hits = inner.hits.saturating_sub(1);
            inner.misses += 1;
        }
    }

    /// Whether a live entry exists, without touching counters
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        let now = self.clock.now();
        self.inner
            .lock()
            .entries
            .get(key)
            .is_some_and(|e| !e.is_expired(now))
    }

    /// Drop all entries
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.size_bytes = 0;
    }

    /// Drop expired entries, returning how many were removed
    pub fn clear_expired(&self) -> usize {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        let expired: Vec<String> = inner
            .entries
            .values()
            .filter(|e| e.is_expired(now))
            .map(|e| e.key.clone())
            .collect();
        for key in &expired {
            inner.remove(key);
        }
        expired.len()
    }

    /// Entries held, including expired ones not yet swept
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Whether the store is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of counters
    #[must_use]
    pub fn stats(&self) -> ExactStats {
        let inner = self.inner.lock();
        ExactStats {
            entries: inner.entries.len(),
            size_bytes: inner.size_bytes,
            max_entries: self.limits.max_entries,
            max_size_bytes: self.limits.max_size_bytes,
            eviction_policy: self.limits.eviction_policy.to_string(),
            hits: inner.hits,
            misses: inner.misses,
            evictions: inner.evictions,
        }
    }
}
