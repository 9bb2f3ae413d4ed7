//! Cached entries and expiry arithmetic.

use bytes::Bytes;
use chrono::{DateTime, Duration as ChronoDuration, Utc};

/// Longest TTL honoured; larger values are clamped
const MAX_TTL_SECONDS: u64 = 100 * 365 * 24 * 60 * 60;

/// Expiry instant for an entry created at `created_at` with a TTL in seconds
#[must_use]
pub fn expires_at(created_at: DateTime<Utc>, ttl_seconds: u64) -> DateTime<Utc> {
    let secs = ttl_seconds.min(MAX_TTL_SECONDS) as i64;
    created_at
        .checked_add_signed(ChronoDuration::seconds(secs))
        .unwrap_or(created_at)
}

/// A serialized response held by the exact store
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Fingerprint
    pub key: String,
    /// Serialized JSON value
    pub value: Bytes,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Expiry time
    pub expires_at: DateTime<Utc>,
    /// Successful reads
    pub access_count: u64,
    /// Time of the last successful read, or creation
    pub last_accessed: DateTime<Utc>,
    /// Serialized length
    pub size_bytes: u64,
    /// Insertion order
    pub(crate) inserted_seq: u64,
    /// Recency order, bumped on every read
    pub(crate) accessed_seq: u64,
}

impl CacheEntry {
    /// Create an entry
    #[must_use]
    pub fn new(key: impl Into<String>, value: Bytes, now: DateTime<Utc>, ttl_seconds: u64) -> Self {
        let size_bytes = value.len() as u64;
        Self {
            key: key.into(),
            value,
            created_at: now,
            expires_at: expires_at(now, ttl_seconds),
            access_count: 0,
            last_accessed: now,
            size_bytes,
            inserted_seq: 0,
            accessed_seq: 0,
        }
    }

    /// Expired once `now` reaches `expires_at`, so a zero TTL never hits
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Time left before expiry
    #[must_use]
    pub fn remaining_ttl(&self, now: DateTime<Utc>) -> ChronoDuration {
        if self.is_expired(now) {
            ChronoDuration::zero()
        } else {
            self.expires_at - now
        }
    }
}
