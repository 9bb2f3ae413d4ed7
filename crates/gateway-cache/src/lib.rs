//! # Gateway Cache
//!
//! Response caching for the LLM Policy Gateway:
//! - SHA-256 request fingerprints
//! - Bounded exact store with LRU, LFU or FIFO eviction
//! - Embedding-based semantic matching within a request scope
//! - A manager that follows the live caching policy

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod entry;
pub mod error;
pub mod key;
pub mod manager;
pub mod semantic;
pub mod store;

// Re-export main types
pub use entry::CacheEntry;
pub use error::{CacheError, CacheResult};
pub use key::CacheKey;
pub use manager::{CacheHit, CacheManager, CacheSource, CacheStats};
pub use semantic::{Embedder, HashingEmbedder, SemanticCache, SemanticMatch, SemanticStats};
pub use store::{ExactStats, ExactStore};
