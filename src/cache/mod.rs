//! Persistent content cache.
//!
//! This module provides:
//! - Content pages keyed by (topic, query, page) with exact matching
//! - A cache-first read policy with write-back of every live fetch
//! - Optional staleness based on when an entry was written

mod layer;
mod storage;
mod traits;

pub use layer::CacheLayer;
pub use storage::SqliteContentStore;
pub use traits::{CacheKey, CacheLookup, CacheResult, CacheSource, CachedDocument, ContentStore};
