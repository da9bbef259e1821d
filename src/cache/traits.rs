//! Core traits and types for the content cache.

use chrono::{DateTime, Utc};
use color_eyre::Result;

/// Composite key of a cached content page.
///
/// Matching is exact; callers normalize topic and query before building a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
  /// Tag id the content was searched under
  pub topic: String,
  pub query: String,
  /// 1-based page number
  pub page: u32,
}

impl CacheKey {
  pub fn new(topic: &str, query: &str, page: u32) -> Self {
    Self {
      topic: topic.to_string(),
      query: query.to_string(),
      page,
    }
  }
}

/// A stored document with the time it was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedDocument {
  /// Serialized document exactly as stored
  pub body: String,
  pub cached_at: DateTime<Utc>,
}

/// Outcome of a successful lookup. Failures are reported as `Err`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup {
  Hit(CachedDocument),
  Miss,
}

/// Persistent store keyed by [`CacheKey`].
///
/// Each call is atomic on its own; nothing spans a get and a later put.
pub trait ContentStore: Send + Sync {
  fn get(&self, key: &CacheKey) -> Result<CacheLookup>;

  /// Insert or overwrite the document for `key`.
  fn put(&self, key: &CacheKey, body: &str) -> Result<()>;

  fn clear(&self) -> Result<()>;
}

/// Result from a cache-aware fetch, including where the data came from.
#[derive(Debug, Clone)]
pub struct CacheResult<T> {
  pub data: T,
  pub source: CacheSource,
}

impl<T> CacheResult<T> {
  pub fn from_network(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Network,
    }
  }

  pub fn from_cache(data: T, cached_at: DateTime<Utc>) -> Self {
    Self {
      data,
      source: CacheSource::Cache { cached_at },
    }
  }
}

/// Indicates where fetched data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Fresh data from network (and written to the cache)
  Network,
  /// Served from the cache without touching the network
  Cache { cached_at: DateTime<Utc> },
}
