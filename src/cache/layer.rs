//! Cache layer that orchestrates caching logic with network fetching.

use chrono::{DateTime, Duration, Utc};
use color_eyre::Result;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

use super::traits::{CacheKey, CacheLookup, CacheResult, ContentStore};
use crate::comms::CommsError;

/// Cache layer that manages caching policy in front of a content store.
pub struct CacheLayer {
  storage: Arc<dyn ContentStore>,
  /// How long before cached data is considered stale (never, if unset)
  max_age: Option<Duration>,
}

impl CacheLayer {
  /// Create a new cache layer with the given storage backend.
  pub fn new(storage: impl ContentStore + 'static) -> Self {
    Self::from_shared(Arc::new(storage))
  }

  pub fn from_shared(storage: Arc<dyn ContentStore>) -> Self {
    Self {
      storage,
      max_age: None,
    }
  }

  /// Entries older than `max_age` are treated as misses.
  pub fn with_max_age(mut self, max_age: Option<Duration>) -> Self {
    self.max_age = max_age;
    self
  }

  fn is_stale(&self, cached_at: DateTime<Utc>) -> bool {
    match self.max_age {
      Some(max_age) => Utc::now() - cached_at > max_age,
      None => false,
    }
  }

  /// Store lookup with the staleness policy applied.
  pub fn lookup(&self, key: &CacheKey) -> Result<CacheLookup> {
    match self.storage.get(key)? {
      CacheLookup::Hit(doc) if self.is_stale(doc.cached_at) => {
        debug!(topic = %key.topic, page = key.page, cached_at = %doc.cached_at, "Cached content is stale");
        Ok(CacheLookup::Miss)
      }
      lookup => Ok(lookup),
    }
  }

  /// Whether a fresh entry exists for `key`.
  pub fn contains(&self, key: &CacheKey) -> Result<bool> {
    Ok(matches!(self.lookup(key)?, CacheLookup::Hit(_)))
  }

  pub fn store(&self, key: &CacheKey, document: &Value) -> Result<()> {
    self.storage.put(key, &document.to_string())
  }

  pub fn clear(&self) -> Result<()> {
    self.storage.clear()
  }

  /// Fetch a content page with an optional cache-first read.
  ///
  /// With `use_cache`:
  /// 1. A store failure is a local error and nothing is fetched
  /// 2. A hit is decoded and returned; nothing is fetched or re-stored
  /// 3. A miss falls through to the fetch
  ///
  /// Every successful fetch is written back, whether or not the cache was
  /// read, so later reads find it. A failed write is reported as an error.
  pub async fn fetch_page<D, F, Fut>(
    &self,
    key: &CacheKey,
    use_cache: bool,
    decode: D,
    fetcher: F,
  ) -> Result<CacheResult<Value>, CommsError>
  where
    D: FnOnce(&str) -> Option<Value>,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Value, CommsError>>,
  {
    if use_cache {
      let lookup = self.lookup(key).map_err(|e| {
        warn!(error = %e, "Content cache lookup failed");
        CommsError::local(format!(
          "Critical cache failure during content lookup: {}",
          e
        ))
      })?;

      if let CacheLookup::Hit(cached) = lookup {
        debug!(topic = %key.topic, query = %key.query, page = key.page, "Content cache hit");
        let document = decode(&cached.body)
          .ok_or_else(|| CommsError::local("Cached content could not be parsed."))?;
        return Ok(CacheResult::from_cache(document, cached.cached_at));
      }

      debug!(topic = %key.topic, query = %key.query, page = key.page, "Content cache miss");
    }

    let document = fetcher().await?;
    self.store(key, &document).map_err(|e| {
      warn!(error = %e, "Content cache write failed");
      CommsError::local(format!("Failed to cache content: {}", e))
    })?;

    Ok(CacheResult::from_network(document))
  }
}

impl Clone for CacheLayer {
  fn clone(&self) -> Self {
    Self {
      storage: Arc::clone(&self.storage),
      max_age: self.max_age,
    }
  }
}
