//! Application facade over communications, credentials and the reading list.
//!
//! Every public operation swallows its failure: it returns a safe default
//! (`false`, an empty `Vec`), records the message, and broadcasts while the
//! error flag is raised. Observers read [`System::is_error_state`] and
//! [`System::last_error_message`] from inside the broadcast.

mod credential;
mod observer;
mod reading_list;
mod runtime;
mod sleep;

pub use credential::{AuthPhase, CredentialLifecycle};
pub use observer::{ObserverBus, ObserverId};
pub use reading_list::ReadingList;
pub use runtime::{RuntimeKey, RuntimeState, TokenState, INVALIDATED};
pub use sleep::{Sleeper, TokioSleeper};

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use color_eyre::Result;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{info, warn};

use crate::cache::{CacheLayer, SqliteContentStore};
use crate::comms::api_types::{ApiContentResponse, ApiTagsResponse};
use crate::comms::{
  Capability, CommsError, CommsManager, Content, ContentQuery, LiveTransport, MessagePayload,
  OfflineTransport, PostPayload, Tag, TagQuery,
};
use crate::config::Config;
use crate::env::Environment;

const DEFAULT_PAGE_SIZE: u32 = 10;

/// Transient error flag plus the sticky last message.
#[derive(Default)]
struct ErrorSignal {
  active: AtomicBool,
  last: Mutex<Option<String>>,
}

struct Inner {
  comms: CommsManager,
  credentials: CredentialLifecycle,
  bus: ObserverBus,
  errors: ErrorSignal,
  reading_list: Mutex<ReadingList>,
  page_size: u32,
}

/// Cheaply cloneable handle; clones share all state.
#[derive(Clone)]
pub struct System {
  inner: Arc<Inner>,
}

pub struct SystemBuilder {
  comms: CommsManager,
  sleeper: Arc<dyn Sleeper>,
  page_size: u32,
}

impl SystemBuilder {
  pub fn sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
    self.sleeper = sleeper;
    self
  }

  /// Page size for tag and content searches.
  pub fn page_size(mut self, page_size: u32) -> Self {
    self.page_size = page_size;
    self
  }

  pub fn build(self) -> System {
    let bus = ObserverBus::new();
    let credentials =
      CredentialLifecycle::new(Arc::new(RuntimeState::new()), bus.clone(), self.sleeper);

    System {
      inner: Arc::new(Inner {
        comms: self.comms,
        credentials,
        bus,
        errors: ErrorSignal::default(),
        reading_list: Mutex::new(ReadingList::new()),
        page_size: self.page_size,
      }),
    }
  }
}

impl System {
  pub fn builder(comms: CommsManager) -> SystemBuilder {
    SystemBuilder {
      comms,
      sleeper: Arc::new(TokioSleeper),
      page_size: DEFAULT_PAGE_SIZE,
    }
  }

  /// Wire up transports and the content cache from configuration.
  pub fn from_config(config: &Config, env: Arc<dyn Environment>) -> Result<Self> {
    let live = LiveTransport::new(config.endpoints.clone(), Arc::clone(&env))?;
    let mut comms = CommsManager::new(config.modes, Arc::new(live), env)
      .with_offline(Arc::new(OfflineTransport::new(config.offline_delay())));

    if config.cache.enabled {
      let store = SqliteContentStore::open(config.cache.path.as_deref())?;
      comms = comms.with_cache(CacheLayer::new(store).with_max_age(config.cache_max_age()));
    }

    info!(modes = ?config.modes, cache = config.cache.enabled, "System initialized");
    Ok(Self::builder(comms).page_size(config.page_size).build())
  }

  // ==========================================================================
  // Observation and error state
  // ==========================================================================

  /// See [`ObserverBus::register`]; listeners must be quick.
  pub fn register_observer(&self, listener: impl Fn() + Send + Sync + 'static) -> ObserverId {
    self.inner.bus.register(listener)
  }

  pub fn unregister_observer(&self, id: ObserverId) -> bool {
    self.inner.bus.unregister(id)
  }

  /// Only `true` while an error broadcast is in progress.
  pub fn is_error_state(&self) -> bool {
    self.inner.errors.active.load(Ordering::SeqCst)
  }

  /// Most recent error message, kept after the error state resets.
  pub fn last_error_message(&self) -> Option<String> {
    self
      .inner
      .errors
      .last
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .clone()
  }

  fn signal_error(&self, message: String) {
    warn!(%message, "Operation failed");
    let errors = &self.inner.errors;
    errors.active.store(true, Ordering::SeqCst);
    *errors.last.lock().unwrap_or_else(PoisonError::into_inner) = Some(message);
    self.inner.bus.broadcast();
    errors.active.store(false, Ordering::SeqCst);
  }

  fn unwrap_or_signal<T>(&self, result: Result<T, CommsError>, prefix: &str, default: T) -> T {
    match result {
      Ok(value) => value,
      Err(e) => {
        self.signal_error(format!("{}: {}", prefix, e));
        default
      }
    }
  }

  pub fn runtime_data(&self) -> HashMap<String, String> {
    self.inner.credentials.runtime().snapshot()
  }

  pub fn auth_phase(&self) -> AuthPhase {
    self.inner.credentials.phase()
  }

  /// Check the live keys for the content and/or message capabilities up front.
  ///
  /// Signals one error per missing key. Returns whether all were present.
  pub fn check_environment(&self, content: bool, message: bool) -> bool {
    let env = self.inner.comms.environment();
    let capabilities = [(content, Capability::Content), (message, Capability::Message)];
    let mut ok = true;

    for (_, capability) in capabilities.iter().filter(|(checked, _)| *checked) {
      for key in capability.required_keys() {
        if env.lookup(key).is_none() {
          self.signal_error(format!(
            "Environment variable {} is missing. Core functionality cannot work without it; please set it and try again.",
            key
          ));
          ok = false;
        }
      }
    }

    ok
  }

  /// Stop background work. The stored credential is kept.
  pub fn shutdown(&self) {
    self.inner.credentials.shutdown();
  }

  /// Wait for the pending credential expiry, if any.
  pub async fn join_credential_watcher(&self) {
    self.inner.credentials.join_watcher().await;
  }

  // ==========================================================================
  // Content
  // ==========================================================================

  pub async fn search_tags(&self, query: &str) -> Vec<Tag> {
    let query = TagQuery {
      query: query.to_string(),
      page: 1,
      page_size: self.inner.page_size,
    };

    let result = async {
      let doc = self.inner.comms.fetch_tags(&query).await?;
      decode::<ApiTagsResponse>(doc, "tags").map(ApiTagsResponse::into_tags)
    }
    .await;

    self.unwrap_or_signal(result, "Tag getting error", Vec::new())
  }

  pub fn is_content_cached(&self, tag: &Tag, query: &str, page: u32) -> bool {
    self
      .inner
      .comms
      .is_content_cached(&self.content_query(tag, query, page))
  }

  pub fn clear_cache(&self) {
    if let Err(e) = self.inner.comms.clear_content_cache() {
      warn!(error = %e, "Cache clear failed");
      self.signal_error("Failed to clear content cache.".to_string());
    }
  }

  pub async fn search_content(
    &self,
    tag: &Tag,
    query: &str,
    page: u32,
    use_cache: bool,
  ) -> Vec<Content> {
    let query = self.content_query(tag, query, page);

    let result = async {
      let doc = self.inner.comms.fetch_content(&query, use_cache).await?;
      decode::<ApiContentResponse>(doc, "content").map(ApiContentResponse::into_content)
    }
    .await;

    self.unwrap_or_signal(result, "Content getting error", Vec::new())
  }

  fn content_query(&self, tag: &Tag, query: &str, page: u32) -> ContentQuery {
    ContentQuery {
      tag: tag.clone(),
      query: query.to_string(),
      page,
      page_size: self.inner.page_size,
    }
  }

  // ==========================================================================
  // Message and social
  // ==========================================================================

  pub async fn send_message(&self, tag: &Tag, items: &[Content], recipient: &str) -> bool {
    let payload = MessagePayload {
      recipient: recipient.to_string(),
      tag: tag.clone(),
      items: items.to_vec(),
    };

    let result = self.inner.comms.send_message(&payload).await.map(|_| true);
    self.unwrap_or_signal(result, "Message sending error", false)
  }

  pub async fn authenticate(&self, principal: &str, secret: &str) -> bool {
    let result = self
      .inner
      .credentials
      .authenticate(&self.inner.comms, principal, secret)
      .await
      .map(|_| true);
    self.unwrap_or_signal(result, "Error authenticating", false)
  }

  /// Post as the authenticated principal. Fails without an active token.
  pub async fn post_message(&self, tag: &Tag, items: &[Content]) -> bool {
    let runtime = self.inner.credentials.runtime();
    let payload = PostPayload {
      principal: runtime
        .get(RuntimeKey::SocialPrincipal)
        .unwrap_or_default(),
      token: runtime.active_token(),
      tag: tag.clone(),
      items: items.to_vec(),
    };

    let result = self.inner.comms.post_message(&payload).await.map(|_| true);
    self.unwrap_or_signal(result, "Posting error", false)
  }

  // ==========================================================================
  // Reading list
  // ==========================================================================

  pub fn reading_list(&self) -> Vec<Content> {
    self.lock_reading_list().items().to_vec()
  }

  pub fn add_to_reading_list(&self, item: Content) -> bool {
    self.lock_reading_list().add(item)
  }

  pub fn remove_from_reading_list(&self, item: &Content) -> bool {
    self.lock_reading_list().remove(item)
  }

  fn lock_reading_list(&self) -> std::sync::MutexGuard<'_, ReadingList> {
    self
      .inner
      .reading_list
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
  }
}

/// Decode a validated document into its response shape.
fn decode<T: DeserializeOwned>(doc: Value, what: &str) -> Result<T, CommsError> {
  serde_json::from_value(doc)
    .map_err(|e| CommsError::local(format!("Unexpected {} response shape: {}", what, e)))
}
