//! Dispatch of every remote operation to the live or offline transport.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use super::api_types::{content_error_message, ApiSendErrors, ApiTokenResponse, INVALID_GRANT};
use super::error::{is_error_status, CommsError};
use super::mode::{Capability, Modes};
use super::offline::OfflineTransport;
use super::parser::{JsonResponseParser, ResponseParser};
use super::transport::Transport;
use super::types::{
  ContentQuery, Credential, CredentialRequest, MessagePayload, PostPayload, RawResponse, TagQuery,
};
use crate::cache::CacheLayer;
use crate::env::Environment;

/// Routes requests, validates responses and applies the content cache policy.
///
/// Every operation first checks that a live capability has its configuration
/// keys, then dispatches, then turns the raw reply into a document or a
/// [`CommsError`]. Nothing is retried.
pub struct CommsManager {
  modes: Modes,
  live: Arc<dyn Transport>,
  offline: Arc<dyn Transport>,
  cache: Option<CacheLayer>,
  parser: Arc<dyn ResponseParser>,
  env: Arc<dyn Environment>,
}

impl CommsManager {
  /// Manager without a cache, using the canned offline transport and JSON parser.
  pub fn new(modes: Modes, live: Arc<dyn Transport>, env: Arc<dyn Environment>) -> Self {
    Self {
      modes,
      live,
      offline: Arc::new(OfflineTransport::default()),
      cache: None,
      parser: Arc::new(JsonResponseParser),
      env,
    }
  }

  pub fn with_offline(mut self, offline: Arc<dyn Transport>) -> Self {
    self.offline = offline;
    self
  }

  /// Enable content caching. Only used while content is live.
  pub fn with_cache(mut self, cache: CacheLayer) -> Self {
    self.cache = Some(cache);
    self
  }

  pub fn with_parser(mut self, parser: Arc<dyn ResponseParser>) -> Self {
    self.parser = parser;
    self
  }

  pub fn modes(&self) -> Modes {
    self.modes
  }

  pub fn set_modes(&mut self, modes: Modes) {
    self.modes = modes;
  }

  pub fn environment(&self) -> &Arc<dyn Environment> {
    &self.env
  }

  fn transport(&self, capability: Capability) -> &dyn Transport {
    let mode = self.modes.mode(capability);
    debug!(?capability, ?mode, "Dispatching request");
    if mode.is_live() {
      self.live.as_ref()
    } else {
      self.offline.as_ref()
    }
  }

  /// Live capabilities need all their keys before anything is sent.
  fn ensure_configured(&self, capability: Capability) -> Result<(), CommsError> {
    if !self.modes.mode(capability).is_live() {
      return Ok(());
    }

    for key in capability.required_keys() {
      if self.env.lookup(key).is_none() {
        warn!(?capability, key, "Missing configuration for live capability");
        return Err(CommsError::local(format!(
          "Required environment variable {} is missing.",
          key
        )));
      }
    }

    Ok(())
  }

  fn parse(&self, response: &RawResponse, what: &str) -> Result<Value, CommsError> {
    self.parser.parse(&response.body).ok_or_else(|| {
      CommsError::local(format!("Unparsable {} response: {}", what, response.body))
    })
  }

  /// Parse a content service reply, mapping error statuses to transport errors.
  fn parse_validated(&self, response: &RawResponse, what: &str) -> Result<Value, CommsError> {
    let doc = self.parse(response, what)?;

    if is_error_status(response.status) {
      let message = content_error_message(&doc)
        .unwrap_or_else(|| format!("Request failed with status {}", response.status));
      return Err(CommsError::transport(response.status, message));
    }

    Ok(doc)
  }

  // ==========================================================================
  // Content service
  // ==========================================================================

  pub async fn fetch_tags(&self, query: &TagQuery) -> Result<Value, CommsError> {
    self.ensure_configured(Capability::Content)?;
    let response = self
      .transport(Capability::Content)
      .fetch_tags(query)
      .await?;
    self.parse_validated(&response, "tags")
  }

  /// Whether a live content search for `query` would be served from cache.
  ///
  /// Always `false` while content is offline, without a cache, or when the
  /// cache cannot be read.
  pub fn is_content_cached(&self, query: &ContentQuery) -> bool {
    if !self.modes.content.is_live() {
      return false;
    }

    let Some(cache) = &self.cache else {
      return false;
    };

    match cache.contains(&query.cache_key()) {
      Ok(cached) => cached,
      Err(e) => {
        warn!(error = %e, "Content cache check failed");
        false
      }
    }
  }

  /// Clear the content cache. Succeeds trivially offline or without a cache.
  pub fn clear_content_cache(&self) -> Result<(), CommsError> {
    if !self.modes.content.is_live() {
      return Ok(());
    }

    match &self.cache {
      Some(cache) => cache
        .clear()
        .map_err(|e| CommsError::local(format!("Failed to clear content cache: {}", e))),
      None => Ok(()),
    }
  }

  pub async fn fetch_content(
    &self,
    query: &ContentQuery,
    use_cache: bool,
  ) -> Result<Value, CommsError> {
    self.ensure_configured(Capability::Content)?;

    if !self.modes.content.is_live() {
      let response = self.offline.fetch_content(query).await?;
      return self.parse_validated(&response, "content");
    }

    match &self.cache {
      Some(cache) => {
        let result = cache
          .fetch_page(
            &query.cache_key(),
            use_cache,
            |body| self.parser.parse(body),
            move || self.fetch_live_content(query),
          )
          .await?;
        debug!(source = ?result.source, "Content page resolved");
        Ok(result.data)
      }
      None => self.fetch_live_content(query).await,
    }
  }

  async fn fetch_live_content(&self, query: &ContentQuery) -> Result<Value, CommsError> {
    let response = self.transport(Capability::Content).fetch_content(query).await?;
    self.parse_validated(&response, "content")
  }

  // ==========================================================================
  // Message service
  // ==========================================================================

  /// Send an email. An empty reply body means the message was accepted.
  pub async fn send_message(&self, payload: &MessagePayload) -> Result<(), CommsError> {
    self.ensure_configured(Capability::Message)?;
    let response = self
      .transport(Capability::Message)
      .send_message(payload)
      .await?;

    if response.body.is_empty() {
      return Ok(());
    }

    let doc = self.parse(&response, "message send")?;

    if is_error_status(response.status) {
      if let Ok(errors) = serde_json::from_value::<ApiSendErrors>(doc) {
        if !errors.errors.is_empty() {
          return Err(CommsError::transport(response.status, errors.joined()));
        }
      }
    }

    Err(CommsError::local("Unknown error in message sending"))
  }

  // ==========================================================================
  // Social service
  // ==========================================================================

  pub async fn fetch_credential(
    &self,
    request: &CredentialRequest,
  ) -> Result<Credential, CommsError> {
    self.ensure_configured(Capability::Social)?;
    let response = self
      .transport(Capability::Social)
      .fetch_credential(request)
      .await?;

    let doc = self.parse(&response, "access token")?;

    if is_error_status(response.status) {
      return Err(CommsError::transport(
        response.status,
        "Error getting access token.",
      ));
    }

    let missing_fields = || CommsError::local("Access token response does not have the expected fields");
    let token: ApiTokenResponse = serde_json::from_value(doc).map_err(|_| missing_fields())?;

    if let Some(error) = token.error {
      return Err(if error == INVALID_GRANT {
        CommsError::local("Invalid credentials to get an access token.")
      } else {
        CommsError::local(format!("Unknown access token error: {}", error))
      });
    }

    match (token.access_token, token.expires_in) {
      (Some(token), Some(expires_in)) => Ok(Credential { token, expires_in }),
      _ => Err(missing_fields()),
    }
  }

  /// Post to the social service. Refuses to dispatch without a token.
  pub async fn post_message(&self, payload: &PostPayload) -> Result<(), CommsError> {
    self.ensure_configured(Capability::Social)?;

    if payload.token.is_none() {
      return Err(CommsError::local(
        "Trying to post with a missing access token.",
      ));
    }

    let response = self
      .transport(Capability::Social)
      .post_message(payload)
      .await?;

    if is_error_status(response.status) {
      return Err(CommsError::transport(response.status, "Error posting message."));
    }

    Ok(())
  }
}


#[cfg(test)]
mod tests {
  use super::testing::*;
  use super::*;
  use crate::cache::CacheKey;
  use crate::comms::offline::{CONTENT_FIXTURE, CREDENTIAL_FIXTURE, TAGS_FIXTURE};
  use crate::comms::types::{Content, Tag};
  use crate::comms::TransportMode;
  use crate::env::{
    MapEnvironment, CONTENT_API_KEY, MESSAGE_API_KEY, MESSAGE_SENDER, SOCIAL_CLIENT_ID,
    SOCIAL_CLIENT_SECRET,
  };
  use serde_json::json;

  fn full_env() -> MapEnvironment {
    MapEnvironment::new()
      .with(CONTENT_API_KEY, "key1")
      .with(MESSAGE_API_KEY, "mkey")
      .with(MESSAGE_SENDER, "sender@example.com")
      .with(SOCIAL_CLIENT_ID, "client")
      .with(SOCIAL_CLIENT_SECRET, "secret")
  }

  fn manager(modes: Modes, live: &Arc<RecordingTransport>, env: MapEnvironment) -> CommsManager {
    CommsManager::new(modes, live.clone(), Arc::new(env))
  }

  fn tag() -> Tag {
    Tag {
      id: "katine/football".to_string(),
      kind: "keyword".to_string(),
      title: "Football".to_string(),
      web_url: "http://www.theguardian.com/katine/football".to_string(),
      api_url: "http://beta.content.guardianapis.com/katine/football".to_string(),
    }
  }

  fn tag_query() -> TagQuery {
    TagQuery {
      query: "penguins".to_string(),
      page: 1,
      page_size: 10,
    }
  }

  fn content_query() -> ContentQuery {
    ContentQuery {
      tag: tag(),
      query: "cup".to_string(),
      page: 1,
      page_size: 10,
    }
  }

  fn item(title: &str) -> Content {
    Content {
      id: "id".to_string(),
      section_id: "football".to_string(),
      section_name: "Football".to_string(),
      published: "2014-02-17T12:05:47Z".to_string(),
      title: title.to_string(),
      web_url: String::new(),
      api_url: String::new(),
      page: 1,
      total_pages: 1,
    }
  }

  fn message() -> MessagePayload {
    MessagePayload {
      recipient: "pingu@example.com".to_string(),
      tag: tag(),
      items: vec![item("Noot noot")],
    }
  }

  fn credential_request() -> CredentialRequest {
    CredentialRequest {
      principal: "seal".to_string(),
      secret: "treat baker".to_string(),
    }
  }

  fn post(token: Option<&str>, items: Vec<Content>) -> PostPayload {
    PostPayload {
      principal: "seal".to_string(),
      token: token.map(String::from),
      tag: tag(),
      items,
    }
  }

  // ==========================================================================
  // Mode selection and configuration checks
  // ==========================================================================

  #[tokio::test]
  async fn test_offline_capabilities_skip_lookups_and_live_transport() {
    let live = Arc::new(RecordingTransport::new());
    let env = Arc::new(CountingEnvironment::new(MapEnvironment::new()));
    let comms = CommsManager::new(Modes::offline(), live.clone(), env.clone());

    comms.fetch_tags(&tag_query()).await.unwrap();
    comms.fetch_content(&content_query(), true).await.unwrap();
    comms.send_message(&message()).await.unwrap();
    comms.fetch_credential(&credential_request()).await.unwrap();
    comms
      .post_message(&post(Some("token"), vec![]))
      .await
      .unwrap();

    assert!(env.lookups().is_empty());
    assert_eq!(live.total_calls(), 0);
  }

  #[tokio::test]
  async fn test_each_offline_flag_is_independent() {
    let ops = [
      (Capability::Content, TAGS),
      (Capability::Message, SEND),
      (Capability::Social, CREDENTIAL),
    ];

    for (offline, _) in ops {
      let live = Arc::new(
        RecordingTransport::new()
          .respond(TAGS, TAGS_FIXTURE, 200)
          .respond(SEND, "", 202)
          .respond(CREDENTIAL, CREDENTIAL_FIXTURE, 200),
      );
      let env = Arc::new(CountingEnvironment::new(full_env()));
      let modes = Modes::from_flags(
        offline != Capability::Content,
        offline != Capability::Message,
        offline != Capability::Social,
      );
      let comms = CommsManager::new(modes, live.clone(), env.clone());

      comms.fetch_tags(&tag_query()).await.unwrap();
      comms.send_message(&message()).await.unwrap();
      comms.fetch_credential(&credential_request()).await.unwrap();

      let lookups = env.lookups();
      for (capability, op) in ops {
        let touched = capability
          .required_keys()
          .iter()
          .any(|key| lookups.iter().any(|k| k == key));
        if capability == offline {
          assert!(!touched, "{:?} offline looked up its keys", offline);
          assert_eq!(live.calls(op), 0, "{:?} offline reached live {}", offline, op);
        } else {
          assert!(touched, "{:?} live skipped its key check", capability);
          assert_eq!(live.calls(op), 1, "{:?} live missed {}", capability, op);
        }
      }
    }
  }

  #[tokio::test]
  async fn test_missing_key_fails_without_dispatch() {
    let live = Arc::new(RecordingTransport::new().respond(TAGS, TAGS_FIXTURE, 200));
    let comms = manager(Modes::from_flags(true, true, true), &live, MapEnvironment::new());

    let err = comms.fetch_tags(&tag_query()).await.unwrap_err();
    assert_eq!(
      err,
      CommsError::local("Required environment variable INPUT_API_KEY is missing.")
    );

    let err = comms.send_message(&message()).await.unwrap_err();
    assert_eq!(err.message(), "Required environment variable SENDGRID_API_KEY is missing.");

    let env = MapEnvironment::new().with(MESSAGE_API_KEY, "mkey");
    let comms = manager(Modes::from_flags(false, true, false), &live, env);
    let err = comms.send_message(&message()).await.unwrap_err();
    assert_eq!(err.message(), "Required environment variable SENDGRID_API_EMAIL is missing.");

    let env = MapEnvironment::new().with(SOCIAL_CLIENT_ID, "client");
    let comms = manager(Modes::from_flags(false, false, true), &live, env);
    let err = comms
      .fetch_credential(&credential_request())
      .await
      .unwrap_err();
    assert_eq!(err.message(), "Required environment variable REDDIT_API_SECRET is missing.");

    assert_eq!(live.total_calls(), 0);
  }

  #[tokio::test]
  async fn test_set_modes_switches_transport() {
    let live = Arc::new(RecordingTransport::new().respond(TAGS, TAGS_FIXTURE, 200));
    let mut comms = manager(Modes::offline(), &live, full_env());

    comms.fetch_tags(&tag_query()).await.unwrap();
    assert_eq!(live.calls(TAGS), 0);

    comms.set_modes(Modes::new(TransportMode::Live, TransportMode::Offline, TransportMode::Offline));
    comms.fetch_tags(&tag_query()).await.unwrap();
    assert_eq!(live.calls(TAGS), 1);
  }

  // ==========================================================================
  // Tags
  // ==========================================================================

  #[tokio::test]
  async fn test_live_tag_search_returns_parsed_document() {
    let live = Arc::new(RecordingTransport::new().respond(TAGS, TAGS_FIXTURE, 200));
    let env = MapEnvironment::new().with(CONTENT_API_KEY, "key1");
    let comms = manager(Modes::from_flags(true, false, false), &live, env);

    let doc = comms.fetch_tags(&tag_query()).await.unwrap();

    assert_eq!(live.calls(TAGS), 1);
    let results = doc.pointer("/response/results").unwrap().as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["id"], "katine/football");
  }

  #[tokio::test]
  async fn test_tag_error_status_uses_body_message() {
    let live = Arc::new(RecordingTransport::new().respond(
      TAGS,
      r#"{"response": {"status": "error", "message": "requested page is beyond the number of available pages"}}"#,
      400,
    ));
    let comms = manager(Modes::from_flags(true, false, false), &live, full_env());

    let err = comms.fetch_tags(&tag_query()).await.unwrap_err();
    assert_eq!(
      err,
      CommsError::transport(400, "requested page is beyond the number of available pages")
    );
  }

  #[tokio::test]
  async fn test_tag_error_status_without_message_is_generic() {
    let live = Arc::new(RecordingTransport::new().respond(TAGS, r#"{"oops": 1}"#, 503));
    let comms = manager(Modes::from_flags(true, false, false), &live, full_env());

    let err = comms.fetch_tags(&tag_query()).await.unwrap_err();
    assert_eq!(err.code(), 503);
    assert_eq!(err.message(), "Request failed with status 503");
  }

  #[tokio::test]
  async fn test_unparsable_tags_is_local_even_with_error_status() {
    let live = Arc::new(RecordingTransport::new().respond(TAGS, "<html>bad gateway</html>", 502));
    let comms = manager(Modes::from_flags(true, false, false), &live, full_env());

    let err = comms.fetch_tags(&tag_query()).await.unwrap_err();
    assert_eq!(err.code(), -1);
    assert!(err.message().starts_with("Unparsable tags response"));
  }

  #[tokio::test]
  async fn test_transport_failure_propagates_as_local() {
    // No scripted response: the fake fails like a dropped connection
    let live = Arc::new(RecordingTransport::new());
    let comms = manager(Modes::from_flags(true, false, false), &live, full_env());

    let err = comms.fetch_tags(&tag_query()).await.unwrap_err();
    assert_eq!(err.code(), -1);
  }

  // ==========================================================================
  // Content and cache policy
  // ==========================================================================

  fn cached_manager(live: &Arc<RecordingTransport>, store: &Arc<MemoryStore>) -> CommsManager {
    manager(Modes::from_flags(true, false, false), live, full_env())
      .with_cache(CacheLayer::from_shared(store.clone()))
  }

  #[tokio::test]
  async fn test_cache_miss_fetches_once_and_stores_once() {
    let live = Arc::new(RecordingTransport::new().respond(CONTENT, CONTENT_FIXTURE, 200));
    let store = Arc::new(MemoryStore::default());
    let comms = cached_manager(&live, &store);

    let doc = comms.fetch_content(&content_query(), true).await.unwrap();

    assert_eq!(live.calls(CONTENT), 1);
    let puts = store.puts();
    assert_eq!(puts.len(), 1);
    assert_eq!(puts[0].0, CacheKey::new("katine/football", "cup", 1));
    let stored: Value = serde_json::from_str(&puts[0].1).unwrap();
    assert_eq!(stored, doc);
  }

  #[tokio::test]
  async fn test_cache_hit_skips_fetch_and_store() {
    let cached = r#"{"response": {"currentPage": 1, "pages": 1, "results": []}}"#;
    let live = Arc::new(RecordingTransport::new().respond(CONTENT, CONTENT_FIXTURE, 200));
    let store = Arc::new(
      MemoryStore::default().with_entry(CacheKey::new("katine/football", "cup", 1), cached),
    );
    let comms = cached_manager(&live, &store);

    let doc = comms.fetch_content(&content_query(), true).await.unwrap();

    assert_eq!(live.total_calls(), 0);
    assert!(store.puts().is_empty());
    assert_eq!(doc, serde_json::from_str::<Value>(cached).unwrap());
  }

  #[tokio::test]
  async fn test_cache_failure_is_local_and_skips_fetch() {
    let live = Arc::new(RecordingTransport::new().respond(CONTENT, CONTENT_FIXTURE, 200));
    let store = Arc::new(MemoryStore {
      fail_get: true,
      ..Default::default()
    });
    let comms = cached_manager(&live, &store);

    let err = comms.fetch_content(&content_query(), true).await.unwrap_err();

    assert_eq!(err.code(), -1);
    assert!(err.message().contains("Critical cache failure"));
    assert_eq!(live.total_calls(), 0);
  }

  #[tokio::test]
  async fn test_unparsable_cached_value_is_local() {
    let live = Arc::new(RecordingTransport::new().respond(CONTENT, CONTENT_FIXTURE, 200));
    let store = Arc::new(
      MemoryStore::default().with_entry(CacheKey::new("katine/football", "cup", 1), "garbage"),
    );
    let comms = cached_manager(&live, &store);

    let err = comms.fetch_content(&content_query(), true).await.unwrap_err();

    assert_eq!(err, CommsError::local("Cached content could not be parsed."));
    assert_eq!(live.total_calls(), 0);
  }

  #[tokio::test]
  async fn test_uncached_live_fetch_still_warms_cache() {
    let live = Arc::new(RecordingTransport::new().respond(CONTENT, CONTENT_FIXTURE, 200));
    let store = Arc::new(MemoryStore::default());
    let comms = cached_manager(&live, &store);

    comms.fetch_content(&content_query(), false).await.unwrap();

    assert_eq!(store.gets(), 0);
    assert_eq!(store.puts().len(), 1);
    assert!(comms.is_content_cached(&content_query()));
  }

  #[tokio::test]
  async fn test_cache_write_failure_surfaces() {
    let live = Arc::new(RecordingTransport::new().respond(CONTENT, CONTENT_FIXTURE, 200));
    let store = Arc::new(MemoryStore {
      fail_put: true,
      ..Default::default()
    });
    let comms = cached_manager(&live, &store);

    let err = comms.fetch_content(&content_query(), false).await.unwrap_err();
    assert_eq!(err.code(), -1);
    assert_eq!(live.calls(CONTENT), 1);
  }

  #[tokio::test]
  async fn test_content_error_status_is_not_cached() {
    let live = Arc::new(RecordingTransport::new().respond(
      CONTENT,
      r#"{"message": "Unauthorized"}"#,
      401,
    ));
    let store = Arc::new(MemoryStore::default());
    let comms = cached_manager(&live, &store);

    let err = comms.fetch_content(&content_query(), true).await.unwrap_err();
    assert_eq!(err, CommsError::transport(401, "Unauthorized"));
    assert!(store.puts().is_empty());
  }

  #[tokio::test]
  async fn test_offline_content_never_touches_cache() {
    let live = Arc::new(RecordingTransport::new());
    let store = Arc::new(MemoryStore {
      fail_get: true,
      fail_put: true,
      ..Default::default()
    });
    let comms = manager(Modes::offline(), &live, MapEnvironment::new())
      .with_cache(CacheLayer::from_shared(store.clone()));

    let doc = comms.fetch_content(&content_query(), true).await.unwrap();

    assert_eq!(doc.pointer("/response/pages"), Some(&json!(1)));
    assert_eq!(store.gets(), 0);
    assert!(store.puts().is_empty());
    assert!(!comms.is_content_cached(&content_query()));
  }

  #[tokio::test]
  async fn test_content_without_cache_fetches_live() {
    let live = Arc::new(RecordingTransport::new().respond(CONTENT, CONTENT_FIXTURE, 200));
    let comms = manager(Modes::from_flags(true, false, false), &live, full_env());

    comms.fetch_content(&content_query(), true).await.unwrap();
    comms.fetch_content(&content_query(), true).await.unwrap();

    assert_eq!(live.calls(CONTENT), 2);
    assert!(!comms.is_content_cached(&content_query()));
  }

  #[test]
  fn test_is_content_cached_swallows_store_failure() {
    let live = Arc::new(RecordingTransport::new());
    let store = Arc::new(MemoryStore {
      fail_get: true,
      ..Default::default()
    });
    let comms = cached_manager(&live, &store);
    assert!(!comms.is_content_cached(&content_query()));
  }

  #[test]
  fn test_clear_content_cache() {
    let live = Arc::new(RecordingTransport::new());
    let store = Arc::new(MemoryStore::default().with_entry(CacheKey::new("t", "q", 1), "{}"));
    let comms = cached_manager(&live, &store);

    comms.clear_content_cache().unwrap();
    assert_eq!(store.len(), 0);

    let failing = Arc::new(MemoryStore {
      fail_clear: true,
      ..Default::default()
    });
    assert_eq!(cached_manager(&live, &failing).clear_content_cache().unwrap_err().code(), -1);

    // Offline never touches the store
    let offline = manager(Modes::offline(), &live, full_env())
      .with_cache(CacheLayer::from_shared(failing.clone()));
    assert!(offline.clear_content_cache().is_ok());
  }

  // ==========================================================================
  // Message sending
  // ==========================================================================

  #[tokio::test]
  async fn test_send_empty_body_is_success_without_parsing() {
    let live = Arc::new(RecordingTransport::new().respond(SEND, "", 202));
    let parser = Arc::new(CountingParser::default());
    let comms = manager(Modes::from_flags(false, true, false), &live, full_env())
      .with_parser(parser.clone());

    comms.send_message(&message()).await.unwrap();

    assert_eq!(live.calls(SEND), 1);
    assert_eq!(parser.calls(), 0);
  }

  #[tokio::test]
  async fn test_send_error_list_is_joined() {
    let body = r#"{
      "errors": [
        {"message": "The from address does not match a verified Sender Identity.", "field": "from"},
        {"message": "Access forbidden", "field": null, "help": null}
      ]
    }"#;
    let live = Arc::new(RecordingTransport::new().respond(SEND, body, 400));
    let comms = manager(Modes::from_flags(false, true, false), &live, full_env());

    let err = comms.send_message(&message()).await.unwrap_err();

    assert_eq!(
      err,
      CommsError::transport(
        400,
        "Problem with field from; The from address does not match a verified Sender Identity., Access forbidden"
      )
    );
  }

  #[tokio::test]
  async fn test_send_unrecognized_body_is_unknown_error() {
    let live = Arc::new(RecordingTransport::new().respond(SEND, r#"{"status": "queued"}"#, 200));
    let comms = manager(Modes::from_flags(false, true, false), &live, full_env());
    let err = comms.send_message(&message()).await.unwrap_err();
    assert_eq!(err, CommsError::local("Unknown error in message sending"));

    let live = Arc::new(RecordingTransport::new().respond(SEND, r#"{"detail": "nope"}"#, 500));
    let comms = manager(Modes::from_flags(false, true, false), &live, full_env());
    let err = comms.send_message(&message()).await.unwrap_err();
    assert_eq!(err, CommsError::local("Unknown error in message sending"));
  }

  #[tokio::test]
  async fn test_send_unparsable_body_is_local() {
    let live = Arc::new(RecordingTransport::new().respond(SEND, "Bad Request", 400));
    let comms = manager(Modes::from_flags(false, true, false), &live, full_env());
    let err = comms.send_message(&message()).await.unwrap_err();
    assert_eq!(err.code(), -1);
    assert!(err.message().starts_with("Unparsable message send response"));
  }

  // ==========================================================================
  // Credentials
  // ==========================================================================

  #[tokio::test]
  async fn test_credential_success() {
    let live = Arc::new(RecordingTransport::new().respond(CREDENTIAL, CREDENTIAL_FIXTURE, 200));
    let comms = manager(Modes::from_flags(false, false, true), &live, full_env());

    let credential = comms.fetch_credential(&credential_request()).await.unwrap();
    assert_eq!(
      credential,
      Credential {
        token: "pingu's key".to_string(),
        expires_in: 86400
      }
    );
  }

  #[tokio::test]
  async fn test_credential_invalid_grant() {
    let live = Arc::new(RecordingTransport::new().respond(
      CREDENTIAL,
      r#"{"error": "invalid_grant"}"#,
      200,
    ));
    let comms = manager(Modes::from_flags(false, false, true), &live, full_env());

    let err = comms.fetch_credential(&credential_request()).await.unwrap_err();
    assert_eq!(err, CommsError::local("Invalid credentials to get an access token."));
  }

  #[tokio::test]
  async fn test_credential_other_error_field() {
    let live = Arc::new(RecordingTransport::new().respond(
      CREDENTIAL,
      r#"{"error": "unsupported_grant_type"}"#,
      200,
    ));
    let comms = manager(Modes::from_flags(false, false, true), &live, full_env());

    let err = comms.fetch_credential(&credential_request()).await.unwrap_err();
    assert_eq!(err.code(), -1);
    assert!(err.message().starts_with("Unknown access token error"));
  }

  #[tokio::test]
  async fn test_credential_error_status() {
    let live = Arc::new(RecordingTransport::new().respond(
      CREDENTIAL,
      r#"{"message": "Unauthorized", "error": 401}"#,
      401,
    ));
    let comms = manager(Modes::from_flags(false, false, true), &live, full_env());

    let err = comms.fetch_credential(&credential_request()).await.unwrap_err();
    assert_eq!(err, CommsError::transport(401, "Error getting access token."));
  }

  #[tokio::test]
  async fn test_credential_missing_fields() {
    for body in [
      r#"{"token_type": "bearer", "expires_in": 3600}"#,
      r#"{"access_token": "abc", "token_type": "bearer"}"#,
      r#"{"access_token": 12, "expires_in": 3600}"#,
    ] {
      let live = Arc::new(RecordingTransport::new().respond(CREDENTIAL, body, 200));
      let comms = manager(Modes::from_flags(false, false, true), &live, full_env());

      let err = comms.fetch_credential(&credential_request()).await.unwrap_err();
      assert_eq!(
        err,
        CommsError::local("Access token response does not have the expected fields"),
        "body: {}",
        body
      );
    }
  }

  // ==========================================================================
  // Posting
  // ==========================================================================

  #[tokio::test]
  async fn test_post_without_token_never_dispatches() {
    let live = Arc::new(RecordingTransport::new().respond(POST, "", 200));
    let offline = Arc::new(RecordingTransport::new().respond(POST, "", 200));

    for modes in [Modes::from_flags(false, false, true), Modes::offline()] {
      let comms = manager(modes, &live, full_env()).with_offline(offline.clone());
      for items in [vec![], vec![item("One")], vec![item("One"), item("Two")]] {
        let err = comms.post_message(&post(None, items)).await.unwrap_err();
        assert_eq!(err, CommsError::local("Trying to post with a missing access token."));
      }
    }

    assert_eq!(live.total_calls(), 0);
    assert_eq!(offline.total_calls(), 0);
  }

  #[tokio::test]
  async fn test_post_error_status() {
    let live = Arc::new(RecordingTransport::new().respond(POST, r#"{"message": "Forbidden"}"#, 403));
    let comms = manager(Modes::from_flags(false, false, true), &live, full_env());

    let err = comms
      .post_message(&post(Some("token"), vec![item("One")]))
      .await
      .unwrap_err();
    assert_eq!(err, CommsError::transport(403, "Error posting message."));
  }

  #[tokio::test]
  async fn test_post_success() {
    let live = Arc::new(RecordingTransport::new().respond(POST, r#"{"json": {"errors": []}}"#, 200));
    let comms = manager(Modes::from_flags(false, false, true), &live, full_env());

    comms
      .post_message(&post(Some("token"), vec![item("One")]))
      .await
      .unwrap();
    assert_eq!(live.calls(POST), 1);
  }
}
