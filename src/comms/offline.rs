//! Offline transport returning the same canned responses every time.

use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use super::error::CommsError;
use super::transport::{render_content_body, Transport};
use super::types::{
  ContentQuery, CredentialRequest, MessagePayload, PostPayload, RawResponse, TagQuery,
};

pub const TAGS_FIXTURE: &str = r#"{
  "response": {
    "status": "ok",
    "userTier": "free",
    "total": 65,
    "startIndex": 1,
    "pageSize": 10,
    "currentPage": 1,
    "pages": 7,
    "results": [
      {
        "id": "katine/football",
        "type": "keyword",
        "webTitle": "Football",
        "webUrl": "http://www.theguardian.com/katine/football",
        "apiUrl": "http://beta.content.guardianapis.com/katine/football",
        "sectionId": "katine",
        "sectionName": "Katine"
      }
    ]
  }
}"#;

pub const CONTENT_FIXTURE: &str = r#"{
  "response": {
    "status": "ok",
    "userTier": "free",
    "total": 1,
    "startIndex": 1,
    "pageSize": 10,
    "currentPage": 1,
    "pages": 1,
    "orderBy": "newest",
    "results": [
      {
        "id": "politics/blog/2014/feb/17/alex-salmond-speech-first-minister-scottish-independence-eu-currency-live",
        "sectionId": "politics",
        "sectionName": "Politics",
        "webPublicationDate": "2014-02-17T12:05:47Z",
        "webTitle": "Alex Salmond speech – first minister hits back over Scottish independence – live",
        "webUrl": "https://www.theguardian.com/politics/blog/2014/feb/17/alex-salmond-speech-first-minister-scottish-independence-eu-currency-live",
        "apiUrl": "https://content.guardianapis.com/politics/blog/2014/feb/17/alex-salmond-speech-first-minister-scottish-independence-eu-currency-live"
      },
      {
        "id": "politics/blog/2014/feb/17/alex-salmond-speech-first-minister-scottish-independence-eu-currency-live",
        "sectionId": "politics",
        "sectionName": "Politics",
        "webPublicationDate": "2014-02-17T12:05:47Z",
        "webTitle": "Pingu becomes President of the Antarctic; what happens next?",
        "webUrl": "https://www.youtube.com/watch?v=aYNXqKaZWR4",
        "apiUrl": "https://content.guardianapis.com/politics/blog/2014/feb/17/alex-salmond-speech-first-minister-scottish-independence-eu-currency-live"
      }
    ]
  }
}"#;

pub const CREDENTIAL_FIXTURE: &str = r#"{"access_token": "pingu's key", "token_type": "bearer", "expires_in": 86400, "scope": "*"}"#;

/// Canned-response transport with an optional artificial delay.
///
/// Never produces transport-range statuses. Sends and posts are logged
/// instead of delivered.
#[derive(Debug, Clone, Default)]
pub struct OfflineTransport {
  delay: Duration,
}

impl OfflineTransport {
  pub fn new(delay: Duration) -> Self {
    Self { delay }
  }

  async fn simulate_delay(&self) {
    if !self.delay.is_zero() {
      tokio::time::sleep(self.delay).await;
    }
  }
}

#[async_trait]
impl Transport for OfflineTransport {
  async fn fetch_tags(&self, _query: &TagQuery) -> Result<RawResponse, CommsError> {
    self.simulate_delay().await;
    Ok(RawResponse::new(TAGS_FIXTURE, 200))
  }

  async fn fetch_content(&self, _query: &ContentQuery) -> Result<RawResponse, CommsError> {
    self.simulate_delay().await;
    Ok(RawResponse::new(CONTENT_FIXTURE, 200))
  }

  async fn send_message(&self, payload: &MessagePayload) -> Result<RawResponse, CommsError> {
    self.simulate_delay().await;
    info!(
      recipient = %payload.recipient,
      body = %render_content_body(&payload.tag, &payload.items),
      "Offline message send"
    );
    Ok(RawResponse::new("", 200))
  }

  async fn fetch_credential(
    &self,
    _request: &CredentialRequest,
  ) -> Result<RawResponse, CommsError> {
    self.simulate_delay().await;
    Ok(RawResponse::new(CREDENTIAL_FIXTURE, 200))
  }

  async fn post_message(&self, payload: &PostPayload) -> Result<RawResponse, CommsError> {
    self.simulate_delay().await;
    info!(
      principal = %payload.principal,
      body = %render_content_body(&payload.tag, &payload.items),
      "Offline social post"
    );
    Ok(RawResponse::new("", 200))
  }
}
