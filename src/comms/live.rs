use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use reqwest::Client;
use serde_json::json;
use tracing::debug;
use url::Url;

use super::error::CommsError;
use super::transport::{render_content_body, render_subject, Transport};
use super::types::{
  ContentQuery, CredentialRequest, MessagePayload, PostPayload, RawResponse, TagQuery,
};
use crate::config::Endpoints;
use crate::env::{
  Environment, CONTENT_API_KEY, MESSAGE_API_KEY, MESSAGE_SENDER, SOCIAL_CLIENT_ID,
  SOCIAL_CLIENT_SECRET,
};

const USER_AGENT: &str = concat!("newsrelay/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Network transport talking to the real content, message and social services.
#[derive(Clone)]
pub struct LiveTransport {
  client: Client,
  endpoints: Endpoints,
  env: Arc<dyn Environment>,
}

impl LiveTransport {
  pub fn new(endpoints: Endpoints, env: Arc<dyn Environment>) -> Result<Self> {
    let client = Client::builder()
      .user_agent(USER_AGENT)
      .timeout(REQUEST_TIMEOUT)
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      client,
      endpoints,
      env,
    })
  }

  fn require(&self, key: &str) -> Result<String, CommsError> {
    self
      .env
      .lookup(key)
      .ok_or_else(|| CommsError::local(format!("Required environment variable {} is missing.", key)))
  }

  /// Read status and body; the body is kept even for error statuses.
  async fn read(response: reqwest::Response) -> Result<RawResponse, CommsError> {
    let status = response.status().as_u16();
    let body = response
      .text()
      .await
      .map_err(|e| CommsError::local(format!("Failed to read response body: {}", e)))?;
    debug!(status, bytes = body.len(), "Received response");
    Ok(RawResponse { body, status })
  }

  async fn content_get(&self, path: &str, params: &[(&str, String)]) -> Result<RawResponse, CommsError> {
    let api_key = self.require(CONTENT_API_KEY)?;
    let mut query: Vec<(&str, String)> = vec![("api-key", api_key), ("format", "json".to_string())];
    query.extend(params.iter().cloned());

    let url = build_url(&self.endpoints.content, path, &query)?;
    debug!(path, "Content service request");

    let response = self
      .client
      .get(url)
      .send()
      .await
      .map_err(|e| CommsError::local(format!("Content request failed: {}", e)))?;

    Self::read(response).await
  }
}

/// Join a base URL and path, then append query parameters (percent-encoded).
pub fn build_url(base: &str, path: &str, params: &[(&str, String)]) -> Result<Url, CommsError> {
  let joined = format!("{}{}", base.trim_end_matches('/'), path);
  let url = if params.is_empty() {
    Url::parse(&joined)
  } else {
    Url::parse_with_params(&joined, params.iter().map(|(k, v)| (*k, v.as_str())))
  };
  url.map_err(|e| CommsError::local(format!("Invalid URL {}: {}", joined, e)))
}

#[async_trait]
impl Transport for LiveTransport {
  async fn fetch_tags(&self, query: &TagQuery) -> Result<RawResponse, CommsError> {
    self
      .content_get(
        "/tags",
        &[
          ("q", query.query.clone()),
          ("page", query.page.to_string()),
          ("page-size", query.page_size.to_string()),
        ],
      )
      .await
  }

  async fn fetch_content(&self, query: &ContentQuery) -> Result<RawResponse, CommsError> {
    self
      .content_get(
        "/search",
        &[
          ("q", query.query.clone()),
          ("tag", query.tag.id.clone()),
          ("page", query.page.to_string()),
          ("page-size", query.page_size.to_string()),
        ],
      )
      .await
  }

  async fn send_message(&self, payload: &MessagePayload) -> Result<RawResponse, CommsError> {
    let api_key = self.require(MESSAGE_API_KEY)?;
    let sender = self.require(MESSAGE_SENDER)?;

    let body = json!({
      "personalizations": [{ "to": [{ "email": payload.recipient }] }],
      "from": { "email": sender },
      "subject": render_subject(&payload.tag),
      "content": [{
        "type": "text/plain",
        "value": render_content_body(&payload.tag, &payload.items)
      }]
    });

    let url = build_url(&self.endpoints.message, "/v3/mail/send", &[])?;
    debug!(recipient = %payload.recipient, items = payload.items.len(), "Message send request");

    let response = self
      .client
      .post(url)
      .bearer_auth(api_key)
      .header(reqwest::header::CONTENT_TYPE, "application/json")
      .body(body.to_string())
      .send()
      .await
      .map_err(|e| CommsError::local(format!("Message request failed: {}", e)))?;

    Self::read(response).await
  }

  async fn fetch_credential(
    &self,
    request: &CredentialRequest,
  ) -> Result<RawResponse, CommsError> {
    let client_id = self.require(SOCIAL_CLIENT_ID)?;
    let client_secret = self.require(SOCIAL_CLIENT_SECRET)?;

    let url = build_url(&self.endpoints.social_auth, "/api/v1/access_token", &[])?;
    debug!(principal = %request.principal, "Access token request");

    let response = self
      .client
      .post(url)
      .basic_auth(client_id, Some(client_secret))
      .form(&[
        ("grant_type", "password"),
        ("username", request.principal.as_str()),
        ("password", request.secret.as_str()),
      ])
      .send()
      .await
      .map_err(|e| CommsError::local(format!("Access token request failed: {}", e)))?;

    Self::read(response).await
  }

  async fn post_message(&self, payload: &PostPayload) -> Result<RawResponse, CommsError> {
    let token = payload
      .token
      .as_deref()
      .ok_or_else(|| CommsError::local("Trying to post with a missing access token."))?;

    let url = build_url(&self.endpoints.social_api, "/api/submit", &[])?;
    let subreddit = format!("u_{}", payload.principal);
    let title = render_subject(&payload.tag);
    let text = render_content_body(&payload.tag, &payload.items);
    debug!(principal = %payload.principal, items = payload.items.len(), "Social post request");

    let response = self
      .client
      .post(url)
      .bearer_auth(token)
      .form(&[
        ("title", title.as_str()),
        ("sr", subreddit.as_str()),
        ("text", text.as_str()),
        ("kind", "self"),
      ])
      .send()
      .await
      .map_err(|e| CommsError::local(format!("Post request failed: {}", e)))?;

    Self::read(response).await
  }
}
