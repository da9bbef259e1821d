//! Transport capability implemented by the live and offline drivers.

use async_trait::async_trait;

use super::error::CommsError;
use super::types::{
  Content, ContentQuery, CredentialRequest, MessagePayload, PostPayload, RawResponse, Tag,
  TagQuery,
};

/// The five remote operations.
///
/// Implementations return the body and status as received; interpreting the
/// status is the manager's job. An `Err` means the request never produced a
/// response (network failure, bad URL) and is always a local error.
#[async_trait]
pub trait Transport: Send + Sync {
  async fn fetch_tags(&self, query: &TagQuery) -> Result<RawResponse, CommsError>;

  async fn fetch_content(&self, query: &ContentQuery) -> Result<RawResponse, CommsError>;

  /// A successful send answers with an empty body.
  async fn send_message(&self, payload: &MessagePayload) -> Result<RawResponse, CommsError>;

  async fn fetch_credential(&self, request: &CredentialRequest)
    -> Result<RawResponse, CommsError>;

  async fn post_message(&self, payload: &PostPayload) -> Result<RawResponse, CommsError>;
}

/// Plain-text body used for both email and social posts.
pub fn render_content_body(tag: &Tag, items: &[Content]) -> String {
  let mut body = format!("Here are some articles for the tag {}:\n", tag.id);
  for item in items {
    body.push_str(&format!("- {} | Published {}\n", item.title, item.published));
  }
  body
}

/// Subject/title line used for both email and social posts.
pub fn render_subject(tag: &Tag) -> String {
  format!("newsrelay: Articles for tag {}", tag.id)
}
