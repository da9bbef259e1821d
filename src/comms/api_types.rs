//! Serde-deserializable types matching the remote service responses.
//!
//! These types are separate from domain types to allow clean deserialization
//! while keeping domain types focused on application needs.

use serde::Deserialize;
use serde_json::Value;

use super::types::{Content, Tag};

// ============================================================================
// Content service: tags endpoint
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiTag {
  pub id: String,
  #[serde(rename = "type")]
  pub kind: String,
  #[serde(rename = "webTitle")]
  pub web_title: String,
  #[serde(rename = "webUrl")]
  pub web_url: String,
  #[serde(rename = "apiUrl")]
  pub api_url: String,
}

impl From<ApiTag> for Tag {
  fn from(t: ApiTag) -> Self {
    Tag {
      id: t.id,
      kind: t.kind,
      title: t.web_title,
      web_url: t.web_url,
      api_url: t.api_url,
    }
  }
}

#[derive(Debug, Deserialize)]
pub struct ApiTagsBody {
  pub results: Vec<ApiTag>,
}

#[derive(Debug, Deserialize)]
pub struct ApiTagsResponse {
  pub response: ApiTagsBody,
}

impl ApiTagsResponse {
  pub fn into_tags(self) -> Vec<Tag> {
    self.response.results.into_iter().map(Tag::from).collect()
  }
}

// ============================================================================
// Content service: search endpoint
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiContent {
  pub id: String,
  #[serde(rename = "sectionId")]
  pub section_id: String,
  #[serde(rename = "sectionName")]
  pub section_name: String,
  #[serde(rename = "webPublicationDate")]
  pub web_publication_date: String,
  #[serde(rename = "webTitle")]
  pub web_title: String,
  #[serde(rename = "webUrl")]
  pub web_url: String,
  #[serde(rename = "apiUrl")]
  pub api_url: String,
}

#[derive(Debug, Deserialize)]
pub struct ApiContentBody {
  #[serde(rename = "currentPage")]
  pub current_page: u32,
  pub pages: u32,
  pub results: Vec<ApiContent>,
}

#[derive(Debug, Deserialize)]
pub struct ApiContentResponse {
  pub response: ApiContentBody,
}

impl ApiContentResponse {
  /// Flatten into content items stamped with the page they were found on.
  pub fn into_content(self) -> Vec<Content> {
    let page = self.response.current_page;
    let total_pages = self.response.pages;
    self
      .response
      .results
      .into_iter()
      .map(|c| Content {
        id: c.id,
        section_id: c.section_id,
        section_name: c.section_name,
        published: c.web_publication_date,
        title: c.web_title,
        web_url: c.web_url,
        api_url: c.api_url,
        page,
        total_pages,
      })
      .collect()
  }
}

/// Human-readable message from a content service error body, if it has one.
///
/// Errors usually arrive as `{"response": {"message": ...}}`; the gateway in
/// front of the service answers `{"message": ...}` for key problems.
pub fn content_error_message(doc: &Value) -> Option<String> {
  doc
    .pointer("/response/message")
    .or_else(|| doc.get("message"))
    .and_then(Value::as_str)
    .map(String::from)
}

// ============================================================================
// Message service: send endpoint error body
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiSendError {
  pub message: String,
  #[serde(default)]
  pub field: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApiSendErrors {
  pub errors: Vec<ApiSendError>,
}

impl ApiSendErrors {
  /// One message for the whole list, each entry prefixed by its field if any.
  pub fn joined(&self) -> String {
    self
      .errors
      .iter()
      .map(|e| match &e.field {
        Some(field) => format!("Problem with field {}; {}", field, e.message),
        None => e.message.clone(),
      })
      .collect::<Vec<_>>()
      .join(", ")
  }
}

// ============================================================================
// Social service: access token endpoint
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiTokenResponse {
  pub access_token: Option<String>,
  pub expires_in: Option<u64>,
  pub error: Option<String>,
}

/// Error value the token endpoint uses for rejected username/password pairs.
pub const INVALID_GRANT: &str = "invalid_grant";
