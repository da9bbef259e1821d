use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::cache::CacheKey;

/// A content tag (topic). Identity is the tag id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
  pub id: String,
  pub kind: String,
  pub title: String,
  pub web_url: String,
  pub api_url: String,
}

impl Tag {
  /// Tag known only by its id, e.g. one typed on the command line.
  pub fn from_id(id: impl Into<String>) -> Self {
    let id = id.into();
    Self {
      title: id.clone(),
      id,
      kind: String::new(),
      web_url: String::new(),
      api_url: String::new(),
    }
  }
}

impl PartialEq for Tag {
  fn eq(&self, other: &Self) -> bool {
    self.id == other.id
  }
}

impl Eq for Tag {}

impl Hash for Tag {
  fn hash<H: Hasher>(&self, state: &mut H) {
    self.id.hash(state);
  }
}

impl fmt::Display for Tag {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.id)
  }
}

/// An article, together with the page of the result set it was found in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Content {
  pub id: String,
  pub section_id: String,
  pub section_name: String,
  /// Publication timestamp exactly as the service reported it
  pub published: String,
  pub title: String,
  pub web_url: String,
  pub api_url: String,
  pub page: u32,
  pub total_pages: u32,
}

impl fmt::Display for Content {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "{} - {} (published {})",
      self.title, self.section_name, self.published
    )
  }
}

/// Short-lived social service token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
  pub token: String,
  /// Lifetime in seconds
  pub expires_in: u64,
}

/// Raw reply from a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
  pub body: String,
  pub status: u16,
}

impl RawResponse {
  pub fn new(body: impl Into<String>, status: u16) -> Self {
    Self {
      body: body.into(),
      status,
    }
  }
}

// ============================================================================
// Request payloads
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagQuery {
  pub query: String,
  pub page: u32,
  pub page_size: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentQuery {
  pub tag: Tag,
  pub query: String,
  pub page: u32,
  pub page_size: u32,
}

impl ContentQuery {
  pub fn cache_key(&self) -> CacheKey {
    CacheKey::new(&self.tag.id, &self.query, self.page)
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessagePayload {
  pub recipient: String,
  pub tag: Tag,
  pub items: Vec<Content>,
}

#[derive(Clone, PartialEq, Eq)]
pub struct CredentialRequest {
  pub principal: String,
  pub secret: String,
}

impl fmt::Debug for CredentialRequest {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CredentialRequest")
      .field("principal", &self.principal)
      .field("secret", &"<redacted>")
      .finish()
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostPayload {
  pub principal: String,
  /// `None` when no valid token is held
  pub token: Option<String>,
  pub tag: Tag,
  pub items: Vec<Content>,
}
