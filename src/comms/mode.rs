//! Per-capability choice between the live and offline transports.

use serde::Deserialize;

use crate::env::{
  CONTENT_API_KEY, MESSAGE_API_KEY, MESSAGE_SENDER, SOCIAL_CLIENT_ID, SOCIAL_CLIENT_SECRET,
};

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
  /// Real network calls
  Live,
  /// Canned responses, no network
  #[default]
  Offline,
}

impl TransportMode {
  pub fn is_live(self) -> bool {
    self == Self::Live
  }
}

impl From<bool> for TransportMode {
  fn from(live: bool) -> Self {
    if live {
      Self::Live
    } else {
      Self::Offline
    }
  }
}

/// The independently switchable remote services.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
  /// Tag and content search
  Content,
  /// Email sending
  Message,
  /// Credential exchange and posting
  Social,
}

impl Capability {
  /// Environment keys that must resolve before a live request is made.
  pub fn required_keys(self) -> &'static [&'static str] {
    match self {
      Self::Content => &[CONTENT_API_KEY],
      Self::Message => &[MESSAGE_API_KEY, MESSAGE_SENDER],
      Self::Social => &[SOCIAL_CLIENT_ID, SOCIAL_CLIENT_SECRET],
    }
  }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
pub struct Modes {
  #[serde(default)]
  pub content: TransportMode,
  #[serde(default)]
  pub message: TransportMode,
  #[serde(default)]
  pub social: TransportMode,
}

impl Modes {
  pub fn new(content: TransportMode, message: TransportMode, social: TransportMode) -> Self {
    Self {
      content,
      message,
      social,
    }
  }

  /// Build from three live/offline switches (content, message, social).
  pub fn from_flags(content: bool, message: bool, social: bool) -> Self {
    Self::new(content.into(), message.into(), social.into())
  }

  pub fn offline() -> Self {
    Self::default()
  }

  pub fn mode(&self, capability: Capability) -> TransportMode {
    match capability {
      Capability::Content => self.content,
      Capability::Message => self.message,
      Capability::Social => self.social,
    }
  }
}
