//! Shared runtime data written by the credential lifecycle.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// Value written into the token slot while an expiry is being broadcast.
pub const INVALIDATED: &str = "INVALIDATED";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuntimeKey {
  SocialToken,
  SocialPrincipal,
}

impl RuntimeKey {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::SocialToken => "social_token",
      Self::SocialPrincipal => "social_principal",
    }
  }
}

/// What the token slot currently holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenState {
  Absent,
  /// Expiry is being broadcast; the slot is about to be cleared
  Invalidated,
  Active(String),
}

/// Concurrent key -> string map. Every read is an independent snapshot.
#[derive(Debug, Default)]
pub struct RuntimeState {
  values: RwLock<HashMap<RuntimeKey, String>>,
}

impl RuntimeState {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn get(&self, key: RuntimeKey) -> Option<String> {
    self
      .values
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .get(&key)
      .cloned()
  }

  pub fn set(&self, key: RuntimeKey, value: impl Into<String>) {
    self
      .values
      .write()
      .unwrap_or_else(PoisonError::into_inner)
      .insert(key, value.into());
  }

  pub fn clear(&self, key: RuntimeKey) {
    self
      .values
      .write()
      .unwrap_or_else(PoisonError::into_inner)
      .remove(&key);
  }

  pub fn token(&self) -> TokenState {
    match self.get(RuntimeKey::SocialToken) {
      None => TokenState::Absent,
      Some(token) if token == INVALIDATED => TokenState::Invalidated,
      Some(token) => TokenState::Active(token),
    }
  }

  /// Token usable for posting; `None` when absent or invalidated.
  pub fn active_token(&self) -> Option<String> {
    match self.token() {
      TokenState::Active(token) => Some(token),
      _ => None,
    }
  }

  /// Copy of every populated slot, keyed by its string name.
  pub fn snapshot(&self) -> HashMap<String, String> {
    self
      .values
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .iter()
      .map(|(key, value)| (key.as_str().to_string(), value.clone()))
      .collect()
  }
}
