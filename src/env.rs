//! Environment lookup for API keys and other secrets.

use std::collections::HashMap;

/// Content service API key.
pub const CONTENT_API_KEY: &str = "INPUT_API_KEY";
/// Message service API key.
pub const MESSAGE_API_KEY: &str = "SENDGRID_API_KEY";
/// Sender address used by the message service.
pub const MESSAGE_SENDER: &str = "SENDGRID_API_EMAIL";
/// Social service OAuth client id.
pub const SOCIAL_CLIENT_ID: &str = "REDDIT_API_CLIENT";
/// Social service OAuth client secret.
pub const SOCIAL_CLIENT_SECRET: &str = "REDDIT_API_SECRET";
/// Password for the `post` command; never taken on the command line.
pub const SOCIAL_PASSWORD: &str = "NEWSRELAY_SOCIAL_PASSWORD";

/// Key -> value lookup. Absent keys are `None`, never an error.
pub trait Environment: Send + Sync {
  fn lookup(&self, key: &str) -> Option<String>;
}

/// Reads from the process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnvironment;

impl Environment for ProcessEnvironment {
  fn lookup(&self, key: &str) -> Option<String> {
    std::env::var(key).ok()
  }
}

/// Fixed set of values, for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct MapEnvironment {
  values: HashMap<String, String>,
}

impl MapEnvironment {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with(mut self, key: &str, value: &str) -> Self {
    self.values.insert(key.to_string(), value.to_string());
    self
  }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MapEnvironment {
  fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
    Self {
      values: iter
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect(),
    }
  }
}

impl Environment for MapEnvironment {
  fn lookup(&self, key: &str) -> Option<String> {
    self.values.get(key).cloned()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_map_environment_lookup() {
    let env = MapEnvironment::new().with(CONTENT_API_KEY, "key1");
    assert_eq!(env.lookup(CONTENT_API_KEY).as_deref(), Some("key1"));
    assert_eq!(env.lookup(MESSAGE_API_KEY), None);
  }

  #[test]
  fn test_map_environment_from_iter() {
    let env: MapEnvironment = [(SOCIAL_CLIENT_ID, "id"), (SOCIAL_CLIENT_SECRET, "secret")]
      .into_iter()
      .collect();
    assert_eq!(env.lookup(SOCIAL_CLIENT_SECRET).as_deref(), Some("secret"));
  }
}
