//! Turns raw response bodies into JSON documents.

use serde_json::Value;

/// Parses a raw body into a structured document.
///
/// Returns `None` when the body is not a JSON object; callers treat that as a
/// local failure.
pub trait ResponseParser: Send + Sync {
  fn parse(&self, body: &str) -> Option<Value>;
}

/// serde_json backed parser accepting object documents only.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonResponseParser;

impl ResponseParser for JsonResponseParser {
  fn parse(&self, body: &str) -> Option<Value> {
    match serde_json::from_str::<Value>(body) {
      Ok(doc @ Value::Object(_)) => Some(doc),
      _ => None,
    }
  }
}
