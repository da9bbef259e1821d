//! Error taxonomy shared by every communications operation.

use thiserror::Error;

/// Code reported for failures that never reached (or came back from) a transport.
pub const LOCAL_ERROR_CODE: i32 = -1;

/// Failure of a communications operation.
///
/// `Local` covers missing configuration, unparsable payloads, missing response
/// fields, cache failures and missing credentials. `Transport` carries an
/// HTTP-style status in `400..=599` reported by the remote side.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommsError {
  #[error("{0}")]
  Local(String),

  #[error("{message}")]
  Transport { status: u16, message: String },
}

impl CommsError {
  pub fn local(message: impl Into<String>) -> Self {
    Self::Local(message.into())
  }

  pub fn transport(status: u16, message: impl Into<String>) -> Self {
    debug_assert!(is_error_status(status), "status {status} outside 400..=599");
    Self::Transport {
      status,
      message: message.into(),
    }
  }

  /// `-1` for local failures, the status for transport failures.
  pub fn code(&self) -> i32 {
    match self {
      Self::Local(_) => LOCAL_ERROR_CODE,
      Self::Transport { status, .. } => i32::from(*status),
    }
  }

  pub fn is_transport(&self) -> bool {
    matches!(self, Self::Transport { .. })
  }

  pub fn message(&self) -> &str {
    match self {
      Self::Local(message) => message,
      Self::Transport { message, .. } => message,
    }
  }
}

/// Whether a status code is reported as a transport failure.
pub fn is_error_status(status: u16) -> bool {
  (400..=599).contains(&status)
}
