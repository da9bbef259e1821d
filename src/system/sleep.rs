use std::time::Duration;

use async_trait::async_trait;

/// Duration sleep used by the credential expiry watcher.
#[async_trait]
pub trait Sleeper: Send + Sync {
  /// Returns `false` if the sleep ended early.
  async fn sleep(&self, duration: Duration) -> bool;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
  async fn sleep(&self, duration: Duration) -> bool {
    tokio::time::sleep(duration).await;
    true
  }
}
