//! Social credential acquisition and expiry.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::observer::ObserverBus;
use super::runtime::{RuntimeKey, RuntimeState, TokenState, INVALIDATED};
use super::sleep::Sleeper;
use crate::comms::{CommsError, CommsManager, CredentialRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPhase {
  Unauthenticated,
  Authenticating,
  Authenticated,
  /// The expiry broadcast is in progress
  Invalidating,
}

/// State shared with the expiry watcher task.
struct Shared {
  runtime: Arc<RuntimeState>,
  bus: ObserverBus,
  phase: Mutex<AuthPhase>,
  /// Bumped for every stored credential; a watcher only acts on its own
  generation: AtomicU64,
  /// Serializes token writes with the invalidation sequence
  sequence: Mutex<()>,
}

impl Shared {
  fn set_phase(&self, phase: AuthPhase) {
    *self.phase.lock().unwrap_or_else(PoisonError::into_inner) = phase;
  }

  fn phase(&self) -> AuthPhase {
    *self.phase.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Settle the phase after a failed attempt from what is stored now. An
  /// expiry may have cleared the token while the attempt was in flight.
  fn settle_phase(&self) {
    let _sequence = self.sequence.lock().unwrap_or_else(PoisonError::into_inner);
    let phase = match self.runtime.token() {
      TokenState::Active(_) => AuthPhase::Authenticated,
      TokenState::Absent | TokenState::Invalidated => AuthPhase::Unauthenticated,
    };
    self.set_phase(phase);
  }

  /// Sentinel, broadcast, clear. Skipped if a newer credential was stored.
  fn invalidate(&self, generation: u64) {
    let _sequence = self.sequence.lock().unwrap_or_else(PoisonError::into_inner);

    if self.generation.load(Ordering::SeqCst) != generation {
      debug!(generation, "Stale expiry watcher, credential was replaced");
      return;
    }

    info!("Social credential expired");
    self.set_phase(AuthPhase::Invalidating);
    self.runtime.set(RuntimeKey::SocialToken, INVALIDATED);
    self.bus.broadcast();
    self.runtime.clear(RuntimeKey::SocialToken);
    self.set_phase(AuthPhase::Unauthenticated);
  }
}

struct Watcher {
  generation: u64,
  handle: JoinHandle<()>,
}

/// Credential state machine with a cancellable expiry watcher.
///
/// A successful [`authenticate`](Self::authenticate) stores the token and
/// principal in the runtime state and spawns one watcher task for the
/// credential's lifetime. Authenticating again aborts the pending watcher.
pub struct CredentialLifecycle {
  shared: Arc<Shared>,
  sleeper: Arc<dyn Sleeper>,
  watcher: Mutex<Option<Watcher>>,
}

impl CredentialLifecycle {
  pub fn new(runtime: Arc<RuntimeState>, bus: ObserverBus, sleeper: Arc<dyn Sleeper>) -> Self {
    Self {
      shared: Arc::new(Shared {
        runtime,
        bus,
        phase: Mutex::new(AuthPhase::Unauthenticated),
        generation: AtomicU64::new(0),
        sequence: Mutex::new(()),
      }),
      sleeper,
      watcher: Mutex::new(None),
    }
  }

  pub fn phase(&self) -> AuthPhase {
    self.shared.phase()
  }

  pub fn runtime(&self) -> &Arc<RuntimeState> {
    &self.shared.runtime
  }

  /// Exchange `principal`/`secret` for a credential and start its watcher.
  ///
  /// On failure any previously stored credential is left untouched and the
  /// phase reflects whether one is still active.
  pub async fn authenticate(
    &self,
    comms: &CommsManager,
    principal: &str,
    secret: &str,
  ) -> Result<(), CommsError> {
    self.shared.set_phase(AuthPhase::Authenticating);

    let request = CredentialRequest {
      principal: principal.to_string(),
      secret: secret.to_string(),
    };

    let credential = match comms.fetch_credential(&request).await {
      Ok(credential) => credential,
      Err(e) => {
        self.shared.settle_phase();
        return Err(e);
      }
    };

    let generation = {
      let _sequence = self
        .shared
        .sequence
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
      let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
      self
        .shared
        .runtime
        .set(RuntimeKey::SocialToken, credential.token);
      self.shared.runtime.set(RuntimeKey::SocialPrincipal, principal);
      self.shared.set_phase(AuthPhase::Authenticated);
      generation
    };

    info!(principal, expires_in = credential.expires_in, "Authenticated with social service");
    self.spawn_watcher(generation, Duration::from_secs(credential.expires_in));
    Ok(())
  }

  fn spawn_watcher(&self, generation: u64, lifetime: Duration) {
    let shared = Arc::clone(&self.shared);
    let sleeper = Arc::clone(&self.sleeper);

    let handle = tokio::spawn(async move {
      if !sleeper.sleep(lifetime).await {
        warn!(generation, "Expiry sleep ended early, invalidating anyway");
      }
      // Listeners run under the sequence lock, off the async workers
      let invalidation = tokio::task::spawn_blocking(move || shared.invalidate(generation));
      if let Err(e) = invalidation.await {
        warn!(error = %e, "Expiry invalidation failed");
      }
    });

    let previous = self
      .watcher
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .replace(Watcher { generation, handle });

    if let Some(stale) = previous {
      debug!(generation = stale.generation, "Cancelling previous expiry watcher");
      stale.handle.abort();
    }
  }

  /// Wait for the pending watcher, if any, to finish.
  pub async fn join_watcher(&self) {
    let watcher = self
      .watcher
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .take();

    if let Some(watcher) = watcher {
      if let Err(e) = watcher.handle.await {
        if !e.is_cancelled() {
          warn!(error = %e, "Expiry watcher failed");
        }
      }
    }
  }

  /// Abort the pending watcher. The stored credential stays in place.
  pub fn shutdown(&self) {
    let watcher = self
      .watcher
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .take();

    if let Some(watcher) = watcher {
      debug!(generation = watcher.generation, "Aborting expiry watcher");
      watcher.handle.abort();
    }
  }
}

impl Drop for CredentialLifecycle {
  fn drop(&mut self) {
    self.shutdown();
  }
}
