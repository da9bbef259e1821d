//! Payload-free broadcast to registered listeners.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

type Listener = Arc<dyn Fn() + Send + Sync>;

/// Handle returned by [`ObserverBus::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

#[derive(Default)]
struct Registry {
  next_id: u64,
  listeners: Vec<(ObserverId, Listener)>,
}

/// Thread-safe listener registry.
///
/// Listeners carry no payload; they re-query whatever state they care about.
/// Clones share the same registry.
#[derive(Clone, Default)]
pub struct ObserverBus {
  inner: Arc<Mutex<Registry>>,
}

impl ObserverBus {
  pub fn new() -> Self {
    Self::default()
  }

  /// Listeners run synchronously on the broadcasting thread and must return
  /// quickly. The expiry broadcast holds the credential lock while they run.
  pub fn register(&self, listener: impl Fn() + Send + Sync + 'static) -> ObserverId {
    let mut registry = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
    let id = ObserverId(registry.next_id);
    registry.next_id += 1;
    registry.listeners.push((id, Arc::new(listener)));
    debug!(?id, "Observer registered");
    id
  }

  /// Returns `false` for an id that is not registered.
  pub fn unregister(&self, id: ObserverId) -> bool {
    let mut registry = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
    let before = registry.listeners.len();
    registry.listeners.retain(|(existing, _)| *existing != id);
    registry.listeners.len() != before
  }

  /// Call every listener in registration order on the current thread.
  ///
  /// The registry lock is released before any listener runs, so listeners
  /// may register or unregister without deadlocking. Such changes apply
  /// from the next broadcast.
  pub fn broadcast(&self) {
    let listeners: Vec<Listener> = {
      let registry = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
      registry
        .listeners
        .iter()
        .map(|(_, listener)| Arc::clone(listener))
        .collect()
    };

    debug!(listeners = listeners.len(), "Broadcasting");
    for listener in listeners {
      listener();
    }
  }

  pub fn len(&self) -> usize {
    self
      .inner
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .listeners
      .len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}
