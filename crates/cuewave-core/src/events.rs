//! Outbound notifications and scoped listener registration
//!
//! Listeners are plain closures. Registering one returns a [`Subscription`]
//! guard; dropping the guard unregisters the listener, so a caller that
//! subscribes on mount only has to keep the guard alive for as long as it
//! wants callbacks.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, Weak};

use crate::engine::EngineState;
use crate::region::Region;

/// Notifications emitted by the waveform engine
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Real audio finished loading
    Ready { duration: f64 },
    /// Playback started or stopped (real or synthetic)
    PlayStateChanged(bool),
    /// Playback position moved (seconds)
    TimeUpdate(f64),
    /// The source could not be loaded; the synthetic waveform is shown
    LoadError { reason: String },
    RegionAdded(Region),
    RegionUpdated(Region),
    RegionDeleted(String),
    /// The state machine moved to a new state
    StateChanged(EngineState),
}

type Callback<E> = Arc<dyn Fn(&E) + Send + Sync>;

struct Registry<E> {
    next_id: AtomicU64,
    entries: RwLock<Vec<(u64, Callback<E>)>>,
}

/// A set of listeners for events of type `E`
pub struct Listeners<E> {
    registry: Arc<Registry<E>>,
}

/// Clones share the same set of listeners
impl<E> Clone for Listeners<E> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<E> Default for Listeners<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Listeners<E> {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Registry {
                next_id: AtomicU64::new(1),
                entries: RwLock::new(Vec::new()),
            }),
        }
    }

    /// Register a listener; it stays registered until the guard is dropped
    #[must_use = "dropping the subscription unregisters the listener immediately"]
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&E) + Send + Sync + 'static,
        E: 'static,
    {
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
        self.registry
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(listener)));

        let weak: Weak<Registry<E>> = Arc::downgrade(&self.registry);
        Subscription {
            id,
            release: Some(Box::new(move |id| {
                if let Some(registry) = weak.upgrade() {
                    registry
                        .entries
                        .write()
                        .unwrap_or_else(PoisonError::into_inner)
                        .retain(|(entry_id, _)| *entry_id != id);
                }
            })),
        }
    }

    /// Deliver an event to every registered listener
    ///
    /// The listener list is snapshotted first, so a listener may drop its own
    /// subscription from inside the callback.
    pub fn emit(&self, event: &E) {
        let snapshot: Vec<Callback<E>> = self
            .registry
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();
        for callback in snapshot {
            callback(event);
        }
    }

    pub fn len(&self) -> usize {
        self.registry
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Unregister everything (outstanding guards become no-ops)
    pub fn clear(&self) {
        self.registry
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

/// Guard for a registered listener
pub struct Subscription {
    id: u64,
    release: Option<Box<dyn FnOnce(u64) + Send + Sync>>,
}

impl Subscription {
    /// Unregister now (same as dropping the guard)
    pub fn cancel(mut self) {
        self.release_now();
    }

    fn release_now(&mut self) {
        if let Some(release) = self.release.take() {
            release(self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release_now();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.release.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_emit_reaches_all_listeners() {
        let listeners = Listeners::<u32>::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let a = Arc::clone(&seen);
        let _sub_a = listeners.subscribe(move |v| a.lock().unwrap().push(("a", *v)));
        let b = Arc::clone(&seen);
        let _sub_b = listeners.subscribe(move |v| b.lock().unwrap().push(("b", *v)));

        listeners.emit(&7);
        assert_eq!(*seen.lock().unwrap(), vec![("a", 7), ("b", 7)]);
    }

    #[test]
    fn test_drop_unsubscribes() {
        let listeners = Listeners::<u32>::new();
        let count = Arc::new(Mutex::new(0));
        let c = Arc::clone(&count);
        let sub = listeners.subscribe(move |_| *c.lock().unwrap() += 1);

        listeners.emit(&1);
        drop(sub);
        listeners.emit(&2);

        assert_eq!(*count.lock().unwrap(), 1);
        assert!(listeners.is_empty());
    }

    #[test]
    fn test_guard_outliving_registry_is_harmless() {
        let listeners = Listeners::<u32>::new();
        let sub = listeners.subscribe(|_| {});
        drop(listeners);
        sub.cancel();
    }
}
