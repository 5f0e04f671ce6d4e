//! Listener registries for event fan-out.
//!
//! Broadcast semantics: every registered callback sees every event
//! independently. This mirrors the on/off subscription surface the mobile
//! UI expects, rather than a consumable queue.

use std::sync::{
    Mutex,
    atomic::{AtomicU64, Ordering},
};

/// Token returned by a registration, used to deregister.
///
/// Closures have no usable identity in Rust, so deregistration is by token
/// rather than by callback value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Callback<E> = Box<dyn Fn(&E) + Send + Sync>;

/// A set of independent subscribers for one event type.
pub(crate) struct Listeners<E> {
    next_id: AtomicU64,
    entries: Mutex<Vec<(ListenerId, Callback<E>)>>,
}

impl<E> Listeners<E> {
    pub(crate) fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Register a callback. It will be invoked once per event until
    /// deregistered.
    pub(crate) fn register(&self, callback: impl Fn(&E) + Send + Sync + 'static) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut entries = self.entries.lock().expect("listener registry poisoned");
        entries.push((id, Box::new(callback)));
        id
    }

    /// Deregister a callback. Returns false when the token is unknown
    /// (already removed, or never registered).
    pub(crate) fn deregister(&self, id: ListenerId) -> bool {
        let mut entries = self.entries.lock().expect("listener registry poisoned");
        let before = entries.len();
        entries.retain(|(entry_id, _)| *entry_id != id);
        entries.len() != before
    }

    /// Deliver one event to every registered callback, in registration
    /// order. Callbacks run on the session task; they must be fast and must
    /// not block.
    pub(crate) fn emit(&self, event: &E) {
        let entries = self.entries.lock().expect("listener registry poisoned");
        for (_, callback) in entries.iter() {
            callback(event);
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.lock().expect("listener registry poisoned").len()
    }
}
