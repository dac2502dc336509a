//! Push listener registry.
//!
//! Listeners are grouped by exact event name and called in registration
//! order. Dispatch works on a snapshot, so a listener may register or remove
//! listeners (including itself) without deadlocking; such changes apply from
//! the next push on.

// ============================================================================
// Imports
// ============================================================================

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde_json::Value;
use tracing::error;

use crate::identifiers::SubscriptionId;
use crate::protocol::Push;

// ============================================================================
// Types
// ============================================================================

/// Push listener callback.
///
/// Receives the push payload (`null` when absent) and the whole message.
pub type PushHandler = Arc<dyn Fn(&Value, &Push) + Send + Sync>;

/// One registration.
struct Listener {
    id: SubscriptionId,
    handler: PushHandler,
}

// ============================================================================
// ListenerRegistry
// ============================================================================

/// Event name → ordered listeners.
#[derive(Default)]
pub(crate) struct ListenerRegistry {
    listeners: RwLock<FxHashMap<String, Vec<Listener>>>,
    next_id: AtomicU64,
}

impl ListenerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a listener for `event`.
    pub fn add(&self, event: &str, handler: PushHandler) -> SubscriptionId {
        let id = SubscriptionId::new(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        self.listeners
            .write()
            .entry(event.to_string())
            .or_default()
            .push(Listener { id, handler });
        id
    }

    /// Removes listeners for `event`.
    ///
    /// With `Some(id)` only that registration is removed; with `None` every
    /// listener for the event is. Returns how many were removed.
    pub fn remove(&self, event: &str, id: Option<SubscriptionId>) -> usize {
        let mut listeners = self.listeners.write();

        let removed = match id {
            None => listeners.remove(event).map_or(0, |list| list.len()),
            Some(id) => {
                let Some(list) = listeners.get_mut(event) else {
                    return 0;
                };
                match list.iter().position(|l| l.id == id) {
                    Some(index) => {
                        list.remove(index);
                        1
                    }
                    None => 0,
                }
            }
        };

        if listeners.get(event).is_some_and(Vec::is_empty) {
            listeners.remove(event);
        }
        removed
    }

    /// Returns the number of listeners for `event`.
    pub fn count(&self, event: &str) -> usize {
        self.listeners.read().get(event).map_or(0, Vec::len)
    }

    /// Calls every listener for the push's event, in registration order.
    ///
    /// A panicking listener is logged and skipped. Returns how many
    /// listeners ran to completion.
    pub fn dispatch(&self, push: &Push) -> usize {
        let snapshot: Vec<(SubscriptionId, PushHandler)> = match self.listeners.read().get(&push.event) {
            Some(list) => list
                .iter()
                .map(|l| (l.id, Arc::clone(&l.handler)))
                .collect(),
            None => return 0,
        };

        let data = push.data_or_null();
        let mut completed = 0;

        for (id, handler) in snapshot {
            match catch_unwind(AssertUnwindSafe(|| handler(data, push))) {
                Ok(()) => completed += 1,
                Err(payload) => {
                    error!(
                        event = %push.event,
                        subscription = %id,
                        panic = %panic_message(payload.as_ref()),
                        "Push listener panicked"
                    );
                }
            }
        }

        completed
    }
}

/// Extracts a readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

// ============================================================================
// Tests
// ============================================================================
