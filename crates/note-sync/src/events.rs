//! Event infrastructure for the sync coordinator.
//!
//! Provides `SyncEvent` for UI updates and monitoring, and `EventBus` for
//! subscriptions.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock, Weak};

use serde::Serialize;

/// Events emitted as the coordinator talks to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SyncEvent {
    /// Local notes were replaced by the server's list.
    NotesLoaded {
        /// Notes kept after skipping blank ones.
        count: usize,
    },
    /// A bulk sync stored the local snapshot on the server.
    SyncCompleted { count: usize },
    /// A bulk sync failed for a reason other than an expired session.
    SyncFailed { message: String },
    /// A single-note request (create, update, delete) failed.
    MutationFailed {
        /// Operation name: "create", "update" or "delete".
        operation: String,
        #[serde(rename = "noteId")]
        note_id: Option<String>,
        message: String,
    },
    /// The server rejected the session; pending edits were dropped.
    SessionExpired,
    LoggedOut,
}

/// Subscription handle that unsubscribes automatically when dropped.
///
/// Follows the disposer pattern: hold this value to keep receiving events,
/// drop it (or let it go out of scope) to unsubscribe.
pub struct Subscription {
    bus: Weak<EventBus>,
    id: usize,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.unsubscribe(self.id);
        }
    }
}

type Callback = Arc<dyn Fn(SyncEvent) + Send + Sync>;

/// Event bus for publishing sync events to subscribers.
///
/// Wrap in `Arc` to enable subscriptions.
pub struct EventBus {
    callbacks: RwLock<Vec<(usize, Callback)>>,
    next_id: AtomicUsize,
}

impl Default for EventBus {
    fn default() -> Self {
        Self {
            callbacks: RwLock::new(Vec::new()),
            next_id: AtomicUsize::new(0),
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let subscribers = self
            .callbacks
            .read()
            .map(|callbacks| callbacks.len())
            .unwrap_or_default();
        f.debug_struct("EventBus")
            .field("subscribers", &subscribers)
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to events. Returns `Subscription` that unsubscribes on drop.
    ///
    /// Requires `self` to be wrapped in `Arc`.
    pub fn subscribe(
        self: &Arc<Self>,
        callback: impl Fn(SyncEvent) + Send + Sync + 'static,
    ) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.callbacks
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push((id, Arc::new(callback)));
        Subscription {
            bus: Arc::downgrade(self),
            id,
        }
    }

    fn unsubscribe(&self, id: usize) {
        // try_write: Drop may run during unwinding while emit holds a read lock
        if let Ok(mut guard) = self.callbacks.try_write() {
            guard.retain(|(i, _)| *i != id);
        }
    }

    /// Emit an event to all subscribers.
    pub fn emit(&self, event: SyncEvent) {
        // Snapshot so a callback may subscribe without deadlocking
        let callbacks: Vec<_> = self
            .callbacks
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();

        for callback in callbacks {
            callback(event.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_subscribe_and_emit() {
        let bus = Arc::new(EventBus::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let _sub = bus.subscribe(move |e| sink.lock().unwrap().push(e));

        bus.emit(SyncEvent::SyncCompleted { count: 3 });
        bus.emit(SyncEvent::SessionExpired);

        assert_eq!(
            *seen.lock().unwrap(),
            vec![SyncEvent::SyncCompleted { count: 3 }, SyncEvent::SessionExpired]
        );
    }

    #[test]
    fn test_drop_unsubscribes() {
        let bus = Arc::new(EventBus::new());
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let sub = bus.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        bus.emit(SyncEvent::LoggedOut);
        drop(sub);
        bus.emit(SyncEvent::LoggedOut);

        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_event_wire_format() {
        let json = serde_json::to_value(SyncEvent::MutationFailed {
            operation: "update".into(),
            note_id: Some("n1".into()),
            message: "boom".into(),
        })
        .unwrap();
        assert_eq!(json["type"], "mutationFailed");
        assert_eq!(json["noteId"], "n1");
    }
}
