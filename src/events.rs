//! Typed domain events emitted by the synchronization engine.
//!
//! The list view and text panel react to these instead of being invoked
//! synchronously from inside the controller. The variant set is closed:
//! every observable state change maps to exactly one of these.

#[cfg(test)]
#[path = "events_test.rs"]
mod events_test;

use tokio::sync::broadcast;
use uuid::Uuid;

/// Capacity of the broadcast channel backing [`EventBus`]. Subscribers that
/// lag further than this lose the oldest events (`RecvError::Lagged`).
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// A domain event. Ids are geometry record ids, not live-feature keys, so
/// subscribers can correlate with the store without touching the layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// The selection set changed. Carries both sides of the diff so the
    /// list view can re-highlight without recomputing membership.
    SelectionChanged {
        selected: Vec<Uuid>,
        deselected: Vec<Uuid>,
    },
    /// A new geometry entered the store and the live layer.
    FeatureCreated { id: Uuid },
    /// A geometry left the store and the live layer.
    FeatureDeleted { id: Uuid },
    /// An in-place edit was detected and committed to the store.
    FeatureModified { id: Uuid },
}

/// Publish/subscribe fan-out for [`SyncEvent`]s.
pub struct EventBus {
    tx: broadcast::Sender<SyncEvent>,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Open a new subscription receiving every event emitted from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.tx.subscribe()
    }

    /// Publish an event to all current subscribers. Emitting with no
    /// subscribers is not an error.
    pub fn emit(&self, event: SyncEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("event emitted with no subscribers");
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
