//! Mutation events for snapshot invalidation
//!
//! Any write to a collection publishes a [`MutationEvent`]. Subscribers that
//! hold a snapshot of that collection drop it and fetch a fresh one on next
//! use; snapshots are never patched in place.
//!
//! ```text
//! create/update/delete ──▶ EventBus::publish() ──▶ broadcast ──▶ ListClient (invalidate snapshot)
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// A write to one record of a collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum MutationEvent {
    Created { collection: String, id: String },
    Updated { collection: String, id: String },
    Deleted { collection: String, id: String },
}

impl MutationEvent {
    /// Collection the mutated record belongs to
    pub fn collection(&self) -> &str {
        match self {
            MutationEvent::Created { collection, .. }
            | MutationEvent::Updated { collection, .. }
            | MutationEvent::Deleted { collection, .. } => collection,
        }
    }

    pub fn record_id(&self) -> &str {
        match self {
            MutationEvent::Created { id, .. }
            | MutationEvent::Updated { id, .. }
            | MutationEvent::Deleted { id, .. } => id,
        }
    }

    /// Get the action name (created, updated, deleted)
    pub fn action(&self) -> &str {
        match self {
            MutationEvent::Created { .. } => "created",
            MutationEvent::Updated { .. } => "updated",
            MutationEvent::Deleted { .. } => "deleted",
        }
    }
}

/// Envelope wrapping an event with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Unique event ID
    pub id: Uuid,
    /// When the event occurred
    pub timestamp: DateTime<Utc>,
    /// The actual event
    pub event: MutationEvent,
}

impl EventEnvelope {
    pub fn new(event: MutationEvent) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            event,
        }
    }
}

/// Broadcast-based event bus
///
/// Cheap to clone; all clones publish to the same subscribers.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EventEnvelope>,
}

impl EventBus {
    /// Create a new EventBus with the given channel capacity
    ///
    /// Slow receivers that fall more than `capacity` events behind get a
    /// `Lagged` error on their next recv().
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers
    ///
    /// Returns the number of receivers that will receive the event.
    pub fn publish(&self, event: MutationEvent) -> usize {
        let envelope = EventEnvelope::new(event);
        // send() returns Err only if there are no receivers, which is fine
        self.sender.send(envelope).unwrap_or(0)
    }

    /// Subscribe to events published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.sender.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}
