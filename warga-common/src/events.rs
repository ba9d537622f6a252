//! Event types and EventBus
//!
//! The store publishes one [`WargaEvent::DocumentChanged`] per effective write
//! after a batch commits. Live subscriptions, the SSE surface and the import
//! workflow all consume the same bus.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;

/// Kind of change applied to a single document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Modified,
    Removed,
}

/// One committed document write
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChange {
    /// Collection path, e.g. `keluarga` or `keluarga/{id}/anggota`
    pub collection: String,
    pub doc_id: String,
    pub kind: ChangeKind,
    /// Document contents after the write (None for removals)
    pub data: Option<Value>,
}

/// Application event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WargaEvent {
    /// A document was added, modified or removed by a committed batch
    DocumentChanged {
        change: DocumentChange,
        timestamp: DateTime<Utc>,
    },

    /// Bulk import finished (possibly with skipped rows or failed families)
    ImportCompleted {
        families_created: usize,
        members_created: usize,
        rows_skipped: usize,
        groups_failed: usize,
        timestamp: DateTime<Utc>,
    },

    /// The signed-in identity changed (None after sign-out)
    AuthStateChanged {
        uid: Option<String>,
        timestamp: DateTime<Utc>,
    },
}

impl WargaEvent {
    /// Event type name, used as the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            WargaEvent::DocumentChanged { .. } => "DocumentChanged",
            WargaEvent::ImportCompleted { .. } => "ImportCompleted",
            WargaEvent::AuthStateChanged { .. } => "AuthStateChanged",
        }
    }
}

/// Central event distribution bus
///
/// Uses tokio::broadcast internally:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Lagged message detection for slow subscribers
///
/// # Examples
///
/// ```
/// use warga_common::events::{EventBus, WargaEvent};
///
/// let event_bus = EventBus::new(100);
/// let mut rx = event_bus.subscribe();
///
/// event_bus.emit_lossy(WargaEvent::AuthStateChanged {
///     uid: None,
///     timestamp: chrono::Utc::now(),
/// });
///
/// assert!(rx.try_recv().is_ok());
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<WargaEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus buffering up to `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<WargaEvent> {
        self.tx.subscribe()
    }

    /// Emit an event, returning the number of receivers reached
    pub fn emit(
        &self,
        event: WargaEvent,
    ) -> Result<usize, broadcast::error::SendError<WargaEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring the "no subscribers" case
    pub fn emit_lossy(&self, event: WargaEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
