//! Live collection subscriptions
//!
//! A subscription registers on the store's change feed when it is opened, so
//! no committed write can slip between registration and the first snapshot.
//! The first update is always a full [`SnapshotUpdate::Snapshot`]; afterwards
//! every committed write to the collection arrives as a
//! [`SnapshotUpdate::Change`], in commit order. There is no ordering between
//! two different subscriptions.
//!
//! Changes that were already reflected in the snapshot may be delivered once
//! more; [`LiveCollection`] applies updates as idempotent upserts.

use futures::Stream;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};

use super::{Document, DocumentStore};
use crate::events::{ChangeKind, DocumentChange, WargaEvent};
use crate::Result;

/// Delay before retrying a snapshot read that failed
const SNAPSHOT_RETRY_DELAY: Duration = Duration::from_millis(500);

/// One update delivered by a subscription
#[derive(Debug, Clone, PartialEq)]
pub enum SnapshotUpdate {
    /// Complete collection contents in arrival order
    Snapshot(Vec<Document>),
    /// One committed write
    Change(DocumentChange),
}

/// Cancellable, restartable live view of one collection
///
/// Dropping the subscription (or calling [`Subscription::unsubscribe`])
/// releases it. Opening a new one yields a fresh snapshot.
pub struct Subscription {
    store: Arc<dyn DocumentStore>,
    collection: String,
    rx: broadcast::Receiver<WargaEvent>,
    needs_snapshot: bool,
    last_snapshot_failed: bool,
}

impl Subscription {
    pub fn open(store: Arc<dyn DocumentStore>, collection: impl Into<String>) -> Self {
        let rx = store.changes();
        let collection = collection.into();
        debug!(collection = %collection, "Subscription opened");
        Self {
            store,
            collection,
            rx,
            needs_snapshot: true,
            last_snapshot_failed: false,
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Wait for the next update
    ///
    /// Returns `None` only when the change feed itself has shut down. A store
    /// error while reading a snapshot is returned and the snapshot is retried
    /// on the following call.
    pub async fn next(&mut self) -> Option<Result<SnapshotUpdate>> {
        loop {
            if self.needs_snapshot {
                if self.last_snapshot_failed {
                    tokio::time::sleep(SNAPSHOT_RETRY_DELAY).await;
                }
                return match self.store.list(&self.collection).await {
                    Ok(docs) => {
                        self.needs_snapshot = false;
                        self.last_snapshot_failed = false;
                        Some(Ok(SnapshotUpdate::Snapshot(docs)))
                    }
                    Err(e) => {
                        self.last_snapshot_failed = true;
                        Some(Err(e))
                    }
                };
            }

            match self.rx.recv().await {
                Ok(WargaEvent::DocumentChanged { change, .. }) => {
                    if change.collection == self.collection {
                        return Some(Ok(SnapshotUpdate::Change(change)));
                    }
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!(
                        collection = %self.collection,
                        skipped,
                        "Subscription lagged behind change feed, resyncing"
                    );
                    self.needs_snapshot = true;
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    pub fn unsubscribe(self) {
        debug!(collection = %self.collection, "Subscription released");
    }

    /// Consume the subscription as a stream of updates
    pub fn into_stream(self) -> impl Stream<Item = Result<SnapshotUpdate>> + Send + 'static {
        futures::stream::unfold(self, |mut sub| async move {
            sub.next().await.map(|item| (item, sub))
        })
    }
}

/// Materialized, arrival-ordered view of a subscribed collection
#[derive(Debug, Clone, Default)]
pub struct LiveCollection {
    docs: Vec<Document>,
}

impl LiveCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one update; returns whether the view changed
    pub fn apply(&mut self, update: SnapshotUpdate) -> bool {
        match update {
            SnapshotUpdate::Snapshot(docs) => {
                let changed = self.docs != docs;
                self.docs = docs;
                changed
            }
            SnapshotUpdate::Change(change) => match (change.kind, change.data) {
                (ChangeKind::Removed, _) | (_, None) => {
                    let before = self.docs.len();
                    self.docs.retain(|d| d.id != change.doc_id);
                    before != self.docs.len()
                }
                (_, Some(data)) => {
                    match self.docs.iter_mut().find(|d| d.id == change.doc_id) {
                        Some(existing) if existing.data == data => false,
                        Some(existing) => {
                            existing.data = data;
                            true
                        }
                        None => {
                            self.docs.push(Document {
                                id: change.doc_id,
                                data,
                            });
                            true
                        }
                    }
                }
            },
        }
    }

    pub fn documents(&self) -> &[Document] {
        &self.docs
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.docs.iter().map(|d| d.id.as_str())
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Decode every document, skipping (and logging) malformed ones
    pub fn decode_all<T: DeserializeOwned>(&self) -> Vec<(String, T)> {
        self.docs
            .iter()
            .filter_map(|doc| match doc.decode::<T>() {
                Ok(value) => Some((doc.id.clone(), value)),
                Err(e) => {
                    warn!(doc_id = %doc.id, error = %e, "Skipping malformed document");
                    None
                }
            })
            .collect()
    }
}
