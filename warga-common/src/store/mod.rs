//! Remote store gateway
//!
//! A small document-store abstraction: JSON documents grouped in slash-path
//! collections (`keluarga`, `keluarga/{id}/anggota`), atomic write batches,
//! equality queries and live subscriptions.
//!
//! Every write goes through [`DocumentStore::commit`]; the single-document
//! helpers are one-write batches. Committed writes are published on the
//! change feed, which [`Subscription`] turns into snapshot-then-delta updates.

mod batch;
mod sqlite;
mod subscription;

pub use batch::{to_fields, WriteBatch, WriteOp, MAX_BATCH_WRITES};
pub use sqlite::SqliteStore;
pub use subscription::{LiveCollection, SnapshotUpdate, Subscription};

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::broadcast;

use crate::events::WargaEvent;
use crate::{uuid_utils, Result};

/// A stored document and its identifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub data: Value,
}

impl Document {
    /// Deserialize the document body into a model type
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.data.clone())?)
    }
}

/// Document store operations consumed by all workflows
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// All documents of a collection in arrival order
    async fn list(&self, collection: &str) -> Result<Vec<Document>>;

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>>;

    /// Documents whose top-level string field equals `value`, in arrival order
    async fn query_eq(&self, collection: &str, field: &str, value: &str)
        -> Result<Vec<Document>>;

    /// Apply every write of the batch, or none of them
    async fn commit(&self, batch: WriteBatch) -> Result<()>;

    /// Change feed; receives one event per committed write
    fn changes(&self) -> broadcast::Receiver<WargaEvent>;

    /// Allocate a fresh document id without writing anything
    fn new_id(&self) -> String {
        uuid_utils::generate_document_id()
    }

    /// Create a document under a fresh id
    async fn create(&self, collection: &str, data: Value) -> Result<String> {
        let id = self.new_id();
        let mut batch = WriteBatch::new();
        batch.set(collection, &id, data);
        self.commit(batch).await?;
        Ok(id)
    }

    /// Create or replace a document
    async fn set(&self, collection: &str, id: &str, data: Value) -> Result<()> {
        let mut batch = WriteBatch::new();
        batch.set(collection, id, data);
        self.commit(batch).await
    }

    /// Merge top-level fields into an existing document (NotFound if absent)
    async fn update(&self, collection: &str, id: &str, fields: Map<String, Value>) -> Result<()> {
        let mut batch = WriteBatch::new();
        batch.update(collection, id, fields);
        self.commit(batch).await
    }

    /// Delete a document; deleting an absent document is a no-op
    async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        let mut batch = WriteBatch::new();
        batch.delete(collection, id);
        self.commit(batch).await
    }
}
