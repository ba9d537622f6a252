//! Atomic multi-document write batches

use serde::Serialize;
use serde_json::{Map, Value};

use crate::{Error, Result};

/// Largest number of writes accepted in one batch
pub const MAX_BATCH_WRITES: usize = 500;

/// A single write inside a batch
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Create or fully replace a document
    Set {
        collection: String,
        id: String,
        data: Value,
    },
    /// Merge top-level fields; the whole batch fails if the document is absent
    Update {
        collection: String,
        id: String,
        fields: Map<String, Value>,
    },
    /// Remove a document (absent documents are ignored)
    Delete { collection: String, id: String },
}

/// Ordered set of writes applied all-or-nothing by [`super::DocumentStore::commit`]
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, collection: &str, id: &str, data: Value) -> &mut Self {
        self.ops.push(WriteOp::Set {
            collection: collection.to_string(),
            id: id.to_string(),
            data,
        });
        self
    }

    pub fn update(&mut self, collection: &str, id: &str, fields: Map<String, Value>) -> &mut Self {
        self.ops.push(WriteOp::Update {
            collection: collection.to_string(),
            id: id.to_string(),
            fields,
        });
        self
    }

    pub fn delete(&mut self, collection: &str, id: &str) -> &mut Self {
        self.ops.push(WriteOp::Delete {
            collection: collection.to_string(),
            id: id.to_string(),
        });
        self
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }
}

/// Serialize a model into document fields (must serialize to a JSON object)
pub fn to_fields<T: Serialize>(value: &T) -> Result<Map<String, Value>> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(Error::Store(format!(
            "Document body must be an object, got {}",
            other
        ))),
    }
}
