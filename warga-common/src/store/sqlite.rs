//! SQLite-backed document store
//!
//! Documents live in the `documents` table as JSON text. A batch runs inside
//! one SQLite transaction; change events are published only after the
//! transaction commits, so subscribers never observe a partial batch.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use sqlx::{SqliteConnection, SqlitePool};
use tokio::sync::broadcast;
use tracing::debug;

use super::{Document, DocumentStore, WriteBatch, WriteOp, MAX_BATCH_WRITES};
use crate::events::{ChangeKind, DocumentChange, EventBus, WargaEvent};
use crate::{Error, Result};

/// Document store over the shared SQLite pool
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    event_bus: EventBus,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool, event_bus: EventBus) -> Self {
        Self { pool, event_bus }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn list(&self, collection: &str) -> Result<Vec<Document>> {
        let rows = sqlx::query_as::<_, (String, String)>(
            "SELECT doc_id, data FROM documents WHERE collection = ? ORDER BY seq",
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(into_document).collect()
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let row = sqlx::query_as::<_, (String, String)>(
            "SELECT doc_id, data FROM documents WHERE collection = ? AND doc_id = ?",
        )
        .bind(collection)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(into_document).transpose()
    }

    async fn query_eq(
        &self,
        collection: &str,
        field: &str,
        value: &str,
    ) -> Result<Vec<Document>> {
        if field.is_empty() || !field.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(Error::Store(format!("Invalid query field: {}", field)));
        }

        let rows = sqlx::query_as::<_, (String, String)>(
            r#"
            SELECT doc_id, data FROM documents
            WHERE collection = ? AND json_extract(data, ?) = ?
            ORDER BY seq
            "#,
        )
        .bind(collection)
        .bind(format!("$.{}", field))
        .bind(value)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(into_document).collect()
    }

    async fn commit(&self, batch: WriteBatch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        if batch.len() > MAX_BATCH_WRITES {
            return Err(Error::Store(format!(
                "Batch of {} writes exceeds the limit of {}",
                batch.len(),
                MAX_BATCH_WRITES
            )));
        }

        let mut tx = self.pool.begin().await?;
        let mut changes = Vec::with_capacity(batch.len());

        // Any early return drops `tx`, which rolls the whole batch back
        for op in batch.into_ops() {
            if let Some(change) = apply_op(&mut *tx, op).await? {
                changes.push(change);
            }
        }

        tx.commit().await?;
        debug!(writes = changes.len(), "Batch committed");

        for change in changes {
            self.event_bus.emit_lossy(WargaEvent::DocumentChanged {
                change,
                timestamp: Utc::now(),
            });
        }

        Ok(())
    }

    fn changes(&self) -> broadcast::Receiver<WargaEvent> {
        self.event_bus.subscribe()
    }
}

async fn apply_op(conn: &mut SqliteConnection, op: WriteOp) -> Result<Option<DocumentChange>> {
    match op {
        WriteOp::Set {
            collection,
            id,
            data,
        } => {
            if !data.is_object() {
                return Err(Error::Store(format!(
                    "Document {}/{} must be a JSON object",
                    collection, id
                )));
            }
            let existed = load_data(conn, &collection, &id).await?.is_some();

            sqlx::query(
                r#"
                INSERT INTO documents (collection, doc_id, data)
                VALUES (?, ?, ?)
                ON CONFLICT(collection, doc_id) DO UPDATE SET
                    data = excluded.data,
                    updated_at = CURRENT_TIMESTAMP
                "#,
            )
            .bind(&collection)
            .bind(&id)
            .bind(data.to_string())
            .execute(&mut *conn)
            .await?;

            Ok(Some(DocumentChange {
                collection,
                doc_id: id,
                kind: if existed {
                    ChangeKind::Modified
                } else {
                    ChangeKind::Added
                },
                data: Some(data),
            }))
        }
        WriteOp::Update {
            collection,
            id,
            fields,
        } => {
            let Some(mut data) = load_data(conn, &collection, &id).await? else {
                return Err(Error::NotFound(format!("{}/{}", collection, id)));
            };

            if let Value::Object(map) = &mut data {
                map.extend(fields);
            }

            sqlx::query(
                r#"
                UPDATE documents SET data = ?, updated_at = CURRENT_TIMESTAMP
                WHERE collection = ? AND doc_id = ?
                "#,
            )
            .bind(data.to_string())
            .bind(&collection)
            .bind(&id)
            .execute(&mut *conn)
            .await?;

            Ok(Some(DocumentChange {
                collection,
                doc_id: id,
                kind: ChangeKind::Modified,
                data: Some(data),
            }))
        }
        WriteOp::Delete { collection, id } => {
            let result = sqlx::query("DELETE FROM documents WHERE collection = ? AND doc_id = ?")
                .bind(&collection)
                .bind(&id)
                .execute(&mut *conn)
                .await?;

            if result.rows_affected() == 0 {
                return Ok(None);
            }

            Ok(Some(DocumentChange {
                collection,
                doc_id: id,
                kind: ChangeKind::Removed,
                data: None,
            }))
        }
    }
}

async fn load_data(conn: &mut SqliteConnection, collection: &str, id: &str) -> Result<Option<Value>> {
    let raw: Option<String> =
        sqlx::query_scalar("SELECT data FROM documents WHERE collection = ? AND doc_id = ?")
            .bind(collection)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

    raw.map(|s| serde_json::from_str(&s).map_err(Error::from))
        .transpose()
}

fn into_document((id, data): (String, String)) -> Result<Document> {
    Ok(Document {
        id,
        data: serde_json::from_str(&data)?,
    })
}
