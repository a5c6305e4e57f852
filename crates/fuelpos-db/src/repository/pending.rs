//! # Pending Operation Repository
//!
//! The queue of writes attempted while offline.
//!
//! ## Queue Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Pending Write Queue                                  │
//! │                                                                         │
//! │  OFFLINE WRITE (e.g., create sale)                                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  enqueue() ── INSERT, sequence = AUTOINCREMENT (never reused)          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  seq 1  POST   /sales        {"productId":"X","quantity":2}     │   │
//! │  │  seq 2  PUT    /branches/7   {...}                              │   │
//! │  │  seq 3  DELETE /customers/4                                     │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼  back online                                                    │
//! │  peek() → replay → remove(seq)   only after a confirmed success        │
//! │                                                                         │
//! │  KEY GUARANTEES:                                                       │
//! │  • FIFO by sequence                                                    │
//! │  • A removed sequence is never handed out again                        │
//! │  • Failed replays leave the row untouched                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use sqlx::SqlitePool;
use std::collections::BTreeMap;
use tracing::debug;

use crate::error::DbResult;
use fuelpos_core::{Collection, EntityId, HttpMethod, NewPendingOperation, PendingOperation};

/// A stored queue row.
#[derive(Debug, sqlx::FromRow)]
struct PendingRow {
    sequence: i64,
    url: String,
    method: HttpMethod,
    headers: String,
    body: Option<String>,
    collection: Option<String>,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl PendingRow {
    fn into_operation(self) -> DbResult<PendingOperation> {
        let headers: BTreeMap<String, String> = serde_json::from_str(&self.headers)?;
        let body = self
            .body
            .as_deref()
            .map(serde_json::from_str::<serde_json::Value>)
            .transpose()?;
        let collection = self
            .collection
            .as_deref()
            .map(str::parse::<Collection>)
            .transpose()?;

        Ok(PendingOperation {
            sequence: self.sequence,
            url: self.url,
            method: self.method,
            headers,
            body,
            collection,
            created_at: self.created_at,
        })
    }
}

const LIST_SQL: &str = r#"
    SELECT sequence, url, method, headers, body, collection, created_at
    FROM pending_operations
    ORDER BY sequence ASC
"#;

const PEEK_SQL: &str = r#"
    SELECT sequence, url, method, headers, body, collection, created_at
    FROM pending_operations
    ORDER BY sequence ASC
    LIMIT 1
"#;

/// Repository for the pending write queue.
#[derive(Debug, Clone)]
pub struct PendingOperationRepository {
    pool: SqlitePool,
}

impl PendingOperationRepository {
    /// Creates a new PendingOperationRepository.
    pub fn new(pool: SqlitePool) -> Self {
        PendingOperationRepository { pool }
    }

    /// Appends an operation, assigning it a fresh sequence number.
    pub async fn enqueue(&self, op: NewPendingOperation) -> DbResult<PendingOperation> {
        let headers = serde_json::to_string(&op.headers)?;
        let body = op.body.as_ref().map(serde_json::to_string).transpose()?;

        let result = sqlx::query(
            r#"
            INSERT INTO pending_operations (url, method, headers, body, collection, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&op.url)
        .bind(op.method)
        .bind(headers)
        .bind(body)
        .bind(op.collection.map(|c| c.name()))
        .bind(op.created_at)
        .execute(&self.pool)
        .await?;

        let sequence = result.last_insert_rowid();

        debug!(
            sequence,
            method = %op.method,
            url = %op.url,
            "Queued pending operation"
        );

        Ok(op.into_pending(sequence))
    }

    /// Returns every queued operation, oldest first.
    pub async fn list(&self) -> DbResult<Vec<PendingOperation>> {
        let rows: Vec<PendingRow> = sqlx::query_as(LIST_SQL).fetch_all(&self.pool).await?;

        rows.into_iter().map(PendingRow::into_operation).collect()
    }

    /// Returns the head of the queue.
    pub async fn peek(&self) -> DbResult<Option<PendingOperation>> {
        let row: Option<PendingRow> = sqlx::query_as(PEEK_SQL).fetch_optional(&self.pool).await?;

        row.map(PendingRow::into_operation).transpose()
    }

    /// Removes one operation by sequence. Returns whether it was queued.
    pub async fn remove(&self, sequence: i64) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM pending_operations WHERE sequence = ?1")
            .bind(sequence)
            .execute(&self.pool)
            .await?;

        let removed = result.rows_affected() > 0;
        debug!(sequence, removed, "Removed pending operation");
        Ok(removed)
    }

    /// Re-targets every queued operation that still refers to `old` at
    /// `new`, in one transaction. Sequence order is unchanged.
    ///
    /// Returns the number of rewritten operations.
    pub async fn rewrite_id(&self, old: &EntityId, new: &EntityId) -> DbResult<u64> {
        let mut tx = self.pool.begin().await?;

        let rows: Vec<PendingRow> = sqlx::query_as(LIST_SQL).fetch_all(&mut *tx).await?;
        let mut rewritten = 0u64;

        for row in rows {
            let mut op = row.into_operation()?;
            if !op.rewrite_id(old, new) {
                continue;
            }

            let body = op.body.as_ref().map(serde_json::to_string).transpose()?;
            sqlx::query("UPDATE pending_operations SET url = ?1, body = ?2 WHERE sequence = ?3")
                .bind(&op.url)
                .bind(body)
                .bind(op.sequence)
                .execute(&mut *tx)
                .await?;
            rewritten += 1;
        }

        tx.commit().await?;

        debug!(old = %old, new = %new, rewritten, "Re-targeted pending operations");
        Ok(rewritten)
    }

    /// Counts queued operations.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM pending_operations")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}
