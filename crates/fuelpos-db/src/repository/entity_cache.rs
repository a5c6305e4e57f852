//! # Entity Cache Repository
//!
//! One cache partition per collection, keyed by entity id.
//!
//! ```text
//! cached_entities
//! ┌──────────────┬───────────┬──────────────────────────────┬────────────┐
//! │ collection   │ entity_id │ body (JSON)                  │ updated_at │
//! ├──────────────┼───────────┼──────────────────────────────┼────────────┤
//! │ products     │ 1         │ {"id":1,"name":"Unleaded"..} │ ...        │
//! │ branches     │ 7f3c...   │ {"id":"7f3c...","name":...}  │ ...        │
//! └──────────────┴───────────┴──────────────────────────────┴────────────┘
//!   PRIMARY KEY (collection, entity_id): at most one row per id
//! ```
//!
//! The key is the id's display form, so numeric `5` and text `"5"` share a
//! row. List order is first-insertion order (rowid); an update keeps the
//! entity's position.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use fuelpos_core::{Collection, EntityId, Record};

const UPSERT_SQL: &str = r#"
    INSERT INTO cached_entities (collection, entity_id, body, updated_at)
    VALUES (?1, ?2, ?3, ?4)
    ON CONFLICT(collection, entity_id) DO UPDATE SET
        body = excluded.body,
        updated_at = excluded.updated_at
"#;

/// Repository for cached entities.
#[derive(Debug, Clone)]
pub struct EntityCacheRepository {
    pool: SqlitePool,
}

impl EntityCacheRepository {
    /// Creates a new EntityCacheRepository.
    pub fn new(pool: SqlitePool) -> Self {
        EntityCacheRepository { pool }
    }

    /// Inserts or overwrites an entity (last write wins).
    pub async fn upsert(&self, collection: Collection, record: &Record) -> DbResult<()> {
        let body = serde_json::to_string(record.as_map())?;

        debug!(
            collection = %collection,
            entity_id = %record.id(),
            "Caching entity"
        );

        sqlx::query(UPSERT_SQL)
            .bind(collection.name())
            .bind(record.id().to_string())
            .bind(body)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Upserts a batch of entities in one transaction.
    ///
    /// Either every entity lands or none does.
    pub async fn upsert_many(&self, collection: Collection, records: &[Record]) -> DbResult<()> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        for record in records {
            let body = serde_json::to_string(record.as_map())?;
            sqlx::query(UPSERT_SQL)
                .bind(collection.name())
                .bind(record.id().to_string())
                .bind(body)
                .bind(now)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        debug!(
            collection = %collection,
            count = records.len(),
            "Cached entity batch"
        );

        Ok(())
    }

    /// Replaces the entity stored under `old_id` with `record`.
    ///
    /// Used when the server answers a client-id create with its own id.
    pub async fn replace(
        &self,
        collection: Collection,
        old_id: &EntityId,
        record: &Record,
    ) -> DbResult<()> {
        let body = serde_json::to_string(record.as_map())?;
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM cached_entities WHERE collection = ?1 AND entity_id = ?2")
            .bind(collection.name())
            .bind(old_id.to_string())
            .execute(&mut *tx)
            .await?;

        sqlx::query(UPSERT_SQL)
            .bind(collection.name())
            .bind(record.id().to_string())
            .bind(body)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Returns every entity in the collection, in insertion order.
    pub async fn get_all(&self, collection: Collection) -> DbResult<Vec<Record>> {
        let bodies: Vec<String> = sqlx::query_scalar(
            "SELECT body FROM cached_entities WHERE collection = ?1 ORDER BY rowid ASC",
        )
        .bind(collection.name())
        .fetch_all(&self.pool)
        .await?;

        bodies.iter().map(String::as_str).map(decode).collect()
    }

    /// Returns the entity, or `None` when it isn't cached.
    pub async fn get_by_id(
        &self,
        collection: Collection,
        id: &EntityId,
    ) -> DbResult<Option<Record>> {
        let body: Option<String> = sqlx::query_scalar(
            "SELECT body FROM cached_entities WHERE collection = ?1 AND entity_id = ?2",
        )
        .bind(collection.name())
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        body.as_deref().map(decode).transpose()
    }

    /// Removes the entity if present. Returns whether a row was removed.
    pub async fn delete(&self, collection: Collection, id: &EntityId) -> DbResult<bool> {
        let result =
            sqlx::query("DELETE FROM cached_entities WHERE collection = ?1 AND entity_id = ?2")
                .bind(collection.name())
                .bind(id.to_string())
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Counts cached entities in a collection.
    pub async fn count(&self, collection: Collection) -> DbResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM cached_entities WHERE collection = ?1")
                .bind(collection.name())
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }

    /// Drops every cached entity of a collection.
    ///
    /// ## Returns
    /// Number of deleted entities.
    pub async fn clear_collection(&self, collection: Collection) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM cached_entities WHERE collection = ?1")
            .bind(collection.name())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

fn decode(body: &str) -> DbResult<Record> {
    let value: serde_json::Value = serde_json::from_str(body)?;
    Ok(Record::from_value(value)?)
}
