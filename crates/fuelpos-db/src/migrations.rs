//! # Schema Migrations
//!
//! The local store schema ships inside the binary. A console upgraded in
//! the field may open a file written by an older build, so every open
//! brings the file forward before the first query.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Local Store Schema                                 │
//! │                                                                         │
//! │  001_local_store.sql                                                   │
//! │    cached_entities     (collection, entity_id) → JSON body             │
//! │    pending_operations  sequence AUTOINCREMENT, FIFO replay order       │
//! │    local_settings      key → value (session tokens)                    │
//! │                                                                         │
//! │  Applied versions are recorded in _sqlx_migrations                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! New schema changes go in a new `NNN_description.sql` file under
//! `migrations/sqlite/`. Shipped files are never edited.

use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::DbResult;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/sqlite");

/// How far a store file is behind the embedded schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaStatus {
    /// Migrations embedded in this build.
    pub known: usize,
    /// Migrations recorded as applied in the file.
    pub applied: usize,
}

impl SchemaStatus {
    pub fn pending(&self) -> usize {
        self.known.saturating_sub(self.applied)
    }

    pub fn is_current(&self) -> bool {
        self.pending() == 0
    }
}

/// Brings the schema up to date. Each migration runs in its own
/// transaction; already-applied ones are checksum-verified and skipped.
pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    let status = schema_status(pool).await?;
    if status.is_current() {
        debug!(applied = status.applied, "Local store schema is current");
    } else {
        info!(pending = status.pending(), "Upgrading local store schema");
    }

    MIGRATOR.run(pool).await?;
    Ok(())
}

/// Compares the embedded migrations with what the file has recorded.
/// A file that has never been migrated reports zero applied.
pub async fn schema_status(pool: &SqlitePool) -> DbResult<SchemaStatus> {
    let applied: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = 1")
            .fetch_one(pool)
            .await
            .unwrap_or(0);

    Ok(SchemaStatus {
        known: MIGRATOR.migrations.len(),
        applied: usize::try_from(applied).unwrap_or(0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_pool() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_fresh_file_is_behind() {
        let pool = memory_pool().await;
        let status = schema_status(&pool).await.unwrap();
        assert_eq!(status.applied, 0);
        assert!(status.known >= 1);
        assert!(!status.is_current());
    }

    #[tokio::test]
    async fn test_migrate_twice() {
        let pool = memory_pool().await;
        run_migrations(&pool).await.unwrap();
        run_migrations(&pool).await.unwrap();

        let status = schema_status(&pool).await.unwrap();
        assert!(status.is_current());
        assert_eq!(status.pending(), 0);
    }
}
