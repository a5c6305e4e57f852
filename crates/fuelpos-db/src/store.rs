//! # Local Store
//!
//! Durable cache and pending-write queue behind one handle.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         LocalStore                                      │
//! │                                                                         │
//! │  LocalStore::new(config)        cheap, no I/O                          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  first call (any caller, any task)                                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  OnceCell::get_or_try_init ── one pool, one migration run              │
//! │       │                       racing callers wait for the same init     │
//! │       │                       a failed init is retried by the next call │
//! │       ▼                                                                 │
//! │  ┌──────────────┐  ┌──────────────────┐  ┌───────────────┐             │
//! │  │ entity cache │  │ pending queue    │  │ settings      │             │
//! │  └──────────────┘  └──────────────────┘  └───────────────┘             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  close() on shutdown                                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every operation is one statement or one transaction; there is no
//! explicit locking. Concurrent upserts to the same id are last-write-wins.

use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{error, info};

use crate::error::{DbError, DbResult};
use crate::pool::{Database, DbConfig};
use fuelpos_core::{Collection, EntityId, NewPendingOperation, PendingOperation, Record};

/// Durable local record store.
///
/// Cloning is cheap; clones share one database.
#[derive(Debug, Clone)]
pub struct LocalStore {
    inner: Arc<StoreInner>,
}

#[derive(Debug)]
struct StoreInner {
    config: DbConfig,
    db: OnceCell<Database>,
}

impl LocalStore {
    /// Creates a store handle. Nothing is opened until first use.
    pub fn new(config: DbConfig) -> Self {
        LocalStore {
            inner: Arc::new(StoreInner {
                config,
                db: OnceCell::new(),
            }),
        }
    }

    /// Creates and opens a store in one step.
    pub async fn connect(config: DbConfig) -> DbResult<Self> {
        let store = LocalStore::new(config);
        store.open().await?;
        Ok(store)
    }

    /// Ensures the database and its partitions exist.
    ///
    /// Idempotent; concurrent callers collapse into a single schema
    /// creation.
    pub async fn open(&self) -> DbResult<()> {
        self.db().await.map(|_| ())
    }

    /// True once the store has been opened successfully.
    pub fn is_open(&self) -> bool {
        self.inner.db.initialized()
    }

    async fn db(&self) -> DbResult<&Database> {
        self.inner
            .db
            .get_or_try_init(|| async {
                let db = Database::new(self.inner.config.clone())
                    .await
                    .map_err(|e| {
                        error!(error = %e, "Failed to open local store");
                        e
                    })?;
                info!(
                    path = %self.inner.config.database_path.display(),
                    "Local store opened"
                );
                Ok::<_, DbError>(db)
            })
            .await
    }

    /// Closes the pool if it was opened. Later calls fail.
    pub async fn close(&self) {
        if let Some(db) = self.inner.db.get() {
            db.close().await;
        }
    }

    // =========================================================================
    // Entity cache
    // =========================================================================

    pub async fn upsert(&self, collection: Collection, record: &Record) -> DbResult<()> {
        self.db().await?.entities().upsert(collection, record).await
    }

    pub async fn upsert_many(&self, collection: Collection, records: &[Record]) -> DbResult<()> {
        self.db().await?.entities().upsert_many(collection, records).await
    }

    /// Swaps a client-id entity for the server's version of it.
    pub async fn replace(
        &self,
        collection: Collection,
        old_id: &EntityId,
        record: &Record,
    ) -> DbResult<()> {
        self.db()
            .await?
            .entities()
            .replace(collection, old_id, record)
            .await
    }

    pub async fn get_all(&self, collection: Collection) -> DbResult<Vec<Record>> {
        self.db().await?.entities().get_all(collection).await
    }

    /// Returns `Ok(None)` for an absent entity; only real failures error.
    pub async fn get_by_id(
        &self,
        collection: Collection,
        id: &EntityId,
    ) -> DbResult<Option<Record>> {
        self.db().await?.entities().get_by_id(collection, id).await
    }

    /// Deleting an absent id is a no-op.
    pub async fn delete(&self, collection: Collection, id: &EntityId) -> DbResult<()> {
        self.db().await?.entities().delete(collection, id).await?;
        Ok(())
    }

    pub async fn count(&self, collection: Collection) -> DbResult<i64> {
        self.db().await?.entities().count(collection).await
    }

    pub async fn clear_collection(&self, collection: Collection) -> DbResult<u64> {
        self.db().await?.entities().clear_collection(collection).await
    }

    // =========================================================================
    // Pending queue
    // =========================================================================

    pub async fn enqueue_pending(&self, op: NewPendingOperation) -> DbResult<PendingOperation> {
        self.db().await?.pending().enqueue(op).await
    }

    /// All queued operations in enqueue order.
    pub async fn list_pending(&self) -> DbResult<Vec<PendingOperation>> {
        self.db().await?.pending().list().await
    }

    pub async fn peek_pending(&self) -> DbResult<Option<PendingOperation>> {
        self.db().await?.pending().peek().await
    }

    /// Returns whether the operation was still queued.
    pub async fn remove_pending(&self, sequence: i64) -> DbResult<bool> {
        self.db().await?.pending().remove(sequence).await
    }

    /// Rewrites queued operations that still address `old` so they
    /// address `new`. Returns how many changed.
    pub async fn rewrite_pending_id(&self, old: &EntityId, new: &EntityId) -> DbResult<u64> {
        self.db().await?.pending().rewrite_id(old, new).await
    }

    pub async fn count_pending(&self) -> DbResult<i64> {
        self.db().await?.pending().count().await
    }

    // =========================================================================
    // Settings
    // =========================================================================

    pub async fn get_setting(&self, key: &str) -> DbResult<Option<String>> {
        self.db().await?.settings().get(key).await
    }

    pub async fn set_setting(&self, key: &str, value: &str) -> DbResult<()> {
        self.db().await?.settings().set(key, value).await
    }

    pub async fn remove_setting(&self, key: &str) -> DbResult<()> {
        self.db().await?.settings().remove(key).await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use fuelpos_core::{HttpMethod, SESSION_TOKEN_KEY};
    use serde_json::json;
    use std::collections::BTreeMap;

    async fn store() -> LocalStore {
        LocalStore::connect(DbConfig::in_memory()).await.unwrap()
    }

    fn record(value: serde_json::Value) -> Record {
        Record::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn test_open_is_idempotent_and_concurrent_safe() {
        let store = LocalStore::new(DbConfig::in_memory());
        assert!(!store.is_open());

        let (a, b, c) = tokio::join!(store.open(), store.open(), store.open());
        a.unwrap();
        b.unwrap();
        c.unwrap();
        store.open().await.unwrap();

        assert!(store.is_open());
        assert_eq!(store.count_pending().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_first_use_opens_store() {
        let store = LocalStore::new(DbConfig::in_memory());
        assert_eq!(store.count(Collection::Products).await.unwrap(), 0);
        assert!(store.is_open());
    }

    #[tokio::test]
    async fn test_upsert_then_get_by_id_round_trips() {
        let store = store().await;
        let sale = record(json!({"id": "s-1", "productId": "X", "quantity": 2}));

        store.upsert(Collection::Sales, &sale).await.unwrap();

        let loaded = store
            .get_by_id(Collection::Sales, sale.id())
            .await
            .unwrap();
        assert_eq!(loaded, Some(sale));
    }

    #[tokio::test]
    async fn test_upsert_is_last_write_wins() {
        let store = store().await;
        store
            .upsert(Collection::Branches, &record(json!({"id": 1, "name": "North"})))
            .await
            .unwrap();
        store
            .upsert(Collection::Branches, &record(json!({"id": 1, "name": "South"})))
            .await
            .unwrap();

        let all = store.get_all(Collection::Branches).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].get("name"), Some(&json!("South")));
    }

    #[tokio::test]
    async fn test_collections_are_partitioned() {
        let store = store().await;
        store
            .upsert(Collection::Products, &record(json!({"id": 1, "name": "Diesel"})))
            .await
            .unwrap();

        assert!(store.get_all(Collection::Customers).await.unwrap().is_empty());
        assert!(store
            .get_by_id(Collection::Customers, &EntityId::Number(1))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_get_all_order_is_stable() {
        let store = store().await;
        let batch: Vec<Record> = (1..=3)
            .map(|i| record(json!({"id": i, "name": format!("P{}", i)})))
            .collect();
        store.upsert_many(Collection::Products, &batch).await.unwrap();

        // Updating the first entity keeps its position.
        store
            .upsert(Collection::Products, &record(json!({"id": 1, "name": "P1b"})))
            .await
            .unwrap();

        let ids: Vec<String> = store
            .get_all(Collection::Products)
            .await
            .unwrap()
            .iter()
            .map(|r| r.id().to_string())
            .collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
    }

    #[tokio::test]
    async fn test_delete_absent_is_noop() {
        let store = store().await;
        store
            .delete(Collection::Tanks, &EntityId::Number(404))
            .await
            .unwrap();

        store
            .upsert(Collection::Tanks, &record(json!({"id": 2, "name": "T2"})))
            .await
            .unwrap();
        store
            .delete(Collection::Tanks, &EntityId::Number(2))
            .await
            .unwrap();
        assert_eq!(store.count(Collection::Tanks).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_replace_swaps_client_id_for_server_id() {
        let store = store().await;
        let client = record(json!({"id": "tmp-1", "name": "North"}));
        store.upsert(Collection::Branches, &client).await.unwrap();

        let server = record(json!({"id": 41, "name": "North"}));
        store
            .replace(Collection::Branches, client.id(), &server)
            .await
            .unwrap();

        let all = store.get_all(Collection::Branches).await.unwrap();
        assert_eq!(all, vec![server]);
    }

    #[tokio::test]
    async fn test_pending_queue_is_fifo() {
        let store = store().await;

        let first = store
            .enqueue_pending(
                NewPendingOperation::new(HttpMethod::Post, "/sales")
                    .unwrap()
                    .with_body(Some(json!({"product": "X", "qty": 2})))
                    .with_collection(Some(Collection::Sales)),
            )
            .await
            .unwrap();
        let second = store
            .enqueue_pending(NewPendingOperation::new(HttpMethod::Delete, "/customers/4").unwrap())
            .await
            .unwrap();

        assert!(second.sequence > first.sequence);

        let queued = store.list_pending().await.unwrap();
        assert_eq!(queued.len(), 2);
        assert_eq!(queued[0], first);
        assert_eq!(queued[1].method, HttpMethod::Delete);
        assert_eq!(queued[1].body, None);

        assert_eq!(store.peek_pending().await.unwrap(), Some(first.clone()));
    }

    #[tokio::test]
    async fn test_removed_operation_is_never_redelivered() {
        let store = store().await;
        let op = store
            .enqueue_pending(NewPendingOperation::new(HttpMethod::Put, "/branches/1").unwrap())
            .await
            .unwrap();

        assert!(store.remove_pending(op.sequence).await.unwrap());
        assert!(!store.remove_pending(op.sequence).await.unwrap());

        // AUTOINCREMENT never reuses a sequence.
        let next = store
            .enqueue_pending(NewPendingOperation::new(HttpMethod::Put, "/branches/1").unwrap())
            .await
            .unwrap();
        assert!(next.sequence > op.sequence);
        assert_eq!(store.count_pending().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_rewrite_pending_id_keeps_order() {
        let store = store().await;
        let client = EntityId::Text("c-1".into());
        let server = EntityId::Number(1001);

        store
            .enqueue_pending(
                NewPendingOperation::new(HttpMethod::Patch, "/sales/c-1")
                    .unwrap()
                    .with_body(Some(json!({"quantity": 3}))),
            )
            .await
            .unwrap();
        store
            .enqueue_pending(NewPendingOperation::new(HttpMethod::Delete, "/tanks/2").unwrap())
            .await
            .unwrap();
        store
            .enqueue_pending(NewPendingOperation::new(HttpMethod::Delete, "/sales/c-1").unwrap())
            .await
            .unwrap();

        assert_eq!(store.rewrite_pending_id(&client, &server).await.unwrap(), 2);

        let urls: Vec<String> = store
            .list_pending()
            .await
            .unwrap()
            .into_iter()
            .map(|op| op.url)
            .collect();
        assert_eq!(urls, vec!["/sales/1001", "/tanks/2", "/sales/1001"]);

        let head = store.peek_pending().await.unwrap().unwrap();
        assert_eq!(head.body, Some(json!({"quantity": 3})));
    }

    #[tokio::test]
    async fn test_pending_headers_round_trip() {
        let store = store().await;
        let mut headers = BTreeMap::new();
        headers.insert("Authorization".to_string(), "Bearer abc".to_string());

        store
            .enqueue_pending(
                NewPendingOperation::new(HttpMethod::Patch, "/tanks/1")
                    .unwrap()
                    .with_headers(headers.clone()),
            )
            .await
            .unwrap();

        let head = store.peek_pending().await.unwrap().unwrap();
        assert_eq!(head.headers, headers);
    }

    #[tokio::test]
    async fn test_settings() {
        let store = store().await;
        assert_eq!(store.get_setting(SESSION_TOKEN_KEY).await.unwrap(), None);

        store.set_setting(SESSION_TOKEN_KEY, "t1").await.unwrap();
        store.set_setting(SESSION_TOKEN_KEY, "t2").await.unwrap();
        assert_eq!(
            store.get_setting(SESSION_TOKEN_KEY).await.unwrap().as_deref(),
            Some("t2")
        );

        store.remove_setting(SESSION_TOKEN_KEY).await.unwrap();
        store.remove_setting(SESSION_TOKEN_KEY).await.unwrap();
        assert_eq!(store.get_setting(SESSION_TOKEN_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_closed_store_reports_failure() {
        let store = store().await;
        store.close().await;
        assert!(store.count(Collection::Sales).await.is_err());
    }

    #[tokio::test]
    async fn test_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fuelpos.db");

        {
            let store = LocalStore::connect(DbConfig::new(&path)).await.unwrap();
            store
                .upsert(Collection::Customers, &record(json!({"id": 7, "name": "Metro"})))
                .await
                .unwrap();
            store
                .enqueue_pending(NewPendingOperation::new(HttpMethod::Post, "/sales").unwrap())
                .await
                .unwrap();
            store.close().await;
        }

        let reopened = LocalStore::connect(DbConfig::new(&path)).await.unwrap();
        assert_eq!(reopened.count(Collection::Customers).await.unwrap(), 1);
        assert_eq!(reopened.count_pending().await.unwrap(), 1);
    }
}
