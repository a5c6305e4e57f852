//! # Request Dispatcher
//!
//! Routes every logical API call to the live transport or to the local
//! store, and keeps the local cache in step with successful live writes.
//!
//! ## Routing
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Dispatch Decision                                │
//! │                                                                         │
//! │  dispatch(request)                                                     │
//! │       │                                                                 │
//! │       │  POST to a collection without an id → client id (UUID v4)      │
//! │       ▼                                                                 │
//! │  NetworkState::is_online()?                                            │
//! │       │                                                                 │
//! │   yes │                                   no │                          │
//! │       ▼                                      ▼                          │
//! │  ┌──────────────────────────┐   ┌──────────────────────────────────┐   │
//! │  │ LIVE                     │   │ OFFLINE                          │   │
//! │  │ send with bearer token   │   │ fallback off → TransportUnavail. │   │
//! │  │ 401 → refresh, resend x1 │   │                                  │   │
//! │  │ non-2xx → Network        │   │ GET   → cache (all or by id)     │   │
//! │  │ POST/PUT/PATCH 2xx →     │   │         empty → NoLocalData      │   │
//! │  │   upsert into cache      │   │ write → pending queue            │   │
//! │  │ DELETE → cache untouched │   │         → OperationQueued        │   │
//! │  └──────────────────────────┘   └──────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Id Reconciliation
//! A create carries its client id from the moment it is issued, so the
//! queued operation and the eventual cache entry share a key. If the
//! server answers with a different id, the client-id entry is replaced by
//! the server's entity, and queued operations that still address the
//! client id (URL segments, body references) are rewritten to the server id.

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use fuelpos_core::{
    Collection, Entity, EntityId, HttpMethod, NewPendingOperation, PendingOperation, Record,
};
use fuelpos_db::LocalStore;

use crate::error::{DispatchError, DispatchResult};
use crate::network::NetworkState;
use crate::session::{apply_token, Session};
use crate::transport::{Transport, TransportRequest, TransportResponse};

// =============================================================================
// Dispatch Request
// =============================================================================

/// One logical API call.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchRequest {
    pub method: HttpMethod,
    /// Endpoint path relative to the API base, e.g. `/sales` or `/sales/42`.
    pub url: String,
    pub body: Option<Value>,
    /// Whether the offline path (cache read or queued write) applies.
    pub offline_fallback: bool,
    /// Cache partition for offline reads and for mirroring responses.
    pub collection: Option<Collection>,
}

impl DispatchRequest {
    /// Describes a call; the collection is derived from the path.
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        let url = url.into();
        DispatchRequest {
            method,
            collection: Collection::from_path(&url),
            url,
            body: None,
            offline_fallback: true,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        DispatchRequest::new(HttpMethod::Get, url)
    }

    pub fn post(url: impl Into<String>, body: Value) -> Self {
        DispatchRequest::new(HttpMethod::Post, url).with_body(body)
    }

    pub fn put(url: impl Into<String>, body: Value) -> Self {
        DispatchRequest::new(HttpMethod::Put, url).with_body(body)
    }

    pub fn patch(url: impl Into<String>, body: Value) -> Self {
        DispatchRequest::new(HttpMethod::Patch, url).with_body(body)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        DispatchRequest::new(HttpMethod::Delete, url)
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Overrides the cache partition derived from the path.
    pub fn with_collection(mut self, collection: Option<Collection>) -> Self {
        self.collection = collection;
        self
    }

    /// Disables the offline path: offline calls fail with
    /// `TransportUnavailable` instead of reading the cache or queueing.
    pub fn without_fallback(mut self) -> Self {
        self.offline_fallback = false;
        self
    }

    /// Id segment of an item path (`/sales/42` → `42`).
    pub fn item_id(&self) -> Option<EntityId> {
        path_item_id(&self.url)
    }
}

fn path_item_id(url: &str) -> Option<EntityId> {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    let segment = path
        .trim_start_matches('/')
        .split('/')
        .nth(1)
        .filter(|s| !s.is_empty())?;

    Some(match segment.parse::<i64>() {
        Ok(n) => EntityId::Number(n),
        Err(_) => EntityId::Text(segment.to_string()),
    })
}

/// The id a create was sent with, used to reconcile the cache.
fn sent_id(method: HttpMethod, body: Option<&Value>) -> Option<EntityId> {
    if method != HttpMethod::Post {
        return None;
    }
    body.and_then(|b| b.get("id"))
        .and_then(|id| EntityId::from_value(id).ok())
}

// =============================================================================
// Dispatcher
// =============================================================================

/// Tuning knobs for the dispatcher.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatcherOptions {
    /// Also mirror successful live GETs into the cache.
    pub cache_reads: bool,
}

/// Decides, per call, between the live transport and the local store.
pub struct RequestDispatcher {
    store: LocalStore,
    network: NetworkState,
    transport: Arc<dyn Transport>,
    session: Session,
    options: DispatcherOptions,
}

impl RequestDispatcher {
    pub fn new(
        store: LocalStore,
        network: NetworkState,
        transport: Arc<dyn Transport>,
        session: Session,
    ) -> Self {
        RequestDispatcher {
            store,
            network,
            transport,
            session,
            options: DispatcherOptions::default(),
        }
    }

    pub fn with_options(mut self, options: DispatcherOptions) -> Self {
        self.options = options;
        self
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    pub fn network(&self) -> &NetworkState {
        &self.network
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Runs one call through the live or the offline path.
    ///
    /// ## Returns
    /// - the parsed response body (`Value::Null` for empty bodies) when live
    /// - the cached collection (array) or entity when offline
    ///
    /// ## Errors
    /// - `OperationQueued` for an offline write: saved, not yet applied
    /// - `NoLocalDataAvailable` for an offline read with nothing cached
    /// - `TransportUnavailable` when offline and no fallback applies
    /// - `Network` / `SessionExpired` from the live path
    /// - `StorageUnavailable` when the local store fails
    pub async fn dispatch(&self, mut request: DispatchRequest) -> DispatchResult<Value> {
        if request.method == HttpMethod::Post && request.collection.is_some() {
            if let Some(body) = request.body.take() {
                request.body = Some(assign_client_id(body)?);
            }
        }

        if self.network.is_online() {
            debug!(method = %request.method, url = %request.url, "Dispatching live");
            let headers = self.session.auth_headers().await?;
            let body = self
                .send_live(request.method, &request.url, headers, request.body.clone())
                .await?;

            self.mirror(
                request.method,
                request.collection,
                sent_id(request.method, request.body.as_ref()),
                body.as_ref(),
            )
            .await;

            return Ok(body.unwrap_or(Value::Null));
        }

        if request.method.is_write() {
            self.queue(request).await
        } else {
            self.read_local(&request).await
        }
    }

    /// Sends a queued operation through the live path.
    ///
    /// Stored headers are reused with `Authorization` replaced by the
    /// current session token. The connectivity check and queue removal are
    /// the caller's job.
    pub async fn replay(&self, op: &PendingOperation) -> DispatchResult<Value> {
        let mut headers = op.headers.clone();
        apply_token(&mut headers, self.session.token().await?.as_deref());

        debug!(sequence = op.sequence, method = %op.method, url = %op.url, "Replaying");
        let body = self
            .send_live(op.method, &op.url, headers, op.body.clone())
            .await?;

        self.mirror(
            op.method,
            op.collection,
            sent_id(op.method, op.body.as_ref()),
            body.as_ref(),
        )
        .await;

        Ok(body.unwrap_or(Value::Null))
    }

    // =========================================================================
    // Live Path
    // =========================================================================

    async fn execute(&self, request: &TransportRequest) -> DispatchResult<TransportResponse> {
        self.transport.execute(request).await.map_err(|e| {
            warn!(method = %request.method, url = %request.url, error = %e, "Live call failed");
            DispatchError::unreachable(e.to_string())
        })
    }

    /// Sends once, refreshing and resending once on 401.
    async fn send_live(
        &self,
        method: HttpMethod,
        url: &str,
        headers: BTreeMap<String, String>,
        body: Option<Value>,
    ) -> DispatchResult<Option<Value>> {
        let mut request = TransportRequest::new(method, url)
            .with_headers(headers)
            .with_body(body);

        let mut response = self.execute(&request).await?;

        if response.is_unauthorized() {
            let stale = request.bearer_token().map(str::to_string);
            if !self.session.refresh(stale.as_deref()).await? {
                return Err(self.expire_session().await);
            }

            apply_token(&mut request.headers, self.session.token().await?.as_deref());
            response = self.execute(&request).await?;

            if response.is_unauthorized() {
                return Err(self.expire_session().await);
            }
        }

        if !response.is_success() {
            warn!(
                method = %method,
                url = %url,
                status = response.status,
                "Server rejected call"
            );
            return Err(DispatchError::status(response.status, response.error_message()));
        }

        Ok(response.body)
    }

    async fn expire_session(&self) -> DispatchError {
        warn!("Session rejected after refresh, clearing tokens");
        if let Err(e) = self.session.reset().await {
            error!(error = %e, "Failed to clear session tokens");
        }
        DispatchError::SessionExpired
    }

    /// Copies a successful live response into the cache.
    ///
    /// The server has already applied the call, so a cache failure is
    /// logged rather than returned.
    async fn mirror(
        &self,
        method: HttpMethod,
        collection: Option<Collection>,
        client_id: Option<EntityId>,
        body: Option<&Value>,
    ) {
        let Some(collection) = collection else {
            return;
        };

        let result = match (method, body) {
            (HttpMethod::Get, Some(body)) if self.options.cache_reads => {
                self.mirror_read(collection, body).await
            }
            (m, Some(body)) if m.returns_entity() => {
                self.mirror_write(collection, client_id, body).await
            }
            _ => Ok(()),
        };

        if let Err(e) = result {
            error!(
                collection = %collection,
                method = %method,
                error = %e,
                "Failed to mirror response into local cache"
            );
        }
    }

    async fn mirror_write(
        &self,
        collection: Collection,
        client_id: Option<EntityId>,
        body: &Value,
    ) -> DispatchResult<()> {
        let record = match Record::from_value(body.clone()) {
            Ok(record) => record,
            Err(e) => {
                debug!(collection = %collection, reason = %e, "Response is not an entity, not cached");
                return Ok(());
            }
        };

        match client_id {
            Some(client_id) if &client_id != record.id() => {
                info!(
                    collection = %collection,
                    client_id = %client_id,
                    server_id = %record.id(),
                    "Reconciling client id with server id"
                );
                self.store.replace(collection, &client_id, &record).await?;

                // Numeric ids are too ambiguous to chase through bodies.
                let rewritten = match client_id {
                    EntityId::Text(_) => {
                        self.store.rewrite_pending_id(&client_id, record.id()).await?
                    }
                    EntityId::Number(_) => 0,
                };
                if rewritten > 0 {
                    info!(
                        client_id = %client_id,
                        server_id = %record.id(),
                        rewritten,
                        "Queued operations re-targeted to server id"
                    );
                }
            }
            _ => self.store.upsert(collection, &record).await?,
        }

        debug!(collection = %collection, id = %record.id(), "Mirrored write into cache");
        Ok(())
    }

    async fn mirror_read(&self, collection: Collection, body: &Value) -> DispatchResult<()> {
        match body {
            Value::Array(items) => {
                let records: Vec<Record> = items
                    .iter()
                    .filter_map(|item| Record::from_value(item.clone()).ok())
                    .collect();
                self.store.upsert_many(collection, &records).await?;
                debug!(collection = %collection, count = records.len(), "Cached read");
            }
            Value::Object(_) => {
                if let Ok(record) = Record::from_value(body.clone()) {
                    self.store.upsert(collection, &record).await?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    // =========================================================================
    // Offline Path
    // =========================================================================

    async fn read_local(&self, request: &DispatchRequest) -> DispatchResult<Value> {
        let collection = match request.collection {
            Some(collection) if request.offline_fallback => collection,
            _ => {
                return Err(DispatchError::TransportUnavailable {
                    url: request.url.clone(),
                })
            }
        };

        if let Some(id) = request.item_id() {
            debug!(collection = %collection, id = %id, "Offline read by id");
            return self
                .store
                .get_by_id(collection, &id)
                .await?
                .map(Record::into_value)
                .ok_or_else(|| DispatchError::no_local_data(collection));
        }

        let records = self.store.get_all(collection).await?;
        debug!(collection = %collection, count = records.len(), "Offline read");
        if records.is_empty() {
            return Err(DispatchError::no_local_data(collection));
        }

        Ok(Value::Array(records.into_iter().map(Record::into_value).collect()))
    }

    async fn queue(&self, request: DispatchRequest) -> DispatchResult<Value> {
        if !request.offline_fallback {
            return Err(DispatchError::TransportUnavailable { url: request.url });
        }

        let headers = self.session.auth_headers().await?;
        let op = NewPendingOperation::new(request.method, request.url)?
            .with_headers(headers)
            .with_body(request.body)
            .with_collection(request.collection);

        let queued = self.store.enqueue_pending(op).await?;

        warn!(
            sequence = queued.sequence,
            method = %queued.method,
            url = %queued.url,
            "Offline, write queued for sync"
        );

        Err(DispatchError::OperationQueued {
            sequence: queued.sequence,
        })
    }

    // =========================================================================
    // Typed Helpers
    // =========================================================================

    /// Every entity of `T`'s collection.
    pub async fn list<T: Entity>(&self) -> DispatchResult<Vec<T>> {
        let value = self.dispatch(DispatchRequest::get(T::COLLECTION.path())).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// One entity by id.
    pub async fn fetch<T: Entity>(&self, id: &EntityId) -> DispatchResult<T> {
        let value = self
            .dispatch(DispatchRequest::get(T::COLLECTION.item_path(id)))
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Creates an entity after validating it.
    pub async fn create<T: Entity>(&self, entity: &T) -> DispatchResult<T> {
        let record = Record::from_entity(entity)?;
        let value = self
            .dispatch(DispatchRequest::post(T::COLLECTION.path(), record.into_value()))
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Replaces an entity after validating it.
    pub async fn update<T: Entity>(&self, entity: &T) -> DispatchResult<T> {
        let record = Record::from_entity(entity)?;
        let value = self
            .dispatch(DispatchRequest::put(
                T::COLLECTION.item_path(entity.id()),
                record.into_value(),
            ))
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Changes some fields of an entity. The id cannot be patched.
    pub async fn patch<T: Entity>(
        &self,
        id: &EntityId,
        mut fields: Map<String, Value>,
    ) -> DispatchResult<T> {
        fields.remove("id");
        let value = self
            .dispatch(DispatchRequest::patch(
                T::COLLECTION.item_path(id),
                Value::Object(fields),
            ))
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Deletes an entity. The cache is left as is.
    pub async fn remove<T: Entity>(&self, id: &EntityId) -> DispatchResult<()> {
        self.dispatch(DispatchRequest::delete(T::COLLECTION.item_path(id)))
            .await?;
        Ok(())
    }
}

/// Gives a create payload a client id if it has none.
fn assign_client_id(body: Value) -> DispatchResult<Value> {
    match body {
        Value::Object(_) => Ok(Record::with_generated_id(body)?.into_value()),
        other => Ok(other),
    }
}
