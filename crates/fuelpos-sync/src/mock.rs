//! # Mock Transport
//!
//! An in-process stand-in for the upstream REST API, served from an
//! in-memory dataset. Used for demos without a backend and by every
//! dispatcher and sync test.
//!
//! ## Routes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Mock Routes                                     │
//! │                                                                         │
//! │  GET    /{collection}          200  every entity, newest first         │
//! │  GET    /{collection}/{id}     200 | 404                               │
//! │  POST   /{collection}          201  prepended, id assigned if missing  │
//! │                                200  existing id updated in place       │
//! │  PUT    /{collection}/{id}     200  replaced (id kept) | 404           │
//! │  PATCH  /{collection}/{id}     200  shallow merge | 404                │
//! │  DELETE /{collection}/{id}     204 | 404                               │
//! │  POST   /auth/refresh          200  { token, refreshToken } | 401      │
//! │                                                                         │
//! │  Unknown collection → 404      Write to a collection root → 405        │
//! │                                                                         │
//! │  Test hooks: fail_next, fail_matching, with_auth, expire_token,        │
//! │              reassign_ids                                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, VecDeque};
use tokio::sync::Mutex;
use tracing::debug;

use fuelpos_core::{demo, Collection, EntityId, HttpMethod, Record};

use crate::transport::{Transport, TransportError, TransportRequest, TransportResponse};

/// Path of the token refresh endpoint.
pub const REFRESH_PATH: &str = "/auth/refresh";

/// An injected failure.
#[derive(Debug, Clone, PartialEq)]
pub enum MockFailure {
    /// Respond with this status.
    Status(u16),
    /// Fail without a response.
    Unreachable,
}

#[derive(Debug, Clone)]
struct FailureRule {
    method: Option<HttpMethod>,
    path_contains: String,
    failure: MockFailure,
}

impl FailureRule {
    fn matches(&self, request: &TransportRequest) -> bool {
        self.method.map_or(true, |m| m == request.method)
            && request.url.contains(&self.path_contains)
    }
}

#[derive(Debug, Default)]
struct AuthState {
    token: String,
    refresh_token: String,
    issued: u64,
}

impl AuthState {
    fn rotate(&mut self) -> (String, String) {
        self.issued += 1;
        self.token = format!("mock-token-{}", self.issued);
        self.refresh_token = format!("mock-refresh-{}", self.issued);
        (self.token.clone(), self.refresh_token.clone())
    }
}

#[derive(Debug, Default)]
struct MockState {
    collections: BTreeMap<Collection, Vec<Record>>,
    requests: Vec<TransportRequest>,
    one_shot: VecDeque<MockFailure>,
    rules: Vec<FailureRule>,
    auth: Option<AuthState>,
    reassign_ids: bool,
    next_id: i64,
}

/// In-memory upstream API.
#[derive(Debug)]
pub struct MockTransport {
    state: Mutex<MockState>,
}

impl MockTransport {
    /// Creates an empty mock: every collection starts with no entities.
    pub fn new() -> Self {
        MockTransport::with_dataset(BTreeMap::new())
    }

    pub fn with_dataset(collections: BTreeMap<Collection, Vec<Record>>) -> Self {
        MockTransport {
            state: Mutex::new(MockState {
                collections,
                next_id: 1000,
                ..MockState::default()
            }),
        }
    }

    /// Creates a mock serving the demo fuel-station dataset.
    pub fn demo() -> Self {
        MockTransport::with_dataset(demo::dataset())
    }

    // =========================================================================
    // Test Hooks
    // =========================================================================

    /// Requires `Authorization: Bearer <token>` on every route except
    /// refresh, which accepts `refresh_token`.
    pub async fn with_auth(&self, token: &str, refresh_token: &str) {
        let mut state = self.state.lock().await;
        state.auth = Some(AuthState {
            token: token.to_string(),
            refresh_token: refresh_token.to_string(),
            issued: 0,
        });
    }

    /// Invalidates the current access token; the refresh token still works.
    pub async fn expire_token(&self) {
        let mut state = self.state.lock().await;
        if let Some(auth) = state.auth.as_mut() {
            auth.token = format!("expired-{}", auth.token);
        }
    }

    /// Invalidates the refresh token as well.
    pub async fn revoke_session(&self) {
        let mut state = self.state.lock().await;
        if let Some(auth) = state.auth.as_mut() {
            auth.token = format!("revoked-{}", auth.token);
            auth.refresh_token = format!("revoked-{}", auth.refresh_token);
        }
    }

    /// Fails the next request, whatever it is.
    pub async fn fail_next(&self, failure: MockFailure) {
        self.state.lock().await.one_shot.push_back(failure);
    }

    /// Fails every request whose path contains `path_contains` (and whose
    /// method matches, if given) until [`clear_failures`](Self::clear_failures).
    pub async fn fail_matching(
        &self,
        method: Option<HttpMethod>,
        path_contains: &str,
        failure: MockFailure,
    ) {
        self.state.lock().await.rules.push(FailureRule {
            method,
            path_contains: path_contains.to_string(),
            failure,
        });
    }

    pub async fn clear_failures(&self) {
        let mut state = self.state.lock().await;
        state.one_shot.clear();
        state.rules.clear();
    }

    /// When enabled, creates always get a server-assigned numeric id,
    /// replacing any id the client sent.
    pub async fn reassign_ids(&self, enabled: bool) {
        self.state.lock().await.reassign_ids = enabled;
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// Every request received, in arrival order.
    pub async fn requests(&self) -> Vec<TransportRequest> {
        self.state.lock().await.requests.clone()
    }

    pub async fn request_count(&self) -> usize {
        self.state.lock().await.requests.len()
    }

    /// Snapshot of one collection as the server holds it.
    pub async fn collection(&self, collection: Collection) -> Vec<Record> {
        self.state
            .lock()
            .await
            .collections
            .get(&collection)
            .cloned()
            .unwrap_or_default()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        MockTransport::new()
    }
}

// =============================================================================
// Routing
// =============================================================================

fn respond(status: u16, body: Value) -> TransportResponse {
    TransportResponse::new(status, Some(body))
}

fn error(status: u16, message: &str) -> TransportResponse {
    respond(status, json!({ "message": message }))
}

fn object_body(request: &TransportRequest) -> Option<Map<String, Value>> {
    match &request.body {
        Some(Value::Object(map)) => Some(map.clone()),
        _ => None,
    }
}

impl MockState {
    fn injected_failure(&mut self, request: &TransportRequest) -> Option<MockFailure> {
        if let Some(failure) = self.one_shot.pop_front() {
            return Some(failure);
        }
        self.rules
            .iter()
            .find(|rule| rule.matches(request))
            .map(|rule| rule.failure.clone())
    }

    fn authorized(&self, request: &TransportRequest) -> bool {
        match &self.auth {
            Some(auth) => request.bearer_token() == Some(auth.token.as_str()),
            None => true,
        }
    }

    fn refresh(&mut self, request: &TransportRequest) -> TransportResponse {
        let presented = object_body(request)
            .and_then(|body| body.get("refreshToken").and_then(Value::as_str).map(str::to_string));

        match self.auth.as_mut() {
            Some(auth) if presented.as_deref() != Some(auth.refresh_token.as_str()) => {
                error(401, "invalid refresh token")
            }
            Some(auth) => {
                let (token, refresh_token) = auth.rotate();
                respond(200, json!({ "token": token, "refreshToken": refresh_token }))
            }
            None => {
                let (token, refresh_token) = AuthState::default().rotate();
                respond(200, json!({ "token": token, "refreshToken": refresh_token }))
            }
        }
    }

    fn route(&mut self, request: &TransportRequest) -> TransportResponse {
        let path = request.url.split(['?', '#']).next().unwrap_or_default();

        if path == REFRESH_PATH && request.method == HttpMethod::Post {
            return self.refresh(request);
        }
        if !self.authorized(request) {
            return error(401, "unauthorized");
        }

        let mut segments = path.trim_start_matches('/').split('/').filter(|s| !s.is_empty());
        let collection = match segments.next().and_then(|s| s.parse::<Collection>().ok()) {
            Some(c) => c,
            None => return error(404, "unknown endpoint"),
        };
        let item = segments.next();
        if segments.next().is_some() {
            return error(404, "unknown endpoint");
        }

        match (request.method, item) {
            (HttpMethod::Get, None) => self.list(collection),
            (HttpMethod::Get, Some(id)) => self.get(collection, id),
            (HttpMethod::Post, None) => self.create(collection, request),
            (HttpMethod::Put, Some(id)) => self.replace(collection, id, request),
            (HttpMethod::Patch, Some(id)) => self.patch(collection, id, request),
            (HttpMethod::Delete, Some(id)) => self.delete(collection, id),
            _ => error(405, "method not allowed"),
        }
    }

    fn entities(&mut self, collection: Collection) -> &mut Vec<Record> {
        self.collections.entry(collection).or_default()
    }

    fn position(&mut self, collection: Collection, id: &str) -> Option<usize> {
        self.entities(collection)
            .iter()
            .position(|r| r.id().to_string() == id)
    }

    fn list(&mut self, collection: Collection) -> TransportResponse {
        let items: Vec<Value> = self.entities(collection).iter().map(Record::to_value).collect();
        respond(200, Value::Array(items))
    }

    fn get(&mut self, collection: Collection, id: &str) -> TransportResponse {
        match self.position(collection, id) {
            Some(idx) => respond(200, self.entities(collection)[idx].to_value()),
            None => error(404, "not found"),
        }
    }

    fn create(&mut self, collection: Collection, request: &TransportRequest) -> TransportResponse {
        let mut body = match object_body(request) {
            Some(body) => body,
            None => return error(400, "body must be a JSON object"),
        };

        let missing = body.get("id").map_or(true, Value::is_null);
        if self.reassign_ids || missing {
            self.next_id += 1;
            body.insert("id".to_string(), EntityId::Number(self.next_id).to_value());
        }

        let record = match Record::from_value(Value::Object(body)) {
            Ok(record) => record,
            Err(e) => return error(400, &e.to_string()),
        };
        let response = record.to_value();
        let id = record.id().to_string();
        // A create replayed after a lost response lands on the same entity.
        match self.position(collection, &id) {
            Some(idx) => {
                self.entities(collection)[idx] = record;
                respond(200, response)
            }
            None => {
                self.entities(collection).insert(0, record);
                respond(201, response)
            }
        }
    }

    fn replace(
        &mut self,
        collection: Collection,
        id: &str,
        request: &TransportRequest,
    ) -> TransportResponse {
        let Some(idx) = self.position(collection, id) else {
            return error(404, "not found");
        };
        let Some(mut body) = object_body(request) else {
            return error(400, "body must be a JSON object");
        };

        let entities = self.entities(collection);
        body.insert("id".to_string(), entities[idx].id().to_value());
        match Record::from_value(Value::Object(body)) {
            Ok(record) => {
                let response = record.to_value();
                entities[idx] = record;
                respond(200, response)
            }
            Err(e) => error(400, &e.to_string()),
        }
    }

    fn patch(
        &mut self,
        collection: Collection,
        id: &str,
        request: &TransportRequest,
    ) -> TransportResponse {
        let Some(idx) = self.position(collection, id) else {
            return error(404, "not found");
        };
        let Some(body) = object_body(request) else {
            return error(400, "body must be a JSON object");
        };

        let entity = &mut self.entities(collection)[idx];
        entity.merge(&body);
        respond(200, entity.to_value())
    }

    fn delete(&mut self, collection: Collection, id: &str) -> TransportResponse {
        match self.position(collection, id) {
            Some(idx) => {
                self.entities(collection).remove(idx);
                TransportResponse::new(204, None)
            }
            None => error(404, "not found"),
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn execute(&self, request: &TransportRequest) -> Result<TransportResponse, TransportError> {
        let mut state = self.state.lock().await;
        state.requests.push(request.clone());

        match state.injected_failure(request) {
            Some(MockFailure::Unreachable) => {
                debug!(method = %request.method, url = %request.url, "Mock: injected unreachable");
                return Err(TransportError::Unreachable("injected failure".to_string()));
            }
            Some(MockFailure::Status(status)) => {
                debug!(method = %request.method, url = %request.url, status, "Mock: injected status");
                return Ok(error(status, "injected failure"));
            }
            None => {}
        }

        let response = state.route(request);
        debug!(
            method = %request.method,
            url = %request.url,
            status = response.status,
            "Mock response"
        );
        Ok(response)
    }
}
