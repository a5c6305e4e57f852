//! # Wire Types
//!
//! The shapes that cross the data-access layer: entity identifiers,
//! collection names, HTTP-style methods and queued write operations.
//!
//! ## Type Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Wire Types                                     │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────────┐   │
//! │  │    EntityId     │   │   Collection    │   │  PendingOperation   │   │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────────  │   │
//! │  │  Number(i64)    │   │  products       │   │  sequence (auto)    │   │
//! │  │  Text(String)   │   │  sales          │   │  url  (/sales)      │   │
//! │  └─────────────────┘   │  branches ...   │   │  method (POST)      │   │
//! │                        └─────────────────┘   │  headers, body      │   │
//! │  ┌─────────────────┐                         │  created_at         │   │
//! │  │   HttpMethod    │                         └─────────────────────┘   │
//! │  │  GET POST PUT   │                                                   │
//! │  │  PATCH DELETE   │                                                   │
//! │  └─────────────────┘                                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;
use uuid::Uuid;

use crate::error::{CoreError, ValidationError};

// =============================================================================
// Entity Identifier
// =============================================================================

/// Identifier of an entity, unique within its collection.
///
/// The upstream API hands out both numeric ids (legacy branch and outlet
/// records) and string ids (UUIDs), so both are accepted. The storage key is
/// the [`Display`](fmt::Display) form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(untagged)]
pub enum EntityId {
    /// Numeric id assigned by the server.
    Number(i64),
    /// String id (server-assigned or client-generated UUID).
    Text(String),
}

impl EntityId {
    /// Generates a fresh client-side id (UUID v4).
    ///
    /// Creates carry this id from the moment they are issued, so a create
    /// queued offline and replayed later lands under the same key.
    pub fn generate() -> Self {
        EntityId::Text(Uuid::new_v4().to_string())
    }

    /// Parses an id out of a JSON value.
    ///
    /// ## Rules
    /// - Non-empty strings become [`EntityId::Text`]
    /// - Integers that fit in `i64` become [`EntityId::Number`]
    /// - Anything else (null, floats, objects, blank strings) is rejected
    pub fn from_value(value: &Value) -> Result<Self, ValidationError> {
        match value {
            Value::String(s) if !s.trim().is_empty() => Ok(EntityId::Text(s.clone())),
            Value::Number(n) => n.as_i64().map(EntityId::Number).ok_or_else(|| {
                ValidationError::InvalidFormat {
                    field: "id".to_string(),
                    reason: format!("numeric id must be an integer, got {}", n),
                }
            }),
            Value::String(_) | Value::Null => Err(ValidationError::Required {
                field: "id".to_string(),
            }),
            other => Err(ValidationError::InvalidFormat {
                field: "id".to_string(),
                reason: format!("expected string or integer, got {}", other),
            }),
        }
    }

    /// Returns the id as a JSON value.
    pub fn to_value(&self) -> Value {
        match self {
            EntityId::Number(n) => Value::from(*n),
            EntityId::Text(s) => Value::from(s.as_str()),
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityId::Number(n) => write!(f, "{}", n),
            EntityId::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        EntityId::Text(s.to_string())
    }
}

impl From<String> for EntityId {
    fn from(s: String) -> Self {
        EntityId::Text(s)
    }
}

impl From<i64> for EntityId {
    fn from(n: i64) -> Self {
        EntityId::Number(n)
    }
}

// =============================================================================
// Collection
// =============================================================================

/// A named partition of entities, one per upstream collection endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "kebab-case")]
pub enum Collection {
    Products,
    Sales,
    Branches,
    Outlets,
    Customers,
    Tanks,
    ProductCategories,
    Users,
    Managers,
    SalesReturns,
    Audit,
}

impl Collection {
    /// Every collection the console talks to.
    pub const ALL: [Collection; 11] = [
        Collection::Products,
        Collection::Sales,
        Collection::Branches,
        Collection::Outlets,
        Collection::Customers,
        Collection::Tanks,
        Collection::ProductCategories,
        Collection::Users,
        Collection::Managers,
        Collection::SalesReturns,
        Collection::Audit,
    ];

    /// Storage/partition name, e.g. `"product-categories"`.
    pub const fn name(&self) -> &'static str {
        match self {
            Collection::Products => "products",
            Collection::Sales => "sales",
            Collection::Branches => "branches",
            Collection::Outlets => "outlets",
            Collection::Customers => "customers",
            Collection::Tanks => "tanks",
            Collection::ProductCategories => "product-categories",
            Collection::Users => "users",
            Collection::Managers => "managers",
            Collection::SalesReturns => "sales-returns",
            Collection::Audit => "audit",
        }
    }

    /// Collection endpoint path relative to the API base, e.g. `"/sales"`.
    pub fn path(&self) -> String {
        format!("/{}", self.name())
    }

    /// Path of a single entity, e.g. `"/sales/42"`.
    pub fn item_path(&self, id: &EntityId) -> String {
        format!("/{}/{}", self.name(), id)
    }

    /// Resolves the collection an endpoint path belongs to.
    ///
    /// `"/sales"`, `"/sales/42"` and `"sales?page=2"` all resolve to
    /// [`Collection::Sales`]. Unknown first segments return `None`.
    pub fn from_path(path: &str) -> Option<Self> {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let first = path.trim_start_matches('/').split('/').next()?;
        first.parse().ok()
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Collection {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Collection::ALL
            .iter()
            .copied()
            .find(|c| c.name() == s)
            .ok_or_else(|| CoreError::UnknownCollection(s.to_string()))
    }
}

// =============================================================================
// HTTP Method
// =============================================================================

/// HTTP-style method of a logical API call.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "UPPERCASE"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    /// Returns the canonical upper-case name.
    pub const fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }

    /// True for every method that changes server state.
    pub const fn is_write(&self) -> bool {
        !matches!(self, HttpMethod::Get)
    }

    /// True for writes whose response body is the stored entity
    /// (POST/PUT/PATCH). DELETE responses are never mirrored.
    pub const fn returns_entity(&self) -> bool {
        matches!(self, HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "PATCH" => Ok(HttpMethod::Patch),
            "DELETE" => Ok(HttpMethod::Delete),
            other => Err(CoreError::UnknownMethod(other.to_string())),
        }
    }
}

// =============================================================================
// Pending Operation
// =============================================================================

/// A write that was attempted while offline and waits for replay.
///
/// Rows are created only by offline writes and removed only after a
/// confirmed successful replay. The `sequence` is assigned by the local
/// store and defines replay order (FIFO).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct PendingOperation {
    /// Auto-incrementing local sequence number.
    pub sequence: i64,

    /// Endpoint path relative to the API base, e.g. `/sales`.
    pub url: String,

    /// Write method (never GET).
    pub method: HttpMethod,

    /// Request headers captured at enqueue time.
    pub headers: BTreeMap<String, String>,

    /// Request body, if any.
    #[ts(type = "unknown")]
    pub body: Option<Value>,

    /// Cache partition to mirror the replay response into.
    pub collection: Option<Collection>,

    /// When the write was attempted.
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// A pending operation before the store has assigned its sequence number.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPendingOperation {
    pub url: String,
    pub method: HttpMethod,
    pub headers: BTreeMap<String, String>,
    pub body: Option<Value>,
    pub collection: Option<Collection>,
    pub created_at: DateTime<Utc>,
}

impl NewPendingOperation {
    /// Describes a write to `url`, stamped with the current time.
    ///
    /// Returns an error for GET: reads are never queued.
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Result<Self, CoreError> {
        if !method.is_write() {
            return Err(CoreError::NotAWrite(method.to_string()));
        }
        Ok(NewPendingOperation {
            url: url.into(),
            method,
            headers: BTreeMap::new(),
            body: None,
            collection: None,
            created_at: Utc::now(),
        })
    }

    pub fn with_headers(mut self, headers: BTreeMap<String, String>) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_body(mut self, body: Option<Value>) -> Self {
        self.body = body;
        self
    }

    pub fn with_collection(mut self, collection: Option<Collection>) -> Self {
        self.collection = collection;
        self
    }

    /// Attaches the sequence number assigned by the store.
    pub fn into_pending(self, sequence: i64) -> PendingOperation {
        PendingOperation {
            sequence,
            url: self.url,
            method: self.method,
            headers: self.headers,
            body: self.body,
            collection: self.collection,
            created_at: self.created_at,
        }
    }
}

impl PendingOperation {
    /// Points this operation at `new` wherever it still refers to `old`:
    /// path segments of the URL, and any body value equal to `old` (the
    /// entity's own `id` or a reference such as `saleId`).
    ///
    /// Returns whether anything changed.
    pub fn rewrite_id(&mut self, old: &EntityId, new: &EntityId) -> bool {
        let mut changed = false;

        let old_segment = old.to_string();
        let (path, rest) = match self.url.find(['?', '#']) {
            Some(idx) => self.url.split_at(idx),
            None => (self.url.as_str(), ""),
        };
        if path.split('/').any(|segment| segment == old_segment) {
            let new_segment = new.to_string();
            let path: Vec<&str> = path
                .split('/')
                .map(|segment| {
                    if segment == old_segment {
                        new_segment.as_str()
                    } else {
                        segment
                    }
                })
                .collect();
            self.url = format!("{}{}", path.join("/"), rest);
            changed = true;
        }

        if let Some(body) = self.body.as_mut() {
            changed |= replace_value(body, &old.to_value(), &new.to_value());
        }

        changed
    }
}

fn replace_value(value: &mut Value, old: &Value, new: &Value) -> bool {
    if value == old {
        *value = new.clone();
        return true;
    }
    match value {
        Value::Object(map) => map
            .values_mut()
            .fold(false, |changed, v| replace_value(v, old, new) | changed),
        Value::Array(items) => items
            .iter_mut()
            .fold(false, |changed, v| replace_value(v, old, new) | changed),
        _ => false,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_entity_id_from_value() {
        assert_eq!(EntityId::from_value(&json!(7)).unwrap(), EntityId::Number(7));
        assert_eq!(
            EntityId::from_value(&json!("br-1")).unwrap(),
            EntityId::Text("br-1".into())
        );
        assert!(EntityId::from_value(&json!("  ")).is_err());
        assert!(EntityId::from_value(&json!(null)).is_err());
        assert!(EntityId::from_value(&json!(1.5)).is_err());
        assert!(EntityId::from_value(&json!({"id": 1})).is_err());
    }

    #[test]
    fn test_entity_id_untagged_serde() {
        let n: EntityId = serde_json::from_str("42").unwrap();
        let s: EntityId = serde_json::from_str("\"abc\"").unwrap();
        assert_eq!(n, EntityId::Number(42));
        assert_eq!(s, EntityId::Text("abc".into()));
        assert_eq!(n.to_string(), "42");
    }

    #[test]
    fn test_collection_paths() {
        assert_eq!(Collection::SalesReturns.path(), "/sales-returns");
        assert_eq!(
            Collection::Sales.item_path(&EntityId::Number(3)),
            "/sales/3"
        );
        assert_eq!(Collection::from_path("/sales/3"), Some(Collection::Sales));
        assert_eq!(
            Collection::from_path("product-categories?page=2"),
            Some(Collection::ProductCategories)
        );
        assert_eq!(Collection::from_path("/auth/refresh"), None);
    }

    #[test]
    fn test_collection_serde_matches_name() {
        for c in Collection::ALL {
            let json = serde_json::to_string(&c).unwrap();
            assert_eq!(json, format!("\"{}\"", c.name()));
        }
    }

    #[test]
    fn test_method_classification() {
        assert!(!HttpMethod::Get.is_write());
        assert!(HttpMethod::Delete.is_write());
        assert!(!HttpMethod::Delete.returns_entity());
        assert!(HttpMethod::Patch.returns_entity());
        assert_eq!("patch".parse::<HttpMethod>().unwrap(), HttpMethod::Patch);
        assert!("TRACE".parse::<HttpMethod>().is_err());
    }

    #[test]
    fn test_reads_are_never_queued() {
        assert!(NewPendingOperation::new(HttpMethod::Get, "/sales").is_err());

        let op = NewPendingOperation::new(HttpMethod::Post, "/sales")
            .unwrap()
            .with_collection(Some(Collection::Sales))
            .into_pending(5);
        assert_eq!(op.sequence, 5);
        assert_eq!(op.collection, Some(Collection::Sales));
    }

    #[test]
    fn test_rewrite_id_follows_server_id() {
        let client = EntityId::Text("c-1".into());
        let server = EntityId::Number(1001);

        let mut patch = NewPendingOperation::new(HttpMethod::Patch, "/sales/c-1?notify=1")
            .unwrap()
            .with_body(Some(json!({"id": "c-1", "quantity": 3})))
            .into_pending(2);
        assert!(patch.rewrite_id(&client, &server));
        assert_eq!(patch.url, "/sales/1001?notify=1");
        assert_eq!(patch.body, Some(json!({"id": 1001, "quantity": 3})));

        let mut refund = NewPendingOperation::new(HttpMethod::Post, "/sales-returns")
            .unwrap()
            .with_body(Some(json!({"id": "r-1", "saleId": "c-1", "lines": [{"saleId": "c-1"}]})))
            .into_pending(3);
        assert!(refund.rewrite_id(&client, &server));
        assert_eq!(
            refund.body,
            Some(json!({"id": "r-1", "saleId": 1001, "lines": [{"saleId": 1001}]}))
        );

        let mut unrelated = NewPendingOperation::new(HttpMethod::Delete, "/sales/c-10")
            .unwrap()
            .into_pending(4);
        assert!(!unrelated.rewrite_id(&client, &server));
        assert_eq!(unrelated.url, "/sales/c-10");
    }
}
