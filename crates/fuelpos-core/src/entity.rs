//! # Entities
//!
//! Domain records the console reads and writes, and the free-form
//! [`Record`] they travel as through the cache and the pending queue.
//!
//! ## Typed vs. Free-Form
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Entity Shapes                                    │
//! │                                                                         │
//! │  Console code                                                          │
//! │       │  Branch { id, name, address }        (typed, validated)        │
//! │       ▼                                                                 │
//! │  Record::from_entity(&branch)                                          │
//! │       │  { "id": "...", "name": "North", ... } (object + checked id)   │
//! │       ▼                                                                 │
//! │  LocalStore / PendingOperation / Transport                             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  record.to_entity::<Branch>()                 (typed again)            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Attributes the typed structs don't name survive in the `Record`, so
//! nothing the server sends is lost by a round-trip through the cache.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{Collection, EntityId};
use crate::validation::{
    validate_email, validate_entity_id, validate_name, validate_price_cents, validate_quantity,
    validate_tank_level, ValidationResult,
};

// =============================================================================
// Entity Trait
// =============================================================================

/// A domain record that lives in exactly one collection.
///
/// The id is immutable once the entity exists; updates replace every other
/// attribute.
pub trait Entity: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Collection (and cache partition) this entity belongs to.
    const COLLECTION: Collection;

    /// Returns the entity's id.
    fn id(&self) -> &EntityId;

    /// Checks the entity before it is handed to the dispatcher.
    fn validate(&self) -> ValidationResult<()> {
        validate_entity_id(self.id())
    }
}

// =============================================================================
// Record
// =============================================================================

/// A JSON object entity whose `id` has been checked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub struct Record {
    id: EntityId,
    body: Map<String, Value>,
}

impl Record {
    /// Wraps a JSON object that already carries an id.
    pub fn from_value(value: Value) -> CoreResult<Self> {
        let body = match value {
            Value::Object(map) => map,
            other => return Err(CoreError::NotAnObject(type_name(&other).to_string())),
        };

        let id = EntityId::from_value(body.get("id").unwrap_or(&Value::Null))?;
        validate_entity_id(&id)?;

        Ok(Record { id, body })
    }

    /// Wraps a JSON object, assigning a client-generated id when the
    /// payload has none (missing or `null`).
    pub fn with_generated_id(value: Value) -> CoreResult<Self> {
        let mut body = match value {
            Value::Object(map) => map,
            other => return Err(CoreError::NotAnObject(type_name(&other).to_string())),
        };

        if body.get("id").map_or(true, Value::is_null) {
            body.insert("id".to_string(), EntityId::generate().to_value());
        }

        Record::from_value(Value::Object(body))
    }

    /// Serializes a typed entity, validating it first.
    pub fn from_entity<T: Entity>(entity: &T) -> CoreResult<Self> {
        entity.validate()?;
        let value = serde_json::to_value(entity)
            .map_err(|e| CoreError::invalid_entity(T::COLLECTION.name(), e.to_string()))?;
        Record::from_value(value)
    }

    /// Deserializes into a typed entity.
    pub fn to_entity<T: Entity>(&self) -> CoreResult<T> {
        serde_json::from_value(Value::Object(self.body.clone()))
            .map_err(|e| CoreError::invalid_entity(T::COLLECTION.name(), e.to_string()))
    }

    pub fn id(&self) -> &EntityId {
        &self.id
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.body.get(key)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.body
    }

    /// Shallow-merges `patch` into this record. The id is never changed.
    pub fn merge(&mut self, patch: &Map<String, Value>) {
        for (key, value) in patch {
            if key != "id" {
                self.body.insert(key.clone(), value.clone());
            }
        }
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.body.clone())
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.body)
    }
}

impl TryFrom<Value> for Record {
    type Error = CoreError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Record::from_value(value)
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        record.into_value()
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// =============================================================================
// Catalog: Products & Categories
// =============================================================================

/// A product sold at the forecourt or shop (fuel grades included).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub category_id: Option<EntityId>,
    /// Price per unit (per litre for fuel) in cents.
    pub price_cents: i64,
    /// Fuel grades are sold by volume and stored in tanks.
    #[serde(default)]
    pub is_fuel: bool,
    #[serde(default = "default_true")]
    pub active: bool,
}

impl Entity for Product {
    const COLLECTION: Collection = Collection::Products;

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn validate(&self) -> ValidationResult<()> {
        validate_entity_id(&self.id)?;
        validate_name("name", &self.name)?;
        validate_price_cents("priceCents", self.price_cents)
    }
}

impl Product {
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ProductCategory {
    pub id: EntityId,
    pub name: String,
}

impl Entity for ProductCategory {
    const COLLECTION: Collection = Collection::ProductCategories;

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn validate(&self) -> ValidationResult<()> {
        validate_entity_id(&self.id)?;
        validate_name("name", &self.name)
    }
}

// =============================================================================
// Sites: Branches, Outlets, Tanks
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Branch {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub manager_id: Option<EntityId>,
}

impl Entity for Branch {
    const COLLECTION: Collection = Collection::Branches;

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn validate(&self) -> ValidationResult<()> {
        validate_entity_id(&self.id)?;
        validate_name("name", &self.name)
    }
}

/// A filling station belonging to a branch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Outlet {
    pub id: EntityId,
    pub name: String,
    pub branch_id: EntityId,
}

impl Entity for Outlet {
    const COLLECTION: Collection = Collection::Outlets;

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn validate(&self) -> ValidationResult<()> {
        validate_entity_id(&self.id)?;
        validate_name("name", &self.name)
    }
}

/// An underground storage tank holding one fuel product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Tank {
    pub id: EntityId,
    pub name: String,
    pub outlet_id: EntityId,
    pub product_id: EntityId,
    pub capacity_litres: i64,
    pub level_litres: i64,
}

impl Entity for Tank {
    const COLLECTION: Collection = Collection::Tanks;

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn validate(&self) -> ValidationResult<()> {
        validate_entity_id(&self.id)?;
        validate_name("name", &self.name)?;
        validate_tank_level(self.capacity_litres, self.level_litres)
    }
}

impl Tank {
    /// Fill level in whole percent.
    pub fn fill_percent(&self) -> i64 {
        if self.capacity_litres <= 0 {
            return 0;
        }
        self.level_litres * 100 / self.capacity_litres
    }
}

// =============================================================================
// People: Customers, Staff, Managers
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    /// Credit limit for fleet/account customers.
    #[serde(default)]
    pub credit_limit_cents: Option<i64>,
}

impl Entity for Customer {
    const COLLECTION: Collection = Collection::Customers;

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn validate(&self) -> ValidationResult<()> {
        validate_entity_id(&self.id)?;
        validate_name("name", &self.name)?;
        validate_email("email", self.email.as_deref())?;
        if let Some(limit) = self.credit_limit_cents {
            validate_price_cents("creditLimitCents", limit)?;
        }
        Ok(())
    }
}

/// A console user (cashier, attendant, admin).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct StaffUser {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    pub role: String,
    #[serde(default)]
    pub outlet_id: Option<EntityId>,
}

impl Entity for StaffUser {
    const COLLECTION: Collection = Collection::Users;

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn validate(&self) -> ValidationResult<()> {
        validate_entity_id(&self.id)?;
        validate_name("name", &self.name)?;
        validate_name("role", &self.role)?;
        validate_email("email", self.email.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Manager {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub branch_id: Option<EntityId>,
}

impl Entity for Manager {
    const COLLECTION: Collection = Collection::Managers;

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn validate(&self) -> ValidationResult<()> {
        validate_entity_id(&self.id)?;
        validate_name("name", &self.name)?;
        validate_email("email", self.email.as_deref())
    }
}

// =============================================================================
// Transactions: Sales, Returns, Audit
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Sale {
    pub id: EntityId,
    pub product_id: EntityId,
    #[serde(default)]
    pub outlet_id: Option<EntityId>,
    #[serde(default)]
    pub customer_id: Option<EntityId>,
    pub quantity: i64,
    pub unit_price_cents: i64,
    #[serde(default)]
    #[ts(as = "Option<String>")]
    pub sold_at: Option<DateTime<Utc>>,
}

impl Entity for Sale {
    const COLLECTION: Collection = Collection::Sales;

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn validate(&self) -> ValidationResult<()> {
        validate_entity_id(&self.id)?;
        validate_quantity("quantity", self.quantity)?;
        validate_price_cents("unitPriceCents", self.unit_price_cents)
    }
}

impl Sale {
    pub fn total(&self) -> Money {
        Money::from_cents(self.unit_price_cents).multiply_quantity(self.quantity)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct SalesReturn {
    pub id: EntityId,
    pub sale_id: EntityId,
    pub quantity: i64,
    pub refund_cents: i64,
    #[serde(default)]
    pub reason: Option<String>,
}

impl Entity for SalesReturn {
    const COLLECTION: Collection = Collection::SalesReturns;

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn validate(&self) -> ValidationResult<()> {
        validate_entity_id(&self.id)?;
        validate_quantity("quantity", self.quantity)?;
        validate_price_cents("refundCents", self.refund_cents)
    }
}

/// An audit trail entry. Written by the server; the console only reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub id: EntityId,
    pub action: String,
    #[serde(default)]
    pub actor_id: Option<EntityId>,
    #[serde(default)]
    pub target: Option<String>,
    #[ts(as = "String")]
    pub at: DateTime<Utc>,
}

impl Entity for AuditEntry {
    const COLLECTION: Collection = Collection::Audit;

    fn id(&self) -> &EntityId {
        &self.id
    }
}

fn default_true() -> bool {
    true
}

// =============================================================================
// Unit Tests
// =============================================================================
