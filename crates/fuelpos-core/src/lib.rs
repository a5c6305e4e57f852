//! # fuelpos-core: Shared Types for the FuelPOS Console
//!
//! This crate holds the types every other layer agrees on: entity ids,
//! collections, queued write operations and the typed fuel-station entities.
//! It performs no I/O.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     FuelPOS Console Architecture                        │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 Console screens (UI code)                       │   │
//! │  │     Products ── Sales ── Tanks ── Branches ── Reports          │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ dispatch(url, method, body)            │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │          fuelpos-sync (dispatcher, network, replay)            │   │
//! │  └──────────────┬──────────────────────────────────┬──────────────┘   │
//! │                 │                                  │                   │
//! │  ┌──────────────▼──────────────┐    ┌──────────────▼──────────────┐   │
//! │  │ fuelpos-db (LocalStore)     │    │ Upstream REST API           │   │
//! │  │ cache, pending queue        │    │                             │   │
//! │  └──────────────┬──────────────┘    └─────────────────────────────┘   │
//! │                 │                                                       │
//! │  ┌──────────────▼──────────────────────────────────────────────────┐   │
//! │  │               ★ fuelpos-core (THIS CRATE) ★                     │   │
//! │  │   EntityId • Collection • PendingOperation • Record • Money     │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK                             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Wire types (EntityId, Collection, HttpMethod, PendingOperation)
//! - [`entity`] - `Entity` trait, free-form `Record`, typed entities
//! - [`money`] - Integer money for sale totals and fuel pricing
//! - [`validation`] - Field rules applied before a write is dispatched
//! - [`error`] - Domain error types
//! - [`demo`] - A small fuel-station dataset for seeding and tests
//!
//! ## Example Usage
//!
//! ```rust
//! use fuelpos_core::{Collection, EntityId, Record};
//! use serde_json::json;
//!
//! let record = Record::with_generated_id(json!({"name": "North"})).unwrap();
//! assert!(matches!(record.id(), EntityId::Text(_)));
//! assert_eq!(Collection::from_path("/branches/7"), Some(Collection::Branches));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod demo;
pub mod entity;
pub mod error;
pub mod money;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use entity::{
    AuditEntry, Branch, Customer, Entity, Manager, Outlet, Product, ProductCategory, Record,
    Sale, SalesReturn, StaffUser, Tank,
};
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum length of any display name.
pub const MAX_NAME_LENGTH: usize = 120;

/// Maximum quantity on a single sale or return line.
///
/// Catches typos such as 40000 for 40.000 litres.
pub const MAX_SALE_QUANTITY: i64 = 100_000;

/// Local settings key holding the current session token.
pub const SESSION_TOKEN_KEY: &str = "session_token";

/// Local settings key holding the refresh token.
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";

/// Generates a client-side entity id for a create.
pub fn new_client_id() -> EntityId {
    EntityId::generate()
}
