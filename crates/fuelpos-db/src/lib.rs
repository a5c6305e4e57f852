//! # fuelpos-db: Local Store for the FuelPOS Console
//!
//! Durable local state that survives restarts: cached entities per
//! collection, the queue of writes made while offline, and the session
//! tokens. SQLite through sqlx.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        FuelPOS Data Flow                                │
//! │                                                                         │
//! │  RequestDispatcher (fuelpos-sync)                                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   fuelpos-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │  LocalStore   │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │  (store.rs)   │    │               │    │  (embedded)  │  │   │
//! │  │   │               │    │ EntityCache   │    │              │  │   │
//! │  │   │ lazy OnceCell │◄───│ PendingQueue  │    │ 001_local_   │  │   │
//! │  │   │ open + pool   │    │ Settings      │    │   store.sql  │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database                             │   │
//! │  │                  <data dir>/fuelpos.db                          │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`store`] - `LocalStore`, the handle the dispatcher owns
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`repository`] - One repository per partition
//! - [`error`] - Database error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use fuelpos_db::{DbConfig, LocalStore};
//!
//! let store = LocalStore::connect(DbConfig::new("fuelpos.db")).await?;
//! let products = store.get_all(Collection::Products).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod store;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use store::LocalStore;

pub use repository::entity_cache::EntityCacheRepository;
pub use repository::pending::PendingOperationRepository;
pub use repository::settings::SettingsRepository;
