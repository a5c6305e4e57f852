//! # Repository Module
//!
//! SQL for each local store partition lives in exactly one repository.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Local Store Repositories                             │
//! │                                                                         │
//! │  LocalStore                                                            │
//! │       │                                                                 │
//! │       ├──► EntityCacheRepository       cached_entities                 │
//! │       │    upsert / get_all / get_by_id / delete                       │
//! │       │                                                                 │
//! │       ├──► PendingOperationRepository  pending_operations              │
//! │       │    enqueue / list / peek / remove                              │
//! │       │                                                                 │
//! │       └──► SettingsRepository          local_settings                  │
//! │            get / set / remove                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod entity_cache;
pub mod pending;
pub mod settings;
