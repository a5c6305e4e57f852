//! # fuelpos-sync: Offline-First Data Access for the FuelPOS Console
//!
//! Every call the console makes to the upstream API goes through this crate.
//! While online it talks to the server and mirrors results into the local
//! cache; while offline it serves reads from the cache and queues writes
//! for later replay.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Offline-First Client Architecture                   │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                   ConsoleClient (facade)                         │  │
//! │  │                                                                  │  │
//! │  │  Built from ClientConfig, owned by the UI shell                  │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               │                                         │
//! │         ┌─────────────────────┼─────────────────────┐                  │
//! │         ▼                     ▼                     ▼                   │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────┐    │
//! │  │ NetworkMonitor │  │RequestDispatch.│  │  SyncTrigger           │    │
//! │  │                │  │                │  │                        │    │
//! │  │ watch channel  │  │ online: live   │  │ Watches offline→online │    │
//! │  │ single writer  │  │  call + mirror │  │ Replays pending queue  │    │
//! │  │ many readers   │  │ offline: cache │  │ head-first, halts on   │    │
//! │  │                │  │  read / queue  │  │ first failure          │    │
//! │  └────────────────┘  └───────┬────────┘  └────────────────────────┘    │
//! │                              │                                          │
//! │                 ┌────────────┴────────────┐                             │
//! │                 ▼                         ▼                             │
//! │  ┌────────────────────────┐  ┌────────────────────────┐                │
//! │  │ Transport (trait)      │  │ LocalStore (fuelpos-db)│                │
//! │  │  HttpTransport reqwest │  │  entity cache          │                │
//! │  │  MockTransport demo    │  │  pending queue         │                │
//! │  │ Session: bearer token, │  │  session settings      │                │
//! │  │  one refresh on 401    │  │                        │                │
//! │  └────────────────────────┘  └────────────────────────┘                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`client`] - `ConsoleClient` facade and builder
//! - [`config`] - Client configuration (API URL, store path, sync tuning)
//! - [`dispatcher`] - Per-call live/offline routing
//! - [`error`] - Dispatch and sync error types
//! - [`mock`] - In-process demo API
//! - [`network`] - Connectivity signal
//! - [`session`] - Bearer tokens and refresh
//! - [`transport`] - Transport trait and HTTP implementation
//! - [`trigger`] - Pending queue replay
//!
//! ## Usage
//!
//! ```rust,ignore
//! use fuelpos_sync::{ClientConfig, ConsoleClient};
//! use fuelpos_core::Product;
//!
//! let config = ClientConfig::load_or_default(None);
//! let mut client = ConsoleClient::from_config(config).await?;
//! client.start()?;
//!
//! // The host reports connectivity changes
//! client.set_online(false);
//!
//! // Served from the cache while offline
//! let products: Vec<Product> = client.dispatcher().list().await?;
//!
//! let status = client.status().await?;
//! println!("Pending: {}", status.pending_count);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod client;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod mock;
pub mod network;
pub mod session;
pub mod transport;
pub mod trigger;

// =============================================================================
// Re-exports
// =============================================================================

pub use client::{ClientStatus, ConsoleClient, ConsoleClientBuilder};
pub use config::{ApiSettings, ClientConfig, StoreSettings, SyncSettings};
pub use dispatcher::{DispatchRequest, DispatcherOptions, RequestDispatcher};
pub use error::{DispatchError, DispatchResult, SyncError, SyncResult};
pub use mock::{MockFailure, MockTransport};
pub use network::{NetworkMonitor, NetworkState};
pub use session::Session;
pub use transport::{HttpTransport, Transport, TransportError, TransportRequest, TransportResponse};
pub use trigger::{
    DrainReport, HaltReason, NoOpEmitter, SyncEventEmitter, SyncTrigger, SyncTriggerHandle,
    TriggerConfig, TriggerState,
};

use tracing_subscriber::EnvFilter;

/// Initializes the tracing subscriber for structured logging.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=fuelpos=trace` - Show trace for fuelpos crates only
/// - Default: `info,fuelpos=debug,sqlx=warn`
///
/// Does nothing if the host already installed a subscriber.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,fuelpos=debug,sqlx=warn"));

    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
