//! # Sync Error Types
//!
//! Error types for request dispatch and background sync.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Dispatch Error Categories                         │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Live Path      │  │  Offline Path   │  │  Local / Boundary       │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  Network        │  │  NoLocalData    │  │  StorageUnavailable     │ │
//! │  │  SessionExpired │  │  OperationQueued│  │  InvalidEntity          │ │
//! │  │                 │  │  TransportUnav. │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  SyncError: configuration files and background task plumbing           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every [`DispatchError`] reaches the calling UI code unchanged. The UI
//! decides what to show; [`DispatchError::user_message`] is the default.

use thiserror::Error;

use fuelpos_core::{Collection, CoreError};
use fuelpos_db::DbError;

/// Result type alias for dispatcher operations.
pub type DispatchResult<T> = Result<T, DispatchError>;

/// Result type alias for configuration and task plumbing.
pub type SyncResult<T> = Result<T, SyncError>;

// =============================================================================
// Dispatch Error
// =============================================================================

/// What a caller of the dispatcher can get back instead of a value.
#[derive(Debug, Error)]
pub enum DispatchError {
    // =========================================================================
    // Live Path
    // =========================================================================
    /// The live call failed: non-success status, or the server could not be
    /// reached while the network was reported online (`status` is `None`).
    #[error("Network error{}: {message}", status_suffix(.status))]
    Network {
        status: Option<u16>,
        message: String,
    },

    /// The server rejected the session twice (or the refresh failed).
    /// Stored tokens were cleared; the caller should route to login.
    #[error("Session expired, please sign in again")]
    SessionExpired,

    // =========================================================================
    // Offline Path
    // =========================================================================
    /// Offline read against a collection with nothing cached.
    #[error("No local data available for {collection}")]
    NoLocalDataAvailable { collection: String },

    /// Offline write accepted into the pending queue. Not yet applied.
    #[error("Operation queued for sync (sequence {sequence})")]
    OperationQueued { sequence: i64 },

    /// Offline call for an endpoint with no fallback configured.
    #[error("No offline fallback for {url}")]
    TransportUnavailable { url: String },

    // =========================================================================
    // Local / Boundary
    // =========================================================================
    /// The local store could not be read or written.
    #[error("Local storage unavailable: {0}")]
    StorageUnavailable(String),

    /// A payload failed boundary validation.
    #[error("Invalid entity: {0}")]
    InvalidEntity(String),
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" ({})", s)).unwrap_or_default()
}

impl DispatchError {
    /// Creates a Network error for a non-success response.
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        DispatchError::Network {
            status: Some(status),
            message: message.into(),
        }
    }

    /// Creates a Network error for a call that never got a response.
    pub fn unreachable(message: impl Into<String>) -> Self {
        DispatchError::Network {
            status: None,
            message: message.into(),
        }
    }

    /// Creates a NoLocalDataAvailable error for a collection.
    pub fn no_local_data(collection: Collection) -> Self {
        DispatchError::NoLocalDataAvailable {
            collection: collection.name().to_string(),
        }
    }

    /// True when the write was saved locally and will be replayed later.
    pub fn is_queued(&self) -> bool {
        matches!(self, DispatchError::OperationQueued { .. })
    }

    /// True when the caller should send the user to the login screen.
    pub fn requires_login(&self) -> bool {
        matches!(
            self,
            DispatchError::SessionExpired | DispatchError::Network { status: Some(401), .. }
        )
    }

    /// Returns the HTTP status of a rejected live call.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            DispatchError::Network { status, .. } => *status,
            _ => None,
        }
    }

    /// Default text for the UI.
    ///
    /// A queued write reads as a soft success, not a failure.
    pub fn user_message(&self) -> String {
        match self {
            DispatchError::OperationQueued { .. } => "Saved locally, will sync later".to_string(),
            DispatchError::NoLocalDataAvailable { .. } => {
                "No data available offline yet".to_string()
            }
            DispatchError::TransportUnavailable { .. } => {
                "This screen needs a network connection".to_string()
            }
            DispatchError::SessionExpired => "Your session has expired".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<DbError> for DispatchError {
    fn from(err: DbError) -> Self {
        DispatchError::StorageUnavailable(err.to_string())
    }
}

impl From<CoreError> for DispatchError {
    fn from(err: CoreError) -> Self {
        DispatchError::InvalidEntity(err.to_string())
    }
}

impl From<fuelpos_core::ValidationError> for DispatchError {
    fn from(err: fuelpos_core::ValidationError) -> Self {
        DispatchError::InvalidEntity(err.to_string())
    }
}

impl From<serde_json::Error> for DispatchError {
    fn from(err: serde_json::Error) -> Self {
        DispatchError::InvalidEntity(err.to_string())
    }
}

// =============================================================================
// Sync Error
// =============================================================================

/// Errors outside a single dispatched call: config files, background tasks.
#[derive(Debug, Error)]
pub enum SyncError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid client configuration.
    #[error("Invalid client configuration: {0}")]
    InvalidConfig(String),

    /// Invalid API base URL.
    #[error("Invalid API URL: {0}")]
    InvalidUrl(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Runtime Errors
    // =========================================================================
    /// Local store could not be opened.
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// HTTP client could not be built.
    #[error("Transport setup failed: {0}")]
    TransportSetup(String),

    /// The client is already running.
    #[error("Sync trigger already started")]
    AlreadyStarted,

    /// The background task is gone.
    #[error("Sync trigger is shutting down")]
    ShuttingDown,

    /// Channel send/receive failed.
    #[error("Channel error: {0}")]
    ChannelError(String),

    /// The background task panicked or was aborted.
    #[error("Background task failed: {0}")]
    TaskFailed(String),
}

impl From<DbError> for SyncError {
    fn from(err: DbError) -> Self {
        SyncError::DatabaseError(err.to_string())
    }
}

impl From<url::ParseError> for SyncError {
    fn from(err: url::ParseError) -> Self {
        SyncError::InvalidUrl(err.to_string())
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for SyncError {
    fn from(err: toml::ser::Error) -> Self {
        SyncError::ConfigSaveFailed(err.to_string())
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        SyncError::TransportSetup(err.to_string())
    }
}

impl SyncError {
    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SyncError::InvalidConfig(_)
                | SyncError::InvalidUrl(_)
                | SyncError::ConfigLoadFailed(_)
                | SyncError::ConfigSaveFailed(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queued_is_soft() {
        let err = DispatchError::OperationQueued { sequence: 3 };
        assert!(err.is_queued());
        assert_eq!(err.user_message(), "Saved locally, will sync later");
        assert!(err.to_string().contains("sequence 3"));

        assert!(!DispatchError::SessionExpired.is_queued());
    }

    #[test]
    fn test_network_display() {
        let err = DispatchError::status(422, "quantity must be positive");
        assert_eq!(err.http_status(), Some(422));
        assert_eq!(err.to_string(), "Network error (422): quantity must be positive");

        let err = DispatchError::unreachable("connection refused");
        assert_eq!(err.http_status(), None);
        assert_eq!(err.to_string(), "Network error: connection refused");
    }

    #[test]
    fn test_storage_errors_convert() {
        let err: DispatchError = DbError::ConnectionFailed("disk full".into()).into();
        assert!(matches!(err, DispatchError::StorageUnavailable(_)));

        let err: DispatchError = CoreError::NotAnObject("[]".into()).into();
        assert!(matches!(err, DispatchError::InvalidEntity(_)));
    }

    #[test]
    fn test_requires_login() {
        assert!(DispatchError::SessionExpired.requires_login());
        assert!(!DispatchError::no_local_data(Collection::Sales).requires_login());
    }

    #[test]
    fn test_config_errors() {
        assert!(SyncError::InvalidUrl("ftp://x".into()).is_config_error());
        assert!(!SyncError::ShuttingDown.is_config_error());
    }
}
