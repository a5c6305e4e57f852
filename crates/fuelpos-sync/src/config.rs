//! # Client Configuration
//!
//! Configuration for the console's data-access layer.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     FUELPOS_API_URL=https://pos.example.com/api                        │
//! │     FUELPOS_DB_PATH=/var/lib/fuelpos/fuelpos.db                        │
//! │     FUELPOS_API_MOCK=true                                              │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/fuelpos/client.toml (Linux)                              │
//! │     ~/Library/Application Support/com.fuelpos.console/client.toml      │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # client.toml
//! [api]
//! base_url = "https://pos.example.com/api"
//! timeout_secs = 30
//! refresh_path = "/auth/refresh"
//! mock = false            # serve every call from the built-in demo API
//!
//! [store]
//! database_path = "fuelpos.db"   # relative paths land in the data dir
//! cache_reads = false            # also cache successful GETs
//!
//! [sync]
//! auto_drain = true
//! retry_halted = false
//! initial_backoff_ms = 500
//! max_backoff_secs = 60
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use fuelpos_db::DbConfig;

use crate::dispatcher::DispatcherOptions;
use crate::error::{SyncError, SyncResult};
use crate::mock::MockTransport;
use crate::transport::{HttpTransport, Transport};
use crate::trigger::TriggerConfig;

// =============================================================================
// Sections
// =============================================================================

/// Upstream API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSettings {
    /// Base URL every endpoint path is resolved under.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Token refresh endpoint.
    #[serde(default = "default_refresh_path")]
    pub refresh_path: String,

    /// Use the in-process demo API instead of the network.
    #[serde(default)]
    pub mock: bool,
}

fn default_base_url() -> String {
    "http://localhost:8080/api".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_refresh_path() -> String {
    "/auth/refresh".to_string()
}

impl Default for ApiSettings {
    fn default() -> Self {
        ApiSettings {
            base_url: default_base_url(),
            timeout_secs: default_timeout(),
            refresh_path: default_refresh_path(),
            mock: false,
        }
    }
}

/// Local store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSettings {
    /// SQLite file. Relative paths are resolved under the platform data
    /// directory.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Also mirror successful live GETs into the cache.
    #[serde(default)]
    pub cache_reads: bool,
}

fn default_database_path() -> String {
    "fuelpos.db".to_string()
}

impl Default for StoreSettings {
    fn default() -> Self {
        StoreSettings {
            database_path: default_database_path(),
            cache_reads: false,
        }
    }
}

/// Background sync settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Drain the pending queue on every offline→online edge.
    #[serde(default = "default_true")]
    pub auto_drain: bool,

    /// Retry a halted drain with exponential backoff.
    #[serde(default)]
    pub retry_halted: bool,

    /// Initial backoff in milliseconds.
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    /// Maximum backoff in seconds.
    #[serde(default = "default_max_backoff")]
    pub max_backoff_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_initial_backoff() -> u64 {
    500
}

fn default_max_backoff() -> u64 {
    60
}

impl Default for SyncSettings {
    fn default() -> Self {
        SyncSettings {
            auto_drain: true,
            retry_halted: false,
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_secs: default_max_backoff(),
        }
    }
}

// =============================================================================
// Client Config
// =============================================================================

/// Complete client configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub api: ApiSettings,

    #[serde(default)]
    pub store: StoreSettings,

    #[serde(default)]
    pub sync: SyncSettings,
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (client.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading client config from file");
                config = Self::from_file(&path)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load client config: {}. Using defaults.", e);
            Self::default()
        })
    }

    fn from_file(path: &Path) -> SyncResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> SyncResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| SyncError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Client config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> SyncResult<()> {
        self.base_url()?;

        if self.api.timeout_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        if !self.api.refresh_path.starts_with('/') {
            return Err(SyncError::InvalidConfig(format!(
                "refresh_path must start with '/', got: {}",
                self.api.refresh_path
            )));
        }

        if self.store.database_path.trim().is_empty() {
            return Err(SyncError::InvalidConfig("database_path is required".into()));
        }

        if self.sync.initial_backoff_ms == 0 {
            return Err(SyncError::InvalidConfig(
                "initial_backoff_ms must be greater than 0".into(),
            ));
        }

        if Duration::from_millis(self.sync.initial_backoff_ms)
            > Duration::from_secs(self.sync.max_backoff_secs)
        {
            return Err(SyncError::InvalidConfig(
                "initial_backoff_ms must not exceed max_backoff_secs".into(),
            ));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies overrides from any key lookup.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("FUELPOS_API_URL") {
            debug!(url = %url, "Overriding API URL from environment");
            self.api.base_url = url;
        }

        if let Some(timeout) = lookup("FUELPOS_API_TIMEOUT_SECS") {
            match timeout.parse::<u64>() {
                Ok(secs) => self.api.timeout_secs = secs,
                Err(_) => warn!(value = %timeout, "Ignoring invalid FUELPOS_API_TIMEOUT_SECS"),
            }
        }

        if let Some(mock) = lookup("FUELPOS_API_MOCK") {
            self.api.mock = matches!(mock.to_lowercase().as_str(), "1" | "true" | "yes");
        }

        if let Some(path) = lookup("FUELPOS_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.store.database_path = path;
        }
    }

    fn project_dirs() -> Option<directories::ProjectDirs> {
        directories::ProjectDirs::from("com", "fuelpos", "console")
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.config_dir().join("client.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Parsed API base URL. Only http and https are accepted.
    pub fn base_url(&self) -> SyncResult<Url> {
        let url = Url::parse(&self.api.base_url)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(SyncError::InvalidUrl(format!(
                "API URL must start with http:// or https://, got: {}",
                self.api.base_url
            )));
        }
        Ok(url)
    }

    /// Database file, with relative paths placed in the data directory.
    pub fn database_path(&self) -> PathBuf {
        let path = PathBuf::from(&self.store.database_path);
        if path.is_absolute() {
            return path;
        }
        match Self::project_dirs() {
            Some(dirs) => dirs.data_dir().join(path),
            None => path,
        }
    }

    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(self.database_path())
    }

    pub fn dispatcher_options(&self) -> DispatcherOptions {
        DispatcherOptions {
            cache_reads: self.store.cache_reads,
        }
    }

    pub fn trigger_config(&self) -> TriggerConfig {
        TriggerConfig {
            auto_drain: self.sync.auto_drain,
            retry_halted: self.sync.retry_halted,
            initial_backoff: Duration::from_millis(self.sync.initial_backoff_ms),
            max_backoff: Duration::from_secs(self.sync.max_backoff_secs),
        }
    }

    /// Builds the transport this configuration describes.
    pub fn build_transport(&self) -> SyncResult<Arc<dyn Transport>> {
        if self.api.mock {
            info!("Using built-in demo API");
            return Ok(Arc::new(MockTransport::demo()));
        }

        let transport =
            HttpTransport::new(self.base_url()?, Duration::from_secs(self.api.timeout_secs))?;
        Ok(Arc::new(transport))
    }
}
