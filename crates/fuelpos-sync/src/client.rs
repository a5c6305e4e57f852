//! # Console Client
//!
//! Wires the local store, connectivity signal, transport, dispatcher and
//! sync trigger together for a host application.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          ConsoleClient                                  │
//! │                                                                         │
//! │  UI shell ── set_online(bool) ──► NetworkMonitor ──► NetworkState       │
//! │                                                        │                │
//! │  UI calls ── dispatcher() ──► RequestDispatcher ◄──────┤                │
//! │                                 │          │           │                │
//! │                          Transport    LocalStore       │                │
//! │                                            ▲           ▼                │
//! │                                            └──── SyncTrigger (task)     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use fuelpos_db::LocalStore;

use crate::config::ClientConfig;
use crate::dispatcher::RequestDispatcher;
use crate::error::{DispatchResult, SyncError, SyncResult};
use crate::network::{NetworkMonitor, NetworkState};
use crate::session::Session;
use crate::transport::Transport;
use crate::trigger::{
    DrainReport, NoOpEmitter, SyncEventEmitter, SyncTrigger, SyncTriggerHandle, TriggerState,
};

/// Snapshot for a status bar.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientStatus {
    pub online: bool,
    pub sync_state: TriggerState,
    pub pending_count: i64,
}

/// Data-access facade for the console UI.
pub struct ConsoleClient {
    store: LocalStore,
    monitor: NetworkMonitor,
    dispatcher: Arc<RequestDispatcher>,
    trigger: Arc<SyncTrigger>,
    handle: Option<SyncTriggerHandle>,
}

impl ConsoleClient {
    /// Builds a client from configuration with default wiring.
    pub async fn from_config(config: ClientConfig) -> SyncResult<Self> {
        ConsoleClientBuilder::new(config).build().await
    }

    pub fn builder(config: ClientConfig) -> ConsoleClientBuilder {
        ConsoleClientBuilder::new(config)
    }

    /// Starts the background sync task.
    pub fn start(&mut self) -> SyncResult<()> {
        if self.handle.is_some() {
            return Err(SyncError::AlreadyStarted);
        }

        self.handle = Some(self.trigger.clone().spawn());
        info!(online = self.monitor.is_online(), "Console client started");
        Ok(())
    }

    pub fn is_started(&self) -> bool {
        self.handle.is_some()
    }

    /// Stops the background task and closes the local store.
    pub async fn shutdown(&mut self) -> SyncResult<()> {
        info!("Shutting down console client");

        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.shutdown().await {
                warn!(error = %e, "Sync trigger did not stop cleanly");
            }
        }

        self.store.close().await;
        info!("Console client stopped");
        Ok(())
    }

    /// Reports a connectivity change observed by the host.
    pub fn set_online(&self, online: bool) {
        self.monitor.set_online(online);
    }

    pub fn network(&self) -> NetworkState {
        self.monitor.state()
    }

    pub fn dispatcher(&self) -> &RequestDispatcher {
        &self.dispatcher
    }

    pub fn session(&self) -> &Session {
        self.dispatcher.session()
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    pub fn trigger(&self) -> &SyncTrigger {
        &self.trigger
    }

    /// Drains the pending queue now and waits for the result.
    pub async fn drain(&self) -> DrainReport {
        self.trigger.drain().await
    }

    /// Asks the background task to drain without waiting.
    pub fn request_drain(&self) -> SyncResult<()> {
        match &self.handle {
            Some(handle) => handle.request_drain(),
            None => Err(SyncError::ChannelError("sync trigger not started".into())),
        }
    }

    /// Stores tokens issued by the login screen.
    pub async fn login(&self, token: &str, refresh_token: &str) -> DispatchResult<()> {
        self.session().login(token, refresh_token).await
    }

    /// Clears the session tokens. Queued operations are kept.
    pub async fn logout(&self) -> DispatchResult<()> {
        self.session().reset().await
    }

    pub async fn status(&self) -> DispatchResult<ClientStatus> {
        Ok(ClientStatus {
            online: self.monitor.is_online(),
            sync_state: self.trigger.state(),
            pending_count: self.store.count_pending().await?,
        })
    }
}

// =============================================================================
// Builder Pattern
// =============================================================================

/// Builder for creating a ConsoleClient with options.
pub struct ConsoleClientBuilder {
    config: ClientConfig,
    store: Option<LocalStore>,
    transport: Option<Arc<dyn Transport>>,
    emitter: Option<Arc<dyn SyncEventEmitter>>,
    online: bool,
}

impl ConsoleClientBuilder {
    /// Creates a new builder with the given config.
    pub fn new(config: ClientConfig) -> Self {
        ConsoleClientBuilder {
            config,
            store: None,
            transport: None,
            emitter: None,
            online: true,
        }
    }

    /// Uses an already connected store instead of opening the configured file.
    pub fn with_store(mut self, store: LocalStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Overrides the configured transport.
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Sets the event emitter.
    pub fn with_emitter(mut self, emitter: Arc<dyn SyncEventEmitter>) -> Self {
        self.emitter = Some(emitter);
        self
    }

    /// Initial connectivity, before the host reports anything.
    pub fn online(mut self, online: bool) -> Self {
        self.online = online;
        self
    }

    /// Builds the ConsoleClient. The background task is not started.
    pub async fn build(self) -> SyncResult<ConsoleClient> {
        self.config.validate()?;

        let store = match self.store {
            Some(store) => store,
            None => LocalStore::connect(self.config.db_config()).await?,
        };

        let transport = match self.transport {
            Some(transport) => transport,
            None => self.config.build_transport()?,
        };

        let emitter = self.emitter.unwrap_or_else(|| Arc::new(NoOpEmitter));
        let monitor = NetworkMonitor::new(self.online);

        let session = Session::new(
            store.clone(),
            transport.clone(),
            self.config.api.refresh_path.clone(),
        );

        let dispatcher = Arc::new(
            RequestDispatcher::new(store.clone(), monitor.state(), transport, session)
                .with_options(self.config.dispatcher_options()),
        );

        let trigger = Arc::new(
            SyncTrigger::new(dispatcher.clone())
                .with_config(self.config.trigger_config())
                .with_emitter(emitter),
        );

        Ok(ConsoleClient {
            store,
            monitor,
            dispatcher,
            trigger,
            handle: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::DispatchRequest;
    use crate::error::DispatchError;
    use crate::mock::MockTransport;
    use fuelpos_core::{Branch, Collection, EntityId};
    use fuelpos_db::DbConfig;
    use serde_json::json;
    use std::time::Duration;

    async fn client(online: bool) -> (ConsoleClient, Arc<MockTransport>) {
        let store = LocalStore::connect(DbConfig::in_memory()).await.unwrap();
        let mock = Arc::new(MockTransport::demo());
        let client = ConsoleClient::builder(ClientConfig::default())
            .with_store(store)
            .with_transport(mock.clone())
            .online(online)
            .build()
            .await
            .unwrap();
        (client, mock)
    }

    async fn wait_for_empty_queue(client: &ConsoleClient) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while client.store().count_pending().await.unwrap() > 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("queue did not drain");
    }

    #[tokio::test]
    async fn test_online_read_goes_live() {
        let (client, mock) = client(true).await;

        let branches: Vec<Branch> = client.dispatcher().list().await.unwrap();
        assert_eq!(branches.len(), 2);
        assert_eq!(mock.request_count().await, 1);
    }

    #[tokio::test]
    async fn test_offline_write_syncs_after_reconnect() {
        let (mut client, mock) = client(false).await;
        client.start().unwrap();

        let err = client
            .dispatcher()
            .dispatch(DispatchRequest::post(
                "/branches",
                json!({"name": "Harbour", "address": "Quay 4"}),
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::OperationQueued { .. }));

        let status = client.status().await.unwrap();
        assert!(!status.online);
        assert_eq!(status.pending_count, 1);

        client.set_online(true);
        wait_for_empty_queue(&client).await;

        let branches = mock.collection(Collection::Branches).await;
        assert_eq!(branches.len(), 3);
        assert_eq!(branches[0].get("name"), Some(&json!("Harbour")));

        client.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_start_twice() {
        let (mut client, _mock) = client(true).await;
        client.start().unwrap();
        assert!(matches!(client.start(), Err(SyncError::AlreadyStarted)));
        client.shutdown().await.unwrap();
        assert!(!client.is_started());
    }

    #[tokio::test]
    async fn test_request_drain_needs_running_task() {
        let (client, _mock) = client(true).await;
        assert!(client.request_drain().is_err());
    }

    #[tokio::test]
    async fn test_manual_drain() {
        let (client, mock) = client(false).await;
        let _ = client
            .dispatcher()
            .dispatch(DispatchRequest::delete("/branches/2"))
            .await;

        client.set_online(true);
        let report = client.drain().await;
        assert_eq!(report.replayed, 1);
        assert!(report.is_complete());

        let branches = mock.collection(Collection::Branches).await;
        assert_eq!(branches.len(), 1);
        assert_eq!(branches[0].id(), &EntityId::Number(1));
    }

    #[tokio::test]
    async fn test_logout_clears_session() {
        let (client, _mock) = client(true).await;
        client.login("t-1", "r-1").await.unwrap();
        assert!(client.session().is_authenticated().await.unwrap());

        client.logout().await.unwrap();
        assert!(!client.session().is_authenticated().await.unwrap());
    }

    #[test]
    fn test_status_serializes_camel_case() {
        let status = ClientStatus {
            online: true,
            sync_state: TriggerState::Idle,
            pending_count: 2,
        };
        let value = serde_json::to_value(status).unwrap();
        assert_eq!(value, json!({"online": true, "syncState": "idle", "pendingCount": 2}));
    }
}
