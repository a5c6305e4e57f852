//! # Sync Trigger
//!
//! Drains the pending write queue when connectivity returns.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       SyncTrigger States                                │
//! │                                                                         │
//! │          offline→online edge / drain() / backoff timer                 │
//! │  ┌──────┐ ─────────────────────────────────────────► ┌──────────┐      │
//! │  │ Idle │                                             │ Draining │      │
//! │  └──────┘ ◄───────────────────────────────────────── └────┬─────┘      │
//! │      ▲       queue empty, or halted on first failure       │            │
//! │      │                                                     │            │
//! │      │      ┌──────────────────────────────────────────────┘            │
//! │      │      ▼                                                           │
//! │      │   loop: online? → peek head → replay → remove head              │
//! │      │                                                                  │
//! │      └── HALT (head stays queued, nothing reordered):                  │
//! │          • network went offline                                        │
//! │          • server unreachable                                          │
//! │          • server rejected the head                                    │
//! │          • local store failed                                          │
//! │                                                                         │
//! │  One operation in flight at a time. Concurrent drain() calls queue     │
//! │  behind each other on a lock and never replay the same head twice.     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A permanently rejected head blocks everything behind it until it is
//! resolved by hand. That is accepted: operations are never dropped or
//! reordered to get past it.

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::dispatcher::RequestDispatcher;
use crate::error::{DispatchError, SyncError, SyncResult};

// =============================================================================
// State & Reports
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerState {
    Idle,
    Draining,
}

impl std::fmt::Display for TriggerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TriggerState::Idle => write!(f, "idle"),
            TriggerState::Draining => write!(f, "draining"),
        }
    }
}

/// Why a drain stopped before the queue was empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "camelCase")]
pub enum HaltReason {
    /// The network was reported offline.
    Offline,
    /// The head could not reach the server.
    Unreachable { sequence: i64, message: String },
    /// The server answered the head with an error.
    Rejected {
        sequence: i64,
        status: Option<u16>,
        message: String,
    },
    /// The server rejected the session and the tokens were cleared.
    SessionExpired { sequence: i64 },
    /// The local store failed.
    Storage { message: String },
}

impl HaltReason {
    /// True for halts worth retrying on a timer. Offline halts wait for
    /// the next online edge; an expired session waits for a new login and
    /// a manual drain.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, HaltReason::Offline | HaltReason::SessionExpired { .. })
    }
}

/// Outcome of one drain.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DrainReport {
    /// Operations replayed and removed.
    pub replayed: usize,
    /// Operations still queued afterwards; `None` when the store could not
    /// be read.
    pub remaining: Option<i64>,
    pub halted: Option<HaltReason>,
}

impl DrainReport {
    pub fn is_complete(&self) -> bool {
        self.halted.is_none()
    }
}

// =============================================================================
// Event Emitter Trait
// =============================================================================

/// Receives sync events (implemented by the UI shell).
pub trait SyncEventEmitter: Send + Sync {
    /// Emits a state change.
    fn emit_state(&self, state: TriggerState);

    /// Emits progress after each replayed operation.
    fn emit_progress(&self, replayed: usize, remaining: i64);

    /// Emits a halted drain.
    fn emit_halted(&self, reason: &HaltReason);
}

/// No-op event emitter for headless use and tests.
pub struct NoOpEmitter;

impl SyncEventEmitter for NoOpEmitter {
    fn emit_state(&self, _state: TriggerState) {}
    fn emit_progress(&self, _replayed: usize, _remaining: i64) {}
    fn emit_halted(&self, _reason: &HaltReason) {}
}

// =============================================================================
// Configuration
// =============================================================================

#[derive(Debug, Clone)]
pub struct TriggerConfig {
    /// Drain on every offline→online edge (and at startup when online).
    pub auto_drain: bool,

    /// Retry a halted drain on an exponential backoff timer.
    pub retry_halted: bool,

    /// Initial backoff duration.
    pub initial_backoff: Duration,

    /// Maximum backoff duration.
    pub max_backoff: Duration,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        TriggerConfig {
            auto_drain: true,
            retry_halted: false,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(60),
        }
    }
}

// =============================================================================
// Sync Trigger
// =============================================================================

pub struct SyncTrigger {
    dispatcher: Arc<RequestDispatcher>,
    config: TriggerConfig,
    emitter: Arc<dyn SyncEventEmitter>,
    state_tx: watch::Sender<TriggerState>,
    drain_lock: Mutex<()>,
}

impl SyncTrigger {
    pub fn new(dispatcher: Arc<RequestDispatcher>) -> Self {
        let (state_tx, _) = watch::channel(TriggerState::Idle);
        SyncTrigger {
            dispatcher,
            config: TriggerConfig::default(),
            emitter: Arc::new(NoOpEmitter),
            state_tx,
            drain_lock: Mutex::new(()),
        }
    }

    pub fn with_config(mut self, config: TriggerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_emitter(mut self, emitter: Arc<dyn SyncEventEmitter>) -> Self {
        self.emitter = emitter;
        self
    }

    pub fn state(&self) -> TriggerState {
        *self.state_tx.borrow()
    }

    /// Subscribes to state changes.
    pub fn subscribe(&self) -> watch::Receiver<TriggerState> {
        self.state_tx.subscribe()
    }

    fn set_state(&self, state: TriggerState) {
        self.state_tx.send_replace(state);
        self.emitter.emit_state(state);
    }

    /// Replays the queue head-first until it is empty or something fails.
    ///
    /// An operation is removed only after its replay succeeded. On failure
    /// the head stays where it is and the rest of the queue is untouched.
    pub async fn drain(&self) -> DrainReport {
        let _guard = self.drain_lock.lock().await;
        let store = self.dispatcher.store();
        let network = self.dispatcher.network();

        self.set_state(TriggerState::Draining);
        info!("Draining pending queue");

        let mut replayed = 0usize;
        let halted = loop {
            if !network.is_online() {
                break Some(HaltReason::Offline);
            }

            let op = match store.peek_pending().await {
                Ok(Some(op)) => op,
                Ok(None) => break None,
                Err(e) => {
                    break Some(HaltReason::Storage {
                        message: e.to_string(),
                    })
                }
            };

            if let Err(e) = self.dispatcher.replay(&op).await {
                break Some(halt_reason(op.sequence, e));
            }

            if let Err(e) = store.remove_pending(op.sequence).await {
                error!(sequence = op.sequence, error = %e, "Replayed but could not dequeue");
                break Some(HaltReason::Storage {
                    message: e.to_string(),
                });
            }

            replayed += 1;
            let remaining = match store.count_pending().await {
                Ok(n) => n,
                Err(e) => {
                    break Some(HaltReason::Storage {
                        message: e.to_string(),
                    })
                }
            };
            debug!(sequence = op.sequence, remaining, "Replayed pending operation");
            self.emitter.emit_progress(replayed, remaining);
        };

        let (remaining, halted) = match store.count_pending().await {
            Ok(n) => (Some(n), halted),
            Err(e) => {
                error!(error = %e, "Could not count pending operations");
                let halted = halted.or(Some(HaltReason::Storage {
                    message: e.to_string(),
                }));
                (None, halted)
            }
        };

        match &halted {
            None => info!(replayed, "Pending queue drained"),
            Some(reason) => {
                warn!(replayed, remaining = ?remaining, reason = ?reason, "Drain halted");
                self.emitter.emit_halted(reason);
            }
        }

        self.set_state(TriggerState::Idle);

        DrainReport {
            replayed,
            remaining,
            halted,
        }
    }

    /// Starts the background task that drains on reconnect.
    pub fn spawn(self: Arc<Self>) -> SyncTriggerHandle {
        let (drain_tx, drain_rx) = mpsc::channel(1);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let state_rx = self.subscribe();

        let join = tokio::spawn(self.run(drain_rx, shutdown_rx));

        SyncTriggerHandle {
            drain_tx,
            shutdown_tx,
            state_rx,
            join,
        }
    }

    fn create_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.config.initial_backoff,
            max_interval: self.config.max_backoff,
            multiplier: 2.0,
            max_elapsed_time: None,
            ..Default::default()
        }
    }

    /// Decides when to try again after a drain.
    fn next_retry(&self, report: &DrainReport, backoff: &mut ExponentialBackoff) -> Option<Instant> {
        match &report.halted {
            None => {
                backoff.reset();
                None
            }
            Some(reason) if self.config.retry_halted && reason.is_retryable() => {
                let delay = backoff.next_backoff()?;
                debug!(?delay, "Scheduling drain retry");
                Some(Instant::now() + delay)
            }
            Some(_) => None,
        }
    }

    async fn run(
        self: Arc<Self>,
        mut drain_rx: mpsc::Receiver<()>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        let mut online_rx = self.dispatcher.network().subscribe();
        let mut was_online = *online_rx.borrow_and_update();
        let mut network_open = true;
        let mut backoff = self.create_backoff();
        let mut retry_at: Option<Instant> = None;

        info!(online = was_online, auto_drain = self.config.auto_drain, "Sync trigger started");

        if was_online && self.config.auto_drain {
            let report = self.drain().await;
            retry_at = self.next_retry(&report, &mut backoff);
        }

        loop {
            let retry = async move {
                match retry_at {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("Sync trigger shutting down");
                    break;
                }

                changed = online_rx.changed(), if network_open => {
                    if changed.is_err() {
                        debug!("Network monitor dropped, edge detection stopped");
                        network_open = false;
                        continue;
                    }

                    let online = *online_rx.borrow_and_update();
                    let edge = online && !was_online;
                    was_online = online;

                    if edge && self.config.auto_drain {
                        info!("Connectivity restored");
                        backoff.reset();
                        let report = self.drain().await;
                        retry_at = self.next_retry(&report, &mut backoff);
                    }
                }

                Some(()) = drain_rx.recv() => {
                    backoff.reset();
                    let report = self.drain().await;
                    retry_at = self.next_retry(&report, &mut backoff);
                }

                _ = retry => {
                    let report = self.drain().await;
                    retry_at = self.next_retry(&report, &mut backoff);
                }
            }
        }
    }
}

fn halt_reason(sequence: i64, err: DispatchError) -> HaltReason {
    match err {
        DispatchError::Network {
            status: None,
            message,
        } => HaltReason::Unreachable { sequence, message },
        DispatchError::Network { status, message } => HaltReason::Rejected {
            sequence,
            status,
            message,
        },
        DispatchError::StorageUnavailable(message) => HaltReason::Storage { message },
        DispatchError::SessionExpired => HaltReason::SessionExpired { sequence },
        other => HaltReason::Rejected {
            sequence,
            status: None,
            message: other.to_string(),
        },
    }
}

// =============================================================================
// Handle
// =============================================================================

/// Handle to the background drain task.
pub struct SyncTriggerHandle {
    drain_tx: mpsc::Sender<()>,
    shutdown_tx: mpsc::Sender<()>,
    state_rx: watch::Receiver<TriggerState>,
    join: JoinHandle<()>,
}

impl SyncTriggerHandle {
    pub fn state(&self) -> TriggerState {
        *self.state_rx.borrow()
    }

    /// Asks the background task to drain now (manual retry).
    ///
    /// Requests made while one is already pending are coalesced.
    pub fn request_drain(&self) -> SyncResult<()> {
        match self.drain_tx.try_send(()) {
            Ok(()) | Err(mpsc::error::TrySendError::Full(())) => Ok(()),
            Err(mpsc::error::TrySendError::Closed(())) => Err(SyncError::ShuttingDown),
        }
    }

    /// Stops the background task and waits for it. A drain in progress
    /// finishes its current operation first.
    pub async fn shutdown(self) -> SyncResult<()> {
        let _ = self.shutdown_tx.send(()).await;
        self.join
            .await
            .map_err(|e| SyncError::TaskFailed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::DispatchRequest;
    use crate::mock::{MockFailure, MockTransport, REFRESH_PATH};
    use crate::network::NetworkMonitor;
    use crate::session::Session;
    use fuelpos_core::{Collection, EntityId, HttpMethod};
    use fuelpos_db::{DbConfig, LocalStore};
    use serde_json::{json, Value};
    use std::sync::Mutex as StdMutex;

    struct Harness {
        store: LocalStore,
        monitor: NetworkMonitor,
        mock: Arc<MockTransport>,
        dispatcher: Arc<RequestDispatcher>,
    }

    async fn harness() -> Harness {
        let store = LocalStore::connect(DbConfig::in_memory()).await.unwrap();
        let monitor = NetworkMonitor::new(false);
        let mock = Arc::new(MockTransport::new());
        let session = Session::new(store.clone(), mock.clone(), REFRESH_PATH);
        let dispatcher = Arc::new(RequestDispatcher::new(
            store.clone(),
            monitor.state(),
            mock.clone(),
            session,
        ));

        Harness {
            store,
            monitor,
            mock,
            dispatcher,
        }
    }

    /// Queues two creates while offline and returns their client ids.
    async fn queue_two_sales(h: &Harness) -> Vec<Value> {
        let mut ids = Vec::new();
        for qty in [1, 2] {
            let err = h
                .dispatcher
                .dispatch(DispatchRequest::post("/sales", json!({"productId": "X", "qty": qty})))
                .await
                .unwrap_err();
            assert!(err.is_queued());
        }
        for op in h.store.list_pending().await.unwrap() {
            ids.push(op.body.unwrap()["id"].clone());
        }
        ids
    }

    async fn wait_for_empty_queue(store: &LocalStore) {
        for _ in 0..200 {
            if store.count_pending().await.unwrap() == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("queue was not drained");
    }

    #[derive(Default)]
    struct RecordingEmitter {
        events: StdMutex<Vec<String>>,
    }

    impl SyncEventEmitter for RecordingEmitter {
        fn emit_state(&self, state: TriggerState) {
            self.events.lock().unwrap().push(format!("state:{}", state));
        }
        fn emit_progress(&self, replayed: usize, remaining: i64) {
            self.events
                .lock()
                .unwrap()
                .push(format!("progress:{}/{}", replayed, remaining));
        }
        fn emit_halted(&self, _reason: &HaltReason) {
            self.events.lock().unwrap().push("halted".to_string());
        }
    }

    #[tokio::test]
    async fn test_drains_in_fifo_order() {
        let h = harness().await;
        let ids = queue_two_sales(&h).await;
        h.monitor.set_online(true);

        let trigger = SyncTrigger::new(h.dispatcher.clone());
        let report = trigger.drain().await;

        assert!(report.is_complete());
        assert_eq!(report.replayed, 2);
        assert_eq!(report.remaining, Some(0));
        assert_eq!(h.store.count_pending().await.unwrap(), 0);

        let sent: Vec<Value> = h
            .mock
            .requests()
            .await
            .into_iter()
            .map(|r| r.body.unwrap()["id"].clone())
            .collect();
        assert_eq!(sent, ids);

        // Replayed creates are now cached under their client ids.
        assert_eq!(h.store.count(Collection::Sales).await.unwrap(), 2);
        assert_eq!(trigger.state(), TriggerState::Idle);
    }

    #[tokio::test]
    async fn test_failed_head_keeps_queue_intact() {
        let h = harness().await;
        queue_two_sales(&h).await;
        let before = h.store.list_pending().await.unwrap();
        h.monitor.set_online(true);
        h.mock.fail_next(MockFailure::Status(500)).await;

        let trigger = SyncTrigger::new(h.dispatcher.clone());
        let report = trigger.drain().await;

        assert_eq!(report.replayed, 0);
        assert_eq!(report.remaining, Some(2));
        assert_eq!(
            report.halted,
            Some(HaltReason::Rejected {
                sequence: before[0].sequence,
                status: Some(500),
                message: "injected failure".to_string(),
            })
        );
        assert_eq!(h.store.list_pending().await.unwrap(), before);
        // Nothing behind the failed head was attempted.
        assert_eq!(h.mock.request_count().await, 1);
    }

    #[tokio::test]
    async fn test_connectivity_drop_mid_drain() {
        let h = harness().await;
        h.dispatcher
            .dispatch(DispatchRequest::post("/sales", json!({"qty": 1})))
            .await
            .unwrap_err();
        h.dispatcher
            .dispatch(DispatchRequest::put("/branches/7", json!({"name": "East"})))
            .await
            .unwrap_err();
        h.monitor.set_online(true);
        h.mock
            .fail_matching(None, "/branches", MockFailure::Unreachable)
            .await;

        let trigger = SyncTrigger::new(h.dispatcher.clone());
        let report = trigger.drain().await;

        assert_eq!(report.replayed, 1);
        assert_eq!(report.remaining, Some(1));
        assert!(matches!(report.halted, Some(HaltReason::Unreachable { .. })));

        let head = h.store.peek_pending().await.unwrap().unwrap();
        assert_eq!(head.method, HttpMethod::Put);
        assert_eq!(head.url, "/branches/7");
    }

    #[tokio::test]
    async fn test_offline_drain_does_nothing() {
        let h = harness().await;
        queue_two_sales(&h).await;

        let report = SyncTrigger::new(h.dispatcher.clone()).drain().await;

        assert_eq!(report.halted, Some(HaltReason::Offline));
        assert_eq!(report.remaining, Some(2));
        assert_eq!(h.mock.request_count().await, 0);
    }

    #[tokio::test]
    async fn test_replayed_operation_never_redelivered() {
        let h = harness().await;
        queue_two_sales(&h).await;
        h.monitor.set_online(true);
        let trigger = SyncTrigger::new(h.dispatcher.clone());

        trigger.drain().await;
        let second = trigger.drain().await;

        assert_eq!(second.replayed, 0);
        assert_eq!(h.mock.request_count().await, 2);
    }

    #[tokio::test]
    async fn test_concurrent_drains_replay_each_once() {
        let h = harness().await;
        queue_two_sales(&h).await;
        h.monitor.set_online(true);
        let trigger = SyncTrigger::new(h.dispatcher.clone());

        let (a, b) = tokio::join!(trigger.drain(), trigger.drain());

        assert_eq!(a.replayed + b.replayed, 2);
        assert_eq!(h.mock.request_count().await, 2);
        assert_eq!(h.mock.collection(Collection::Sales).await.len(), 2);
    }

    #[tokio::test]
    async fn test_replay_uses_current_token() {
        let h = harness().await;
        h.dispatcher.session().login("t-old", "r-old").await.unwrap();
        queue_two_sales(&h).await;

        h.mock.with_auth("t-new", "r-new").await;
        h.dispatcher.session().login("t-new", "r-new").await.unwrap();
        h.monitor.set_online(true);

        let report = SyncTrigger::new(h.dispatcher.clone()).drain().await;

        assert!(report.is_complete());
        for request in h.mock.requests().await {
            assert_eq!(request.bearer_token(), Some("t-new"));
        }
    }

    #[tokio::test]
    async fn test_replay_reconciles_server_ids() {
        let h = harness().await;
        let ids = queue_two_sales(&h).await;
        h.mock.reassign_ids(true).await;
        h.monitor.set_online(true);

        SyncTrigger::new(h.dispatcher.clone()).drain().await;

        for id in ids {
            let client_id = EntityId::from_value(&id).unwrap();
            assert_eq!(
                h.store.get_by_id(Collection::Sales, &client_id).await.unwrap(),
                None
            );
        }
        let cached = h.store.get_all(Collection::Sales).await.unwrap();
        assert_eq!(cached.len(), 2);
        assert!(cached.iter().all(|r| matches!(r.id(), EntityId::Number(_))));
    }

    #[tokio::test]
    async fn test_emitter_sees_progress_and_state() {
        let h = harness().await;
        queue_two_sales(&h).await;
        h.monitor.set_online(true);
        let emitter = Arc::new(RecordingEmitter::default());

        SyncTrigger::new(h.dispatcher.clone())
            .with_emitter(emitter.clone())
            .drain()
            .await;

        let events = emitter.events.lock().unwrap().clone();
        assert_eq!(
            events,
            vec![
                "state:draining",
                "progress:1/1",
                "progress:2/0",
                "state:idle"
            ]
        );
    }

    #[tokio::test]
    async fn test_background_task_drains_on_reconnect() {
        let h = harness().await;
        queue_two_sales(&h).await;

        let trigger = Arc::new(SyncTrigger::new(h.dispatcher.clone()));
        let handle = trigger.spawn();

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(h.store.count_pending().await.unwrap(), 2);

        h.monitor.set_online(true);
        wait_for_empty_queue(&h.store).await;
        assert_eq!(h.mock.request_count().await, 2);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_background_task_drains_at_startup_when_online() {
        let h = harness().await;
        queue_two_sales(&h).await;
        h.monitor.set_online(true);

        let handle = Arc::new(SyncTrigger::new(h.dispatcher.clone())).spawn();
        wait_for_empty_queue(&h.store).await;

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_manual_drain_request() {
        let h = harness().await;
        queue_two_sales(&h).await;

        let trigger = SyncTrigger::new(h.dispatcher.clone()).with_config(TriggerConfig {
            auto_drain: false,
            ..TriggerConfig::default()
        });
        let handle = Arc::new(trigger).spawn();

        h.monitor.set_online(true);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(h.store.count_pending().await.unwrap(), 2);

        handle.request_drain().unwrap();
        wait_for_empty_queue(&h.store).await;

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_halted_drain_retried_with_backoff() {
        let h = harness().await;
        queue_two_sales(&h).await;
        h.monitor.set_online(true);
        h.mock.fail_next(MockFailure::Status(503)).await;

        let trigger = SyncTrigger::new(h.dispatcher.clone()).with_config(TriggerConfig {
            retry_halted: true,
            initial_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(50),
            ..TriggerConfig::default()
        });
        let handle = Arc::new(trigger).spawn();

        wait_for_empty_queue(&h.store).await;
        // One rejected attempt, then both replayed.
        assert_eq!(h.mock.request_count().await, 3);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_expired_session_not_retried() {
        let h = harness().await;
        h.mock.with_auth("t-1", "r-1").await;
        h.dispatcher.session().login("t-1", "r-1").await.unwrap();
        queue_two_sales(&h).await;
        h.mock.revoke_session().await;
        h.monitor.set_online(true);

        let trigger = Arc::new(SyncTrigger::new(h.dispatcher.clone()).with_config(TriggerConfig {
            retry_halted: true,
            initial_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(20),
            ..TriggerConfig::default()
        }));
        let handle = trigger.clone().spawn();

        tokio::time::sleep(Duration::from_millis(200)).await;

        // The head, then the rejected refresh. Nothing after that.
        assert_eq!(h.mock.request_count().await, 2);
        assert_eq!(h.store.count_pending().await.unwrap(), 2);
        assert!(!h.dispatcher.session().is_authenticated().await.unwrap());

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_unreadable_store_leaves_remaining_unknown() {
        let h = harness().await;
        queue_two_sales(&h).await;
        h.monitor.set_online(true);
        h.store.close().await;

        let report = SyncTrigger::new(h.dispatcher.clone()).drain().await;

        assert_eq!(report.replayed, 0);
        assert_eq!(report.remaining, None);
        assert!(matches!(report.halted, Some(HaltReason::Storage { .. })));
        assert_eq!(h.mock.request_count().await, 0);
    }

    #[tokio::test]
    async fn test_queued_update_follows_reassigned_id() {
        let h = harness().await;
        h.dispatcher
            .dispatch(DispatchRequest::post("/sales", json!({"productId": "X", "qty": 1})))
            .await
            .unwrap_err();
        let head = h.store.peek_pending().await.unwrap().unwrap();
        let client_id = EntityId::from_value(&head.body.unwrap()["id"]).unwrap();

        h.dispatcher
            .dispatch(DispatchRequest::patch(
                format!("/sales/{}", client_id),
                json!({"qty": 5}),
            ))
            .await
            .unwrap_err();

        h.mock.reassign_ids(true).await;
        h.monitor.set_online(true);
        let report = SyncTrigger::new(h.dispatcher.clone()).drain().await;

        assert!(report.is_complete());
        assert_eq!(report.replayed, 2);
        assert_eq!(report.remaining, Some(0));

        let sales = h.mock.collection(Collection::Sales).await;
        assert_eq!(sales.len(), 1);
        let server_id = sales[0].id().clone();
        assert!(matches!(server_id, EntityId::Number(_)));
        assert_eq!(sales[0].get("qty"), Some(&json!(5)));

        let requests = h.mock.requests().await;
        assert_eq!(requests[1].method, HttpMethod::Patch);
        assert_eq!(requests[1].url, format!("/sales/{}", server_id));

        let cached = h.store.get_by_id(Collection::Sales, &server_id).await.unwrap().unwrap();
        assert_eq!(cached.get("qty"), Some(&json!(5)));
    }

    #[test]
    fn test_halt_reason_mapping() {
        assert_eq!(
            halt_reason(4, DispatchError::unreachable("refused")),
            HaltReason::Unreachable {
                sequence: 4,
                message: "refused".to_string()
            }
        );
        assert_eq!(
            halt_reason(4, DispatchError::SessionExpired),
            HaltReason::SessionExpired { sequence: 4 }
        );
        assert!(!HaltReason::SessionExpired { sequence: 4 }.is_retryable());
        assert!(matches!(
            halt_reason(4, DispatchError::status(409, "conflict")),
            HaltReason::Rejected { sequence: 4, status: Some(409), .. }
        ));
        assert!(!HaltReason::Offline.is_retryable());
        assert!(HaltReason::Storage { message: "x".into() }.is_retryable());
    }
}
