//! # Network State
//!
//! The process-wide online/offline signal.
//!
//! ## Ownership
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Connectivity Signal                              │
//! │                                                                         │
//! │  Host shell (OS / browser connectivity events)                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  NetworkMonitor ── the only writer ── set_online(bool)                 │
//! │       │                                                                 │
//! │       │ watch channel                                                   │
//! │       ▼                                                                 │
//! │  NetworkState (Clone, read-only)                                       │
//! │       ├──► RequestDispatcher   is_online() per call                    │
//! │       └──► SyncTrigger         subscribe() for the false→true edge     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use tokio::sync::watch;
use tracing::info;

/// Writer side of the connectivity signal.
#[derive(Debug)]
pub struct NetworkMonitor {
    tx: watch::Sender<bool>,
}

impl NetworkMonitor {
    /// Creates a monitor with the given initial connectivity.
    pub fn new(online: bool) -> Self {
        let (tx, _) = watch::channel(online);
        NetworkMonitor { tx }
    }

    /// Returns a read-only handle.
    pub fn state(&self) -> NetworkState {
        NetworkState {
            rx: self.tx.subscribe(),
        }
    }

    /// Publishes a connectivity change. Repeated values are not re-sent, so
    /// subscribers only wake on real transitions.
    pub fn set_online(&self, online: bool) {
        let changed = self.tx.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });

        if changed {
            info!(online, "Network state changed");
        }
    }

    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Default for NetworkMonitor {
    fn default() -> Self {
        NetworkMonitor::new(true)
    }
}

/// Read-only view of the connectivity signal.
#[derive(Debug, Clone)]
pub struct NetworkState {
    rx: watch::Receiver<bool>,
}

impl NetworkState {
    pub fn is_online(&self) -> bool {
        *self.rx.borrow()
    }

    /// Subscribes to connectivity changes.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.rx.clone()
    }

    /// Waits until the network is reported online.
    ///
    /// Returns false if the monitor was dropped first.
    pub async fn wait_for_online(&self) -> bool {
        let mut rx = self.rx.clone();
        let reached = rx.wait_for(|online| *online).await.is_ok();
        reached
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_state_reflects_monitor() {
        let monitor = NetworkMonitor::new(false);
        let state = monitor.state();
        assert!(!state.is_online());

        monitor.set_online(true);
        assert!(state.is_online());
        assert!(monitor.is_online());
    }

    #[tokio::test]
    async fn test_repeated_value_does_not_notify() {
        let monitor = NetworkMonitor::new(true);
        let mut rx = monitor.state().subscribe();
        rx.borrow_and_update();

        monitor.set_online(true);
        assert!(!rx.has_changed().unwrap());

        monitor.set_online(false);
        assert!(rx.has_changed().unwrap());
        assert!(!*rx.borrow_and_update());
    }

    #[tokio::test]
    async fn test_wait_for_online() {
        let monitor = NetworkMonitor::new(false);
        let state = monitor.state();

        let waiter = tokio::spawn(async move { state.wait_for_online().await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        monitor.set_online(true);

        assert!(waiter.await.unwrap());
    }

    #[tokio::test]
    async fn test_wait_returns_false_when_monitor_dropped() {
        let monitor = NetworkMonitor::new(false);
        let state = monitor.state();
        drop(monitor);

        assert!(!state.wait_for_online().await);
    }
}
