//! # Network Monitor
//!
//! Connectivity signal shared by the offline queue and the coordinator.
//!
//! ## Features
//!
//! - **Connectivity Detection**: current online/offline status
//! - **Real-time Updates**: subscribers are woken on every transition
//!
//! The host platform feeds transitions in through [`ConnectivityMonitor::set_status`];
//! the queue subscribes and drains whenever the status becomes
//! [`NetworkStatus::Online`].

use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkStatus {
    Online,
    Offline,
}

impl NetworkStatus {
    pub fn is_online(self) -> bool {
        self == Self::Online
    }
}

impl From<bool> for NetworkStatus {
    fn from(connected: bool) -> Self {
        if connected {
            Self::Online
        } else {
            Self::Offline
        }
    }
}

/// Cloneable handle to the process-wide connectivity state
#[derive(Debug, Clone)]
pub struct ConnectivityMonitor {
    sender: Arc<watch::Sender<NetworkStatus>>,
}

impl ConnectivityMonitor {
    pub fn new(initial: NetworkStatus) -> Self {
        let (sender, _) = watch::channel(initial);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn online() -> Self {
        Self::new(NetworkStatus::Online)
    }

    pub fn offline() -> Self {
        Self::new(NetworkStatus::Offline)
    }

    /// Record a connectivity report. Returns whether the status changed;
    /// subscribers are only notified on change.
    pub fn set_status(&self, status: NetworkStatus) -> bool {
        let changed = self.sender.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
        if changed {
            tracing::info!(?status, "Connectivity changed");
        }
        changed
    }

    pub fn set_connected(&self, connected: bool) -> bool {
        self.set_status(connected.into())
    }

    pub fn status(&self) -> NetworkStatus {
        *self.sender.borrow()
    }

    pub fn is_online(&self) -> bool {
        self.status().is_online()
    }

    pub fn subscribe(&self) -> watch::Receiver<NetworkStatus> {
        self.sender.subscribe()
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::online()
    }
}
