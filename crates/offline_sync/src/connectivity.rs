//! Connectivity tracking.
//!
//! The platform reports reachability changes as [`NetworkEvent`]s. The
//! [`ConnectivityMonitor`] is the only writer of the shared
//! [`ConnectivityState`]: it flips the flag, tells the user, and on
//! regaining the network starts a reconciliation pass.

use crate::notify::{NoticeKind, Notifier};
use crate::reconcile::Reconciler;
use crate::remote::{IdentityResolver, RemoteStore};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Connection status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Online,
    Offline,
}

/// Reachability change reported by the platform
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NetworkEvent {
    Online,
    Offline,
}

/// Session-wide online flag, shared by every component of a session.
#[derive(Clone, Debug)]
pub struct ConnectivityState {
    online: Arc<AtomicBool>,
}

impl ConnectivityState {
    pub fn new(online: bool) -> Self {
        Self {
            online: Arc::new(AtomicBool::new(online)),
        }
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> ConnectionStatus {
        if self.is_online() {
            ConnectionStatus::Online
        } else {
            ConnectionStatus::Offline
        }
    }

    /// Set the flag, returning true if it changed
    pub(crate) fn set_online(&self, online: bool) -> bool {
        self.online.swap(online, Ordering::SeqCst) != online
    }
}

/// Reacts to platform reachability events.
pub struct ConnectivityMonitor<R, I> {
    state: ConnectivityState,
    notifier: Notifier,
    reconciler: Reconciler<R, I>,
}

impl<R, I> ConnectivityMonitor<R, I>
where
    R: RemoteStore + 'static,
    I: IdentityResolver + 'static,
{
    pub fn new(state: ConnectivityState, notifier: Notifier, reconciler: Reconciler<R, I>) -> Self {
        Self {
            state,
            notifier,
            reconciler,
        }
    }

    /// Apply one event.
    ///
    /// Returns the handle of the reconciliation pass started by an
    /// offline-to-online transition. Events that repeat the current state
    /// are ignored.
    pub fn handle_event(&self, event: NetworkEvent) -> Option<JoinHandle<()>> {
        match event {
            NetworkEvent::Online => {
                if !self.state.set_online(true) {
                    return None;
                }
                tracing::info!("Network: online, starting reconciliation");
                self.notifier.notify(
                    NoticeKind::Info,
                    "Back online",
                    "Syncing your changes...",
                );
                Some(self.reconciler.spawn())
            }
            NetworkEvent::Offline => {
                if self.state.set_online(false) {
                    tracing::warn!("Network: offline");
                    self.notifier.notify(
                        NoticeKind::Warning,
                        "You're offline",
                        "Changes are saved on this device and will sync when you reconnect.",
                    );
                }
                None
            }
        }
    }

    /// Consume events until the platform side of the channel closes
    pub async fn run(self, mut events: mpsc::Receiver<NetworkEvent>) {
        while let Some(event) = events.recv().await {
            self.handle_event(event);
        }
        tracing::debug!("Network event channel closed, connectivity monitor stopping");
    }

    /// Run the monitor as a background task
    pub fn spawn(self, events: mpsc::Receiver<NetworkEvent>) -> JoinHandle<()> {
        tokio::spawn(self.run(events))
    }
}
