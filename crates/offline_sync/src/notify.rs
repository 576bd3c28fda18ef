//! User-facing notices, delivered over a broadcast channel.
//!
//! The engine never waits on the UI: a notice is sent and forgotten. With
//! no subscriber the notice is simply discarded, and a slow subscriber
//! loses the oldest notices rather than blocking the sender.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Severity of a notice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeKind {
    Info,
    Warning,
}

/// A toast-style message for the UI layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub title: String,
    pub message: String,
}

/// Sending side of the notice channel
#[derive(Debug, Clone)]
pub struct Notifier {
    sender: broadcast::Sender<Notice>,
}

impl Notifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to notices sent from now on
    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.sender.subscribe()
    }

    /// Send a notice. Never blocks and never fails.
    pub fn notify(&self, kind: NoticeKind, title: impl Into<String>, message: impl Into<String>) {
        let notice = Notice {
            kind,
            title: title.into(),
            message: message.into(),
        };
        if self.sender.send(notice).is_err() {
            tracing::trace!("Notice dropped, no subscribers");
        }
    }
}
