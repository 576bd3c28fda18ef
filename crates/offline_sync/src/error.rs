//! Error types for the offline sync engine.

use local_store::StoreError;
use thiserror::Error;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors returned from the public surface.
///
/// Remote failures never appear here: they are absorbed by the queue.
/// Only failures to persist local state reach the caller.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The local store could not be written.
    #[error("Local storage error: {0}")]
    Storage(#[from] StoreError),

    /// A record could not be encoded for the queue.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for remote store calls.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Failures reported by a remote store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// Network or transport failure.
    #[error("Network error: {0}")]
    Network(String),

    /// The backend refused the write.
    #[error("Rejected by backend: {0}")]
    Rejected(String),

    /// No backend is reachable.
    #[error("Remote store unavailable")]
    Unavailable,

    /// A queued payload does not match its action.
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
}

impl From<serde_json::Error> for RemoteError {
    fn from(err: serde_json::Error) -> Self {
        RemoteError::InvalidPayload(err.to_string())
    }
}
