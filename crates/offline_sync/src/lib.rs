//! Offline-first persistence for practice data.
//!
//! Writes land locally first and reach the remote backend either right away
//! or, when that is not possible, through a durable queue that is replayed
//! once the device is back online.
//!
//! # Modules
//!
//! - `queue`: durable FIFO of pending mutations with retry bookkeeping
//! - `mirror`: latest progress snapshot per poem, written on every mutation
//! - `connectivity`: online/offline state and the monitor that reacts to it
//! - `reconcile`: replays the queue and re-pushes the mirror
//! - `session`: the write facade and public surface
//! - `remote`: identity resolver and remote store collaborators
//!
//! # Example
//!
//! ```
//! use local_store::MemoryStore;
//! use offline_sync::{NoIdentity, OfflineRemote, SyncSession};
//! use practice_model::{PoemId, Progress};
//! use std::sync::Arc;
//!
//! # let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
//! # rt.block_on(async {
//! let session = SyncSession::new(Arc::new(MemoryStore::new()), OfflineRemote, NoIdentity);
//!
//! let poem_id = PoemId::from("poem-1");
//! let outcome = session
//!     .write_progress(&poem_id, Progress::new().with_stage(2, 1))
//!     .await
//!     .unwrap();
//!
//! assert!(outcome.is_queued());
//! assert_eq!(session.pending_count(), 1);
//! assert_eq!(session.progress(&poem_id).unwrap().stage, 2);
//! # });
//! ```

pub mod config;
pub mod connectivity;
pub mod error;
pub mod mirror;
pub mod mutation;
pub mod notify;
pub mod queue;
pub mod reconcile;
pub mod remote;
pub mod session;

pub use config::SyncConfig;
pub use connectivity::{ConnectionStatus, ConnectivityMonitor, ConnectivityState, NetworkEvent};
pub use error::{RemoteError, RemoteResult, SyncError, SyncResult};
pub use mirror::ProgressMirror;
pub use mutation::{Mutation, SyncAction};
pub use notify::{Notice, NoticeKind, Notifier};
pub use queue::{QueueItem, SyncQueue};
pub use reconcile::{LastSync, PassStatus, ReconcileReport, Reconciler};
pub use remote::{
    Identity, IdentityResolver, NoIdentity, OfflineRemote, RemoteStore, StaticIdentity,
    StoreRemote,
};
pub use session::{SyncSession, SyncStatusInfo, WriteOutcome};
