//! The sync session: the write facade and the public surface.
//!
//! A `SyncSession` is owned by the application root and handed to whatever
//! needs to write practice data. Every write goes through the same three
//! steps:
//!
//! 1. Update the progress mirror (never skipped).
//! 2. If online and signed in, try the remote write right away.
//! 3. If that was not possible or failed, queue the mutation.
//!
//! A mutation is therefore never lost, is synced as early as possible, and
//! degrades to deferred sync under any remote failure.

use crate::config::SyncConfig;
use crate::connectivity::{ConnectionStatus, ConnectivityMonitor, ConnectivityState};
use crate::error::SyncResult;
use crate::mirror::ProgressMirror;
use crate::mutation::Mutation;
use crate::notify::{Notice, NoticeKind, Notifier};
use crate::queue::{QueueItem, SyncQueue};
use crate::reconcile::{LastSync, ReconcileReport, Reconciler};
use crate::remote::{IdentityResolver, RemoteStore};
use chrono::{DateTime, Utc};
use local_store::KeyValueStore;
use practice_model::{Poem, PoemId, Progress, ProgressSnapshot, Quote, QuoteId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// What happened to a write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Written to the remote store immediately
    Synced,
    /// Queued for the next reconciliation pass
    Queued { item_id: String },
}

impl WriteOutcome {
    pub fn is_queued(&self) -> bool {
        matches!(self, WriteOutcome::Queued { .. })
    }
}

/// Sync status for UI display
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStatusInfo {
    pub status: ConnectionStatus,
    pub pending_changes: usize,
    pub last_sync: Option<DateTime<Utc>>,
    /// Seconds since the last reconciliation pass
    pub time_since_sync: Option<u64>,
    pub status_message: String,
}

/// Offline-first persistence session.
pub struct SyncSession<R, I> {
    config: SyncConfig,
    queue: SyncQueue,
    mirror: ProgressMirror,
    last_sync: LastSync,
    connectivity: ConnectivityState,
    notifier: Notifier,
    remote: Arc<R>,
    identity: Arc<I>,
    reconciler: Reconciler<R, I>,
}

impl<R, I> SyncSession<R, I>
where
    R: RemoteStore + 'static,
    I: IdentityResolver + 'static,
{
    /// Create a session with the default configuration
    pub fn new(store: Arc<dyn KeyValueStore>, remote: R, identity: I) -> Self {
        Self::with_config(store, remote, identity, SyncConfig::default())
    }

    /// Create a session.
    ///
    /// The session starts offline; [`initialize`](Self::initialize) seeds
    /// the real reachability.
    pub fn with_config(
        store: Arc<dyn KeyValueStore>,
        remote: R,
        identity: I,
        config: SyncConfig,
    ) -> Self {
        let queue = SyncQueue::new(store.clone(), config.queue_key.clone());
        let mirror = ProgressMirror::new(store.clone(), config.mirror_key.clone());
        let last_sync = LastSync::new(store, config.last_sync_key.clone());
        let connectivity = ConnectivityState::new(false);
        let notifier = Notifier::new(config.notice_capacity);
        let remote = Arc::new(remote);
        let identity = Arc::new(identity);
        let reconciler = Reconciler::new(
            queue.clone(),
            mirror.clone(),
            last_sync.clone(),
            connectivity.clone(),
            Arc::clone(&remote),
            Arc::clone(&identity),
            config.max_retries,
        );

        Self {
            config,
            queue,
            mirror,
            last_sync,
            connectivity,
            notifier,
            remote,
            identity,
            reconciler,
        }
    }

    /// Seed connectivity from the platform and schedule the first pass.
    ///
    /// The first reconciliation waits for the startup grace period so the
    /// rest of the application can finish initializing.
    pub fn initialize(&self, reachable: bool) -> JoinHandle<()> {
        self.connectivity.set_online(reachable);
        tracing::info!(
            "Sync session starting {} with {} pending changes",
            if reachable { "online" } else { "offline" },
            self.queue.len()
        );
        self.reconciler.spawn_after(self.config.startup_grace())
    }

    /// Monitor that applies platform reachability events to this session
    pub fn connectivity_monitor(&self) -> ConnectivityMonitor<R, I> {
        ConnectivityMonitor::new(
            self.connectivity.clone(),
            self.notifier.clone(),
            self.reconciler.clone(),
        )
    }

    pub fn is_online(&self) -> bool {
        self.connectivity.is_online()
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Subscribe to user-facing notices
    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.notifier.subscribe()
    }

    // ========== Write Facade ==========

    /// Save a poem together with its progress
    pub async fn write_poem(&self, poem: Poem) -> SyncResult<WriteOutcome> {
        self.mirror.upsert(&poem.id, poem.progress.clone())?;
        self.push_or_enqueue(Mutation::SavePoem(poem)).await
    }

    /// Record practice progress for a poem
    pub async fn write_progress(
        &self,
        poem_id: &PoemId,
        progress: Progress,
    ) -> SyncResult<WriteOutcome> {
        self.mirror.upsert(poem_id, progress.clone())?;
        self.push_or_enqueue(Mutation::SaveProgress {
            poem_id: poem_id.clone(),
            progress,
        })
        .await
    }

    /// Remove a poem and its mirrored progress
    pub async fn remove_poem(&self, poem_id: &PoemId) -> SyncResult<WriteOutcome> {
        self.mirror.remove(poem_id)?;
        self.push_or_enqueue(Mutation::RemovePoem(poem_id.clone())).await
    }

    pub async fn write_quote(&self, quote: Quote) -> SyncResult<WriteOutcome> {
        self.push_or_enqueue(Mutation::SaveQuote(quote)).await
    }

    pub async fn delete_quote(&self, quote_id: &QuoteId) -> SyncResult<WriteOutcome> {
        self.push_or_enqueue(Mutation::DeleteQuote(quote_id.clone()))
            .await
    }

    async fn push_or_enqueue(&self, mutation: Mutation) -> SyncResult<WriteOutcome> {
        if self.connectivity.is_online() {
            if let Some(identity) = self.identity.resolve_current_identity().await {
                match mutation.push(&*self.remote, &identity).await {
                    Ok(()) => return Ok(WriteOutcome::Synced),
                    Err(e) => {
                        tracing::debug!("Immediate {} failed, queuing: {}", mutation.action(), e)
                    }
                }
            }
        }

        let item = self.queue.enqueue_mutation(&mutation)?;
        Ok(WriteOutcome::Queued { item_id: item.id })
    }

    // ========== Sync ==========

    /// Run one reconciliation pass
    pub async fn reconcile(&self) -> SyncResult<ReconcileReport> {
        self.reconciler.reconcile().await
    }

    /// Sync now at the user's request.
    ///
    /// Returns false without doing anything while offline.
    pub async fn force_sync(&self) -> SyncResult<bool> {
        if !self.is_online() {
            self.notifier.notify(
                NoticeKind::Warning,
                "Can't sync",
                "You're offline. Your changes are saved on this device.",
            );
            return Ok(false);
        }

        let report = self.reconciler.reconcile().await?;
        if report.has_failures() {
            self.notifier.notify(
                NoticeKind::Warning,
                "Sync incomplete",
                format!(
                    "{} changes will be retried, {} could not be synced.",
                    report.retried + report.progress_failed,
                    report.dropped
                ),
            );
        }
        Ok(true)
    }

    // ========== Queries ==========

    pub fn pending_count(&self) -> usize {
        self.queue.len()
    }

    pub fn pending_items(&self) -> Vec<QueueItem> {
        self.queue.peek_all()
    }

    pub fn last_sync_time(&self) -> Option<DateTime<Utc>> {
        self.last_sync.get()
    }

    pub fn progress(&self, poem_id: &PoemId) -> Option<ProgressSnapshot> {
        self.mirror.get(poem_id)
    }

    pub fn all_progress(&self) -> std::collections::BTreeMap<PoemId, ProgressSnapshot> {
        self.mirror.get_all()
    }

    /// Get status info for UI display
    pub fn status_info(&self) -> SyncStatusInfo {
        let status = self.connectivity.status();
        let pending = self.pending_count();
        let last_sync = self.last_sync_time();
        let time_since_sync = last_sync.map(|at| (Utc::now() - at).num_seconds().max(0) as u64);

        let status_message = match (status, pending) {
            (ConnectionStatus::Online, 0) => "Connected".to_string(),
            (ConnectionStatus::Online, n) => format!("Connected - {} changes waiting to sync", n),
            (ConnectionStatus::Offline, 0) => "Offline".to_string(),
            (ConnectionStatus::Offline, n) => format!("Offline - {} pending changes", n),
        };

        SyncStatusInfo {
            status,
            pending_changes: pending,
            last_sync,
            time_since_sync,
            status_message,
        }
    }
}
