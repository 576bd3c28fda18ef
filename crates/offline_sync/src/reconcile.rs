//! Reconciliation: replay the queue, then re-push the progress mirror.
//!
//! A pass runs only while online and signed in. Queued items are replayed
//! one at a time in enqueue order, because later items may depend on
//! earlier ones (a poem must exist before progress on it is recorded).
//! Every remote operation is an idempotent upsert or delete, so two passes
//! overlapping is harmless and no lock is taken.

use crate::connectivity::ConnectivityState;
use crate::error::{RemoteError, SyncResult};
use crate::mirror::ProgressMirror;
use crate::mutation::Mutation;
use crate::queue::{QueueItem, SyncQueue};
use crate::remote::{Identity, IdentityResolver, RemoteStore};
use chrono::{DateTime, Utc};
use local_store::{KeyValueStore, KeyValueStoreExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Persisted time of the last reconciliation pass.
#[derive(Clone)]
pub struct LastSync {
    store: Arc<dyn KeyValueStore>,
    key: String,
}

impl LastSync {
    pub fn new(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    pub fn get(&self) -> Option<DateTime<Utc>> {
        self.store.get(&self.key)
    }

    pub(crate) fn record(&self, at: DateTime<Utc>) -> SyncResult<()> {
        self.store.set(&self.key, &at)?;
        Ok(())
    }
}

/// Why a pass did or did not run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassStatus {
    #[default]
    Completed,
    SkippedOffline,
    SkippedSignedOut,
}

/// Outcome of one reconciliation pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub status: PassStatus,
    /// Queue items replayed and removed
    pub synced: usize,
    /// Queue items that failed and stay queued
    pub retried: usize,
    /// Queue items that failed for the last time and were removed
    pub dropped: usize,
    /// Queue items with an action this build does not know
    pub unrecognized: usize,
    /// Mirror snapshots pushed
    pub progress_pushed: usize,
    /// Mirror snapshots that failed to push
    pub progress_failed: usize,
}

impl ReconcileReport {
    fn skipped(status: PassStatus) -> Self {
        Self {
            status,
            ..Default::default()
        }
    }

    /// Whether anything failed during the pass
    pub fn has_failures(&self) -> bool {
        self.retried > 0 || self.dropped > 0 || self.progress_failed > 0
    }
}

/// Drains the sync queue against the remote store.
pub struct Reconciler<R, I> {
    queue: SyncQueue,
    mirror: ProgressMirror,
    last_sync: LastSync,
    connectivity: ConnectivityState,
    remote: Arc<R>,
    identity: Arc<I>,
    max_retries: u32,
}

impl<R, I> Clone for Reconciler<R, I> {
    fn clone(&self) -> Self {
        Self {
            queue: self.queue.clone(),
            mirror: self.mirror.clone(),
            last_sync: self.last_sync.clone(),
            connectivity: self.connectivity.clone(),
            remote: Arc::clone(&self.remote),
            identity: Arc::clone(&self.identity),
            max_retries: self.max_retries,
        }
    }
}

impl<R: RemoteStore, I: IdentityResolver> Reconciler<R, I> {
    pub fn new(
        queue: SyncQueue,
        mirror: ProgressMirror,
        last_sync: LastSync,
        connectivity: ConnectivityState,
        remote: Arc<R>,
        identity: Arc<I>,
        max_retries: u32,
    ) -> Self {
        Self {
            queue,
            mirror,
            last_sync,
            connectivity,
            remote,
            identity,
            max_retries,
        }
    }

    /// Run one reconciliation pass.
    ///
    /// Remote failures are absorbed into the report; only local storage
    /// failures are returned as errors. A storage error ends the pass early
    /// and leaves the last sync time unchanged.
    pub async fn reconcile(&self) -> SyncResult<ReconcileReport> {
        if !self.connectivity.is_online() {
            tracing::debug!("Skipping reconciliation while offline");
            return Ok(ReconcileReport::skipped(PassStatus::SkippedOffline));
        }

        let Some(identity) = self.identity.resolve_current_identity().await else {
            tracing::debug!("Skipping reconciliation, nobody is signed in");
            return Ok(ReconcileReport::skipped(PassStatus::SkippedSignedOut));
        };

        let mut report = ReconcileReport::default();

        let items = self.queue.peek_all();
        if !items.is_empty() {
            tracing::info!("Replaying {} queued changes", items.len());
        }
        for item in &items {
            self.replay(item, &identity, &mut report).await?;
        }

        for (poem_id, snapshot) in self.mirror.get_all() {
            match self.remote.save_progress(&poem_id, &snapshot.progress).await {
                Ok(()) => report.progress_pushed += 1,
                Err(e) => {
                    tracing::warn!("Failed to push progress for {}: {}", poem_id, e);
                    report.progress_failed += 1;
                }
            }
        }

        self.last_sync.record(Utc::now())?;

        tracing::info!(
            "Reconciliation finished: {} synced, {} retrying, {} dropped, {} progress pushed",
            report.synced,
            report.retried,
            report.dropped,
            report.progress_pushed
        );
        Ok(report)
    }

    async fn replay(
        &self,
        item: &QueueItem,
        identity: &Identity,
        report: &mut ReconcileReport,
    ) -> SyncResult<()> {
        let result = match Mutation::decode(&item.action, &item.payload) {
            Ok(Some(mutation)) => mutation.push(&*self.remote, identity).await,
            Ok(None) => {
                tracing::warn!(
                    "Leaving queued item {} with unrecognized action {:?} in place",
                    item.id,
                    item.action.as_str()
                );
                report.unrecognized += 1;
                return Ok(());
            }
            Err(e) => Err(RemoteError::from(e)),
        };

        match result {
            Ok(()) => {
                self.queue.dequeue(&item.id)?;
                tracing::debug!("Synced {} ({})", item.id, item.action);
                report.synced += 1;
            }
            Err(e) => match self.queue.record_failure(&item.id)? {
                Some(attempts) if attempts >= self.max_retries => {
                    self.queue.dequeue(&item.id)?;
                    tracing::warn!(
                        "Dropping {} ({}) after {} failed attempts: {}",
                        item.id,
                        item.action,
                        attempts,
                        e
                    );
                    report.dropped += 1;
                }
                Some(attempts) => {
                    tracing::debug!("Replay of {} failed (attempt {}): {}", item.id, attempts, e);
                    report.retried += 1;
                }
                None => {
                    tracing::debug!("Queued item {} vanished during replay", item.id);
                }
            },
        }
        Ok(())
    }
}

impl<R, I> Reconciler<R, I>
where
    R: RemoteStore + 'static,
    I: IdentityResolver + 'static,
{
    /// Run a pass in the background
    pub fn spawn(&self) -> JoinHandle<()> {
        self.spawn_after(Duration::ZERO)
    }

    /// Run a pass in the background after `delay`
    pub fn spawn_after(&self, delay: Duration) -> JoinHandle<()> {
        let reconciler = self.clone();
        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            if let Err(e) = reconciler.reconcile().await {
                tracing::error!("Reconciliation failed: {}", e);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mutation::SyncAction;
    use crate::remote::{NoIdentity, StaticIdentity, StoreRemote};
    use local_store::MemoryStore;
    use practice_model::{Poem, PoemId, Progress, Quote};
    use serde_json::json;

    type TestReconciler = Reconciler<StoreRemote<MemoryStore>, StaticIdentity>;

    struct Fixture {
        queue: SyncQueue,
        mirror: ProgressMirror,
        last_sync: LastSync,
        connectivity: ConnectivityState,
        remote: Arc<StoreRemote<MemoryStore>>,
        reconciler: TestReconciler,
    }

    fn fixture() -> Fixture {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let queue = SyncQueue::new(store.clone(), "sync_queue");
        let mirror = ProgressMirror::new(store.clone(), "progress_mirror");
        let last_sync = LastSync::new(store, "last_sync");
        let connectivity = ConnectivityState::new(true);
        let remote = Arc::new(StoreRemote::new(MemoryStore::new()));
        let identity = Arc::new(StaticIdentity::signed_in(Identity::new("alice")));
        let reconciler = Reconciler::new(
            queue.clone(),
            mirror.clone(),
            last_sync.clone(),
            connectivity.clone(),
            remote.clone(),
            identity,
            3,
        );
        Fixture {
            queue,
            mirror,
            last_sync,
            connectivity,
            remote,
            reconciler,
        }
    }

    #[tokio::test]
    async fn test_offline_is_noop() {
        let f = fixture();
        f.connectivity.set_online(false);
        f.queue.enqueue_mutation(&Mutation::SaveQuote(Quote::new("q", "a"))).unwrap();

        let report = f.reconciler.reconcile().await.unwrap();
        assert_eq!(report.status, PassStatus::SkippedOffline);
        assert_eq!(f.queue.len(), 1);
        assert_eq!(f.remote.call_count(), 0);
        assert!(f.last_sync.get().is_none());
    }

    #[tokio::test]
    async fn test_signed_out_is_noop() {
        let f = fixture();
        let reconciler = Reconciler::new(
            f.queue.clone(),
            f.mirror.clone(),
            f.last_sync.clone(),
            f.connectivity.clone(),
            f.remote.clone(),
            Arc::new(NoIdentity),
            3,
        );
        f.queue.enqueue_mutation(&Mutation::SaveQuote(Quote::new("q", "a"))).unwrap();

        let report = reconciler.reconcile().await.unwrap();
        assert_eq!(report.status, PassStatus::SkippedSignedOut);
        assert_eq!(f.queue.len(), 1);
        assert!(f.last_sync.get().is_none());
    }

    #[tokio::test]
    async fn test_drains_queue_in_order() {
        let f = fixture();
        let poem = Poem::new("Fog", "Carl Sandburg", "The fog comes").with_id("poem-1");
        f.queue.enqueue_mutation(&Mutation::SavePoem(poem.clone())).unwrap();
        f.queue
            .enqueue_mutation(&Mutation::RemovePoem(poem.id.clone()))
            .unwrap();

        let report = f.reconciler.reconcile().await.unwrap();
        assert_eq!(report.synced, 2);
        assert!(f.queue.is_empty());
        // Replayed in order: saved, then removed
        assert!(f.remote.poems("alice").is_empty());
        assert!(f.last_sync.get().is_some());
    }

    #[tokio::test]
    async fn test_failed_item_dropped_after_three_passes() {
        let f = fixture();
        f.queue.enqueue_mutation(&Mutation::SaveQuote(Quote::new("q", "a"))).unwrap();
        f.remote.set_available(false);

        let first = f.reconciler.reconcile().await.unwrap();
        assert_eq!(first.retried, 1);
        assert_eq!(f.queue.peek_all()[0].retry_count, 1);

        f.reconciler.reconcile().await.unwrap();
        assert_eq!(f.queue.peek_all()[0].retry_count, 2);

        let third = f.reconciler.reconcile().await.unwrap();
        assert_eq!(third.dropped, 1);
        assert!(f.queue.is_empty());

        f.reconciler.reconcile().await.unwrap();
        assert_eq!(f.remote.call_count(), 3);
    }

    #[tokio::test]
    async fn test_undecodable_payload_counts_as_failure() {
        let f = fixture();
        f.queue
            .enqueue(SyncAction::SaveProgress, json!({"unexpected": true}))
            .unwrap();

        let report = f.reconciler.reconcile().await.unwrap();
        assert_eq!(report.retried, 1);
        assert_eq!(f.queue.peek_all()[0].retry_count, 1);
        assert_eq!(f.remote.call_count(), 0);
    }

    #[tokio::test]
    async fn test_unrecognized_action_left_alone() {
        let f = fixture();
        let item = f
            .queue
            .enqueue(SyncAction::Unrecognized("archivePoem".into()), json!({"id": 1}))
            .unwrap();

        for _ in 0..4 {
            let report = f.reconciler.reconcile().await.unwrap();
            assert_eq!(report.unrecognized, 1);
        }
        assert_eq!(f.queue.peek_all(), vec![item]);
    }

    #[tokio::test]
    async fn test_mirror_pushed_even_without_queue_entries() {
        let f = fixture();
        let poem_id = PoemId::from("poem-9");
        f.mirror.upsert(&poem_id, Progress::new().with_stage(5, 0)).unwrap();

        let report = f.reconciler.reconcile().await.unwrap();
        assert_eq!(report.progress_pushed, 1);
        assert_eq!(f.remote.progress(&poem_id).unwrap().stage, 5);
    }

    #[tokio::test]
    async fn test_mirror_push_failures_do_not_abort() {
        let f = fixture();
        f.mirror.upsert(&PoemId::from("a"), Progress::new()).unwrap();
        f.mirror.upsert(&PoemId::from("b"), Progress::new()).unwrap();
        f.remote.set_available(false);

        let report = f.reconciler.reconcile().await.unwrap();
        assert_eq!(report.progress_failed, 2);
        assert!(report.has_failures());
        assert!(f.last_sync.get().is_some());
    }

    #[tokio::test]
    async fn test_second_pass_is_clean() {
        let f = fixture();
        f.queue.enqueue_mutation(&Mutation::SaveQuote(Quote::new("q", "a"))).unwrap();

        f.reconciler.reconcile().await.unwrap();
        let second = f.reconciler.reconcile().await.unwrap();
        assert_eq!(second, ReconcileReport::default());
        assert!(f.queue.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawn_after_waits_for_delay() {
        let f = fixture();
        f.queue.enqueue_mutation(&Mutation::SaveQuote(Quote::new("q", "a"))).unwrap();

        let handle = f.reconciler.spawn_after(Duration::from_secs(2));
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(f.queue.len(), 1);

        handle.await.unwrap();
        assert!(f.queue.is_empty());
    }

    /// Store whose writes can be made to fail
    #[derive(Default)]
    struct ReadOnlyAfterFlip {
        inner: MemoryStore,
        read_only: std::sync::atomic::AtomicBool,
    }

    impl KeyValueStore for ReadOnlyAfterFlip {
        fn get_raw(&self, key: &str) -> local_store::StoreResult<Option<String>> {
            self.inner.get_raw(key)
        }

        fn set_raw(&self, key: &str, value: String) -> local_store::StoreResult<()> {
            if self.read_only.load(std::sync::atomic::Ordering::SeqCst) {
                return Err(std::io::Error::other("disk full").into());
            }
            self.inner.set_raw(key, value)
        }

        fn remove(&self, key: &str) -> local_store::StoreResult<()> {
            self.inner.remove(key)
        }

        fn keys(&self) -> local_store::StoreResult<Vec<String>> {
            self.inner.keys()
        }
    }

    #[tokio::test]
    async fn test_storage_error_ends_pass_without_last_sync() {
        let store = Arc::new(ReadOnlyAfterFlip::default());
        let shared: Arc<dyn KeyValueStore> = store.clone();
        let queue = SyncQueue::new(shared.clone(), "sync_queue");
        let last_sync = LastSync::new(shared.clone(), "last_sync");
        let remote = Arc::new(StoreRemote::new(MemoryStore::new()));
        let reconciler = Reconciler::new(
            queue.clone(),
            ProgressMirror::new(shared, "progress_mirror"),
            last_sync.clone(),
            ConnectivityState::new(true),
            remote.clone(),
            Arc::new(StaticIdentity::signed_in(Identity::new("alice"))),
            3,
        );
        queue.enqueue_mutation(&Mutation::SaveQuote(Quote::new("q", "a"))).unwrap();
        store.read_only.store(true, std::sync::atomic::Ordering::SeqCst);

        let result = reconciler.reconcile().await;
        assert!(matches!(result, Err(crate::SyncError::Storage(_))));
        assert!(last_sync.get().is_none());
        assert_eq!(queue.len(), 1);
        assert_eq!(remote.quotes("alice").len(), 1);
    }
}
