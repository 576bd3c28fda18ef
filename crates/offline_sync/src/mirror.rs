//! Local mirror of the latest practice progress per poem.
//!
//! The mirror is written before any remote attempt, whatever the
//! connectivity, so the newest progress survives even when both the
//! immediate write and the queue fail. It keeps one snapshot per poem and
//! no history. Read-modify-write cycles hold the mirror's write lock,
//! shared by every clone of the handle.

use crate::error::SyncResult;
use chrono::Utc;
use local_store::{KeyValueStore, KeyValueStoreExt};
use practice_model::{PoemId, Progress, ProgressSnapshot};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Handle to the persisted progress mirror.
#[derive(Clone)]
pub struct ProgressMirror {
    store: Arc<dyn KeyValueStore>,
    key: String,
    write_lock: Arc<Mutex<()>>,
}

impl ProgressMirror {
    pub fn new(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the snapshot for `poem_id`, stamping it with the current time
    pub fn upsert(&self, poem_id: &PoemId, progress: Progress) -> SyncResult<ProgressSnapshot> {
        let _guard = self.lock();
        let mut all = self.get_all();
        let snapshot = progress.snapshot_at(Utc::now());
        all.insert(poem_id.clone(), snapshot.clone());
        self.store.set(&self.key, &all)?;
        Ok(snapshot)
    }

    pub fn get(&self, poem_id: &PoemId) -> Option<ProgressSnapshot> {
        self.get_all().remove(poem_id)
    }

    pub fn get_all(&self) -> BTreeMap<PoemId, ProgressSnapshot> {
        self.store.get_or_default(&self.key)
    }

    /// Forget a poem. Returns false, without writing, if it was not mirrored.
    pub fn remove(&self, poem_id: &PoemId) -> SyncResult<bool> {
        let _guard = self.lock();
        let mut all = self.get_all();
        if all.remove(poem_id).is_none() {
            return Ok(false);
        }
        self.store.set(&self.key, &all)?;
        Ok(true)
    }
}
