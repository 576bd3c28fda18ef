//! Durable FIFO of mutations waiting for the remote store.
//!
//! The queue is one document in the local store. Every mutating call reads
//! the whole document, changes it, and writes the whole document back while
//! holding the queue's write lock, so concurrent writers never overwrite
//! each other. Clones of a `SyncQueue` share that lock.
//!
//! Entries are kept as raw JSON text. An entry this build does not modify
//! (an unrecognized action, or fields added by a newer client) is written
//! back exactly as it was read.

use crate::error::SyncResult;
use crate::mutation::{Mutation, SyncAction};
use chrono::{DateTime, Utc};
use local_store::{KeyValueStore, KeyValueStoreExt};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

const ID_SUFFIX_LEN: usize = 9;

/// One pending mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueItem {
    /// Unique within the queue for the item's lifetime
    pub id: String,
    pub action: SyncAction,
    /// Action-specific record, decoded at replay time
    pub payload: Value,
    pub enqueued_at: DateTime<Utc>,
    /// Failed replay attempts so far
    #[serde(default)]
    pub retry_count: u32,
}

#[derive(Deserialize)]
struct EntryId {
    id: String,
}

type Entry = Box<RawValue>;

fn entry_id(entry: &Entry) -> Option<String> {
    serde_json::from_str::<EntryId>(entry.get())
        .ok()
        .map(|e| e.id)
}

/// Handle to the persisted sync queue.
#[derive(Clone)]
pub struct SyncQueue {
    store: Arc<dyn KeyValueStore>,
    key: String,
    write_lock: Arc<Mutex<()>>,
}

impl SyncQueue {
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

    fn load(&self) -> Vec<Entry> {
        self.store.get_or_default(&self.key)
    }

    fn save(&self, entries: &[Entry]) -> SyncResult<()> {
        self.store.set(&self.key, entries)?;
        Ok(())
    }

    /// Append a new item and persist the queue
    pub fn enqueue(&self, action: SyncAction, payload: Value) -> SyncResult<QueueItem> {
        let _guard = self.lock();
        let mut entries = self.load();

        let mut id = generate_id();
        while entries.iter().any(|e| entry_id(e).as_deref() == Some(id.as_str())) {
            id = generate_id();
        }

        let item = QueueItem {
            id,
            action,
            payload,
            enqueued_at: Utc::now(),
            retry_count: 0,
        };
        entries.push(serde_json::value::to_raw_value(&item)?);
        self.save(&entries)?;

        tracing::debug!("Queued {} as {} ({} pending)", item.action, item.id, entries.len());
        Ok(item)
    }

    /// Append a typed mutation
    pub fn enqueue_mutation(&self, mutation: &Mutation) -> SyncResult<QueueItem> {
        self.enqueue(mutation.action(), mutation.to_payload()?)
    }

    /// Remove the item with `id`. Returns false, without writing, if absent.
    pub fn dequeue(&self, id: &str) -> SyncResult<bool> {
        let _guard = self.lock();
        let mut entries = self.load();
        let before = entries.len();
        entries.retain(|e| entry_id(e).as_deref() != Some(id));

        if entries.len() == before {
            return Ok(false);
        }
        self.save(&entries)?;
        Ok(true)
    }

    /// Count one more failed attempt for `id`.
    ///
    /// Returns the new retry count, or `None` if the item is gone. Only the
    /// `retryCount` field of the entry changes.
    pub fn record_failure(&self, id: &str) -> SyncResult<Option<u32>> {
        let _guard = self.lock();
        let mut entries = self.load();
        let Some(entry) = entries
            .iter_mut()
            .find(|e| entry_id(e).as_deref() == Some(id))
        else {
            return Ok(None);
        };

        let mut fields: Map<String, Value> = serde_json::from_str(entry.get())?;
        let count = fields
            .get("retryCount")
            .and_then(Value::as_u64)
            .map_or(0, |n| u32::try_from(n).unwrap_or(u32::MAX))
            .saturating_add(1);
        fields.insert("retryCount".to_string(), Value::from(count));
        *entry = serde_json::value::to_raw_value(&fields)?;

        self.save(&entries)?;
        Ok(Some(count))
    }

    /// Snapshot of every item in processing order.
    ///
    /// Entries that do not decode are skipped here but stay persisted.
    pub fn peek_all(&self) -> Vec<QueueItem> {
        self.load()
            .iter()
            .filter_map(|entry| match serde_json::from_str(entry.get()) {
                Ok(item) => Some(item),
                Err(e) => {
                    tracing::warn!("Skipping unreadable queue entry: {}", e);
                    None
                }
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.peek_all().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Millisecond timestamp plus a random suffix, e.g. `1718031123456-k3j9x0qaz`.
fn generate_id() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(ID_SUFFIX_LEN)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect();
    format!("{}-{}", Utc::now().timestamp_millis(), suffix)
}
