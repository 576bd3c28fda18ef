//! In-memory key-value store.
//!
//! Intended for tests and for sessions that do not need to survive a
//! restart. Data is lost when the store is dropped.

use crate::kv::{validate_key, KeyValueStore};
use crate::StoreResult;
use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

/// In-memory implementation of [`KeyValueStore`]
///
/// Documents are kept as raw JSON strings so that the decode path is the
/// same one a persistent backend goes through.
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: RwLock<BTreeMap<String, String>>,
}

impl MemoryStore {
    /// Create a new empty in-memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents
    pub fn len(&self) -> usize {
        self.documents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether the store holds no documents
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every document
    pub fn clear(&self) {
        self.documents
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl KeyValueStore for MemoryStore {
    fn get_raw(&self, key: &str) -> StoreResult<Option<String>> {
        let docs = self.documents.read().unwrap_or_else(PoisonError::into_inner);
        Ok(docs.get(key).cloned())
    }

    fn set_raw(&self, key: &str, value: String) -> StoreResult<()> {
        validate_key(key)?;
        let mut docs = self.documents.write().unwrap_or_else(PoisonError::into_inner);
        docs.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        let mut docs = self.documents.write().unwrap_or_else(PoisonError::into_inner);
        docs.remove(key);
        Ok(())
    }

    fn keys(&self) -> StoreResult<Vec<String>> {
        let docs = self.documents.read().unwrap_or_else(PoisonError::into_inner);
        Ok(docs.keys().cloned().collect())
    }
}
