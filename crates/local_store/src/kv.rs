//! Key-value storage abstraction.
//!
//! `KeyValueStore` is the raw contract a backend implements: whole JSON
//! documents addressed by a fixed key. `KeyValueStoreExt` layers typed
//! access on top, and its reads never fail: anything that cannot be read or
//! decoded is reported as absent so that a corrupted document degrades to
//! an empty default instead of breaking the caller.

use crate::StoreResult;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Trait for key-value storage backends
///
/// Methods take `&self`; implementations use interior locking so a single
/// store can be shared behind an `Arc` by every component of a session.
/// Each call is synchronous and replaces or reads a whole document.
pub trait KeyValueStore: Send + Sync {
    /// Read the raw document stored under `key`
    fn get_raw(&self, key: &str) -> StoreResult<Option<String>>;

    /// Replace the document stored under `key`
    fn set_raw(&self, key: &str, value: String) -> StoreResult<()>;

    /// Delete the document stored under `key`. Missing keys are not an error.
    fn remove(&self, key: &str) -> StoreResult<()>;

    /// List all keys that currently hold a document
    fn keys(&self) -> StoreResult<Vec<String>>;

    /// Check whether a document exists under `key`
    fn contains(&self, key: &str) -> StoreResult<bool> {
        Ok(self.get_raw(key)?.is_some())
    }
}

/// Typed, defensive access to any [`KeyValueStore`].
pub trait KeyValueStoreExt: KeyValueStore {
    /// Read and decode the value under `key`.
    ///
    /// Read failures and malformed content are logged and yield `None`.
    fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.get_raw(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!("Failed to read {}, treating as empty: {}", key, e);
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("Malformed content under {}, treating as empty: {}", key, e);
                None
            }
        }
    }

    /// Read the value under `key`, or its default when absent or unreadable
    fn get_or_default<T: DeserializeOwned + Default>(&self, key: &str) -> T {
        self.get(key).unwrap_or_default()
    }

    /// Encode and store `value` under `key`
    fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> StoreResult<()> {
        let json = serde_json::to_string(value)?;
        self.set_raw(key, json)
    }
}

impl<S: KeyValueStore + ?Sized> KeyValueStoreExt for S {}

/// Keys end up as file names, so they are restricted to a safe alphabet.
pub(crate) fn validate_key(key: &str) -> StoreResult<()> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
        && !key.starts_with('.');

    if valid {
        Ok(())
    } else {
        Err(crate::StoreError::InvalidKey(key.to_string()))
    }
}
