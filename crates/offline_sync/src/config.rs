//! Sync engine configuration

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Configuration for a [`SyncSession`](crate::SyncSession).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Failed replays after which a queued item is dropped
    pub max_retries: u32,
    /// Delay before the first reconciliation after startup (milliseconds)
    pub startup_grace_ms: u64,
    /// Store key of the sync queue
    pub queue_key: String,
    /// Store key of the progress mirror
    pub mirror_key: String,
    /// Store key of the last sync timestamp
    pub last_sync_key: String,
    /// Buffered notices per subscriber before the oldest are dropped
    pub notice_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            startup_grace_ms: 2000,
            queue_key: "sync_queue".to_string(),
            mirror_key: "progress_mirror".to_string(),
            last_sync_key: "last_sync".to_string(),
            notice_capacity: 16,
        }
    }
}

impl SyncConfig {
    /// Set the retry ceiling
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the startup grace period
    pub fn with_startup_grace(mut self, grace: Duration) -> Self {
        self.startup_grace_ms = grace.as_millis() as u64;
        self
    }

    /// Prefix every store key, for several sessions sharing one store
    pub fn with_key_prefix(mut self, prefix: &str) -> Self {
        self.queue_key = format!("{}{}", prefix, self.queue_key);
        self.mirror_key = format!("{}{}", prefix, self.mirror_key);
        self.last_sync_key = format!("{}{}", prefix, self.last_sync_key);
        self
    }

    /// Startup grace period as a duration
    pub fn startup_grace(&self) -> Duration {
        Duration::from_millis(self.startup_grace_ms)
    }

    /// Load configuration from a JSON file.
    ///
    /// A missing file yields the defaults; an unreadable or malformed one
    /// is logged and also yields the defaults.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!("Failed to read sync config {:?}, using defaults: {}", path, e);
                return Self::default();
            }
        };

        match serde_json::from_str::<SyncConfig>(&content) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Failed to parse sync config, using defaults: {}", e);
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.startup_grace(), Duration::from_secs(2));
        assert_eq!(config.queue_key, "sync_queue");
        assert_eq!(config.mirror_key, "progress_mirror");
        assert_eq!(config.last_sync_key, "last_sync");
    }

    #[test]
    fn test_builders() {
        let config = SyncConfig::default()
            .with_max_retries(5)
            .with_startup_grace(Duration::from_millis(10))
            .with_key_prefix("alice_");

        assert_eq!(config.max_retries, 5);
        assert_eq!(config.startup_grace_ms, 10);
        assert_eq!(config.queue_key, "alice_sync_queue");
        assert_eq!(config.last_sync_key, "alice_last_sync");
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("sync.json");
        std::fs::write(&path, r#"{"max_retries": 7}"#).unwrap();

        let config = SyncConfig::load_or_default(&path);
        assert_eq!(config.max_retries, 7);
        assert_eq!(config.startup_grace_ms, 2000);
    }

    #[test]
    fn test_missing_or_malformed_file_is_default() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("sync.json");
        assert_eq!(SyncConfig::load_or_default(&path), SyncConfig::default());

        std::fs::write(&path, "max_retries = 7").unwrap();
        assert_eq!(SyncConfig::load_or_default(&path), SyncConfig::default());
    }
}
