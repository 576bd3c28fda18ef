//! Integration tests for the key-value backends
//!
//! Both backends must behave identically through the trait, including the
//! defensive decode of malformed documents.

use local_store::{FileStore, KeyValueStore, KeyValueStoreExt, MemoryStore};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tempfile::TempDir;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Entry {
    id: String,
    retry_count: u32,
}

fn exercise(store: Arc<dyn KeyValueStore>) {
    assert!(store.get::<Vec<Entry>>("sync_queue").is_none());

    let entries = vec![
        Entry { id: "a".into(), retry_count: 0 },
        Entry { id: "b".into(), retry_count: 2 },
    ];
    store.set("sync_queue", &entries).unwrap();
    assert_eq!(store.get_or_default::<Vec<Entry>>("sync_queue"), entries);

    let mut mirror = BTreeMap::new();
    mirror.insert("poem-1".to_string(), 2u32);
    store.set("progress_mirror", &mirror).unwrap();

    assert_eq!(store.keys().unwrap(), vec!["progress_mirror", "sync_queue"]);

    store.set_raw("sync_queue", "[{\"id\": 5}]".to_string()).unwrap();
    assert!(store.get_or_default::<Vec<Entry>>("sync_queue").is_empty());

    let mirror_back: BTreeMap<String, u32> = store.get_or_default("progress_mirror");
    assert_eq!(mirror_back, mirror);

    store.remove("sync_queue").unwrap();
    assert!(!store.contains("sync_queue").unwrap());
}

#[test]
fn test_memory_backend_contract() {
    exercise(Arc::new(MemoryStore::new()));
}

#[test]
fn test_file_backend_contract() {
    let temp_dir = TempDir::new().unwrap();
    exercise(Arc::new(FileStore::open(temp_dir.path()).unwrap()));
}
