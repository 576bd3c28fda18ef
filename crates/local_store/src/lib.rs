//! Local store - durable key-value persistence of JSON documents
//!
//! Every higher layer of the offline sync engine keeps its state here as a
//! handful of whole documents under fixed keys. Reads are defensive: a
//! document that cannot be decoded is treated as absent.

mod error;
mod file;
mod kv;
mod memory;

pub use error::*;
pub use file::FileStore;
pub use kv::{KeyValueStore, KeyValueStoreExt};
pub use memory::MemoryStore;
