//! Shared fixtures for the sync scenario tests

#![allow(dead_code)]

use offline_sync::{Identity, RemoteError, RemoteResult, RemoteStore};
use practice_model::{Poem, PoemId, Progress, Quote, QuoteId};
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Remote store with scripted failures and a call log.
///
/// Every call is recorded as `"<operation>:<id>"`. Ids listed with
/// [`fail_for`](Self::fail_for) always fail; [`set_down`](Self::set_down)
/// fails everything.
#[derive(Default)]
pub struct ScriptedRemote {
    down: AtomicBool,
    failing: Mutex<HashSet<String>>,
    log: Mutex<Vec<String>>,
    poems: Mutex<BTreeMap<PoemId, Poem>>,
    progress: Mutex<BTreeMap<PoemId, Progress>>,
    quotes: Mutex<BTreeMap<QuoteId, Quote>>,
}

impl ScriptedRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    pub fn fail_for(&self, id: &str) {
        self.failing.lock().unwrap().insert(id.to_string());
    }

    pub fn heal(&self, id: &str) {
        self.failing.lock().unwrap().remove(id);
    }

    pub fn calls(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    pub fn calls_to(&self, operation: &str) -> usize {
        let prefix = format!("{}:", operation);
        self.calls().iter().filter(|c| c.starts_with(&prefix)).count()
    }

    pub fn poem(&self, id: &PoemId) -> Option<Poem> {
        self.poems.lock().unwrap().get(id).cloned()
    }

    pub fn progress(&self, id: &PoemId) -> Option<Progress> {
        self.progress.lock().unwrap().get(id).cloned()
    }

    pub fn quote_count(&self) -> usize {
        self.quotes.lock().unwrap().len()
    }

    fn call(&self, operation: &str, id: &str) -> RemoteResult<()> {
        self.log.lock().unwrap().push(format!("{}:{}", operation, id));
        if self.down.load(Ordering::SeqCst) {
            return Err(RemoteError::Network("connection reset".to_string()));
        }
        if self.failing.lock().unwrap().contains(id) {
            return Err(RemoteError::Rejected(format!("{} refused", id)));
        }
        Ok(())
    }
}

impl RemoteStore for ScriptedRemote {
    async fn save_poem(&self, _identity: &Identity, poem: &Poem) -> RemoteResult<()> {
        self.call("save_poem", poem.id.as_str())?;
        self.poems.lock().unwrap().insert(poem.id.clone(), poem.clone());
        Ok(())
    }

    async fn remove_poem(&self, _identity: &Identity, poem_id: &PoemId) -> RemoteResult<()> {
        self.call("remove_poem", poem_id.as_str())?;
        self.poems.lock().unwrap().remove(poem_id);
        Ok(())
    }

    async fn save_progress(&self, poem_id: &PoemId, progress: &Progress) -> RemoteResult<()> {
        self.call("save_progress", poem_id.as_str())?;
        self.progress.lock().unwrap().insert(poem_id.clone(), progress.clone());
        Ok(())
    }

    async fn save_quote(&self, _identity: &Identity, quote: &Quote) -> RemoteResult<()> {
        self.call("save_quote", quote.id.as_str())?;
        self.quotes.lock().unwrap().insert(quote.id.clone(), quote.clone());
        Ok(())
    }

    async fn delete_quote(&self, _identity: &Identity, quote_id: &QuoteId) -> RemoteResult<()> {
        self.call("delete_quote", quote_id.as_str())?;
        self.quotes.lock().unwrap().remove(quote_id);
        Ok(())
    }
}
