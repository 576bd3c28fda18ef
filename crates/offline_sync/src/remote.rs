//! Collaborators the engine talks to: identity resolution and the remote store.
//!
//! Both are traits so a session can be wired to a real backend, to the
//! store-backed remote below, or to the null implementations
//! ([`NoIdentity`], [`OfflineRemote`]) when a capability is missing.

use crate::error::{RemoteError, RemoteResult};
use local_store::{KeyValueStore, KeyValueStoreExt};
use practice_model::{Poem, PoemId, Progress, Quote, QuoteId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

/// The signed-in user a remote write is attributed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl Identity {
    /// Create an identity for a user id
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: None,
        }
    }
}

/// Resolves the currently authenticated user.
///
/// `None` means nobody is signed in; the session then stays local-only.
#[trait_variant::make(Send)]
pub trait IdentityResolver: Send + Sync {
    async fn resolve_current_identity(&self) -> Option<Identity>;
}

/// The remote backend, one operation per queued action.
#[trait_variant::make(Send)]
pub trait RemoteStore: Send + Sync {
    async fn save_poem(&self, identity: &Identity, poem: &Poem) -> RemoteResult<()>;

    async fn remove_poem(&self, identity: &Identity, poem_id: &PoemId) -> RemoteResult<()>;

    async fn save_progress(&self, poem_id: &PoemId, progress: &Progress) -> RemoteResult<()>;

    async fn save_quote(&self, identity: &Identity, quote: &Quote) -> RemoteResult<()>;

    async fn delete_quote(&self, identity: &Identity, quote_id: &QuoteId) -> RemoteResult<()>;
}

impl<T: RemoteStore> RemoteStore for Arc<T> {
    async fn save_poem(&self, identity: &Identity, poem: &Poem) -> RemoteResult<()> {
        (**self).save_poem(identity, poem).await
    }

    async fn remove_poem(&self, identity: &Identity, poem_id: &PoemId) -> RemoteResult<()> {
        (**self).remove_poem(identity, poem_id).await
    }

    async fn save_progress(&self, poem_id: &PoemId, progress: &Progress) -> RemoteResult<()> {
        (**self).save_progress(poem_id, progress).await
    }

    async fn save_quote(&self, identity: &Identity, quote: &Quote) -> RemoteResult<()> {
        (**self).save_quote(identity, quote).await
    }

    async fn delete_quote(&self, identity: &Identity, quote_id: &QuoteId) -> RemoteResult<()> {
        (**self).delete_quote(identity, quote_id).await
    }
}

/// Identity resolver for sessions without authentication.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoIdentity;

impl IdentityResolver for NoIdentity {
    async fn resolve_current_identity(&self) -> Option<Identity> {
        None
    }
}

/// Identity resolver holding a fixed identity that can be swapped on
/// sign-in and sign-out.
#[derive(Debug, Default)]
pub struct StaticIdentity {
    current: RwLock<Option<Identity>>,
}

impl StaticIdentity {
    /// Resolver that is signed in as `identity`
    pub fn signed_in(identity: Identity) -> Self {
        Self {
            current: RwLock::new(Some(identity)),
        }
    }

    /// Resolver nobody is signed in to
    pub fn signed_out() -> Self {
        Self::default()
    }

    /// Replace the current identity
    pub fn set(&self, identity: Option<Identity>) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = identity;
    }
}

impl IdentityResolver for StaticIdentity {
    async fn resolve_current_identity(&self) -> Option<Identity> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Remote store for sessions without a backend: every call fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineRemote;

impl RemoteStore for OfflineRemote {
    async fn save_poem(&self, _identity: &Identity, _poem: &Poem) -> RemoteResult<()> {
        Err(RemoteError::Unavailable)
    }

    async fn remove_poem(&self, _identity: &Identity, _poem_id: &PoemId) -> RemoteResult<()> {
        Err(RemoteError::Unavailable)
    }

    async fn save_progress(&self, _poem_id: &PoemId, _progress: &Progress) -> RemoteResult<()> {
        Err(RemoteError::Unavailable)
    }

    async fn save_quote(&self, _identity: &Identity, _quote: &Quote) -> RemoteResult<()> {
        Err(RemoteError::Unavailable)
    }

    async fn delete_quote(&self, _identity: &Identity, _quote_id: &QuoteId) -> RemoteResult<()> {
        Err(RemoteError::Unavailable)
    }
}

const PROGRESS_KEY: &str = "remote_progress";

/// Remote store kept in another [`KeyValueStore`].
///
/// Poems and quotes are partitioned per user; progress is keyed by poem
/// only, matching the backend's progress table. Backed by a `FileStore`
/// this serves as a shared directory backend; backed by a `MemoryStore` it
/// is an in-process backend for tests. Availability can be toggled to
/// simulate an outage.
#[derive(Debug)]
pub struct StoreRemote<S> {
    store: S,
    available: AtomicBool,
    calls: AtomicUsize,
    write_lock: Mutex<()>,
}

impl<S: KeyValueStore> StoreRemote<S> {
    /// Create a remote over `store`
    pub fn new(store: S) -> Self {
        Self {
            store,
            available: AtomicBool::new(true),
            calls: AtomicUsize::new(0),
            write_lock: Mutex::new(()),
        }
    }

    /// Make every subsequent call succeed or fail with `Unavailable`
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of calls received, failed ones included
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Poems stored for a user
    pub fn poems(&self, user_id: &str) -> BTreeMap<PoemId, Poem> {
        match Self::user_key("poems", user_id) {
            Ok(key) => self.store.get_or_default(&key),
            Err(_) => BTreeMap::new(),
        }
    }

    /// Quotes stored for a user
    pub fn quotes(&self, user_id: &str) -> BTreeMap<QuoteId, Quote> {
        match Self::user_key("quotes", user_id) {
            Ok(key) => self.store.get_or_default(&key),
            Err(_) => BTreeMap::new(),
        }
    }

    /// Progress stored for a poem
    pub fn progress(&self, poem_id: &PoemId) -> Option<Progress> {
        let all: BTreeMap<PoemId, Progress> = self.store.get_or_default(PROGRESS_KEY);
        all.get(poem_id).cloned()
    }

    fn begin_call(&self) -> RemoteResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(RemoteError::Unavailable)
        }
    }

    fn user_key(collection: &str, user_id: &str) -> RemoteResult<String> {
        let valid = !user_id.is_empty()
            && user_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-'));
        if valid {
            Ok(format!("{}_{}", collection, user_id))
        } else {
            Err(RemoteError::Rejected(format!("invalid user id {:?}", user_id)))
        }
    }

    /// Read-modify-write one collection document
    fn update<T, F>(&self, key: &str, apply: F) -> RemoteResult<()>
    where
        T: serde::de::DeserializeOwned + Serialize + Default,
        F: FnOnce(&mut T),
    {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut collection: T = self.store.get_or_default(key);
        apply(&mut collection);
        self.store
            .set(key, &collection)
            .map_err(|e| RemoteError::Network(e.to_string()))
    }
}

impl<S: KeyValueStore> RemoteStore for StoreRemote<S> {
    async fn save_poem(&self, identity: &Identity, poem: &Poem) -> RemoteResult<()> {
        self.begin_call()?;
        let key = Self::user_key("poems", &identity.user_id)?;
        self.update(&key, |poems: &mut BTreeMap<PoemId, Poem>| {
            poems.insert(poem.id.clone(), poem.clone());
        })
    }

    async fn remove_poem(&self, identity: &Identity, poem_id: &PoemId) -> RemoteResult<()> {
        self.begin_call()?;
        let key = Self::user_key("poems", &identity.user_id)?;
        self.update(&key, |poems: &mut BTreeMap<PoemId, Poem>| {
            poems.remove(poem_id);
        })?;
        self.update(PROGRESS_KEY, |progress: &mut BTreeMap<PoemId, Progress>| {
            progress.remove(poem_id);
        })
    }

    async fn save_progress(&self, poem_id: &PoemId, progress: &Progress) -> RemoteResult<()> {
        self.begin_call()?;
        self.update(PROGRESS_KEY, |all: &mut BTreeMap<PoemId, Progress>| {
            all.insert(poem_id.clone(), progress.clone());
        })
    }

    async fn save_quote(&self, identity: &Identity, quote: &Quote) -> RemoteResult<()> {
        self.begin_call()?;
        let key = Self::user_key("quotes", &identity.user_id)?;
        self.update(&key, |quotes: &mut BTreeMap<QuoteId, Quote>| {
            quotes.insert(quote.id.clone(), quote.clone());
        })
    }

    async fn delete_quote(&self, identity: &Identity, quote_id: &QuoteId) -> RemoteResult<()> {
        self.begin_call()?;
        let key = Self::user_key("quotes", &identity.user_id)?;
        self.update(&key, |quotes: &mut BTreeMap<QuoteId, Quote>| {
            quotes.remove(quote_id);
        })
    }
}
