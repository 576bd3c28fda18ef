//! Queued mutation kinds and their replay against the remote store.

use crate::error::RemoteResult;
use crate::remote::{Identity, RemoteStore};
use practice_model::{Poem, PoemId, Progress, Quote, QuoteId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Action tag of a queued mutation.
///
/// Persisted as a string. Tags this build does not know are kept verbatim
/// in [`SyncAction::Unrecognized`] so that a record written by a newer
/// client survives a load/store cycle unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SyncAction {
    SavePoem,
    RemovePoem,
    SaveProgress,
    SaveQuote,
    DeleteQuote,
    Unrecognized(String),
}

impl SyncAction {
    pub fn as_str(&self) -> &str {
        match self {
            SyncAction::SavePoem => "savePoem",
            SyncAction::RemovePoem => "removePoem",
            SyncAction::SaveProgress => "saveProgress",
            SyncAction::SaveQuote => "saveQuote",
            SyncAction::DeleteQuote => "deleteQuote",
            SyncAction::Unrecognized(tag) => tag,
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, SyncAction::Unrecognized(_))
    }
}

impl From<String> for SyncAction {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "savePoem" => SyncAction::SavePoem,
            "removePoem" => SyncAction::RemovePoem,
            "saveProgress" => SyncAction::SaveProgress,
            "saveQuote" => SyncAction::SaveQuote,
            "deleteQuote" => SyncAction::DeleteQuote,
            _ => SyncAction::Unrecognized(tag),
        }
    }
}

impl From<SyncAction> for String {
    fn from(action: SyncAction) -> Self {
        match action {
            SyncAction::Unrecognized(tag) => tag,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for SyncAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PoemRef {
    poem_id: PoemId,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProgressUpdate {
    poem_id: PoemId,
    progress: Progress,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteRef {
    quote_id: QuoteId,
}

/// A typed mutation destined for the remote store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    SavePoem(Poem),
    RemovePoem(PoemId),
    SaveProgress { poem_id: PoemId, progress: Progress },
    SaveQuote(Quote),
    DeleteQuote(QuoteId),
}

impl Mutation {
    pub fn action(&self) -> SyncAction {
        match self {
            Mutation::SavePoem(_) => SyncAction::SavePoem,
            Mutation::RemovePoem(_) => SyncAction::RemovePoem,
            Mutation::SaveProgress { .. } => SyncAction::SaveProgress,
            Mutation::SaveQuote(_) => SyncAction::SaveQuote,
            Mutation::DeleteQuote(_) => SyncAction::DeleteQuote,
        }
    }

    /// Encode the action-specific payload stored in the queue
    pub fn to_payload(&self) -> serde_json::Result<Value> {
        match self {
            Mutation::SavePoem(poem) => serde_json::to_value(poem),
            Mutation::RemovePoem(poem_id) => serde_json::to_value(PoemRef {
                poem_id: poem_id.clone(),
            }),
            Mutation::SaveProgress { poem_id, progress } => serde_json::to_value(ProgressUpdate {
                poem_id: poem_id.clone(),
                progress: progress.clone(),
            }),
            Mutation::SaveQuote(quote) => serde_json::to_value(quote),
            Mutation::DeleteQuote(quote_id) => serde_json::to_value(QuoteRef {
                quote_id: quote_id.clone(),
            }),
        }
    }

    /// Decode a queued payload.
    ///
    /// Returns `Ok(None)` for an unrecognized action and an error when the
    /// payload does not have the shape its action requires.
    pub fn decode(action: &SyncAction, payload: &Value) -> serde_json::Result<Option<Self>> {
        let payload = payload.clone();
        let mutation = match action {
            SyncAction::SavePoem => Mutation::SavePoem(serde_json::from_value(payload)?),
            SyncAction::RemovePoem => {
                let r: PoemRef = serde_json::from_value(payload)?;
                Mutation::RemovePoem(r.poem_id)
            }
            SyncAction::SaveProgress => {
                let u: ProgressUpdate = serde_json::from_value(payload)?;
                Mutation::SaveProgress {
                    poem_id: u.poem_id,
                    progress: u.progress,
                }
            }
            SyncAction::SaveQuote => Mutation::SaveQuote(serde_json::from_value(payload)?),
            SyncAction::DeleteQuote => {
                let r: QuoteRef = serde_json::from_value(payload)?;
                Mutation::DeleteQuote(r.quote_id)
            }
            SyncAction::Unrecognized(_) => return Ok(None),
        };
        Ok(Some(mutation))
    }

    /// Apply this mutation to the remote store
    pub async fn push<R: RemoteStore>(&self, remote: &R, identity: &Identity) -> RemoteResult<()> {
        match self {
            Mutation::SavePoem(poem) => remote.save_poem(identity, poem).await,
            Mutation::RemovePoem(poem_id) => remote.remove_poem(identity, poem_id).await,
            Mutation::SaveProgress { poem_id, progress } => {
                remote.save_progress(poem_id, progress).await
            }
            Mutation::SaveQuote(quote) => remote.save_quote(identity, quote).await,
            Mutation::DeleteQuote(quote_id) => remote.delete_quote(identity, quote_id).await,
        }
    }
}
