//! Poems and quotes in the user's collection

use crate::{PoemId, Progress, QuoteId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A poem the user is memorizing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Poem {
    pub id: PoemId,
    pub title: String,
    pub author: String,
    pub text: String,
    pub added_at: DateTime<Utc>,
    /// Practice progress carried with the poem
    #[serde(default)]
    pub progress: Progress,
}

impl Poem {
    /// Create a new poem with fresh progress
    pub fn new(
        title: impl Into<String>,
        author: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            id: PoemId::new(),
            title: title.into(),
            author: author.into(),
            text: text.into(),
            added_at: Utc::now(),
            progress: Progress::new(),
        }
    }

    /// Use an existing id
    pub fn with_id(mut self, id: impl Into<PoemId>) -> Self {
        self.id = id.into();
        self
    }

    /// Attach progress
    pub fn with_progress(mut self, progress: Progress) -> Self {
        self.progress = progress;
        self
    }

    /// Number of non-empty lines
    pub fn line_count(&self) -> usize {
        self.text.lines().filter(|l| !l.trim().is_empty()).count()
    }
}

/// A quote the user saved, optionally taken from one of their poems.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub id: QuoteId,
    pub text: String,
    pub author: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poem_id: Option<PoemId>,
    pub saved_at: DateTime<Utc>,
}

impl Quote {
    /// Create a new free-standing quote
    pub fn new(text: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            id: QuoteId::new(),
            text: text.into(),
            author: author.into(),
            poem_id: None,
            saved_at: Utc::now(),
        }
    }

    /// Link the quote to the poem it came from
    pub fn from_poem(mut self, poem_id: PoemId) -> Self {
        self.poem_id = Some(poem_id);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poem_defaults_to_fresh_progress() {
        let poem = Poem::new("Ozymandias", "Percy Bysshe Shelley", "I met a traveller\n\nfrom an antique land");
        assert_eq!(poem.progress, Progress::new());
        assert_eq!(poem.line_count(), 2);
    }

    #[test]
    fn test_poem_missing_progress_field_decodes() {
        let json = r#"{
            "id": "poem-1",
            "title": "Fog",
            "author": "Carl Sandburg",
            "text": "The fog comes on little cat feet.",
            "addedAt": "2024-03-01T10:00:00Z"
        }"#;
        let poem: Poem = serde_json::from_str(json).unwrap();
        assert_eq!(poem.id, PoemId::from("poem-1"));
        assert_eq!(poem.progress.stage, 0);
    }

    #[test]
    fn test_quote_omits_missing_poem_link() {
        let quote = Quote::new("Hope is the thing with feathers", "Emily Dickinson");
        let value = serde_json::to_value(&quote).unwrap();
        assert!(value.get("poemId").is_none());

        let linked = quote.from_poem(PoemId::from("poem-7"));
        let value = serde_json::to_value(&linked).unwrap();
        assert_eq!(value["poemId"], "poem-7");
    }
}
