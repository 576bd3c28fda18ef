//! Identifiers for poems and quotes

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a poem in the user's collection.
///
/// Poem ids are opaque strings. Fresh ids use UUID v4, but ids minted by
/// the backend or by older clients are accepted as-is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PoemId(String);

impl PoemId {
    /// Create a new random PoemId
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Get the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for PoemId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PoemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PoemId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for PoemId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Identifier of a saved quote.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuoteId(String);

impl QuoteId {
    /// Create a new random QuoteId
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Get the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for QuoteId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for QuoteId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for QuoteId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for QuoteId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_ids_are_unique() {
        assert_ne!(PoemId::new(), PoemId::new());
        assert_ne!(QuoteId::new(), QuoteId::new());
    }

    #[test]
    fn test_poem_id_serializes_as_plain_string() {
        let id = PoemId::from("poem-1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"poem-1\"");
        assert_eq!(id.to_string(), "poem-1");
    }

    #[test]
    fn test_poem_id_usable_as_map_key() {
        let mut map = std::collections::BTreeMap::new();
        map.insert(PoemId::from("b"), 2);
        map.insert(PoemId::from("a"), 1);

        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"a":1,"b":2}"#);
    }
}
