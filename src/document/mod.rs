//! Document model for the routing core
//!
//! A record lives in the host key-value store and is addressed by its
//! external key. The routing core never owns record bodies; it sees them
//! as a flat map of field name to JSON value, loaded on demand through
//! the `FieldLoader` seam in `crate::index`.

use std::collections::BTreeMap;

use serde_json::Value;

/// Default relevance score assigned when a rule names no score field or
/// the named field is absent/mistyped.
pub const DEFAULT_SCORE: f64 = 1.0;

/// Default language used when a rule names no language field.
pub const DEFAULT_LANGUAGE: &str = "english";

/// Field name → value map for one loaded record.
///
/// BTreeMap so iteration (and test assertions) are deterministic.
pub type DocumentFields = BTreeMap<String, Value>;

/// A record key as delivered by the host store's notification mechanism.
///
/// Keys are UTF-8 in practice but matched byte-wise; prefix matching in
/// `crate::prefix` operates on `as_bytes()`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordKey(String);

impl RecordKey {
    pub fn new(key: impl Into<String>) -> Self {
        RecordKey(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl From<&str> for RecordKey {
    fn from(s: &str) -> Self {
        RecordKey(s.to_string())
    }
}

impl From<String> for RecordKey {
    fn from(s: String) -> Self {
        RecordKey(s)
    }
}

impl std::fmt::Display for RecordKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Per-index attributes extracted from a record when a rule matched it.
///
/// Produced fresh for every notification, consumed by the indexing path
/// and recorded in the document identity table. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexAttrs {
    /// Relevance score, default 1.0.
    pub score: f64,
    /// Language tag, default `DEFAULT_LANGUAGE`.
    pub language: String,
    /// Optional opaque payload stored alongside the document metadata.
    pub payload: Option<Vec<u8>>,
}

impl Default for IndexAttrs {
    fn default() -> Self {
        IndexAttrs {
            score: DEFAULT_SCORE,
            language: DEFAULT_LANGUAGE.to_string(),
            payload: None,
        }
    }
}

/// A loaded record ready to be handed to the downstream indexer: the key
/// plus its field values under the index's current schema.
#[derive(Debug, Clone)]
pub struct LoadedDocument {
    pub key: RecordKey,
    pub fields: DocumentFields,
}

impl LoadedDocument {
    pub fn new(key: RecordKey, fields: DocumentFields) -> Self {
        LoadedDocument { key, fields }
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}
