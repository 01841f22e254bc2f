//! Document Identity Table
//!
//! Per-index mapping between external record keys and stable internal
//! document ids, plus the metadata (score, flags, payload) addressed by
//! those ids.
//!
//! # Invariants
//!
//! - An external key maps to at most one live id at a time.
//! - Ids are monotonic and never reused within a table's lifetime, even
//!   across deletes. Re-adding a deleted key allocates a fresh id.
//! - Id 0 is a reserved sentinel meaning "not found"; the public API
//!   exposes `Option<DocId>` instead.
//! - Deleting a key tombstones its metadata slot without renumbering
//!   other entries.

use std::collections::HashMap;

use crate::document::{IndexAttrs, RecordKey};

/// Internal document id. Dense, starting at 1; 0 is reserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocId(pub u64);

impl DocId {
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// Metadata stored per live document id.
#[derive(Debug, Clone, PartialEq)]
pub struct DocMetadata {
    /// External key, kept for reverse lookup.
    pub key: String,
    /// Relevance score recorded at index time.
    pub score: f64,
    /// Document flags (host-defined bits).
    pub flags: u8,
    /// Optional opaque payload.
    pub payload: Option<Vec<u8>>,
}

/// Per-index identity table.
///
/// Growth doubles the metadata vector's capacity; ids are direct slot
/// indices offset by the reserved sentinel.
#[derive(Debug)]
pub struct DocTable {
    /// key → id for live entries only.
    ids: HashMap<String, DocId>,
    /// Slot `id - 1` holds the metadata for `id`; `None` is a tombstone.
    docs: Vec<Option<DocMetadata>>,
    /// Highest id ever allocated. Monotonic, never rewound.
    max_doc_id: u64,
}

impl DocTable {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(cap: usize) -> Self {
        DocTable {
            ids: HashMap::with_capacity(cap),
            docs: Vec::with_capacity(cap),
            max_doc_id: 0,
        }
    }

    /// Number of live (non-tombstoned) entries.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Highest id ever allocated, 0 if none.
    pub fn max_doc_id(&self) -> u64 {
        self.max_doc_id
    }

    /// Returns the id for `key`, allocating a new one only if the key is
    /// unseen. Idempotent: repeated calls with the same live key return
    /// the same id, with metadata refreshed from `attrs` on every call
    /// (re-indexing the same key overwrites its prior attributes).
    pub fn get_or_assign(&mut self, key: &RecordKey, attrs: &IndexAttrs) -> DocId {
        if let Some(&id) = self.ids.get(key.as_str()) {
            let slot = (id.0 - 1) as usize;
            self.docs[slot] = Some(Self::metadata_for(key, attrs));
            return id;
        }

        self.max_doc_id += 1;
        let id = DocId(self.max_doc_id);
        if self.docs.len() == self.docs.capacity() {
            // Doubling growth; Vec::reserve already amortizes, this keeps
            // the doubling explicit for the zero-capacity start.
            let grow = self.docs.capacity().max(1);
            self.docs.reserve(grow);
        }
        self.docs.push(Some(Self::metadata_for(key, attrs)));
        debug_assert_eq!(self.docs.len() as u64, self.max_doc_id);
        self.ids.insert(key.as_str().to_string(), id);
        id
    }

    /// Id for `key` if the key is live.
    pub fn get_id(&self, key: &RecordKey) -> Option<DocId> {
        self.ids.get(key.as_str()).copied()
    }

    /// Metadata for `id`, or `None` if the id was never allocated or its
    /// entry was deleted.
    pub fn lookup(&self, id: DocId) -> Option<&DocMetadata> {
        if id.0 == 0 || id.0 > self.max_doc_id {
            return None;
        }
        self.docs[(id.0 - 1) as usize].as_ref()
    }

    /// External key for `id`, if live.
    pub fn key_for(&self, id: DocId) -> Option<&str> {
        self.lookup(id).map(|m| m.key.as_str())
    }

    /// Score for `id`; 0.0 if the id is not in the table.
    pub fn score_for(&self, id: DocId) -> f64 {
        self.lookup(id).map(|m| m.score).unwrap_or(0.0)
    }

    /// Payload for `id`, if one was set.
    pub fn payload_for(&self, id: DocId) -> Option<&[u8]> {
        self.lookup(id).and_then(|m| m.payload.as_deref())
    }

    /// Tombstones `key`'s entry. Returns false if the key was not live.
    /// The freed slot is never reallocated; the id is retired for good.
    pub fn remove(&mut self, key: &RecordKey) -> bool {
        match self.ids.remove(key.as_str()) {
            Some(id) => {
                self.docs[(id.0 - 1) as usize] = None;
                true
            }
            None => false,
        }
    }

    /// Iterates live entries in id order.
    pub fn iter(&self) -> impl Iterator<Item = (DocId, &DocMetadata)> {
        self.docs.iter().enumerate().filter_map(|(slot, meta)| {
            meta.as_ref().map(|m| (DocId(slot as u64 + 1), m))
        })
    }

    fn metadata_for(key: &RecordKey, attrs: &IndexAttrs) -> DocMetadata {
        DocMetadata {
            key: key.as_str().to_string(),
            score: attrs.score,
            flags: 0,
            payload: attrs.payload.clone(),
        }
    }
}

impl Default for DocTable {
    fn default() -> Self {
        Self::new()
    }
}
