//! Index handles and collaborator seams
//!
//! The routing core does not build postings. It resolves which indexes a
//! mutated record belongs to, maintains each index's document identity
//! table, and hands the loaded record to the downstream engine through
//! `DocumentIndexer`. Record bodies come from the host store through
//! `FieldLoader`.
//!
//! Ownership: a `SearchIndex` exclusively owns its `DocTable`. The rule
//! registry and prefix index refer to indexes by name only.

mod errors;

pub use errors::{IndexError, IndexResult, LoadError, LoadResult};

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use crate::doctable::DocTable;
use crate::document::{DocumentFields, IndexAttrs, LoadedDocument, RecordKey};

/// Whether a write notification indexes inline or through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexingMode {
    Sync,
    Async,
}

/// Loads record field values from the host store.
pub trait FieldLoader: Send + Sync {
    /// Field values for `key` under the current schema.
    fn load_fields(&self, key: &RecordKey) -> LoadResult<DocumentFields>;

    /// True if the record currently exists. Async workers call this
    /// immediately before committing a doc-table entry so a job for a
    /// key deleted after enqueue cannot resurrect it.
    fn exists(&self, key: &RecordKey) -> bool;
}

/// Builds and commits postings for one document. Must be idempotent per
/// (index, key): re-indexing with fresher field values overwrites prior
/// postings, which is what makes duplicate pending jobs harmless.
pub trait DocumentIndexer: Send + Sync {
    fn index_document(
        &self,
        index: &str,
        document: &LoadedDocument,
        attrs: &IndexAttrs,
    ) -> IndexResult<()>;
}

/// One rule-governed index as seen by the routing core.
#[derive(Debug)]
pub struct SearchIndex {
    name: String,
    mode: IndexingMode,
    docs: Mutex<DocTable>,
    /// Set on teardown; pending pipeline jobs observe it at dequeue and
    /// discard themselves.
    torn_down: AtomicBool,
}

impl SearchIndex {
    pub fn new(name: impl Into<String>, mode: IndexingMode) -> Self {
        SearchIndex {
            name: name.into(),
            mode,
            docs: Mutex::new(DocTable::new()),
            torn_down: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mode(&self) -> IndexingMode {
        self.mode
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::Acquire)
    }

    pub(crate) fn mark_torn_down(&self) {
        self.torn_down.store(true, Ordering::Release);
    }

    /// Serialized access to the identity table. Per-index lock; tables
    /// of different indexes never contend.
    pub fn docs(&self) -> MutexGuard<'_, DocTable> {
        self.docs.lock().expect("doc table lock poisoned")
    }
}

/// Name → index map shared by the dispatcher and the pipeline workers.
#[derive(Debug, Default)]
pub struct IndexRegistry {
    indexes: RwLock<HashMap<String, Arc<SearchIndex>>>,
}

impl IndexRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `index`, replacing any previous index of the same name.
    pub fn register(&self, index: Arc<SearchIndex>) {
        let mut map = self.indexes.write().expect("index registry poisoned");
        map.insert(index.name().to_string(), index);
    }

    /// Removes and tears down the named index. Its doc table goes with
    /// it; pending async jobs for it become no-ops.
    pub fn unregister(&self, name: &str) -> Option<Arc<SearchIndex>> {
        let mut map = self.indexes.write().expect("index registry poisoned");
        let index = map.remove(name)?;
        index.mark_torn_down();
        Some(index)
    }

    pub fn get(&self, name: &str) -> Option<Arc<SearchIndex>> {
        let map = self.indexes.read().expect("index registry poisoned");
        map.get(name).cloned()
    }

    /// Snapshot of all registered indexes, name-sorted for determinism.
    pub fn all(&self) -> Vec<Arc<SearchIndex>> {
        let map = self.indexes.read().expect("index registry poisoned");
        let mut indexes: Vec<_> = map.values().cloned().collect();
        indexes.sort_by(|a, b| a.name().cmp(b.name()));
        indexes
    }

    pub fn len(&self) -> usize {
        self.indexes.read().expect("index registry poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unregister_marks_torn_down() {
        let registry = IndexRegistry::new();
        let idx = Arc::new(SearchIndex::new("idx1", IndexingMode::Sync));
        registry.register(idx.clone());

        assert!(!idx.is_torn_down());
        registry.unregister("idx1");
        assert!(idx.is_torn_down());
        assert!(registry.get("idx1").is_none());
    }

    #[test]
    fn test_register_replaces_same_name() {
        let registry = IndexRegistry::new();
        registry.register(Arc::new(SearchIndex::new("idx", IndexingMode::Sync)));
        registry.register(Arc::new(SearchIndex::new("idx", IndexingMode::Async)));

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("idx").unwrap().mode(), IndexingMode::Async);
    }
}
