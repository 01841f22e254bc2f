//! Rule matching and dispatch invariants
//!
//! End-to-end through `RoutingEngine` with an in-memory host store and
//! a recording downstream indexer:
//! - prefix + filter matching, per-index dedup, defaults
//! - delete path removes identity entries index-wide
//! - load/index failures never corrupt the engine
//! - NOREINDEX skips keys that already hold an id

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::{json, Value};

use siftdb::config::EngineConfig;
use siftdb::document::{DocumentFields, IndexAttrs, LoadedDocument, RecordKey};
use siftdb::index::{DocumentIndexer, FieldLoader, IndexError, IndexResult, IndexingMode, LoadError, LoadResult};
use siftdb::{ProcessOptions, RoutingEngine};

// =============================================================================
// Helpers
// =============================================================================

/// In-memory stand-in for the host key-value store.
#[derive(Default)]
struct MemoryStore {
    records: Mutex<HashMap<String, DocumentFields>>,
}

impl MemoryStore {
    fn put(&self, key: &str, fields: &[(&str, Value)]) {
        let fields: DocumentFields = fields
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        self.records.lock().unwrap().insert(key.to_string(), fields);
    }

    fn delete(&self, key: &str) {
        self.records.lock().unwrap().remove(key);
    }
}

impl FieldLoader for MemoryStore {
    fn load_fields(&self, key: &RecordKey) -> LoadResult<DocumentFields> {
        self.records
            .lock()
            .unwrap()
            .get(key.as_str())
            .cloned()
            .ok_or_else(|| LoadError::KeyNotFound(key.as_str().to_string()))
    }

    fn exists(&self, key: &RecordKey) -> bool {
        self.records.lock().unwrap().contains_key(key.as_str())
    }
}

/// Downstream indexer that records every call.
#[derive(Default)]
struct RecordingIndexer {
    calls: Mutex<Vec<(String, String, IndexAttrs)>>,
    fail_next: Mutex<Option<IndexError>>,
}

impl RecordingIndexer {
    fn calls(&self) -> Vec<(String, String, IndexAttrs)> {
        self.calls.lock().unwrap().clone()
    }

    fn fail_next_with(&self, err: IndexError) {
        *self.fail_next.lock().unwrap() = Some(err);
    }
}

impl DocumentIndexer for RecordingIndexer {
    fn index_document(
        &self,
        index: &str,
        document: &LoadedDocument,
        attrs: &IndexAttrs,
    ) -> IndexResult<()> {
        if let Some(err) = self.fail_next.lock().unwrap().take() {
            return Err(err);
        }
        self.calls.lock().unwrap().push((
            index.to_string(),
            document.key.as_str().to_string(),
            attrs.clone(),
        ));
        Ok(())
    }
}

fn args(tokens: &[&str]) -> Vec<String> {
    tokens.iter().map(|s| s.to_string()).collect()
}

fn engine() -> (Arc<MemoryStore>, Arc<RecordingIndexer>, RoutingEngine) {
    let store = Arc::new(MemoryStore::default());
    let indexer = Arc::new(RecordingIndexer::default());
    let engine = RoutingEngine::new(
        EngineConfig {
            workers: 1,
            ..EngineConfig::default()
        },
        store.clone(),
        indexer.clone(),
    );
    (store, indexer, engine)
}

// =============================================================================
// Matching
// =============================================================================

/// Prefix rule without filter: one match action, default attributes.
#[test]
fn test_prefix_rule_indexes_with_defaults() {
    let (store, indexer, engine) = engine();
    engine.create_index("idx1", IndexingMode::Sync);
    engine.add_rule("idx1", "r", &args(&["PREFIX", "1", "doc:"])).unwrap();

    store.put("doc:1", &[("title", json!("hello"))]);
    engine.notify_key_mutated(&RecordKey::from("doc:1"));

    let calls = indexer.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "idx1");
    assert_eq!(calls[0].1, "doc:1");
    assert_eq!(calls[0].2.score, 1.0);
    assert_eq!(calls[0].2.language, "english");

    let idx = engine.index("idx1").unwrap();
    assert!(idx.docs().get_id(&RecordKey::from("doc:1")).is_some());
}

/// Filter mismatch produces no match and no identity entry.
#[test]
fn test_filter_mismatch_is_not_indexed() {
    let (store, indexer, engine) = engine();
    engine.create_index("idx1", IndexingMode::Sync);
    engine
        .add_rule(
            "idx1",
            "r",
            &args(&["PREFIX", "1", "doc:", "FILTER", "@visible == 1"]),
        )
        .unwrap();

    store.put("doc:1", &[("visible", json!(0))]);
    engine.notify_key_mutated(&RecordKey::from("doc:1"));

    assert!(indexer.calls().is_empty());
    let idx = engine.index("idx1").unwrap();
    assert!(idx.docs().get_id(&RecordKey::from("doc:1")).is_none());
}

/// Non-matching key prefix reaches no index.
#[test]
fn test_non_matching_prefix_ignored() {
    let (store, indexer, engine) = engine();
    engine.create_index("idx1", IndexingMode::Sync);
    engine.add_rule("idx1", "r", &args(&["PREFIX", "1", "doc:"])).unwrap();

    store.put("other:1", &[("title", json!("x"))]);
    engine.notify_key_mutated(&RecordKey::from("other:1"));

    assert!(indexer.calls().is_empty());
}

/// Two indexes with overlapping prefixes both get the record; each is
/// indexed exactly once.
#[test]
fn test_multiple_indexes_one_notification() {
    let (store, indexer, engine) = engine();
    engine.create_index("idx1", IndexingMode::Sync);
    engine.create_index("idx2", IndexingMode::Sync);
    engine.add_rule("idx1", "a", &args(&["PREFIX", "1", "doc:"])).unwrap();
    engine.add_rule("idx1", "b", &args(&["PREFIX", "1", "doc:u"])).unwrap();
    engine.add_rule("idx2", "a", &args(&["PREFIX", "1", "doc:user:"])).unwrap();

    store.put("doc:user:1", &[]);
    engine.notify_key_mutated(&RecordKey::from("doc:user:1"));

    let mut targets: Vec<String> = indexer.calls().into_iter().map(|c| c.0).collect();
    targets.sort();
    assert_eq!(targets, vec!["idx1", "idx2"]);
}

/// Attribute extraction from the record, with defaults for missing
/// fields.
#[test]
fn test_attribute_extraction_from_fields() {
    let (store, indexer, engine) = engine();
    engine.create_index("idx1", IndexingMode::Sync);
    engine
        .add_rule(
            "idx1",
            "r",
            &args(&["PREFIX", "1", "doc:", "SCORE", "rank", "PAYLOAD", "extra"]),
        )
        .unwrap();

    store.put("doc:1", &[("rank", json!(0.25)), ("extra", json!("blob"))]);
    engine.notify_key_mutated(&RecordKey::from("doc:1"));

    let attrs = &indexer.calls()[0].2;
    assert_eq!(attrs.score, 0.25);
    assert_eq!(attrs.payload.as_deref(), Some(&b"blob"[..]));

    let idx = engine.index("idx1").unwrap();
    let docs = idx.docs();
    let id = docs.get_id(&RecordKey::from("doc:1")).unwrap();
    assert_eq!(docs.score_for(id), 0.25);
}

/// Dropping an index removes its rules: the same key matches nothing
/// afterwards.
#[test]
fn test_drop_index_stops_matching() {
    let (store, indexer, engine) = engine();
    engine.create_index("idx1", IndexingMode::Sync);
    engine.add_rule("idx1", "r", &args(&["PREFIX", "1", "doc:"])).unwrap();

    store.put("doc:1", &[]);
    engine.notify_key_mutated(&RecordKey::from("doc:1"));
    assert_eq!(indexer.calls().len(), 1);

    engine.drop_index("idx1");
    engine.notify_key_mutated(&RecordKey::from("doc:1"));
    assert_eq!(indexer.calls().len(), 1);
    assert!(engine.index("idx1").is_none());
}

/// Rules for unregistered indexes are rejected.
#[test]
fn test_rule_for_unknown_index_rejected() {
    let (_, _, engine) = engine();
    assert!(engine
        .add_rule("ghost", "r", &args(&["PREFIX", "1", "doc:"]))
        .is_err());
}

// =============================================================================
// Deletes
// =============================================================================

/// A delete removes the identity entry from every rule-governed index,
/// regardless of rule predicates.
#[test]
fn test_delete_removes_from_all_indexes() {
    let (store, _, engine) = engine();
    engine.create_index("idx1", IndexingMode::Sync);
    engine.create_index("idx2", IndexingMode::Sync);
    engine.add_rule("idx1", "r", &args(&["PREFIX", "1", "doc:"])).unwrap();
    engine.add_rule("idx2", "r", &args(&["PREFIX", "1", "doc:"])).unwrap();

    store.put("doc:1", &[]);
    engine.notify_key_mutated(&RecordKey::from("doc:1"));

    store.delete("doc:1");
    engine.notify_key_deleted(&RecordKey::from("doc:1"));

    for name in ["idx1", "idx2"] {
        let idx = engine.index(name).unwrap();
        assert!(idx.docs().get_id(&RecordKey::from("doc:1")).is_none());
    }
}

/// Deleting a never-indexed key is harmless.
#[test]
fn test_delete_unknown_key_is_noop() {
    let (_, _, engine) = engine();
    engine.create_index("idx1", IndexingMode::Sync);
    engine.notify_key_deleted(&RecordKey::from("never-seen"));
}

// =============================================================================
// Dispatch flags and failure handling
// =============================================================================

/// NOREINDEX skips keys that already hold an id.
#[test]
fn test_no_reindex_skips_existing_ids() {
    let (store, indexer, engine) = engine();
    engine.create_index("idx1", IndexingMode::Sync);
    engine.add_rule("idx1", "r", &args(&["PREFIX", "1", "doc:"])).unwrap();

    store.put("doc:1", &[]);
    engine.notify_key_mutated(&RecordKey::from("doc:1"));
    assert_eq!(indexer.calls().len(), 1);

    let rescan = ProcessOptions {
        no_reindex: true,
        ..ProcessOptions::default()
    };
    engine.process_item(&RecordKey::from("doc:1"), rescan).unwrap();
    assert_eq!(indexer.calls().len(), 1);

    // A fresh key still goes through under NOREINDEX.
    store.put("doc:2", &[]);
    engine.process_item(&RecordKey::from("doc:2"), rescan).unwrap();
    assert_eq!(indexer.calls().len(), 2);
}

/// A record that fails to load is skipped, not an error.
#[test]
fn test_unloadable_record_skipped() {
    let (_, indexer, engine) = engine();
    engine.create_index("idx1", IndexingMode::Sync);
    engine.add_rule("idx1", "r", &args(&["PREFIX", "1", "doc:"])).unwrap();

    // Never inserted into the store.
    engine
        .process_item(&RecordKey::from("doc:gone"), ProcessOptions::default())
        .unwrap();
    assert!(indexer.calls().is_empty());
}

/// "No indexable fields" is a successful no-op without identity entry.
#[test]
fn test_no_indexable_fields_is_noop() {
    let (store, indexer, engine) = engine();
    engine.create_index("idx1", IndexingMode::Sync);
    engine.add_rule("idx1", "r", &args(&["PREFIX", "1", "doc:"])).unwrap();

    store.put("doc:1", &[]);
    indexer.fail_next_with(IndexError::NoIndexableFields);
    engine
        .process_item(&RecordKey::from("doc:1"), ProcessOptions::default())
        .unwrap();

    let idx = engine.index("idx1").unwrap();
    assert!(idx.docs().get_id(&RecordKey::from("doc:1")).is_none());
}

/// Other downstream failures surface from process_item.
#[test]
fn test_index_failure_surfaces() {
    let (store, indexer, engine) = engine();
    engine.create_index("idx1", IndexingMode::Sync);
    engine.add_rule("idx1", "r", &args(&["PREFIX", "1", "doc:"])).unwrap();

    store.put("doc:1", &[]);
    indexer.fail_next_with(IndexError::failed("doc:1", "disk full"));
    assert!(engine
        .process_item(&RecordKey::from("doc:1"), ProcessOptions::default())
        .is_err());
}

/// Re-indexing the same key keeps its id but refreshes attributes.
#[test]
fn test_reindex_reuses_id() {
    let (store, _, engine) = engine();
    engine.create_index("idx1", IndexingMode::Sync);
    engine
        .add_rule("idx1", "r", &args(&["PREFIX", "1", "doc:", "SCORE", "rank"]))
        .unwrap();

    store.put("doc:1", &[("rank", json!(0.1))]);
    engine.notify_key_mutated(&RecordKey::from("doc:1"));
    let first = engine
        .index("idx1")
        .unwrap()
        .docs()
        .get_id(&RecordKey::from("doc:1"))
        .unwrap();

    store.put("doc:1", &[("rank", json!(0.9))]);
    engine.notify_key_mutated(&RecordKey::from("doc:1"));

    let idx = engine.index("idx1").unwrap();
    let docs = idx.docs();
    let second = docs.get_id(&RecordKey::from("doc:1")).unwrap();
    assert_eq!(first, second);
    assert_eq!(docs.score_for(second), 0.9);
}
