//! Document identity invariants under concurrency
//!
//! - `get_or_assign` is idempotent per key
//! - concurrently live keys never share an id
//! - tables of different indexes are independent

use std::collections::HashSet;
use std::sync::Arc;

use siftdb::doctable::DocTable;
use siftdb::document::{IndexAttrs, RecordKey};
use siftdb::index::{IndexingMode, SearchIndex};

/// Hammer one table from several threads; every key must end up with
/// exactly one id and no two keys may share one.
#[test]
fn test_concurrent_assignment_yields_unique_ids() {
    let index = Arc::new(SearchIndex::new("idx", IndexingMode::Sync));
    let threads = 4;
    let keys_per_thread = 50;

    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let index = index.clone();
            std::thread::spawn(move || {
                for n in 0..keys_per_thread {
                    let key = RecordKey::new(format!("doc:{}:{}", t, n));
                    // Assign twice; the second call must agree.
                    let first = index.docs().get_or_assign(&key, &IndexAttrs::default());
                    let second = index.docs().get_or_assign(&key, &IndexAttrs::default());
                    assert_eq!(first, second);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let docs = index.docs();
    assert_eq!(docs.len(), threads * keys_per_thread);
    let ids: HashSet<u64> = docs.iter().map(|(id, _)| id.value()).collect();
    assert_eq!(ids.len(), threads * keys_per_thread);
}

/// Ids survive unrelated deletes and are never handed out twice.
#[test]
fn test_ids_monotonic_across_deletes() {
    let mut table = DocTable::new();
    let attrs = IndexAttrs::default();

    let mut seen = HashSet::new();
    for round in 0..10 {
        let key = RecordKey::new(format!("doc:{}", round));
        let id = table.get_or_assign(&key, &attrs);
        assert!(seen.insert(id.value()), "id reused: {:?}", id);
        if round % 2 == 0 {
            table.remove(&key);
        }
    }
    // Deleted keys come back with fresh ids.
    for round in (0..10).step_by(2) {
        let key = RecordKey::new(format!("doc:{}", round));
        let id = table.get_or_assign(&key, &attrs);
        assert!(seen.insert(id.value()), "id reused after delete: {:?}", id);
    }
    assert_eq!(table.max_doc_id(), 15);
}

/// Per-index tables do not observe each other.
#[test]
fn test_tables_are_per_index() {
    let a = SearchIndex::new("a", IndexingMode::Sync);
    let b = SearchIndex::new("b", IndexingMode::Sync);
    let key = RecordKey::from("doc:1");

    a.docs().get_or_assign(&key, &IndexAttrs::default());
    assert!(b.docs().get_id(&key).is_none());

    a.docs().remove(&key);
    let again = b.docs().get_or_assign(&key, &IndexAttrs::default());
    assert_eq!(again.value(), 1);
}
