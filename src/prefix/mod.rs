//! Prefix Index
//!
//! Byte trie mapping literal key prefixes to the indexes registered
//! under them. Answers one question fast: "which indexes might care
//! about this key?" The filter pass in the matcher narrows candidates
//! to actual rule matches.
//!
//! Never persisted; rebuilt from the rule registry on load.
//!
//! # Invariants
//!
//! - An index appears at the node of every distinct prefix across all
//!   of its rules.
//! - The empty prefix registers at the root and therefore matches every
//!   key.
//! - `find_candidates` returns a set: an index reachable through two
//!   different prefixes of the same key is reported once.

use std::collections::{BTreeSet, HashMap};

use crate::document::RecordKey;

#[derive(Debug, Default)]
struct TrieNode {
    children: HashMap<u8, TrieNode>,
    /// Index names registered under exactly this prefix.
    indexes: BTreeSet<String>,
}

impl TrieNode {
    fn is_empty(&self) -> bool {
        self.children.is_empty() && self.indexes.is_empty()
    }
}

/// Trie over byte-string prefixes.
#[derive(Debug, Default)]
pub struct PrefixIndex {
    root: TrieNode,
}

impl PrefixIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `index` under `prefix`, creating trie nodes as needed.
    /// Registering the same (index, prefix) pair twice is a no-op.
    pub fn register(&mut self, index: &str, prefix: &[u8]) {
        let mut node = &mut self.root;
        for &byte in prefix {
            node = node.children.entry(byte).or_default();
        }
        node.indexes.insert(index.to_string());
    }

    /// Removes `index` from the node at `prefix`, pruning now-empty
    /// nodes on the way back up.
    pub fn unregister(&mut self, index: &str, prefix: &[u8]) {
        Self::unregister_at(&mut self.root, index, prefix);
    }

    fn unregister_at(node: &mut TrieNode, index: &str, prefix: &[u8]) {
        match prefix.split_first() {
            None => {
                node.indexes.remove(index);
            }
            Some((&byte, rest)) => {
                if let Some(child) = node.children.get_mut(&byte) {
                    Self::unregister_at(child, index, rest);
                    if child.is_empty() {
                        node.children.remove(&byte);
                    }
                }
            }
        }
    }

    /// Removes `index` from every node it appears in. Rule counts per
    /// index are small, so callers that know the prefixes should prefer
    /// `unregister`; this is the teardown fallback.
    pub fn unregister_all(&mut self, index: &str) {
        Self::scrub(&mut self.root, index);
    }

    fn scrub(node: &mut TrieNode, index: &str) {
        node.indexes.remove(index);
        node.children.retain(|_, child| {
            Self::scrub(child, index);
            !child.is_empty()
        });
    }

    /// Walks every prefix of `key` (root included) and unions the index
    /// sets found at matching nodes.
    pub fn find_candidates(&self, key: &RecordKey) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        let mut node = &self.root;
        out.extend(node.indexes.iter().cloned());
        for &byte in key.as_bytes() {
            match node.children.get(&byte) {
                Some(child) => {
                    node = child;
                    out.extend(node.indexes.iter().cloned());
                }
                None => break,
            }
        }
        out
    }

    /// True if no index is registered anywhere.
    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }
}
