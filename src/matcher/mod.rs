//! Matcher
//!
//! Maps one mutated key to the set of indexes it should be indexed
//! under, with per-index attributes extracted from the record.
//!
//! Two stages: the prefix index narrows to candidate indexes, then the
//! candidates' rules run the prefix test plus (if present) their filter
//! predicate. Fields load lazily through the accessor, so a key no rule
//! cares about never touches the store.
//!
//! # Semantics
//!
//! - Multiple matching rules on the same index collapse to one
//!   `MatchAction`; the first matching rule (registry order) supplies
//!   the attributes. An index is indexed at most once per notification.
//! - A filter that fails to evaluate means the rule does not match.
//!   Matching never errors: a malformed document must not block the
//!   host's write path.
//! - Attribute fields that are absent or mistyped fall back to their
//!   defaults (score 1.0, configured default language, no payload).

use std::collections::BTreeSet;

use serde_json::Value;

use crate::document::{DocumentFields, IndexAttrs, RecordKey, DEFAULT_SCORE};
use crate::filter::FieldAccessor;
use crate::index::{FieldLoader, LoadResult};
use crate::rules::{Rule, RuleRegistry};

/// One match result: target index plus the attributes the document
/// should be indexed with. Ephemeral; produced fresh per notification.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchAction {
    pub index: String,
    pub attrs: IndexAttrs,
}

/// Field accessor that loads the record on first access and caches the
/// result (including a load failure, which reads as "no fields").
pub struct LazyAccessor<'a> {
    key: &'a RecordKey,
    loader: &'a dyn FieldLoader,
    loaded: Option<LoadResult<DocumentFields>>,
}

impl<'a> LazyAccessor<'a> {
    pub fn new(key: &'a RecordKey, loader: &'a dyn FieldLoader) -> Self {
        LazyAccessor {
            key,
            loader,
            loaded: None,
        }
    }

    fn fields(&mut self) -> Option<&DocumentFields> {
        if self.loaded.is_none() {
            self.loaded = Some(self.loader.load_fields(self.key));
        }
        match self.loaded.as_ref().expect("just loaded") {
            Ok(fields) => Some(fields),
            Err(_) => None,
        }
    }

    /// The cached load result, if any rule forced a load.
    pub fn take_loaded(self) -> Option<LoadResult<DocumentFields>> {
        self.loaded
    }
}

impl FieldAccessor for LazyAccessor<'_> {
    fn key(&self) -> &str {
        self.key.as_str()
    }

    fn field(&mut self, name: &str) -> Option<Value> {
        self.fields().and_then(|f| f.get(name).cloned())
    }
}

/// Matches `key` against the registry's rules.
///
/// `default_language` seeds the language attribute when a rule names no
/// language field (or the field is missing from the record).
pub fn match_key(
    registry: &RuleRegistry,
    key: &RecordKey,
    accessor: &mut dyn FieldAccessor,
    default_language: &str,
) -> Vec<MatchAction> {
    let candidates: BTreeSet<String> = registry.prefixes().find_candidates(key);
    let mut actions: Vec<MatchAction> = Vec::new();

    for rule in registry.rules() {
        if !candidates.contains(&rule.index) {
            continue;
        }
        // One action per index; first matching rule wins.
        if actions.iter().any(|a| a.index == rule.index) {
            continue;
        }
        if !rule.matches_prefix(key.as_bytes()) {
            continue;
        }
        if let Some(filter) = &rule.filter {
            match filter.evaluate(accessor) {
                Ok(true) => {}
                // Eval failure is a non-match, never an error.
                Ok(false) | Err(_) => continue,
            }
        }
        actions.push(MatchAction {
            index: rule.index.clone(),
            attrs: extract_attrs(rule, accessor, default_language),
        });
    }

    actions
}

fn extract_attrs(
    rule: &Rule,
    accessor: &mut dyn FieldAccessor,
    default_language: &str,
) -> IndexAttrs {
    let score = rule
        .score_field
        .as_deref()
        .and_then(|f| accessor.field(f))
        .and_then(|v| numeric(&v))
        .unwrap_or(DEFAULT_SCORE);

    let language = rule
        .language_field
        .as_deref()
        .and_then(|f| accessor.field(f))
        .and_then(|v| match v {
            Value::String(s) if !s.is_empty() => Some(s),
            _ => None,
        })
        .unwrap_or_else(|| default_language.to_string());

    let payload = rule
        .payload_field
        .as_deref()
        .and_then(|f| accessor.field(f))
        .and_then(|v| match v {
            Value::String(s) => Some(s.into_bytes()),
            _ => None,
        });

    IndexAttrs {
        score,
        language,
        payload,
    }
}

fn numeric(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        // Hash-stored records deliver numbers as strings.
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}
