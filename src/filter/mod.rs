//! Filter predicate seam
//!
//! Rules may carry a boolean predicate over document field values. The
//! full expression engine belongs to the host; this module defines the
//! seam (`FilterEvaluator` parses, `FilterPredicate` evaluates) plus a
//! built-in single-comparison evaluator that covers predicates of the
//! form `@field OP literal` and bare `@field` truth tests.
//!
//! Evaluation reads fields through `FieldAccessor` so the record body is
//! loaded lazily: a key no rule cares about never touches the store.

mod errors;
mod eval;

pub use errors::{FilterError, FilterResult};
pub use eval::ComparisonEvaluator;

use std::sync::Arc;

use serde_json::Value;

/// Read access to one record's field values during predicate evaluation.
///
/// `field` takes `&mut self` so implementations can load the record on
/// first access and cache it.
pub trait FieldAccessor {
    /// The record's external key.
    fn key(&self) -> &str;

    /// Value of `name`, or `None` if the field is absent or the record
    /// could not be loaded.
    fn field(&mut self, name: &str) -> Option<Value>;
}

/// A parsed, reusable boolean predicate.
pub trait FilterPredicate: Send + Sync {
    /// The original expression text, kept for persistence round-trips.
    fn source(&self) -> &str;

    /// Evaluates against one record. `Err` is downgraded to non-match
    /// by the caller.
    fn evaluate(&self, fields: &mut dyn FieldAccessor) -> FilterResult<bool>;
}

/// Parses filter expressions into predicates.
pub trait FilterEvaluator: Send + Sync {
    fn parse(&self, expr: &str) -> FilterResult<Arc<dyn FilterPredicate>>;
}

/// Accessor over already-loaded fields. Used by tests and by the sync
/// indexing path once fields are in hand.
pub struct LoadedAccessor<'a> {
    key: &'a str,
    fields: &'a crate::document::DocumentFields,
}

impl<'a> LoadedAccessor<'a> {
    pub fn new(key: &'a str, fields: &'a crate::document::DocumentFields) -> Self {
        LoadedAccessor { key, fields }
    }
}

impl FieldAccessor for LoadedAccessor<'_> {
    fn key(&self) -> &str {
        self.key
    }

    fn field(&mut self, name: &str) -> Option<Value> {
        self.fields.get(name).cloned()
    }
}
