//! Rule registry
//!
//! Ordered collection of all rules across all indexes, plus the prefix
//! index derived from them. Insertion order is append-only and only
//! affects persistence order, never match results.
//!
//! # Invariants
//!
//! - Rule names are unique within an index.
//! - The prefix index always reflects exactly the registered rules; it
//!   is rebuilt from them on snapshot load, never persisted itself.
//! - Removing an index removes all of its rules (and its prefix-index
//!   registrations) before the index is torn down.

mod errors;
mod parser;
pub mod snapshot;

pub use errors::{RuleError, RuleResult, SnapshotError, SnapshotResult};
pub use parser::{parse_rule, Rule};

use std::sync::Arc;

use crate::filter::FilterEvaluator;
use crate::prefix::PrefixIndex;

/// Process-wide rule collection. One per engine; lifecycle matches the
/// engine's init/shutdown.
pub struct RuleRegistry {
    rules: Vec<Rule>,
    prefixes: PrefixIndex,
    evaluator: Arc<dyn FilterEvaluator>,
}

impl RuleRegistry {
    pub fn new(evaluator: Arc<dyn FilterEvaluator>) -> Self {
        RuleRegistry {
            rules: Vec::new(),
            prefixes: PrefixIndex::new(),
            evaluator,
        }
    }

    /// Parses and registers a rule from its raw argument tokens.
    pub fn add_rule(
        &mut self,
        index: &str,
        name: &str,
        raw_args: &[String],
    ) -> RuleResult<&Rule> {
        if self.contains(index, name) {
            return Err(RuleError::DuplicateRule {
                index: index.to_string(),
                name: name.to_string(),
            });
        }

        let rule = parse_rule(index, name, raw_args, self.evaluator.as_ref())?;
        for prefix in &rule.prefixes {
            self.prefixes.register(index, prefix.as_bytes());
        }
        self.rules.push(rule);
        Ok(self.rules.last().expect("rule just pushed"))
    }

    /// Whether a rule named `name` already exists on `index`.
    pub fn contains(&self, index: &str, name: &str) -> bool {
        self.rules.iter().any(|r| r.index == index && r.name == name)
    }

    /// Appends every rule of `other`, carrying its prefix registrations
    /// over. Callers must have checked for name collisions.
    pub(crate) fn absorb(&mut self, other: RuleRegistry) {
        for rule in other.rules {
            for prefix in &rule.prefixes {
                self.prefixes.register(&rule.index, prefix.as_bytes());
            }
            self.rules.push(rule);
        }
    }

    /// Removes every rule owned by `index` and scrubs the prefix index.
    /// Must run before the index itself is torn down.
    pub fn remove_index(&mut self, index: &str) {
        self.rules.retain(|r| r.index != index);
        self.prefixes.unregister_all(index);
    }

    /// All rules, in insertion order.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Rules owned by `index`, in insertion order.
    pub fn rules_for_index<'a>(&'a self, index: &'a str) -> impl Iterator<Item = &'a Rule> {
        self.rules.iter().filter(move |r| r.index == index)
    }

    pub fn prefixes(&self) -> &PrefixIndex {
        &self.prefixes
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
