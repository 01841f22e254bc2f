//! Rule argument parser
//!
//! Rules are defined (and persisted) as flat token lists:
//!
//! ```text
//! [PREFIX {count} {prefix}...] [FILTER {expr}] [SCORE {field}]
//! [LANGUAGE {field}] [PAYLOAD {field}]
//! ```
//!
//! Keywords are case-insensitive. Every clause is optional; a rule with
//! neither PREFIX nor FILTER gets the single empty prefix, which
//! matches every key. The raw tokens are kept verbatim on the parsed
//! rule so persistence round-trips byte-for-byte regardless of internal
//! representation changes.

use std::sync::Arc;

use crate::filter::{FilterEvaluator, FilterPredicate};

use super::errors::{RuleError, RuleResult};

/// One parsed rule: the binding from matching records to one index.
#[derive(Clone)]
pub struct Rule {
    /// Owning index name.
    pub index: String,
    /// Rule name, unique within the index.
    pub name: String,
    /// Literal key prefixes; a key matches if it starts with any of
    /// them. Contains at least the empty prefix when no explicit
    /// prefixes were given.
    pub prefixes: Vec<String>,
    /// Optional filter predicate, parsed by the configured evaluator.
    pub filter: Option<Arc<dyn FilterPredicate>>,
    /// Field to source the relevance score from.
    pub score_field: Option<String>,
    /// Field to source the language from.
    pub language_field: Option<String>,
    /// Field to source the payload from.
    pub payload_field: Option<String>,
    /// Original argument tokens, verbatim, for persistence.
    pub raw_args: Vec<String>,
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule")
            .field("index", &self.index)
            .field("name", &self.name)
            .field("prefixes", &self.prefixes)
            .field("filter", &self.filter.as_ref().map(|p| p.source()))
            .field("score_field", &self.score_field)
            .field("language_field", &self.language_field)
            .field("payload_field", &self.payload_field)
            .finish()
    }
}

impl Rule {
    /// True if `key` starts with one of this rule's prefixes.
    pub fn matches_prefix(&self, key: &[u8]) -> bool {
        self.prefixes
            .iter()
            .any(|p| key.starts_with(p.as_bytes()))
    }
}

struct TokenCursor<'a> {
    tokens: &'a [String],
    pos: usize,
}

impl<'a> TokenCursor<'a> {
    fn new(tokens: &'a [String]) -> Self {
        TokenCursor { tokens, pos: 0 }
    }

    fn next(&mut self) -> Option<&'a str> {
        let tok = self.tokens.get(self.pos)?;
        self.pos += 1;
        Some(tok)
    }

    fn expect(&mut self, clause: &str) -> RuleResult<&'a str> {
        self.next()
            .ok_or_else(|| RuleError::BadArgs(format!("{} requires an argument", clause)))
    }
}

/// Parses `raw_args` into a rule bound to `(index, name)`, running the
/// FILTER clause (if any) through `evaluator`.
pub fn parse_rule(
    index: &str,
    name: &str,
    raw_args: &[String],
    evaluator: &dyn FilterEvaluator,
) -> RuleResult<Rule> {
    let mut prefixes: Vec<String> = Vec::new();
    let mut filter = None;
    let mut score_field = None;
    let mut language_field = None;
    let mut payload_field = None;

    let mut cursor = TokenCursor::new(raw_args);
    while let Some(tok) = cursor.next() {
        match tok.to_ascii_uppercase().as_str() {
            "PREFIX" => {
                let count: usize = cursor
                    .expect("PREFIX")?
                    .parse()
                    .map_err(|_| RuleError::BadArgs("PREFIX expects a count".to_string()))?;
                for _ in 0..count {
                    prefixes.push(cursor.expect("PREFIX")?.to_string());
                }
            }
            "FILTER" => {
                let expr = cursor.expect("FILTER")?;
                filter = Some(evaluator.parse(expr)?);
            }
            "SCORE" => score_field = Some(cursor.expect("SCORE")?.to_string()),
            "LANGUAGE" => language_field = Some(cursor.expect("LANGUAGE")?.to_string()),
            "PAYLOAD" => payload_field = Some(cursor.expect("PAYLOAD")?.to_string()),
            other => {
                return Err(RuleError::BadArgs(format!("Unknown argument `{}`", other)));
            }
        }
    }

    // Without prefixes the rule would never reach the matcher; fall
    // back to the wildcard (empty) prefix.
    if prefixes.is_empty() {
        prefixes.push(String::new());
    }

    Ok(Rule {
        index: index.to_string(),
        name: name.to_string(),
        prefixes,
        filter,
        score_field,
        language_field,
        payload_field,
        raw_args: raw_args.to_vec(),
    })
}
