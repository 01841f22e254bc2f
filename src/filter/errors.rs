//! Filter predicate error types.

use thiserror::Error;

/// Result type for filter operations
pub type FilterResult<T> = Result<T, FilterError>;

/// Errors from the filter-predicate seam.
///
/// Parse errors surface as `RuleError::InvalidFilter` at rule-definition
/// time. Eval errors never propagate past the matcher: a predicate that
/// cannot be evaluated against a document means "rule does not match",
/// because indexing must not be blocked by a malformed record.
#[derive(Debug, Clone, Error)]
pub enum FilterError {
    /// Expression failed to parse
    #[error("Invalid filter expression: {0}")]
    Parse(String),

    /// Expression failed to evaluate against a document
    #[error("Filter evaluation failed: {0}")]
    Eval(String),
}
