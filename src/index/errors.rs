//! Errors crossing the indexing collaborator seams.

use thiserror::Error;

pub type LoadResult<T> = Result<T, LoadError>;
pub type IndexResult<T> = Result<T, IndexError>;

/// Field loading failed for a candidate record.
///
/// A record that cannot be loaded is skipped for indexing, never
/// retried. `KeyNotFound` additionally signals the async path that the
/// record was deleted between enqueue and execution.
#[derive(Debug, Clone, Error)]
pub enum LoadError {
    /// The key no longer exists in the host store
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    /// The record exists but its fields could not be read
    #[error("Failed to load fields for {key}: {reason}")]
    Failed { key: String, reason: String },
}

/// The downstream indexing call failed.
#[derive(Debug, Clone, Error)]
pub enum IndexError {
    /// The record carries none of the index's schema fields. A record
    /// legitimately outside an index's field set is a successful no-op,
    /// not a failure; every caller downgrades this variant.
    #[error("No indexable fields in document")]
    NoIndexableFields,

    /// Any other downstream failure
    #[error("Indexing failed for {key}: {reason}")]
    Failed { key: String, reason: String },
}

impl IndexError {
    pub fn failed(key: impl Into<String>, reason: impl Into<String>) -> Self {
        IndexError::Failed {
            key: key.into(),
            reason: reason.into(),
        }
    }
}
