//! Rule definition and persistence error types.

use thiserror::Error;

use crate::filter::FilterError;

pub type RuleResult<T> = Result<T, RuleError>;
pub type SnapshotResult<T> = Result<T, SnapshotError>;

/// Errors from rule definition. These are the hard failures of the
/// core: they surface synchronously to whoever is defining rules.
#[derive(Debug, Clone, Error)]
pub enum RuleError {
    /// A rule with this (index, name) pair already exists
    #[error("Rule `{name}` already exists for index `{index}`")]
    DuplicateRule { index: String, name: String },

    /// The filter predicate failed to parse
    #[error("Invalid filter: {0}")]
    InvalidFilter(#[from] FilterError),

    /// Malformed rule argument list
    #[error("Bad rule arguments: {0}")]
    BadArgs(String),

    /// The rule names an index that is not registered
    #[error("Unknown index `{0}`")]
    UnknownIndex(String),
}

/// Errors from rule-registry persistence. All load-side variants are
/// fatal: a snapshot that cannot be fully reloaded silently changes
/// which future writes get indexed, so nothing is skipped.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("Snapshot I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// Missing or wrong magic bytes
    #[error("Not a rule snapshot")]
    BadMagic,

    /// Snapshot written by a newer version of the format
    #[error("Unsupported snapshot version {found} (current {current})")]
    UnsupportedVersion { found: u32, current: u32 },

    /// Payload does not match its recorded checksum
    #[error("Snapshot checksum mismatch: expected {expected:#010x}, computed {computed:#010x}")]
    ChecksumMismatch { expected: u32, computed: u32 },

    /// A persisted rule failed to re-parse
    #[error("Snapshot rule `{name}` for index `{index}` failed to re-parse: {source}")]
    MalformedRule {
        index: String,
        name: String,
        #[source]
        source: RuleError,
    },
}
