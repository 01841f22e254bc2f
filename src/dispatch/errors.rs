//! Top-level engine error.

use thiserror::Error;

use crate::index::IndexError;
use crate::pipeline::PipelineError;
use crate::rules::{RuleError, SnapshotError};

pub type EngineResult<T> = Result<T, EngineError>;

/// Errors surfaced by `RoutingEngine` operations.
///
/// Only rule definition and snapshot load are hard failures. Matching
/// and dispatch errors during notification handling are logged, never
/// propagated into the host's write path.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Rule(#[from] RuleError),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}
