//! Engine configuration

use serde::Deserialize;

use crate::document::DEFAULT_LANGUAGE;

/// Tunables for one routing engine instance.
///
/// Defaults: a 1000-slot job queue serviced by 5 workers.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Async job queue capacity. Submission blocks when full; this is
    /// the engine's only backpressure point.
    pub queue_capacity: usize,
    /// Fixed number of async indexing workers.
    pub workers: usize,
    /// Language assigned when no rule supplies one.
    pub default_language: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            queue_capacity: 1000,
            workers: 5,
            default_language: DEFAULT_LANGUAGE.to_string(),
        }
    }
}
