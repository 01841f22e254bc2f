//! Structured logging for the routing core
//!
//! One JSON object per line, written synchronously, keys in
//! deterministic order. The async pipeline is the main client: a failed
//! deferred job has no caller to report to, so the log line is the only
//! record of it.

mod logger;

pub use logger::{Logger, Severity};
