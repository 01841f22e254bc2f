//! siftdb - automatic document-routing and indexing core
//!
//! When a record in the host key-value store is written, deleted, or
//! expired, this crate decides which search indexes the record belongs
//! to, extracts per-index attributes from it, and gets it indexed,
//! inline with the write or deferred to a bounded worker pipeline.

pub mod config;
pub mod dispatch;
pub mod doctable;
pub mod document;
pub mod filter;
pub mod index;
pub mod matcher;
pub mod observability;
pub mod pipeline;
pub mod prefix;
pub mod rules;

pub use dispatch::{ProcessOptions, RoutingEngine};
