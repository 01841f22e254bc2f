//! Routing engine
//!
//! Top-level service tying the pieces together: rule registry + prefix
//! index behind one readers-writer lock, the index registry, and the
//! async pipeline. All state is owned by the engine instance; multiple
//! independent engines can coexist (nothing is process-global).
//!
//! Inbound events arrive through two handlers the host calls
//! synchronously per key:
//!
//! - `notify_key_mutated` — a record was written; resolve its indexes
//!   and index it, inline or deferred.
//! - `notify_key_deleted` — a record was deleted, expired, or evicted;
//!   drop its identity entry from every rule-governed index.
//!
//! Neither handler ever returns an error into the host's write path.

mod errors;

pub use errors::{EngineError, EngineResult};

use std::sync::{Arc, RwLock};

use crate::config::EngineConfig;
use crate::document::{DocumentFields, IndexAttrs, LoadedDocument, RecordKey};
use crate::filter::{ComparisonEvaluator, FilterEvaluator};
use crate::index::{
    DocumentIndexer, FieldLoader, IndexError, IndexRegistry, IndexingMode, SearchIndex,
};
use crate::matcher::{match_key, LazyAccessor, MatchAction};
use crate::observability::Logger;
use crate::pipeline::{AsyncIndexPipeline, IndexJob, PipelineStatsSnapshot};
use crate::rules::{snapshot, RuleError, RuleRegistry, RuleResult, SnapshotResult};

/// Per-call dispatch flags.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessOptions {
    /// Skip indexes that already hold an id for the key. Full-corpus
    /// rescans set this to avoid clobbering incremental work.
    pub no_reindex: bool,
    /// Route to the pipeline regardless of each index's mode.
    pub force_async: bool,
}

/// The document-routing and indexing core.
pub struct RoutingEngine {
    config: EngineConfig,
    rules: RwLock<RuleRegistry>,
    indexes: IndexRegistry,
    pipeline: AsyncIndexPipeline,
    loader: Arc<dyn FieldLoader>,
    indexer: Arc<dyn DocumentIndexer>,
}

impl RoutingEngine {
    /// Engine with the built-in comparison evaluator.
    pub fn new(
        config: EngineConfig,
        loader: Arc<dyn FieldLoader>,
        indexer: Arc<dyn DocumentIndexer>,
    ) -> Self {
        Self::with_evaluator(config, loader, indexer, Arc::new(ComparisonEvaluator::new()))
    }

    /// Engine with a host-supplied filter evaluator.
    pub fn with_evaluator(
        config: EngineConfig,
        loader: Arc<dyn FieldLoader>,
        indexer: Arc<dyn DocumentIndexer>,
        evaluator: Arc<dyn FilterEvaluator>,
    ) -> Self {
        let pipeline = AsyncIndexPipeline::start(
            config.queue_capacity,
            config.workers,
            loader.clone(),
            indexer.clone(),
        );
        RoutingEngine {
            config,
            rules: RwLock::new(RuleRegistry::new(evaluator)),
            indexes: IndexRegistry::new(),
            pipeline,
            loader,
            indexer,
        }
    }

    /// Registers a new index and returns its handle.
    pub fn create_index(&self, name: &str, mode: IndexingMode) -> Arc<SearchIndex> {
        let index = Arc::new(SearchIndex::new(name, mode));
        self.indexes.register(index.clone());
        index
    }

    /// Removes an index: its rules first (so the matcher can no longer
    /// produce it), then the index itself. Its doc table is freed with
    /// the last handle; pending async jobs for it become no-ops.
    pub fn drop_index(&self, name: &str) {
        {
            let mut rules = self.rules.write().expect("rule registry poisoned");
            rules.remove_index(name);
        }
        self.indexes.unregister(name);
    }

    pub fn index(&self, name: &str) -> Option<Arc<SearchIndex>> {
        self.indexes.get(name)
    }

    /// Defines a rule for a registered index from raw argument tokens.
    pub fn add_rule(&self, index: &str, name: &str, raw_args: &[String]) -> RuleResult<()> {
        if self.indexes.get(index).is_none() {
            return Err(RuleError::UnknownIndex(index.to_string()));
        }
        let mut rules = self.rules.write().expect("rule registry poisoned");
        rules.add_rule(index, name, raw_args)?;
        Ok(())
    }

    /// Inbound handler: a record was written. Matching or dispatch
    /// failures are logged and swallowed.
    pub fn notify_key_mutated(&self, key: &RecordKey) {
        if let Err(err) = self.process_item(key, ProcessOptions::default()) {
            Logger::warn(
                "PROCESS_ITEM_FAILED",
                &[("key", key.as_str()), ("error", &err.to_string())],
            );
        }
    }

    /// Inbound handler: a record was deleted, expired, or evicted.
    pub fn notify_key_deleted(&self, key: &RecordKey) {
        self.process_delete(key);
    }

    /// Resolves `key`'s match set and indexes it under each matching
    /// index, inline or through the pipeline per index configuration.
    pub fn process_item(&self, key: &RecordKey, options: ProcessOptions) -> EngineResult<()> {
        let (actions, preloaded) = self.match_actions(key);
        let mut fields_cache = preloaded;

        for action in actions {
            let index = match self.indexes.get(&action.index) {
                Some(index) => index,
                // Rule outlived its index; nothing to do.
                None => continue,
            };

            if options.no_reindex && index.docs().get_id(key).is_some() {
                continue;
            }

            if options.force_async || index.mode() == IndexingMode::Async {
                self.pipeline.submit(IndexJob {
                    index,
                    key: key.clone(),
                    attrs: action.attrs,
                })?;
            } else {
                self.index_sync(&index, key, &action.attrs, &mut fields_cache)?;
            }
        }
        Ok(())
    }

    /// Delete path: always synchronous, no matching step. A record that
    /// no longer exists cannot be re-evaluated against a filter, so the
    /// identity entry is removed from every index unconditionally.
    pub fn process_delete(&self, key: &RecordKey) {
        for index in self.indexes.all() {
            index.docs().remove(key);
        }
    }

    /// Persists the rule registry.
    pub fn save_rules<W: std::io::Write>(&self, writer: &mut W) -> SnapshotResult<()> {
        let rules = self.rules.read().expect("rule registry poisoned");
        snapshot::write_snapshot(&rules, writer)
    }

    /// Reloads a rule snapshot. Fatal on any malformed rule; partial
    /// loads do not happen.
    pub fn load_rules<R: std::io::Read>(&self, reader: &mut R) -> SnapshotResult<()> {
        let mut rules = self.rules.write().expect("rule registry poisoned");
        snapshot::load_snapshot(reader, &mut rules)
    }

    /// Stops the async pipeline: in-flight jobs finish, pending jobs
    /// are dropped.
    pub fn shutdown(&self) {
        self.pipeline.shutdown();
    }

    pub fn pipeline_stats(&self) -> PipelineStatsSnapshot {
        self.pipeline.stats()
    }

    /// Runs the matcher under the rules read lock, handing back the
    /// actions plus any fields the filter pass already loaded so the
    /// sync path does not load them twice.
    fn match_actions(&self, key: &RecordKey) -> (Vec<MatchAction>, Option<DocumentFields>) {
        let rules = self.rules.read().expect("rule registry poisoned");
        let mut accessor = LazyAccessor::new(key, self.loader.as_ref());
        let actions = match_key(&rules, key, &mut accessor, &self.config.default_language);
        let preloaded = accessor.take_loaded().and_then(|result| result.ok());
        (actions, preloaded)
    }

    /// Inline indexing: load fields (unless the matcher already did),
    /// hand the document downstream, then commit the identity entry.
    fn index_sync(
        &self,
        index: &Arc<SearchIndex>,
        key: &RecordKey,
        attrs: &IndexAttrs,
        fields_cache: &mut Option<DocumentFields>,
    ) -> EngineResult<()> {
        let fields = match fields_cache {
            Some(fields) => fields.clone(),
            None => match self.loader.load_fields(key) {
                Ok(fields) => {
                    *fields_cache = Some(fields.clone());
                    fields
                }
                Err(err) => {
                    // Unloadable record: skipped, not retried.
                    Logger::warn(
                        "FIELD_LOAD_FAILED",
                        &[("key", key.as_str()), ("error", &err.to_string())],
                    );
                    return Ok(());
                }
            },
        };

        let document = LoadedDocument::new(key.clone(), fields);
        match self.indexer.index_document(index.name(), &document, attrs) {
            Ok(()) => {
                index.docs().get_or_assign(key, attrs);
                Ok(())
            }
            // Outside this index's field set: successful no-op.
            Err(IndexError::NoIndexableFields) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
