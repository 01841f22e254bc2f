//! Async Indexing Pipeline
//!
//! Bounded job queue serviced by a fixed pool of worker threads.
//! Deferred jobs perform the same load-and-index operation as the
//! inline path, off the notification path.
//!
//! # Contract
//!
//! - `submit` blocks the notification thread when the queue is full.
//!   Backpressure by design: a flood of writes slows down rather than
//!   growing unbounded pending work. No job is silently dropped while
//!   the pipeline is running.
//! - Workers pull jobs in FIFO order. A job whose target index was torn
//!   down before dequeue is discarded without doing any work.
//! - Duplicate pending jobs for one key are not coalesced; correctness
//!   comes from `DocumentIndexer` being idempotent per (index, key).
//! - `shutdown` stops the workers after their in-flight job; pending
//!   jobs are drained off the queue and discarded. Queued jobs are
//!   never persisted across restarts.
//! - A worker re-checks record existence under the doc-table lock
//!   before committing, so a job racing a delete cannot resurrect the
//!   deleted document's identity entry.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crossbeam_channel::{bounded, Receiver, Sender};
use thiserror::Error;

use crate::document::{IndexAttrs, LoadedDocument, RecordKey};
use crate::index::{DocumentIndexer, FieldLoader, IndexError, LoadError, SearchIndex};
use crate::observability::Logger;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Clone, Error)]
pub enum PipelineError {
    /// Submission after shutdown
    #[error("Indexing pipeline is shut down")]
    ShutDown,
}

/// One deferred indexing job.
#[derive(Debug)]
pub struct IndexJob {
    pub index: Arc<SearchIndex>,
    pub key: RecordKey,
    pub attrs: IndexAttrs,
}

/// Monotonic job counters. `submitted` counts accepted submissions;
/// every submitted job eventually lands in exactly one of the other
/// three buckets.
#[derive(Debug, Default)]
pub struct PipelineStats {
    submitted: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineStatsSnapshot {
    pub submitted: u64,
    pub completed: u64,
    pub failed: u64,
    pub dropped: u64,
}

impl PipelineStats {
    fn snapshot(&self) -> PipelineStatsSnapshot {
        PipelineStatsSnapshot {
            submitted: self.submitted.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

/// Bounded queue plus fixed worker pool.
pub struct AsyncIndexPipeline {
    sender: Mutex<Option<Sender<IndexJob>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    draining: Arc<AtomicBool>,
    stats: Arc<PipelineStats>,
}

impl AsyncIndexPipeline {
    /// Starts `workers` threads over a queue of `capacity` slots.
    pub fn start(
        capacity: usize,
        workers: usize,
        loader: Arc<dyn FieldLoader>,
        indexer: Arc<dyn DocumentIndexer>,
    ) -> Self {
        let (tx, rx) = bounded::<IndexJob>(capacity);
        let draining = Arc::new(AtomicBool::new(false));
        let stats = Arc::new(PipelineStats::default());

        let mut handles = Vec::with_capacity(workers);
        for n in 0..workers {
            let worker = Worker {
                receiver: rx.clone(),
                loader: loader.clone(),
                indexer: indexer.clone(),
                draining: draining.clone(),
                stats: stats.clone(),
            };
            let handle = std::thread::Builder::new()
                .name(format!("sift-index-{}", n))
                .spawn(move || worker.run())
                .expect("failed to spawn indexing worker");
            handles.push(handle);
        }

        AsyncIndexPipeline {
            sender: Mutex::new(Some(tx)),
            workers: Mutex::new(handles),
            draining,
            stats,
        }
    }

    /// Enqueues a job, blocking while the queue is at capacity.
    pub fn submit(&self, job: IndexJob) -> PipelineResult<()> {
        let sender = {
            let guard = self.sender.lock().expect("pipeline sender poisoned");
            match guard.as_ref() {
                Some(tx) => tx.clone(),
                None => return Err(PipelineError::ShutDown),
            }
        };
        // Blocking send outside the lock so producers only contend on
        // the queue itself.
        sender.send(job).map_err(|_| PipelineError::ShutDown)?;
        self.stats.submitted.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Stops the pool: in-flight jobs finish, pending jobs are dropped.
    /// Idempotent.
    pub fn shutdown(&self) {
        self.draining.store(true, Ordering::Release);
        {
            let mut guard = self.sender.lock().expect("pipeline sender poisoned");
            guard.take();
        }
        let mut workers = self.workers.lock().expect("pipeline workers poisoned");
        for handle in workers.drain(..) {
            let _ = handle.join();
        }
    }

    pub fn stats(&self) -> PipelineStatsSnapshot {
        self.stats.snapshot()
    }
}

impl Drop for AsyncIndexPipeline {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct Worker {
    receiver: Receiver<IndexJob>,
    loader: Arc<dyn FieldLoader>,
    indexer: Arc<dyn DocumentIndexer>,
    draining: Arc<AtomicBool>,
    stats: Arc<PipelineStats>,
}

impl Worker {
    fn run(self) {
        while let Ok(job) = self.receiver.recv() {
            if self.draining.load(Ordering::Acquire) {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                continue;
            }
            self.execute(job);
        }
        // Channel disconnected: all producers gone, pool is done.
    }

    fn execute(&self, job: IndexJob) {
        if job.index.is_torn_down() {
            self.stats.dropped.fetch_add(1, Ordering::Relaxed);
            return;
        }

        let fields = match self.loader.load_fields(&job.key) {
            Ok(fields) => fields,
            Err(LoadError::KeyNotFound(_)) => {
                // Deleted between enqueue and execution.
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                return;
            }
            Err(err) => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                Logger::warn(
                    "ASYNC_INDEX_LOAD_FAILED",
                    &[
                        ("index", job.index.name()),
                        ("key", job.key.as_str()),
                        ("error", &err.to_string()),
                    ],
                );
                return;
            }
        };

        let document = LoadedDocument::new(job.key.clone(), fields);
        match self
            .indexer
            .index_document(job.index.name(), &document, &job.attrs)
        {
            Ok(()) => {}
            Err(IndexError::NoIndexableFields) => {
                // Record legitimately outside this index's field set: a
                // successful no-op, and no identity entry is created.
                self.stats.completed.fetch_add(1, Ordering::Relaxed);
                return;
            }
            Err(err) => {
                // No caller to report to; the log line is the record.
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                Logger::warn(
                    "ASYNC_INDEX_FAILED",
                    &[
                        ("index", job.index.name()),
                        ("key", job.key.as_str()),
                        ("error", &err.to_string()),
                    ],
                );
                return;
            }
        }

        // Commit the identity entry only if the record still exists.
        // Check and insert happen under the doc-table lock; the delete
        // path takes the same lock, so a concurrent delete either ran
        // before (exists() is false, result discarded) or runs after
        // and removes the entry we are about to add.
        let mut docs = job.index.docs();
        if self.loader.exists(&job.key) {
            docs.get_or_assign(&job.key, &job.attrs);
            self.stats.completed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.stats.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }
}
