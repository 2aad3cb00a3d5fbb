//! Bounded concurrency pipeline.
//!
//! A single producer hands units of work to a fixed pool of worker threads.
//! Two admission gates bound the work in flight: an unbounded task counter
//! used for [`Pipeline::drain`], and a byte counter that blocks
//! [`Pipeline::submit`] while the outstanding estimated size is at or above
//! the configured memory budget.
//!
//! Each worker owns a lazily opened sink for its whole life. Sinks are handed
//! back when the workers exit and closed exactly once by
//! [`Pipeline::shutdown`].

mod gate;
mod worker;

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
};

use flume::Sender;
use thiserror::Error;

use self::gate::AdmissionGate;
use crate::{
    observability::{log_debug, log_info, log_warn},
    sink::{Connector, Sink},
};

/// Default memory budget: 128 MiB.
pub const DEFAULT_MEMORY_BUDGET: usize = 128 * 1024 * 1024;

/// Result of running one unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// The unit completed.
    Succeeded,
    /// The unit failed; the message is logged and counted, never propagated.
    Failed(String),
}

impl<E: std::fmt::Display> From<Result<(), E>> for JobOutcome {
    fn from(result: Result<(), E>) -> Self {
        match result {
            Ok(()) => JobOutcome::Succeeded,
            Err(err) => JobOutcome::Failed(err.to_string()),
        }
    }
}

type Job<S> = Box<dyn FnOnce(&mut S) -> JobOutcome + Send>;

struct Task<S> {
    id: u64,
    size: usize,
    job: Job<S>,
}

/// Worker pool sizing and memory budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOptions {
    pub(crate) threads: usize,
    pub(crate) memory_budget: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            threads: 1,
            memory_budget: DEFAULT_MEMORY_BUDGET,
        }
    }
}

impl PipelineOptions {
    /// Number of worker threads.
    pub fn threads(self, threads: usize) -> Self {
        Self { threads, ..self }
    }

    /// Byte budget for admitted-but-unfinished work.
    pub fn memory_budget(self, memory_budget: usize) -> Self {
        Self {
            memory_budget,
            ..self
        }
    }
}

/// Errors surfaced to the producer.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A pipeline needs at least one worker.
    #[error("pipeline requires at least one worker thread")]
    NoWorkers,
    /// A zero byte budget would never admit a unit.
    #[error("pipeline memory budget must be greater than zero")]
    NoMemory,
    /// A worker thread could not be spawned.
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
    /// Every worker has exited; nothing can accept work.
    #[error("pipeline closed")]
    Closed,
}

/// Counters observed once the pipeline has shut down.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub struct PipelineStats {
    /// Units handed to workers.
    pub submitted: u64,
    /// Units whose job returned [`JobOutcome::Succeeded`].
    pub succeeded: u64,
    /// Units that failed, including connection failures.
    pub failed: u64,
    /// Sinks opened across all workers.
    pub connections: u64,
}

pub(crate) struct Shared {
    tasks: AdmissionGate,
    bytes: AdmissionGate,
    succeeded: AtomicU64,
    failed: AtomicU64,
    connections: AtomicU64,
}

impl Shared {
    fn finish(&self, size: usize, outcome: &JobOutcome) {
        match outcome {
            JobOutcome::Succeeded => self.succeeded.fetch_add(1, Ordering::Relaxed),
            JobOutcome::Failed(_) => self.failed.fetch_add(1, Ordering::Relaxed),
        };
        self.bytes.release(size);
        self.tasks.release(1);
    }

    fn record_connection(&self) {
        self.connections.fetch_add(1, Ordering::Relaxed);
    }
}

/// Fixed worker pool with memory-bounded admission.
pub struct Pipeline<C: Connector> {
    sender: Option<Sender<Task<C::Sink>>>,
    workers: Vec<JoinHandle<Option<C::Sink>>>,
    shared: Arc<Shared>,
    next_id: AtomicU64,
}

impl<C: Connector> Pipeline<C> {
    /// Start `options.threads` workers that open sinks through `connector`.
    pub fn new(connector: Arc<C>, options: PipelineOptions) -> Result<Self, PipelineError> {
        if options.threads == 0 {
            return Err(PipelineError::NoWorkers);
        }
        if options.memory_budget == 0 {
            return Err(PipelineError::NoMemory);
        }
        let shared = Arc::new(Shared {
            tasks: AdmissionGate::unbounded(),
            bytes: AdmissionGate::new(options.memory_budget),
            succeeded: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            connections: AtomicU64::new(0),
        });
        let (sender, receiver) = flume::unbounded();

        let mut pipeline = Pipeline {
            sender: Some(sender),
            workers: Vec::with_capacity(options.threads),
            shared,
            next_id: AtomicU64::new(0),
        };
        for index in 0..options.threads {
            let connector = Arc::clone(&connector);
            let receiver = receiver.clone();
            let shared = Arc::clone(&pipeline.shared);
            let handle = thread::Builder::new()
                .name(format!("columnload-worker-{index}"))
                .spawn(move || worker::run(index, connector, receiver, shared))?;
            pipeline.workers.push(handle);
        }

        log_info!(
            "pipeline",
            "pipeline_started",
            threads = options.threads,
            memory_budget = options.memory_budget,
        );
        Ok(pipeline)
    }

    /// Admit a unit of estimated `size` bytes and hand it to a worker.
    ///
    /// Blocks while outstanding bytes are at or above the budget, then returns
    /// as soon as the unit is queued. The job receives the worker's sink; its
    /// captured data is dropped on the worker once it returns.
    pub fn submit<F>(&self, size: usize, job: F) -> Result<(), PipelineError>
    where
        F: FnOnce(&mut C::Sink) -> JobOutcome + Send + 'static,
    {
        let sender = self.sender.as_ref().ok_or(PipelineError::Closed)?;
        self.shared.bytes.admit(size);
        self.shared.tasks.admit(1);

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let task = Task {
            id,
            size,
            job: Box::new(job),
        };
        if sender.send(task).is_err() {
            self.shared.tasks.release(1);
            self.shared.bytes.release(size);
            return Err(PipelineError::Closed);
        }
        log_debug!("pipeline", "task_submitted", task = id, size);
        Ok(())
    }

    /// Account for `size` producer-held bytes until the guard is dropped.
    ///
    /// Waits while admitted plus reserved bytes are at or above the budget.
    pub fn reserve(&self, size: usize) -> Reservation<'_> {
        self.shared.bytes.reserve(size);
        Reservation {
            gate: &self.shared.bytes,
            size,
        }
    }

    /// Block until every submitted unit has completed.
    pub fn drain(&self) {
        self.shared.tasks.wait_idle();
    }

    /// Units submitted but not yet completed.
    pub fn outstanding_tasks(&self) -> usize {
        self.shared.tasks.admitted()
    }

    /// Estimated bytes of submitted but not yet completed units.
    pub fn outstanding_bytes(&self) -> usize {
        self.shared.bytes.admitted()
    }

    /// Configured memory budget.
    pub fn memory_budget(&self) -> usize {
        self.shared.bytes.limit()
    }

    /// Snapshot of the counters.
    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            submitted: self.next_id.load(Ordering::Relaxed),
            succeeded: self.shared.succeeded.load(Ordering::Relaxed),
            failed: self.shared.failed.load(Ordering::Relaxed),
            connections: self.shared.connections.load(Ordering::Relaxed),
        }
    }

    /// Drain, stop the workers and close every sink they opened.
    pub fn shutdown(mut self) -> PipelineStats {
        self.drain();
        self.stop_workers();
        let stats = self.stats();
        log_info!(
            "pipeline",
            "pipeline_stopped",
            submitted = stats.submitted,
            succeeded = stats.succeeded,
            failed = stats.failed,
            connections = stats.connections,
        );
        stats
    }

    fn stop_workers(&mut self) {
        // Closing the channel lets idle workers fall out of `recv`.
        self.sender = None;
        for handle in self.workers.drain(..) {
            match handle.join() {
                Ok(Some(sink)) => {
                    if let Err(err) = sink.close() {
                        log_warn!("pipeline", "sink_close_failed", error = %err);
                    }
                }
                Ok(None) => {}
                Err(_) => {
                    log_warn!("pipeline", "worker_panicked");
                }
            }
        }
    }
}

impl<C: Connector> Drop for Pipeline<C> {
    fn drop(&mut self) {
        if !self.workers.is_empty() {
            self.stop_workers();
        }
    }
}

/// Producer-side hold on the byte budget, released on drop.
#[must_use = "the reservation is released as soon as it is dropped"]
pub struct Reservation<'a> {
    gate: &'a AdmissionGate,
    size: usize,
}

impl Reservation<'_> {
    /// Reserved bytes.
    pub fn size(&self) -> usize {
        self.size
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        self.gate.unreserve(self.size);
    }
}
