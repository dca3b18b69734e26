//! Batch Scheduler
//!
//! Drives a batch of generation jobs through a bounded worker pool: targets
//! drain from a FIFO queue into at most `concurrency` concurrently running
//! jobs, and a new job is admitted the moment a running one reaches a
//! terminal outcome.
//!
//! The scheduler is single-flight: one batch at a time, guarded by an atomic
//! flag that is set together with the admission check so near-simultaneous
//! submissions cannot both proceed. Once started, a batch runs every admitted
//! job to a terminal outcome even if the caller drops the returned handle.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::core::{CoreError, CoreResult, EntityId};

/// Default number of concurrent generation calls
pub const DEFAULT_CONCURRENCY: usize = 3;

// =============================================================================
// Outcomes
// =============================================================================

/// Terminal outcome of one scheduled job
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobOutcome {
    /// The generation call succeeded
    Completed,
    /// The generation call failed; siblings are unaffected
    Failed,
    /// The target vanished before the job could run (e.g. deleted mid-batch)
    Skipped,
}

/// Aggregate result of a finished batch
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub completed: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl BatchSummary {
    /// Total number of jobs that ran
    pub fn total(&self) -> usize {
        self.completed + self.failed + self.skipped
    }

    fn tally(&mut self, outcome: JobOutcome) {
        match outcome {
            JobOutcome::Completed => self.completed += 1,
            JobOutcome::Failed => self.failed += 1,
            JobOutcome::Skipped => self.skipped += 1,
        }
    }

    fn merge(&mut self, other: BatchSummary) {
        self.completed += other.completed;
        self.failed += other.failed;
        self.skipped += other.skipped;
    }
}

// =============================================================================
// Batch Handle
// =============================================================================

/// Handle to a running batch. Dropping the handle does not stop the batch;
/// every admitted job still runs to a terminal outcome.
#[derive(Debug)]
pub struct BatchHandle {
    supervisor: tokio::task::JoinHandle<BatchSummary>,
}

impl BatchHandle {
    /// Waits for the batch to finish and returns its summary
    pub async fn wait(self) -> CoreResult<BatchSummary> {
        self.supervisor
            .await
            .map_err(|e| CoreError::Internal(format!("batch supervisor failed: {}", e)))
    }
}

// =============================================================================
// Batch Scheduler
// =============================================================================

/// Bounded-concurrency, single-flight batch scheduler
#[derive(Debug)]
pub struct BatchScheduler {
    /// Maximum number of jobs in flight
    concurrency: usize,
    /// Single-flight guard; set atomically with the admission check
    active: Arc<AtomicBool>,
}

impl BatchScheduler {
    /// Creates a scheduler with the given concurrency cap (minimum 1)
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
            active: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Creates a scheduler with the default concurrency cap
    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_CONCURRENCY)
    }

    /// The configured concurrency cap
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Whether a batch is currently running
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Submits a batch of targets, running `run` for each under the
    /// concurrency cap.
    ///
    /// Targets are admitted in queue order; completion order is
    /// unconstrained. Returns [`CoreError::BatchActive`] if another batch is
    /// still running.
    pub fn submit<F, Fut>(&self, targets: Vec<EntityId>, run: F) -> CoreResult<BatchHandle>
    where
        F: Fn(EntityId) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = JobOutcome> + Send + 'static,
    {
        if self
            .active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("batch rejected: another batch is already running");
            return Err(CoreError::BatchActive);
        }

        let queue_len = targets.len();
        let worker_count = self.concurrency.min(queue_len).max(1);
        info!(targets = queue_len, workers = worker_count, "batch started");

        let queue = Arc::new(Mutex::new(VecDeque::from(targets)));
        let run = Arc::new(run);

        let mut workers = Vec::with_capacity(worker_count);
        for worker_id in 0..worker_count {
            let queue = Arc::clone(&queue);
            let run = Arc::clone(&run);

            workers.push(tokio::spawn(async move {
                let mut summary = BatchSummary::default();
                loop {
                    // Admission: pull the next queued target, FIFO
                    let next = queue.lock().unwrap().pop_front();
                    let Some(target) = next else { break };

                    let outcome = run(target).await;
                    summary.tally(outcome);
                }
                tracing::debug!(worker_id, ?summary, "batch worker drained");
                summary
            }));
        }

        let active = Arc::clone(&self.active);
        let supervisor = tokio::spawn(async move {
            let mut summary = BatchSummary::default();
            for worker in workers {
                match worker.await {
                    Ok(worker_summary) => summary.merge(worker_summary),
                    Err(e) => warn!("batch worker panicked: {}", e),
                }
            }
            // The guard is released exactly once, after every admitted job
            // reached a terminal outcome.
            active.store(false, Ordering::SeqCst);
            info!(?summary, "batch finished");
            summary
        });

        Ok(BatchHandle { supervisor })
    }
}

impl Default for BatchScheduler {
    fn default() -> Self {
        Self::with_defaults()
    }
}

// =============================================================================
// Tests
// =============================================================================
