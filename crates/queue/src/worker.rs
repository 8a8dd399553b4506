//! The worker pool: N concurrent claim loops over the shared queue.
//!
//! Each loop polls for available work, executes it, and applies the retry
//! policy on transient failures. Claims use `SKIP LOCKED`, so pools in
//! multiple processes coexist without double-dispatch.

use std::sync::Arc;
use std::time::Duration;

use quadcalc_core::retry::RetryPolicy;
use quadcalc_db::models::queue_entry::QueueEntry;
use quadcalc_db::repositories::{JobRepo, QueueRepo};
use quadcalc_db::DbPool;
use tokio_util::sync::CancellationToken;

use crate::executor::JobExecutor;
use crate::payload::ComputeJobPayload;

/// Default number of concurrent claim loops.
const DEFAULT_CONCURRENCY: usize = 4;

/// Default polling interval when the queue is empty.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Tunables for the worker pool.
#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    /// Number of concurrent claim loops in this process.
    pub concurrency: usize,
    /// How often an idle loop re-checks the queue.
    pub poll_interval: Duration,
    /// Backoff schedule applied when a claimed item fails transiently.
    pub retry: RetryPolicy,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            poll_interval: DEFAULT_POLL_INTERVAL,
            retry: RetryPolicy::default(),
        }
    }
}

impl WorkerPoolConfig {
    /// Load configuration from environment variables.
    ///
    /// | Env Var                  | Default |
    /// |--------------------------|---------|
    /// | `WORKER_CONCURRENCY`     | `4`     |
    /// | `WORKER_POLL_INTERVAL_MS`| `1000`  |
    pub fn from_env() -> Self {
        let concurrency: usize = std::env::var("WORKER_CONCURRENCY")
            .unwrap_or_else(|_| DEFAULT_CONCURRENCY.to_string())
            .parse()
            .expect("WORKER_CONCURRENCY must be a valid usize");

        let poll_interval_ms: u64 = std::env::var("WORKER_POLL_INTERVAL_MS")
            .unwrap_or_else(|_| DEFAULT_POLL_INTERVAL.as_millis().to_string())
            .parse()
            .expect("WORKER_POLL_INTERVAL_MS must be a valid u64");

        Self {
            concurrency,
            poll_interval: Duration::from_millis(poll_interval_ms),
            retry: RetryPolicy::default(),
        }
    }
}

/// A pool of claim loops sharing one executor.
pub struct WorkerPool {
    pool: DbPool,
    executor: Arc<JobExecutor>,
    config: WorkerPoolConfig,
}

impl WorkerPool {
    pub fn new(pool: DbPool, executor: JobExecutor, config: WorkerPoolConfig) -> Self {
        Self {
            pool,
            executor: Arc::new(executor),
            config,
        }
    }

    /// Spawn the claim loops. They run until `cancel` is triggered; await
    /// the returned handles to drain in-flight work during shutdown.
    pub fn start(&self, cancel: CancellationToken) -> Vec<tokio::task::JoinHandle<()>> {
        tracing::info!(
            concurrency = self.config.concurrency,
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            "Worker pool starting",
        );

        (0..self.config.concurrency)
            .map(|worker_id| {
                let pool = self.pool.clone();
                let executor = Arc::clone(&self.executor);
                let config = self.config.clone();
                let cancel = cancel.clone();
                tokio::spawn(async move {
                    run_worker(worker_id, pool, executor, config, cancel).await;
                })
            })
            .collect()
    }
}

/// One claim loop: tick, drain the queue, repeat until cancelled.
async fn run_worker(
    worker_id: usize,
    pool: DbPool,
    executor: Arc<JobExecutor>,
    config: WorkerPoolConfig,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(config.poll_interval);
    tracing::info!(worker_id, "Worker started");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!(worker_id, "Worker shutting down");
                break;
            }
            _ = ticker.tick() => {
                drain_queue(worker_id, &pool, &executor, &config, &cancel).await;
            }
        }
    }
}

/// Claim and process items until the queue is empty (or we are cancelled).
async fn drain_queue(
    worker_id: usize,
    pool: &DbPool,
    executor: &JobExecutor,
    config: &WorkerPoolConfig,
    cancel: &CancellationToken,
) {
    while !cancel.is_cancelled() {
        let entry = match QueueRepo::claim_next(pool).await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                tracing::error!(worker_id, error = %e, "Failed to claim from queue");
                break;
            }
        };

        if let Err(e) = process_entry(worker_id, pool, executor, config, &entry).await {
            tracing::error!(
                worker_id,
                job_id = entry.job_id,
                error = %e,
                "Failed to finalize claimed work item",
            );
        }
    }
}

/// Execute one claimed entry and settle it against the queue: remove on a
/// terminal outcome, release with backoff on a transient failure, or mark
/// the job FAILED once attempts are exhausted.
async fn process_entry(
    worker_id: usize,
    pool: &DbPool,
    executor: &JobExecutor,
    config: &WorkerPoolConfig,
    entry: &QueueEntry,
) -> Result<(), sqlx::Error> {
    let payload = match ComputeJobPayload::try_from(entry) {
        Ok(payload) => payload,
        Err(e) => {
            // An entry the executor can never serve; settle the job so it
            // does not hang and drop the work item.
            tracing::error!(job_id = entry.job_id, error = %e, "Dropping unservable queue entry");
            JobRepo::fail(pool, entry.job_id, "Unservable work item").await?;
            QueueRepo::remove(pool, entry.job_id).await?;
            return Ok(());
        }
    };

    match executor.execute(&payload).await {
        Ok(outcome) => {
            tracing::info!(
                worker_id,
                job_id = payload.job_id,
                run_id = payload.run_id,
                operation = %payload.operation,
                ?outcome,
                "Job settled",
            );
            QueueRepo::remove(pool, entry.job_id).await?;
        }
        Err(e) if entry.attempts >= entry.max_attempts => {
            tracing::error!(
                worker_id,
                job_id = payload.job_id,
                attempts = entry.attempts,
                error = %e,
                "Job failed on final attempt",
            );
            let message = format!("Failed after {} attempts: {e}", entry.attempts);
            match executor.settle_failed(&payload, &message).await {
                Ok(()) => {
                    QueueRepo::remove(pool, entry.job_id).await?;
                }
                Err(settle_err) => {
                    // Could not even record the failure; put the entry back
                    // so a later claim settles it instead of losing the job.
                    tracing::error!(
                        job_id = payload.job_id,
                        error = %settle_err,
                        "Failed to settle exhausted job; releasing for another pass",
                    );
                    QueueRepo::release(pool, entry.job_id, config.retry.initial_delay).await?;
                }
            }
        }
        Err(e) => {
            let delay = config.retry.delay_after_attempt(entry.attempts.max(1) as u32);
            tracing::warn!(
                worker_id,
                job_id = payload.job_id,
                attempts = entry.attempts,
                delay_ms = delay.as_millis() as u64,
                error = %e,
                "Transient job failure; releasing for retry",
            );
            QueueRepo::release(pool, entry.job_id, delay).await?;
        }
    }

    Ok(())
}
