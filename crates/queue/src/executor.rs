//! Worker-side execution of one claimed work item.
//!
//! Drives a job through its state machine, publishing a progress event at
//! the IN_PROGRESS transition and at the terminal transition, then hands
//! the run to the aggregator. Business failures settle the job; transient
//! failures bubble up so the worker loop can apply the queue's backoff.

use quadcalc_core::ops::ComputeError;
use quadcalc_db::models::status::JobStatus;
use quadcalc_db::repositories::JobRepo;
use quadcalc_db::DbPool;
use quadcalc_events::{publish_progress, ProgressEvent, PublishError};
use quadcalc_llm::{verify_result, LlmClient};

use crate::aggregator::recompute_run_status;
use crate::payload::ComputeJobPayload;

/// How an executed job settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Completed,
    Failed,
}

/// Transient failures during execution. The queue retries these; a
/// deterministic business failure never surfaces here.
#[derive(Debug, thiserror::Error)]
pub enum ExecuteError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Publish(#[from] PublishError),
}

/// Executes claimed work items against the database and the progress
/// channel, with an optional LLM cross-check.
pub struct JobExecutor {
    pool: DbPool,
    verifier: Option<LlmClient>,
}

impl JobExecutor {
    pub fn new(pool: DbPool, verifier: Option<LlmClient>) -> Self {
        if verifier.is_none() {
            tracing::info!("LLM verification disabled; jobs use deterministic results only");
        }
        Self { pool, verifier }
    }

    /// Execute one claimed work item to a terminal outcome.
    ///
    /// Returns `Err` only for transient faults; the caller releases the
    /// work item for retry or, once attempts are exhausted, settles the
    /// job via [`settle_failed`](Self::settle_failed).
    pub async fn execute(&self, payload: &ComputeJobPayload) -> Result<JobOutcome, ExecuteError> {
        // Claim transition. A no-op when this is a retry of an already
        // claimed job -- the IN_PROGRESS event is published exactly once.
        let transitioned = JobRepo::mark_in_progress(&self.pool, payload.job_id).await?;
        if transitioned {
            let completed_count = JobRepo::count_terminal(&self.pool, payload.run_id).await?;
            publish_progress(
                &self.pool,
                &ProgressEvent::in_progress(
                    payload.run_id,
                    payload.job_id,
                    payload.operation,
                    completed_count,
                ),
            )
            .await?;
        } else if let Some(outcome) = self.settled_outcome(payload).await? {
            // Duplicate delivery of an already settled job: nothing to do.
            return Ok(outcome);
        }

        tracing::debug!(
            job_id = payload.job_id,
            run_id = payload.run_id,
            operation = %payload.operation,
            "Executing job",
        );

        let expected = match payload.operation.apply(payload.number_a, payload.number_b) {
            Ok(value) => value,
            Err(business @ ComputeError::DivisionByZero) => {
                // Deterministic, non-retryable outcome for this job.
                self.settle_failed(payload, &business.to_string()).await?;
                return Ok(JobOutcome::Failed);
            }
        };

        // Optional cross-check. Never changes the persisted value.
        let llm_response = match &self.verifier {
            Some(client) => {
                verify_result(
                    client,
                    payload.operation,
                    payload.number_a,
                    payload.number_b,
                    expected,
                )
                .await
                .llm_response
            }
            None => None,
        };

        JobRepo::complete(&self.pool, payload.job_id, expected, llm_response.as_deref()).await?;

        let completed_count = JobRepo::count_terminal(&self.pool, payload.run_id).await?;
        publish_progress(
            &self.pool,
            &ProgressEvent::completed(
                payload.run_id,
                payload.job_id,
                payload.operation,
                expected,
                completed_count,
            ),
        )
        .await?;

        recompute_run_status(&self.pool, payload.run_id).await?;

        Ok(JobOutcome::Completed)
    }

    /// Settle a job as FAILED: persist the error, publish the terminal
    /// event, and re-aggregate the run.
    ///
    /// Used for business failures and for queue exhaustion, so no job
    /// stays non-terminal after the queue gives up.
    pub async fn settle_failed(
        &self,
        payload: &ComputeJobPayload,
        error: &str,
    ) -> Result<(), ExecuteError> {
        JobRepo::fail(&self.pool, payload.job_id, error).await?;

        tracing::warn!(
            job_id = payload.job_id,
            run_id = payload.run_id,
            operation = %payload.operation,
            error,
            "Job failed",
        );

        let completed_count = JobRepo::count_terminal(&self.pool, payload.run_id).await?;
        publish_progress(
            &self.pool,
            &ProgressEvent::failed(
                payload.run_id,
                payload.job_id,
                payload.operation,
                error,
                completed_count,
            ),
        )
        .await?;

        recompute_run_status(&self.pool, payload.run_id).await?;
        Ok(())
    }

    /// The job's terminal outcome, if it already settled.
    async fn settled_outcome(
        &self,
        payload: &ComputeJobPayload,
    ) -> Result<Option<JobOutcome>, ExecuteError> {
        let Some(job) = JobRepo::find_by_id(&self.pool, payload.job_id).await? else {
            tracing::warn!(job_id = payload.job_id, "Claimed work item has no job row");
            return Ok(Some(JobOutcome::Failed));
        };
        Ok(match JobStatus::from_id(job.status_id) {
            Some(JobStatus::Completed) => Some(JobOutcome::Completed),
            Some(JobStatus::Failed) => Some(JobOutcome::Failed),
            _ => None,
        })
    }
}
