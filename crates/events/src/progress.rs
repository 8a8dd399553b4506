//! The transient progress event broadcast on every job state change.

use quadcalc_core::ops::Operation;
use quadcalc_core::types::DbId;
use quadcalc_db::models::status::JobStatus;
use quadcalc_db::DbPool;
use serde::{Deserialize, Serialize};

use crate::bridge::PROGRESS_CHANNEL;

/// Every run owns exactly this many jobs.
pub const TOTAL_JOBS_PER_RUN: i64 = 4;

/// A job state change, with the run-level tally at the time of publishing.
///
/// Ephemeral: broadcast to live subscribers and never persisted. A
/// subscriber that attaches late reconciles through the run snapshot
/// endpoint instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub run_id: DbId,
    pub job_id: DbId,
    pub operation: Operation,
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// COMPLETED + FAILED jobs of the run at publish time.
    pub completed_count: i64,
    pub total_count: i64,
}

impl ProgressEvent {
    /// Event for a job entering IN_PROGRESS.
    pub fn in_progress(
        run_id: DbId,
        job_id: DbId,
        operation: Operation,
        completed_count: i64,
    ) -> Self {
        Self {
            run_id,
            job_id,
            operation,
            status: JobStatus::InProgress,
            result: None,
            error: None,
            completed_count,
            total_count: TOTAL_JOBS_PER_RUN,
        }
    }

    /// Event for a job settling as COMPLETED.
    pub fn completed(
        run_id: DbId,
        job_id: DbId,
        operation: Operation,
        result: f64,
        completed_count: i64,
    ) -> Self {
        Self {
            run_id,
            job_id,
            operation,
            status: JobStatus::Completed,
            result: Some(result),
            error: None,
            completed_count,
            total_count: TOTAL_JOBS_PER_RUN,
        }
    }

    /// Event for a job settling as FAILED.
    pub fn failed(
        run_id: DbId,
        job_id: DbId,
        operation: Operation,
        error: impl Into<String>,
        completed_count: i64,
    ) -> Self {
        Self {
            run_id,
            job_id,
            operation,
            status: JobStatus::Failed,
            result: None,
            error: Some(error.into()),
            completed_count,
            total_count: TOTAL_JOBS_PER_RUN,
        }
    }

    /// Whether this event settles the whole run: a terminal job status and
    /// a full tally. Subscribers use this to end their streams.
    pub fn settles_run(&self) -> bool {
        self.status.is_terminal() && self.completed_count >= self.total_count
    }
}

/// Failures on the publishing path.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("failed to serialize progress event: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to notify progress channel: {0}")]
    Database(#[from] sqlx::Error),
}

/// Publish a progress event to all live subscribers of its run.
///
/// Uses `pg_notify` on the shared channel so events cross process
/// boundaries between workers and API instances.
pub async fn publish_progress(pool: &DbPool, event: &ProgressEvent) -> Result<(), PublishError> {
    let payload = serde_json::to_string(event)?;
    sqlx::query("SELECT pg_notify($1, $2)")
        .bind(PROGRESS_CHANNEL)
        .bind(payload)
        .execute(pool)
        .await?;
    Ok(())
}
