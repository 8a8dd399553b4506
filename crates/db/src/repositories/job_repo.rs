//! Repository for the `jobs` table.
//!
//! Every status transition is guarded by a `WHERE status_id` clause so the
//! PENDING -> IN_PROGRESS -> {COMPLETED | FAILED} order holds even when
//! several workers or a queue retry touch the same job.

use quadcalc_core::ops::Operation;
use quadcalc_core::types::DbId;
use sqlx::{PgPool, Postgres, Transaction};

use crate::models::job::Job;
use crate::models::status::JobStatus;

/// Column list for `jobs` queries.
const COLUMNS: &str = "\
    id, run_id, operation_id, status_id, result, error_message, llm_response, \
    started_at, completed_at, created_at, updated_at";

/// Provides CRUD operations for per-run arithmetic jobs.
pub struct JobRepo;

impl JobRepo {
    /// Insert a pending job for one operation of a run, inside the caller's
    /// transaction. Used only by [`RunRepo::create_with_jobs`].
    ///
    /// [`RunRepo::create_with_jobs`]: crate::repositories::RunRepo::create_with_jobs
    pub async fn insert_pending(
        tx: &mut Transaction<'_, Postgres>,
        run_id: DbId,
        operation: Operation,
    ) -> Result<Job, sqlx::Error> {
        let query = format!(
            "INSERT INTO jobs (run_id, operation_id, status_id) \
             VALUES ($1, $2, $3) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(run_id)
            .bind(operation.id())
            .bind(JobStatus::Pending.id())
            .fetch_one(&mut **tx)
            .await
    }

    /// Find a job by its ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Job>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM jobs WHERE id = $1");
        sqlx::query_as::<_, Job>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List all jobs of a run in operation order.
    pub async fn list_by_run(pool: &PgPool, run_id: DbId) -> Result<Vec<Job>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM jobs WHERE run_id = $1 ORDER BY operation_id ASC"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(run_id)
            .fetch_all(pool)
            .await
    }

    /// Count the run's settled (COMPLETED or FAILED) jobs.
    ///
    /// This is the `completed_count` tally carried on progress events.
    pub async fn count_terminal(pool: &PgPool, run_id: DbId) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM jobs WHERE run_id = $1 AND status_id IN ($2, $3)",
        )
        .bind(run_id)
        .bind(JobStatus::Completed.id())
        .bind(JobStatus::Failed.id())
        .fetch_one(pool)
        .await
    }

    /// Transition a job from PENDING to IN_PROGRESS with a start timestamp.
    ///
    /// Returns `false` without touching the row when the job is not PENDING
    /// (already claimed by a previous attempt, or already settled) -- a
    /// queue retry never regresses job state.
    pub async fn mark_in_progress(pool: &PgPool, job_id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE jobs \
             SET status_id = $2, started_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND status_id = $3",
        )
        .bind(job_id)
        .bind(JobStatus::InProgress.id())
        .bind(JobStatus::Pending.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Mark a job COMPLETED with its result and optional raw verification
    /// response.
    ///
    /// Only fires from IN_PROGRESS; a settled job is never overwritten.
    pub async fn complete(
        pool: &PgPool,
        job_id: DbId,
        result: f64,
        llm_response: Option<&str>,
    ) -> Result<bool, sqlx::Error> {
        let outcome = sqlx::query(
            "UPDATE jobs \
             SET status_id = $2, result = $3, llm_response = $4, \
                 completed_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND status_id = $5",
        )
        .bind(job_id)
        .bind(JobStatus::Completed.id())
        .bind(result)
        .bind(llm_response)
        .bind(JobStatus::InProgress.id())
        .execute(pool)
        .await?;
        Ok(outcome.rows_affected() > 0)
    }

    /// Mark a job FAILED with an error message.
    ///
    /// Accepts PENDING as well as IN_PROGRESS so queue exhaustion can settle
    /// a job that never got past its claim. Terminal states stay put.
    pub async fn fail(pool: &PgPool, job_id: DbId, error: &str) -> Result<bool, sqlx::Error> {
        let outcome = sqlx::query(
            "UPDATE jobs \
             SET status_id = $2, error_message = $3, \
                 completed_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND status_id IN ($4, $5)",
        )
        .bind(job_id)
        .bind(JobStatus::Failed.id())
        .bind(error)
        .bind(JobStatus::Pending.id())
        .bind(JobStatus::InProgress.id())
        .execute(pool)
        .await?;
        Ok(outcome.rows_affected() > 0)
    }
}
