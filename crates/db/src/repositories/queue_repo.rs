//! Repository for the `queue_entries` table (the durable work queue).
//!
//! Claiming uses `SELECT FOR UPDATE SKIP LOCKED` so any number of worker
//! tasks and processes can pull from the queue without double-dispatch.

use std::time::Duration;

use quadcalc_core::types::DbId;
use sqlx::{PgPool, Postgres, Transaction};

use crate::models::job::Job;
use crate::models::queue_entry::QueueEntry;

/// Column list for `queue_entries` queries.
const COLUMNS: &str = "\
    job_id, run_id, operation_id, number_a, number_b, \
    attempts, max_attempts, available_at, claimed_at, created_at";

/// Provides claim/release operations for queued work items.
pub struct QueueRepo;

impl QueueRepo {
    /// Enqueue a work item for a job, inside the caller's transaction.
    ///
    /// The entry's identity is the job id, so a duplicate submission is
    /// idempotent (`ON CONFLICT DO NOTHING`).
    pub async fn enqueue(
        tx: &mut Transaction<'_, Postgres>,
        job: &Job,
        number_a: f64,
        number_b: f64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO queue_entries (job_id, run_id, operation_id, number_a, number_b) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (job_id) DO NOTHING",
        )
        .bind(job.id)
        .bind(job.run_id)
        .bind(job.operation_id)
        .bind(number_a)
        .bind(number_b)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Atomically claim the next available work item.
    ///
    /// Increments the attempt counter as part of the claim and returns the
    /// updated entry, or `None` when the queue is empty (or everything is
    /// claimed or still backing off).
    pub async fn claim_next(pool: &PgPool) -> Result<Option<QueueEntry>, sqlx::Error> {
        let query = format!(
            "UPDATE queue_entries \
             SET claimed_at = NOW(), attempts = attempts + 1 \
             WHERE job_id = ( \
                 SELECT job_id FROM queue_entries \
                 WHERE claimed_at IS NULL AND available_at <= NOW() \
                 ORDER BY created_at ASC \
                 LIMIT 1 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, QueueEntry>(&query)
            .fetch_optional(pool)
            .await
    }

    /// Release a claimed entry back to the queue after a transient failure,
    /// postponing it by the given backoff delay.
    pub async fn release(
        pool: &PgPool,
        job_id: DbId,
        delay: Duration,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE queue_entries \
             SET claimed_at = NULL, available_at = NOW() + make_interval(secs => $2) \
             WHERE job_id = $1",
        )
        .bind(job_id)
        .bind(delay.as_secs_f64())
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Remove a settled work item from the queue.
    ///
    /// Returns `true` if an entry was removed.
    pub async fn remove(pool: &PgPool, job_id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM queue_entries WHERE job_id = $1")
            .bind(job_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Number of entries currently in the queue (any state).
    pub async fn depth(pool: &PgPool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM queue_entries")
            .fetch_one(pool)
            .await
    }
}
