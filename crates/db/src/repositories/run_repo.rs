//! Repository for the `runs` table.

use quadcalc_core::ops::ALL_OPERATIONS;
use quadcalc_core::types::DbId;
use sqlx::PgPool;

use crate::models::run::Run;
use crate::models::status::RunStatus;
use crate::repositories::{JobRepo, QueueRepo};

/// Column list for `runs` queries.
const COLUMNS: &str =
    "id, number_a, number_b, status_id, submitted_by, created_at, updated_at";

/// Maximum page size for run history listing.
const MAX_LIMIT: i64 = 100;

/// Default page size for run history listing.
const DEFAULT_LIMIT: i64 = 20;

/// Provides CRUD operations for runs.
pub struct RunRepo;

impl RunRepo {
    /// Create a run with its 4 pending jobs and their queue entries in one
    /// transaction, then mark it in progress.
    ///
    /// The enqueue is all-or-nothing: if any insert fails the transaction
    /// rolls back and no run exists without all 4 queued counterparts.
    /// Returns the run in its post-enqueue (IN_PROGRESS) state.
    pub async fn create_with_jobs(
        pool: &PgPool,
        owner_id: DbId,
        number_a: f64,
        number_b: f64,
    ) -> Result<Run, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let query = format!(
            "INSERT INTO runs (number_a, number_b, status_id, submitted_by) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {COLUMNS}"
        );
        let run = sqlx::query_as::<_, Run>(&query)
            .bind(number_a)
            .bind(number_b)
            .bind(RunStatus::Pending.id())
            .bind(owner_id)
            .fetch_one(&mut *tx)
            .await?;

        for operation in ALL_OPERATIONS {
            let job = JobRepo::insert_pending(&mut tx, run.id, operation).await?;
            QueueRepo::enqueue(&mut tx, &job, number_a, number_b).await?;
        }

        // All 4 work items are queued; the run is now in flight.
        let query = format!(
            "UPDATE runs SET status_id = $2, updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        let run = sqlx::query_as::<_, Run>(&query)
            .bind(run.id)
            .bind(RunStatus::InProgress.id())
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(run)
    }

    /// Find a run by its ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Run>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM runs WHERE id = $1");
        sqlx::query_as::<_, Run>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find a run by ID, scoped to its owner.
    ///
    /// Returns `None` both when the run does not exist and when it belongs
    /// to someone else, so callers fail closed without leaking existence.
    pub async fn find_owned(
        pool: &PgPool,
        id: DbId,
        owner_id: DbId,
    ) -> Result<Option<Run>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM runs WHERE id = $1 AND submitted_by = $2");
        sqlx::query_as::<_, Run>(&query)
            .bind(id)
            .bind(owner_id)
            .fetch_optional(pool)
            .await
    }

    /// List a user's runs, newest first.
    pub async fn list_by_user(
        pool: &PgPool,
        owner_id: DbId,
        limit: Option<i64>,
    ) -> Result<Vec<Run>, sqlx::Error> {
        let limit = limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        let query = format!(
            "SELECT {COLUMNS} FROM runs \
             WHERE submitted_by = $1 \
             ORDER BY created_at DESC \
             LIMIT $2"
        );
        sqlx::query_as::<_, Run>(&query)
            .bind(owner_id)
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    /// Move a run to a terminal status.
    ///
    /// The `WHERE` guard only fires while the run is still PENDING or
    /// IN_PROGRESS, so racing aggregator invocations can never regress a
    /// terminal run. Returns `true` if this call performed the transition.
    pub async fn set_status_terminal(
        pool: &PgPool,
        id: DbId,
        status: RunStatus,
    ) -> Result<bool, sqlx::Error> {
        debug_assert!(status.is_terminal());
        let result = sqlx::query(
            "UPDATE runs SET status_id = $2, updated_at = NOW() \
             WHERE id = $1 AND status_id IN ($3, $4)",
        )
        .bind(id)
        .bind(status.id())
        .bind(RunStatus::Pending.id())
        .bind(RunStatus::InProgress.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
