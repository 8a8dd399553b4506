//! Run submission: validation gate plus the atomic create-and-enqueue
//! batch.

use quadcalc_core::error::CoreError;
use quadcalc_core::ops::validate_finite_operands;
use quadcalc_core::types::DbId;
use quadcalc_db::repositories::RunRepo;
use quadcalc_db::DbPool;

/// Errors from run submission.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Create a run with one queued job per operation and return its id.
///
/// Non-finite operands are rejected before anything is written. Run and
/// job creation plus the 4 enqueues are a single transaction; the run
/// leaves it already IN_PROGRESS, or does not exist at all.
pub async fn submit_run(
    pool: &DbPool,
    owner_id: DbId,
    number_a: f64,
    number_b: f64,
) -> Result<DbId, DispatchError> {
    validate_finite_operands(number_a, number_b)?;

    let run = RunRepo::create_with_jobs(pool, owner_id, number_a, number_b).await?;

    tracing::info!(
        run_id = run.id,
        owner_id,
        number_a,
        number_b,
        "Run submitted with 4 jobs enqueued",
    );

    Ok(run.id)
}
