//! Work queue entry model.

use quadcalc_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// A row from the `queue_entries` table.
///
/// The primary key is the job id, so enqueueing the same job twice is a
/// no-op at the queue level. `attempts` counts claims made so far
/// (including the current one after a claim); `available_at` pushes the
/// entry past its backoff delay after a transient failure.
#[derive(Debug, Clone, FromRow)]
pub struct QueueEntry {
    pub job_id: DbId,
    pub run_id: DbId,
    pub operation_id: i16,
    pub number_a: f64,
    pub number_b: f64,
    pub attempts: i32,
    pub max_attempts: i32,
    pub available_at: Timestamp,
    pub claimed_at: Option<Timestamp>,
    pub created_at: Timestamp,
}
