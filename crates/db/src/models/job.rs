//! Job entity model for the per-run arithmetic tasks.

use quadcalc_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

use super::status::StatusId;

/// A row from the `jobs` table.
///
/// `result` is non-null if and only if the job completed; `error_message`
/// only when it failed. `llm_response` carries the raw verification text
/// when the LLM cross-check ran.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Job {
    pub id: DbId,
    pub run_id: DbId,
    pub operation_id: i16,
    pub status_id: StatusId,
    pub result: Option<f64>,
    pub error_message: Option<String>,
    pub llm_response: Option<String>,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}
