//! Run entity model and DTOs.

use quadcalc_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::status::StatusId;

/// A row from the `runs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Run {
    pub id: DbId,
    pub number_a: f64,
    pub number_b: f64,
    pub status_id: StatusId,
    pub submitted_by: DbId,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Request body for `POST /api/v1/runs`.
///
/// Finiteness of the operands is enforced by the dispatcher before any row
/// is written (`quadcalc_core::ops::validate_finite_operands`).
#[derive(Debug, Deserialize)]
pub struct CreateRun {
    pub number_a: f64,
    pub number_b: f64,
}

/// Query parameters for `GET /api/v1/runs`.
#[derive(Debug, Deserialize)]
pub struct RunListQuery {
    /// Maximum number of results. Defaults to 20, capped at 100.
    pub limit: Option<i64>,
}
