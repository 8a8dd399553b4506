//! Handlers for the `/runs` resource: submission, snapshot, and history.
//!
//! All endpoints require authentication and are scoped to the caller's own
//! runs. A run that exists but belongs to someone else reads as not found,
//! so ownership probes leak nothing.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use quadcalc_core::error::CoreError;
use quadcalc_core::ops::Operation;
use quadcalc_core::types::{DbId, Timestamp};
use quadcalc_db::models::job::Job;
use quadcalc_db::models::run::{CreateRun, Run, RunListQuery};
use quadcalc_db::models::status::{JobStatus, RunStatus};
use quadcalc_db::repositories::{JobRepo, RunRepo};
use quadcalc_queue::submit_run;
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

/// Response body for `POST /api/v1/runs`.
#[derive(Debug, Serialize)]
pub struct SubmittedRun {
    pub run_id: DbId,
}

/// A job as exposed on the wire: operation and status by name.
#[derive(Debug, Serialize)]
pub struct JobView {
    pub id: DbId,
    pub operation: Operation,
    pub status: JobStatus,
    pub result: Option<f64>,
    pub error: Option<String>,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
}

/// A run with its full job set.
#[derive(Debug, Serialize)]
pub struct RunView {
    pub id: DbId,
    pub number_a: f64,
    pub number_b: f64,
    pub status: RunStatus,
    pub created_at: Timestamp,
    pub jobs: Vec<JobView>,
}

impl JobView {
    fn from_row(job: Job) -> AppResult<Self> {
        let operation = Operation::from_id(job.operation_id).ok_or_else(|| {
            AppError::InternalError(format!("unknown operation id {}", job.operation_id))
        })?;
        let status = JobStatus::from_id(job.status_id).ok_or_else(|| {
            AppError::InternalError(format!("unknown job status id {}", job.status_id))
        })?;
        Ok(Self {
            id: job.id,
            operation,
            status,
            result: job.result,
            error: job.error_message,
            started_at: job.started_at,
            completed_at: job.completed_at,
        })
    }
}

impl RunView {
    fn from_rows(run: Run, jobs: Vec<Job>) -> AppResult<Self> {
        let status = RunStatus::from_id(run.status_id).ok_or_else(|| {
            AppError::InternalError(format!("unknown run status id {}", run.status_id))
        })?;
        Ok(Self {
            id: run.id,
            number_a: run.number_a,
            number_b: run.number_b,
            status,
            created_at: run.created_at,
            jobs: jobs
                .into_iter()
                .map(JobView::from_row)
                .collect::<AppResult<Vec<_>>>()?,
        })
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/runs
///
/// Submit two finite numbers; creates the run with its 4 queued jobs and
/// returns 201 with the run id. Non-finite operands are rejected with 400
/// before anything is written.
pub async fn create_run(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<CreateRun>,
) -> AppResult<impl IntoResponse> {
    let run_id = submit_run(&state.pool, auth.user_id, input.number_a, input.number_b).await?;

    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: SubmittedRun { run_id },
        }),
    ))
}

/// GET /api/v1/runs
///
/// The caller's run history, newest first, each with its job set.
pub async fn list_runs(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(params): Query<RunListQuery>,
) -> AppResult<Json<DataResponse<Vec<RunView>>>> {
    let runs = RunRepo::list_by_user(&state.pool, auth.user_id, params.limit).await?;

    let mut views = Vec::with_capacity(runs.len());
    for run in runs {
        let jobs = JobRepo::list_by_run(&state.pool, run.id).await?;
        views.push(RunView::from_rows(run, jobs)?);
    }

    Ok(Json(DataResponse { data: views }))
}

/// GET /api/v1/runs/{id}
///
/// Point-in-time snapshot of one run and its 4 jobs. Owner only.
pub async fn get_run(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(run_id): Path<DbId>,
) -> AppResult<Json<DataResponse<RunView>>> {
    let run = find_owned_run(&state, run_id, &auth).await?;
    let jobs = JobRepo::list_by_run(&state.pool, run.id).await?;

    Ok(Json(DataResponse {
        data: RunView::from_rows(run, jobs)?,
    }))
}

/// Fetch a run scoped to the caller, failing closed with 404 whether the
/// run is missing or owned by someone else.
pub(crate) async fn find_owned_run(
    state: &AppState,
    run_id: DbId,
    auth: &AuthUser,
) -> AppResult<Run> {
    RunRepo::find_owned(&state.pool, run_id, auth.user_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Run",
            id: run_id,
        }))
}
