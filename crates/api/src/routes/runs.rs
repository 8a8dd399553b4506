//! Route definitions for the `/runs` resource.
//!
//! All endpoints require authentication.

use axum::routing::get;
use axum::Router;

use crate::handlers::runs;
use crate::state::AppState;
use crate::ws;

/// Routes mounted at `/runs`.
///
/// ```text
/// GET  /             -> list_runs
/// POST /             -> create_run
/// GET  /{id}         -> get_run
/// GET  /{id}/events  -> run_events (WebSocket)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(runs::list_runs).post(runs::create_run))
        .route("/{id}", get(runs::get_run))
        .route("/{id}/events", get(ws::run_events))
}
