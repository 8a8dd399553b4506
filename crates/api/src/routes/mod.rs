pub mod auth;
pub mod health;
pub mod runs;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /auth/register        register (public)
/// /auth/login           login (public)
/// /auth/me              profile (requires auth)
///
/// /runs                 list history, submit (requires auth)
/// /runs/{id}            run + jobs snapshot
/// /runs/{id}/events     live progress WebSocket
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/runs", runs::router())
}
