//! The live progress stream: `GET /api/v1/runs/{id}/events`.
//!
//! Ownership is verified once, before the WebSocket upgrade; the socket
//! then forwards the run's progress events in publish order until the run
//! settles or the client disconnects. There is no replay -- clients fetch
//! the snapshot endpoint to reconcile anything published before they
//! attached.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use quadcalc_core::types::DbId;
use quadcalc_db::models::status::RunStatus;
use quadcalc_db::repositories::RunRepo;

use crate::error::AppResult;
use crate::handlers::runs::find_owned_run;
use crate::middleware::auth::AuthUser;
use crate::state::AppState;

/// HTTP handler that authorizes the subscription and upgrades the
/// connection.
pub async fn run_events(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(run_id): Path<DbId>,
    ws: WebSocketUpgrade,
) -> AppResult<impl IntoResponse> {
    // Subscription authorization happens here, once -- not per event.
    find_owned_run(&state, run_id, &auth).await?;

    Ok(ws.on_upgrade(move |socket| stream_run_events(socket, state, run_id)))
}

/// Forward progress events to one subscriber socket.
async fn stream_run_events(socket: WebSocket, state: AppState, run_id: DbId) {
    let mut subscription = state.progress.subscribe(run_id).await;
    tracing::info!(run_id, "Progress stream attached");

    // Status check AFTER attaching: a run that settled in the meantime
    // will never publish again, so close instead of waiting forever.
    let already_settled = match RunRepo::find_by_id(&state.pool, run_id).await {
        Ok(Some(run)) => RunStatus::from_id(run.status_id).is_some_and(RunStatus::is_terminal),
        Ok(None) => true,
        Err(e) => {
            tracing::error!(run_id, error = %e, "Failed to load run for progress stream");
            true
        }
    };

    let (mut sink, mut stream) = socket.split();

    if !already_settled {
        loop {
            tokio::select! {
                event = subscription.recv() => {
                    let Some(event) = event else { break };
                    let text = match serde_json::to_string(&event) {
                        Ok(text) => text,
                        Err(e) => {
                            tracing::error!(run_id, error = %e, "Failed to serialize progress event");
                            continue;
                        }
                    };
                    if sink.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                    if event.settles_run() {
                        break;
                    }
                }
                inbound = stream.next() => {
                    match inbound {
                        None | Some(Err(_)) | Some(Ok(Message::Close(_))) => break,
                        Some(Ok(_)) => {}
                    }
                }
            }
        }
    }

    subscription.unsubscribe().await;
    let _ = sink.send(Message::Close(None)).await;
    tracing::info!(run_id, "Progress stream closed");
}
