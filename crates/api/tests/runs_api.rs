//! Integration tests for run submission, snapshots, history, and
//! ownership scoping.

mod common;

use axum::http::StatusCode;
use common::{body_json, get_auth, get_ws_upgrade, post_json, register_user};
use serde_json::json;
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Test: submission creates a run with 4 pending jobs
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn create_run_returns_id_and_pending_jobs(pool: PgPool) {
    let app = common::build_test_app(pool).await;
    let token = register_user(&app, "alice").await;

    let response = post_json(
        app.clone(),
        "/api/v1/runs",
        Some(&token),
        json!({"number_a": 10.0, "number_b": 5.0}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let json = body_json(response).await;
    let run_id = json["data"]["run_id"].as_i64().expect("run id");

    // Snapshot: run in flight, one job per operation, none started.
    let snapshot = get_auth(app, &format!("/api/v1/runs/{run_id}"), &token).await;
    assert_eq!(snapshot.status(), StatusCode::OK);

    let json = body_json(snapshot).await;
    let run = &json["data"];
    assert_eq!(run["number_a"], 10.0);
    assert_eq!(run["number_b"], 5.0);
    assert_eq!(run["status"], "IN_PROGRESS");

    let jobs = run["jobs"].as_array().expect("jobs array");
    assert_eq!(jobs.len(), 4);
    let operations: Vec<&str> = jobs
        .iter()
        .map(|j| j["operation"].as_str().unwrap())
        .collect();
    assert_eq!(operations, vec!["ADD", "SUBTRACT", "MULTIPLY", "DIVIDE"]);
    for job in jobs {
        assert_eq!(job["status"], "PENDING");
        assert!(job["result"].is_null());
        assert!(job["error"].is_null());
    }
}

// ---------------------------------------------------------------------------
// Test: submission requires authentication
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn create_run_requires_auth(pool: PgPool) {
    let app = common::build_test_app(pool).await;

    let response = post_json(
        app,
        "/api/v1/runs",
        None,
        json!({"number_a": 1.0, "number_b": 2.0}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// ---------------------------------------------------------------------------
// Test: ownership scoping fails closed
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn foreign_run_reads_as_not_found(pool: PgPool) {
    let app = common::build_test_app(pool).await;
    let owner_token = register_user(&app, "owner").await;
    let intruder_token = register_user(&app, "intruder").await;

    let response = post_json(
        app.clone(),
        "/api/v1/runs",
        Some(&owner_token),
        json!({"number_a": 3.0, "number_b": 4.0}),
    )
    .await;
    let run_id = body_json(response).await["data"]["run_id"].as_i64().unwrap();

    // The owner sees it; the intruder gets 404, on the snapshot and on the
    // event stream alike -- existence is not leaked.
    let owner_view = get_auth(app.clone(), &format!("/api/v1/runs/{run_id}"), &owner_token).await;
    assert_eq!(owner_view.status(), StatusCode::OK);

    let foreign_view =
        get_auth(app.clone(), &format!("/api/v1/runs/{run_id}"), &intruder_token).await;
    assert_eq!(foreign_view.status(), StatusCode::NOT_FOUND);

    let foreign_stream = get_ws_upgrade(
        app.clone(),
        &format!("/api/v1/runs/{run_id}/events"),
        &intruder_token,
    )
    .await;
    assert_eq!(foreign_stream.status(), StatusCode::NOT_FOUND);

    // The owner's upgrade goes through.
    let owner_stream = get_ws_upgrade(
        app,
        &format!("/api/v1/runs/{run_id}/events"),
        &owner_token,
    )
    .await;
    assert_eq!(owner_stream.status(), StatusCode::SWITCHING_PROTOCOLS);
}

// ---------------------------------------------------------------------------
// Test: history is scoped to the caller and newest first
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn history_is_scoped_and_ordered(pool: PgPool) {
    let app = common::build_test_app(pool).await;
    let alice = register_user(&app, "alice").await;
    let bob = register_user(&app, "bob").await;

    for numbers in [(1.0, 1.0), (2.0, 2.0)] {
        let response = post_json(
            app.clone(),
            "/api/v1/runs",
            Some(&alice),
            json!({"number_a": numbers.0, "number_b": numbers.1}),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let alice_history = get_auth(app.clone(), "/api/v1/runs", &alice).await;
    let json = body_json(alice_history).await;
    let runs = json["data"].as_array().unwrap();
    assert_eq!(runs.len(), 2);
    // Newest first.
    assert_eq!(runs[0]["number_a"], 2.0);
    assert_eq!(runs[1]["number_a"], 1.0);

    let bob_history = get_auth(app, "/api/v1/runs", &bob).await;
    let json = body_json(bob_history).await;
    assert_eq!(json["data"].as_array().unwrap().len(), 0);
}
