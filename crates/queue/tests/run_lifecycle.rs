//! End-to-end lifecycle tests: submit a run, drain the queue through the
//! executor, and verify results, run status, and the progress stream.
//!
//! The LLM verifier is disabled here, so jobs settle on deterministic
//! results alone.

use std::collections::HashMap;
use std::time::Duration;

use assert_matches::assert_matches;
use quadcalc_core::ops::Operation;
use quadcalc_db::models::status::{JobStatus, RunStatus};
use quadcalc_db::models::user::CreateUser;
use quadcalc_db::repositories::{JobRepo, QueueRepo, RunRepo, UserRepo};
use quadcalc_events::{ProgressEvent, ProgressListener};
use quadcalc_queue::{submit_run, DispatchError, JobExecutor, JobOutcome};
use sqlx::PgPool;

async fn seed_user(pool: &PgPool) -> i64 {
    UserRepo::create(
        pool,
        &CreateUser {
            username: "runner".into(),
            email: "runner@example.com".into(),
            password_hash: "$argon2id$fake".into(),
        },
    )
    .await
    .expect("user creation should succeed")
    .id
}

/// Claim and execute queue entries until the queue is empty, mirroring the
/// worker loop without its timers.
async fn drain(pool: &PgPool, executor: &JobExecutor) {
    while let Some(entry) = QueueRepo::claim_next(pool).await.unwrap() {
        let payload = quadcalc_queue::ComputeJobPayload::try_from(&entry).unwrap();
        executor.execute(&payload).await.expect("execution should succeed");
        QueueRepo::remove(pool, entry.job_id).await.unwrap();
    }
}

fn results_by_operation(jobs: &[quadcalc_db::models::job::Job]) -> HashMap<i16, Option<f64>> {
    jobs.iter().map(|j| (j.operation_id, j.result)).collect()
}

// ---------------------------------------------------------------------------
// Test: happy path -- submit (10, 5), all four jobs complete
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn all_operations_complete_for_nonzero_divisor(pool: PgPool) {
    let owner = seed_user(&pool).await;
    let executor = JobExecutor::new(pool.clone(), None);

    let run_id = submit_run(&pool, owner, 10.0, 5.0).await.unwrap();
    drain(&pool, &executor).await;

    let jobs = JobRepo::list_by_run(&pool, run_id).await.unwrap();
    assert!(jobs.iter().all(|j| j.status_id == JobStatus::Completed.id()));

    let results = results_by_operation(&jobs);
    assert_eq!(results[&Operation::Add.id()], Some(15.0));
    assert_eq!(results[&Operation::Subtract.id()], Some(5.0));
    assert_eq!(results[&Operation::Multiply.id()], Some(50.0));
    assert_eq!(results[&Operation::Divide.id()], Some(2.0));

    let run = RunRepo::find_by_id(&pool, run_id).await.unwrap().unwrap();
    assert_eq!(run.status_id, RunStatus::Completed.id());

    // Settled work items leave the queue.
    assert_eq!(QueueRepo::depth(&pool).await.unwrap(), 0);
}

// ---------------------------------------------------------------------------
// Test: division by zero fails exactly one job and the run
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn divide_by_zero_fails_only_the_divide_job(pool: PgPool) {
    let owner = seed_user(&pool).await;
    let executor = JobExecutor::new(pool.clone(), None);

    let run_id = submit_run(&pool, owner, 10.0, 0.0).await.unwrap();
    drain(&pool, &executor).await;

    let jobs = JobRepo::list_by_run(&pool, run_id).await.unwrap();
    let by_operation: HashMap<i16, &quadcalc_db::models::job::Job> =
        jobs.iter().map(|j| (j.operation_id, j)).collect();

    // The sibling operations succeed independently.
    assert_eq!(by_operation[&Operation::Add.id()].result, Some(10.0));
    assert_eq!(by_operation[&Operation::Subtract.id()].result, Some(10.0));
    assert_eq!(by_operation[&Operation::Multiply.id()].result, Some(0.0));

    let divide = by_operation[&Operation::Divide.id()];
    assert_eq!(divide.status_id, JobStatus::Failed.id());
    assert_eq!(divide.result, None);
    assert_eq!(divide.error_message.as_deref(), Some("Division by zero"));

    // A mixed terminal set containing a failure fails the run.
    let run = RunRepo::find_by_id(&pool, run_id).await.unwrap().unwrap();
    assert_eq!(run.status_id, RunStatus::Failed.id());
}

// ---------------------------------------------------------------------------
// Test: non-finite operands are rejected before anything exists
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn non_finite_operands_rejected_before_creation(pool: PgPool) {
    let owner = seed_user(&pool).await;

    for (a, b) in [
        (f64::NAN, 1.0),
        (1.0, f64::INFINITY),
        (f64::NEG_INFINITY, 0.0),
    ] {
        let err = submit_run(&pool, owner, a, b).await.unwrap_err();
        assert_matches!(err, DispatchError::Core(_));
    }

    let run_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM runs")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(run_count, 0);
    assert_eq!(QueueRepo::depth(&pool).await.unwrap(), 0);
}

// ---------------------------------------------------------------------------
// Test: duplicate delivery of a settled job is a no-op
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn re_executing_a_settled_job_changes_nothing(pool: PgPool) {
    let owner = seed_user(&pool).await;
    let executor = JobExecutor::new(pool.clone(), None);

    submit_run(&pool, owner, 10.0, 5.0).await.unwrap();

    let entry = QueueRepo::claim_next(&pool).await.unwrap().unwrap();
    let payload = quadcalc_queue::ComputeJobPayload::try_from(&entry).unwrap();

    assert_eq!(
        executor.execute(&payload).await.unwrap(),
        JobOutcome::Completed
    );
    let settled = JobRepo::find_by_id(&pool, payload.job_id).await.unwrap().unwrap();

    // A second delivery reports the same outcome without rewriting the row.
    assert_eq!(
        executor.execute(&payload).await.unwrap(),
        JobOutcome::Completed
    );
    let after = JobRepo::find_by_id(&pool, payload.job_id).await.unwrap().unwrap();
    assert_eq!(after.completed_at, settled.completed_at);
    assert_eq!(after.result, settled.result);
}

// ---------------------------------------------------------------------------
// Test: subscribers observe IN_PROGRESS before the terminal event
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn progress_stream_orders_events_and_settles(pool: PgPool) {
    let owner = seed_user(&pool).await;
    let executor = JobExecutor::new(pool.clone(), None);
    let listener = ProgressListener::start(&pool).await.unwrap();

    let run_id = submit_run(&pool, owner, 10.0, 5.0).await.unwrap();
    let mut subscription = listener.subscribe(run_id).await;

    drain(&pool, &executor).await;

    // 4 jobs x 2 events each.
    let mut events: Vec<ProgressEvent> = Vec::new();
    while events.len() < 8 {
        let event = tokio::time::timeout(Duration::from_secs(5), subscription.recv())
            .await
            .expect("expected a progress event before timeout")
            .expect("stream should stay open");
        assert_eq!(event.run_id, run_id);
        events.push(event);
    }

    // Per job: the IN_PROGRESS event strictly precedes the terminal event.
    let mut first_seen: HashMap<i64, JobStatus> = HashMap::new();
    for event in &events {
        first_seen.entry(event.job_id).or_insert(event.status);
        if event.status.is_terminal() {
            assert_eq!(first_seen[&event.job_id], JobStatus::InProgress);
        }
    }

    // The last settle carries the full tally and ends the stream.
    let last = events.last().unwrap();
    assert!(last.settles_run());
    assert_eq!(last.total_count, 4);
    assert_eq!(last.completed_count, 4);

    subscription.unsubscribe().await;
    listener.shutdown();
}
