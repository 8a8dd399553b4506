//! Run status aggregation.
//!
//! The single source of truth for "is this run done": a full reload of the
//! run's job set and an idempotent guarded write, never an incremental
//! counter. Safe under any number of concurrent invocations from racing
//! job completions.

use quadcalc_core::types::DbId;
use quadcalc_db::models::status::{JobStatus, RunStatus};
use quadcalc_db::repositories::{JobRepo, RunRepo};
use quadcalc_db::DbPool;
use quadcalc_events::TOTAL_JOBS_PER_RUN;

/// Derive a run's terminal status from its job statuses.
///
/// Returns `None` while any job is still PENDING or IN_PROGRESS (or the
/// job set is short) -- the run stays IN_PROGRESS and nothing is written.
pub fn derive_run_status(statuses: &[JobStatus]) -> Option<RunStatus> {
    if statuses.len() < TOTAL_JOBS_PER_RUN as usize {
        return None;
    }
    if statuses.iter().any(|status| !status.is_terminal()) {
        return None;
    }
    if statuses.contains(&JobStatus::Failed) {
        Some(RunStatus::Failed)
    } else {
        Some(RunStatus::Completed)
    }
}

/// Recompute and persist a run's status from its jobs' current states.
///
/// Invoked after every job settles. The write only downgrades a live run
/// to a terminal status once ([`RunRepo::set_status_terminal`] guards on
/// non-terminal state), so the final observed state reflects the true
/// terminal set regardless of completion order.
pub async fn recompute_run_status(pool: &DbPool, run_id: DbId) -> Result<RunStatus, sqlx::Error> {
    let jobs = JobRepo::list_by_run(pool, run_id).await?;
    let statuses: Vec<JobStatus> = jobs
        .iter()
        // An unknown status id cannot count as terminal.
        .map(|job| JobStatus::from_id(job.status_id).unwrap_or(JobStatus::Pending))
        .collect();

    match derive_run_status(&statuses) {
        Some(terminal) => {
            let transitioned = RunRepo::set_status_terminal(pool, run_id, terminal).await?;
            if transitioned {
                tracing::info!(run_id, status = %terminal, "Run settled");
            }
            Ok(terminal)
        }
        None => Ok(RunStatus::InProgress),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use JobStatus::{Completed, Failed, InProgress, Pending};

    #[test]
    fn all_completed_is_completed() {
        assert_eq!(
            derive_run_status(&[Completed, Completed, Completed, Completed]),
            Some(RunStatus::Completed)
        );
    }

    #[test]
    fn any_failure_in_full_terminal_set_is_failed() {
        assert_eq!(
            derive_run_status(&[Completed, Completed, Completed, Failed]),
            Some(RunStatus::Failed)
        );
        assert_eq!(
            derive_run_status(&[Failed, Failed, Failed, Failed]),
            Some(RunStatus::Failed)
        );
    }

    #[test]
    fn settle_order_does_not_matter() {
        // The same terminal multiset in every position yields the same
        // answer -- e.g. DIVIDE settling first vs. last.
        let orderings = [
            [Failed, Completed, Completed, Completed],
            [Completed, Failed, Completed, Completed],
            [Completed, Completed, Failed, Completed],
            [Completed, Completed, Completed, Failed],
        ];
        for statuses in orderings {
            assert_eq!(derive_run_status(&statuses), Some(RunStatus::Failed));
        }
    }

    #[test]
    fn open_jobs_keep_the_run_in_progress() {
        assert_eq!(
            derive_run_status(&[Completed, Completed, Completed, InProgress]),
            None
        );
        assert_eq!(
            derive_run_status(&[Failed, Completed, Completed, Pending]),
            None
        );
        assert_eq!(
            derive_run_status(&[Pending, Pending, Pending, Pending]),
            None
        );
    }

    #[test]
    fn short_job_set_keeps_the_run_in_progress() {
        assert_eq!(derive_run_status(&[Completed, Completed, Completed]), None);
        assert_eq!(derive_run_status(&[]), None);
    }
}
