//! Job orchestration: queue dispatch, worker execution, and run
//! aggregation.
//!
//! The dispatcher turns one submission into a run with 4 queued jobs; the
//! worker pool claims work items and drives each job to a terminal state,
//! publishing progress along the way; the aggregator derives the run's
//! status from its job set after every settle.

pub mod aggregator;
pub mod dispatcher;
pub mod executor;
pub mod payload;
pub mod worker;

pub use aggregator::{derive_run_status, recompute_run_status};
pub use dispatcher::{submit_run, DispatchError};
pub use executor::{ExecuteError, JobExecutor, JobOutcome};
pub use payload::ComputeJobPayload;
pub use worker::{WorkerPool, WorkerPoolConfig};
