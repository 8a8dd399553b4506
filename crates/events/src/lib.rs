//! Progress event schema and the publish/subscribe bridge.
//!
//! Workers publish job-state transitions through Postgres `NOTIFY`; the API
//! process runs a [`ProgressListener`] that pumps notifications into a
//! [`ProgressHub`], which fans each event out on a per-run broadcast
//! channel. Delivery is at-most-once per subscriber with publish order
//! preserved per run; there is no replay, and malformed payloads are
//! dropped and logged at the bridge boundary.

pub mod bridge;
pub mod progress;

pub use bridge::{ProgressHub, ProgressListener, ProgressSubscription, PROGRESS_CHANNEL};
pub use progress::{publish_progress, ProgressEvent, PublishError, TOTAL_JOBS_PER_RUN};
