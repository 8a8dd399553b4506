//! The work item shape workers claim from the queue.

use quadcalc_core::ops::Operation;
use quadcalc_core::types::DbId;
use quadcalc_db::models::queue_entry::QueueEntry;
use serde::{Deserialize, Serialize};

/// One queued unit of work: a single operation of a single run, carrying
/// everything the executor needs without further lookups.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputeJobPayload {
    pub run_id: DbId,
    pub job_id: DbId,
    pub operation: Operation,
    pub number_a: f64,
    pub number_b: f64,
}

/// A queue entry referenced an operation id outside the fixed set.
#[derive(Debug, thiserror::Error)]
#[error("unknown operation id {0}")]
pub struct UnknownOperation(pub i16);

impl TryFrom<&QueueEntry> for ComputeJobPayload {
    type Error = UnknownOperation;

    fn try_from(entry: &QueueEntry) -> Result<Self, Self::Error> {
        let operation = Operation::from_id(entry.operation_id)
            .ok_or(UnknownOperation(entry.operation_id))?;
        Ok(Self {
            run_id: entry.run_id,
            job_id: entry.job_id,
            operation,
            number_a: entry.number_a,
            number_b: entry.number_b,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(operation_id: i16) -> QueueEntry {
        QueueEntry {
            job_id: 11,
            run_id: 3,
            operation_id,
            number_a: 10.0,
            number_b: 5.0,
            attempts: 1,
            max_attempts: 3,
            available_at: chrono::Utc::now(),
            claimed_at: None,
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn payload_from_entry() {
        let payload = ComputeJobPayload::try_from(&entry(3)).unwrap();
        assert_eq!(payload.operation, Operation::Multiply);
        assert_eq!(payload.run_id, 3);
        assert_eq!(payload.job_id, 11);
    }

    #[test]
    fn unknown_operation_rejected() {
        assert!(ComputeJobPayload::try_from(&entry(9)).is_err());
    }

    #[test]
    fn payload_wire_shape() {
        let payload = ComputeJobPayload::try_from(&entry(1)).unwrap();
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["operation"], "ADD");
        assert_eq!(json["number_a"], 10.0);
        assert_eq!(json["number_b"], 5.0);
    }
}
