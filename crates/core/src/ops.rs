//! The fixed arithmetic operation set and its deterministic evaluation.
//!
//! Every run owns exactly one job per [`Operation`]. The enum discriminants
//! match the seed data order (1-based) in the `operations` database table;
//! the serde names are the case-sensitive wire values.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Operation ID type matching SMALLINT/SMALLSERIAL in the database.
pub type OperationId = i16;

/// One of the four arithmetic operations computed for every run.
#[repr(i16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operation {
    Add = 1,
    Subtract = 2,
    Multiply = 3,
    Divide = 4,
}

/// The full operation set, in seed-data order. A run is created with one
/// job per entry, no duplicates.
pub const ALL_OPERATIONS: [Operation; 4] = [
    Operation::Add,
    Operation::Subtract,
    Operation::Multiply,
    Operation::Divide,
];

/// Errors produced by deterministic evaluation.
///
/// These are business outcomes, not infrastructure faults: they are terminal
/// for the job and must not be retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ComputeError {
    #[error("Division by zero")]
    DivisionByZero,
}

impl Operation {
    /// Return the database operation ID.
    pub fn id(self) -> OperationId {
        self as OperationId
    }

    /// Resolve an operation from its database ID.
    pub fn from_id(id: OperationId) -> Option<Self> {
        match id {
            1 => Some(Operation::Add),
            2 => Some(Operation::Subtract),
            3 => Some(Operation::Multiply),
            4 => Some(Operation::Divide),
            _ => None,
        }
    }

    /// The wire name (`"ADD"`, `"SUBTRACT"`, `"MULTIPLY"`, `"DIVIDE"`).
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Add => "ADD",
            Operation::Subtract => "SUBTRACT",
            Operation::Multiply => "MULTIPLY",
            Operation::Divide => "DIVIDE",
        }
    }

    /// The infix symbol used when phrasing the operation for humans (and
    /// the verification prompt).
    pub fn symbol(self) -> char {
        match self {
            Operation::Add => '+',
            Operation::Subtract => '-',
            Operation::Multiply => '*',
            Operation::Divide => '/',
        }
    }

    /// Evaluate the operation on two operands.
    ///
    /// Division by zero is a hard business error, never a value of `inf`
    /// or `NaN`.
    pub fn apply(self, a: f64, b: f64) -> Result<f64, ComputeError> {
        match self {
            Operation::Add => Ok(a + b),
            Operation::Subtract => Ok(a - b),
            Operation::Multiply => Ok(a * b),
            Operation::Divide => {
                if b == 0.0 {
                    Err(ComputeError::DivisionByZero)
                } else {
                    Ok(a / b)
                }
            }
        }
    }
}

impl From<Operation> for OperationId {
    fn from(value: Operation) -> Self {
        value as OperationId
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reject non-finite operands before any run or job row is created.
///
/// This is the submission-time hard gate: NaN and ±Infinity never enter
/// the queue.
pub fn validate_finite_operands(number_a: f64, number_b: f64) -> Result<(), CoreError> {
    if !number_a.is_finite() || !number_b.is_finite() {
        return Err(CoreError::Validation(
            "Operands must be finite numbers".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_ids_match_seed_data() {
        assert_eq!(Operation::Add.id(), 1);
        assert_eq!(Operation::Subtract.id(), 2);
        assert_eq!(Operation::Multiply.id(), 3);
        assert_eq!(Operation::Divide.id(), 4);
    }

    #[test]
    fn operation_from_id_round_trips() {
        for op in ALL_OPERATIONS {
            assert_eq!(Operation::from_id(op.id()), Some(op));
        }
        assert_eq!(Operation::from_id(0), None);
        assert_eq!(Operation::from_id(5), None);
    }

    #[test]
    fn operation_serializes_to_wire_names() {
        assert_eq!(serde_json::to_string(&Operation::Add).unwrap(), "\"ADD\"");
        assert_eq!(
            serde_json::to_string(&Operation::Subtract).unwrap(),
            "\"SUBTRACT\""
        );
        assert_eq!(
            serde_json::to_string(&Operation::Multiply).unwrap(),
            "\"MULTIPLY\""
        );
        assert_eq!(
            serde_json::to_string(&Operation::Divide).unwrap(),
            "\"DIVIDE\""
        );
    }

    #[test]
    fn operation_deserialization_is_case_sensitive() {
        assert!(serde_json::from_str::<Operation>("\"ADD\"").is_ok());
        assert!(serde_json::from_str::<Operation>("\"add\"").is_err());
        assert!(serde_json::from_str::<Operation>("\"MODULO\"").is_err());
    }

    #[test]
    fn apply_computes_exact_results() {
        assert_eq!(Operation::Add.apply(10.0, 5.0), Ok(15.0));
        assert_eq!(Operation::Subtract.apply(10.0, 5.0), Ok(5.0));
        assert_eq!(Operation::Multiply.apply(10.0, 5.0), Ok(50.0));
        assert_eq!(Operation::Divide.apply(10.0, 5.0), Ok(2.0));
    }

    #[test]
    fn divide_by_zero_is_a_business_error() {
        let err = Operation::Divide.apply(10.0, 0.0).unwrap_err();
        assert_eq!(err, ComputeError::DivisionByZero);
        assert_eq!(err.to_string(), "Division by zero");
    }

    #[test]
    fn other_operations_accept_zero_operand() {
        assert_eq!(Operation::Add.apply(10.0, 0.0), Ok(10.0));
        assert_eq!(Operation::Subtract.apply(10.0, 0.0), Ok(10.0));
        assert_eq!(Operation::Multiply.apply(10.0, 0.0), Ok(0.0));
    }

    #[test]
    fn finite_operands_accepted() {
        assert!(validate_finite_operands(10.0, -5.5).is_ok());
        assert!(validate_finite_operands(0.0, 0.0).is_ok());
    }

    #[test]
    fn non_finite_operands_rejected() {
        assert!(validate_finite_operands(f64::NAN, 1.0).is_err());
        assert!(validate_finite_operands(1.0, f64::INFINITY).is_err());
        assert!(validate_finite_operands(f64::NEG_INFINITY, 1.0).is_err());
    }
}
