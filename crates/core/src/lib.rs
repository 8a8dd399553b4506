//! Shared domain types for the quadcalc computation engine.
//!
//! This crate has no internal dependencies and holds the pieces every other
//! crate agrees on: ID/timestamp aliases, the domain error type, the fixed
//! arithmetic operation set, and the queue retry policy.

pub mod error;
pub mod ops;
pub mod retry;
pub mod types;
