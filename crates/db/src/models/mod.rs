//! Domain model structs and DTOs.
//!
//! Each submodule contains:
//! - A `FromRow` + `Serialize` entity struct matching the database row
//! - `Deserialize` DTOs for the operations the API accepts

pub mod job;
pub mod queue_entry;
pub mod run;
pub mod status;
pub mod user;
