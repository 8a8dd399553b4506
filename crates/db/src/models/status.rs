//! Status helper enums mapping to SMALLSERIAL/SMALLINT lookup tables.
//!
//! Each enum variant's discriminant matches the seed data order (1-based)
//! in the corresponding `*_statuses` database table, and its serde name is
//! the case-sensitive wire value.

/// Status ID type matching SMALLINT/SMALLSERIAL in the database.
pub type StatusId = i16;

macro_rules! define_status_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $val:literal => $wire:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[repr(i16)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
        pub enum $name {
            $( $(#[$vmeta])* #[serde(rename = $wire)] $variant = $val ),+
        }

        impl $name {
            /// Return the database status ID.
            pub fn id(self) -> StatusId {
                self as StatusId
            }

            /// Resolve a status from its database ID.
            pub fn from_id(id: StatusId) -> Option<Self> {
                match id {
                    $( $val => Some(Self::$variant), )+
                    _ => None,
                }
            }

            /// The wire name (e.g. `"IN_PROGRESS"`).
            pub fn as_str(self) -> &'static str {
                match self {
                    $( Self::$variant => $wire ),+
                }
            }
        }

        impl From<$name> for StatusId {
            fn from(value: $name) -> Self {
                value as StatusId
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

define_status_enum! {
    /// Run lifecycle status, derived from the run's job set.
    RunStatus {
        Pending = 1 => "PENDING",
        InProgress = 2 => "IN_PROGRESS",
        Completed = 3 => "COMPLETED",
        Failed = 4 => "FAILED",
    }
}

define_status_enum! {
    /// Job execution status. Transitions are strictly
    /// PENDING -> IN_PROGRESS -> {COMPLETED | FAILED}.
    JobStatus {
        Pending = 1 => "PENDING",
        InProgress = 2 => "IN_PROGRESS",
        Completed = 3 => "COMPLETED",
        Failed = 4 => "FAILED",
    }
}

impl JobStatus {
    /// Terminal statuses admit no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_status_ids_match_seed_data() {
        assert_eq!(RunStatus::Pending.id(), 1);
        assert_eq!(RunStatus::InProgress.id(), 2);
        assert_eq!(RunStatus::Completed.id(), 3);
        assert_eq!(RunStatus::Failed.id(), 4);
    }

    #[test]
    fn job_status_ids_match_seed_data() {
        assert_eq!(JobStatus::Pending.id(), 1);
        assert_eq!(JobStatus::InProgress.id(), 2);
        assert_eq!(JobStatus::Completed.id(), 3);
        assert_eq!(JobStatus::Failed.id(), 4);
    }

    #[test]
    fn status_into_status_id() {
        let id: StatusId = JobStatus::Pending.into();
        assert_eq!(id, 1);
    }

    #[test]
    fn from_id_round_trips() {
        for id in 1..=4 {
            assert_eq!(JobStatus::from_id(id).unwrap().id(), id);
            assert_eq!(RunStatus::from_id(id).unwrap().id(), id);
        }
        assert_eq!(JobStatus::from_id(0), None);
        assert_eq!(JobStatus::from_id(5), None);
    }

    #[test]
    fn wire_names_are_screaming_snake_case() {
        assert_eq!(JobStatus::InProgress.as_str(), "IN_PROGRESS");
        assert_eq!(
            serde_json::to_string(&JobStatus::InProgress).unwrap(),
            "\"IN_PROGRESS\""
        );
        assert!(serde_json::from_str::<JobStatus>("\"in_progress\"").is_err());
    }

    #[test]
    fn terminal_statuses() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::InProgress.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }
}
