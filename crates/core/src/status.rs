//! Lookup enums mapping to SMALLINT columns.
//!
//! Each variant's discriminant matches the seed data (1-based) in the
//! corresponding lookup table created by the migrations.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::StatusId;

macro_rules! define_status_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $val:literal => $label:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[repr(i16)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $val ),+
        }

        impl $name {
            /// Every variant in id order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Return the database id.
            pub fn id(self) -> StatusId {
                self as StatusId
            }

            /// Look up a variant by database id.
            pub fn from_id(id: StatusId) -> Option<Self> {
                match id {
                    $( $val => Some($name::$variant), )+
                    _ => None,
                }
            }

            /// Lowercase name as stored in the lookup table.
            pub fn as_str(self) -> &'static str {
                match self {
                    $( $name::$variant => $label, )+
                }
            }
        }

        impl From<$name> for StatusId {
            fn from(value: $name) -> Self {
                value as StatusId
            }
        }

        impl TryFrom<StatusId> for $name {
            type Error = CoreError;

            fn try_from(id: StatusId) -> Result<Self, Self::Error> {
                Self::from_id(id).ok_or_else(|| {
                    CoreError::Internal(format!(
                        "Unknown {} id: {id}",
                        stringify!($name)
                    ))
                })
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
    /// Job lifecycle status.
    JobStatus {
        Pending = 1 => "pending",
        Running = 2 => "running",
        Completed = 3 => "completed",
        Failed = 4 => "failed",
    }
}

define_status_enum! {
    /// Job priority tier. Lower id is dispatched first.
    Priority {
        High = 1 => "high",
        Medium = 2 => "medium",
        Low = 3 => "low",
    }
}

impl JobStatus {
    /// Completed and Failed accept no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::Medium
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_status_ids_match_seed_data() {
        assert_eq!(JobStatus::Pending.id(), 1);
        assert_eq!(JobStatus::Running.id(), 2);
        assert_eq!(JobStatus::Completed.id(), 3);
        assert_eq!(JobStatus::Failed.id(), 4);
    }

    #[test]
    fn priority_ids_are_tier_order() {
        assert_eq!(Priority::High.id(), 1);
        assert_eq!(Priority::Medium.id(), 2);
        assert_eq!(Priority::Low.id(), 3);
        assert!(Priority::High < Priority::Medium);
        assert!(Priority::Medium < Priority::Low);
    }

    #[test]
    fn unknown_id_is_rejected() {
        assert!(JobStatus::from_id(9).is_none());
        assert!(Priority::try_from(0).is_err());
        assert_eq!(JobStatus::try_from(2).unwrap(), JobStatus::Running);
    }

    #[test]
    fn status_into_status_id() {
        let id: StatusId = JobStatus::Failed.into();
        assert_eq!(id, 4);
    }

    #[test]
    fn serde_uses_lowercase_names() {
        let json = serde_json::to_string(&Priority::High).unwrap();
        assert_eq!(json, "\"high\"");
        let parsed: JobStatus = serde_json::from_str("\"completed\"").unwrap();
        assert_eq!(parsed, JobStatus::Completed);
        assert_eq!(JobStatus::Running.to_string(), "running");
    }

    #[test]
    fn only_completed_and_failed_are_terminal() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }
}
