//! Domain core for the job dispatcher.
//!
//! Holds the pieces shared by the store and the worker with no internal
//! dependencies: lifecycle enums and their state machine, the claim
//! ordering used by the selection algorithm, and new-job validation.

pub mod error;
pub mod job;
pub mod job_events;
pub mod scheduling;
pub mod selection;
pub mod status;
pub mod types;

pub use error::CoreError;
pub use status::{JobStatus, Priority};
pub use types::{DbId, StatusId, Timestamp};
