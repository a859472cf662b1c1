//! Job lifecycle state machine and scheduling constants.
//!
//! This module lives in `core` (zero internal deps) so it can be used by both
//! the store implementations and the worker.

use std::time::Duration;

/// Default number of jobs that may run at once.
pub const DEFAULT_CAPACITY: usize = 3;

/// Default sleep between scheduler loop iterations.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

/// Lifecycle transitions: Pending -> Running -> {Completed, Failed}.
///
/// Pending -> Running is performed only by the claim; Running -> terminal
/// only by the worker that owns the job.
pub mod state_machine {
    use crate::error::CoreError;
    use crate::status::JobStatus;

    /// Returns the set of valid target statuses reachable from `from`.
    ///
    /// Terminal states return an empty slice.
    pub fn valid_transitions(from: JobStatus) -> &'static [JobStatus] {
        match from {
            JobStatus::Pending => &[JobStatus::Running],
            JobStatus::Running => &[JobStatus::Completed, JobStatus::Failed],
            JobStatus::Completed | JobStatus::Failed => &[],
        }
    }

    /// Check whether a transition from `from` to `to` is valid.
    pub fn can_transition(from: JobStatus, to: JobStatus) -> bool {
        valid_transitions(from).contains(&to)
    }

    /// Validate a state transition, returning a conflict error for invalid ones.
    pub fn validate_transition(from: JobStatus, to: JobStatus) -> Result<(), CoreError> {
        if can_transition(from, to) {
            Ok(())
        } else {
            Err(CoreError::Conflict(format!(
                "Invalid transition: {from} ({}) -> {to} ({})",
                from.id(),
                to.id()
            )))
        }
    }
}
