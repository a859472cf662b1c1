//! New-job validation and timing helpers.
//!
//! Validation runs at the intake boundary; everything downstream of a
//! Pending row assumes the job passed these checks.

use std::time::Duration;

use crate::error::CoreError;
use crate::types::Timestamp;

/// Maximum length of a job name.
pub const MAX_NAME_LEN: usize = 255;

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate a job name.
///
/// Rules:
/// - Must not be empty or whitespace only.
/// - Must not exceed `MAX_NAME_LEN` characters.
pub fn validate_job_name(name: &str) -> Result<(), CoreError> {
    if name.trim().is_empty() {
        return Err(CoreError::Validation(
            "Job name must not be empty".to_string(),
        ));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(CoreError::Validation(format!(
            "Job name must not exceed {MAX_NAME_LEN} characters"
        )));
    }
    Ok(())
}

/// Estimated duration must be strictly positive.
pub fn validate_estimated_duration(duration_ms: i64) -> Result<(), CoreError> {
    if duration_ms <= 0 {
        return Err(CoreError::Validation(
            "Estimated duration must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

/// Deadline must be strictly after `now`.
pub fn validate_deadline(deadline: Timestamp, now: Timestamp) -> Result<(), CoreError> {
    if deadline <= now {
        return Err(CoreError::Validation(
            "Deadline must be in the future".to_string(),
        ));
    }
    Ok(())
}

/// Run every new-job check, stopping at the first failure.
pub fn validate_new_job(
    name: &str,
    estimated_duration_ms: i64,
    deadline: Timestamp,
    now: Timestamp,
) -> Result<(), CoreError> {
    validate_job_name(name)?;
    validate_estimated_duration(estimated_duration_ms)?;
    validate_deadline(deadline, now)
}

// ---------------------------------------------------------------------------
// Timing
// ---------------------------------------------------------------------------

/// Milliseconds between two timestamps, clamped at zero.
pub fn elapsed_ms(from: Timestamp, to: Timestamp) -> i64 {
    (to - from).num_milliseconds().max(0)
}

/// Convert a stored millisecond count into a [`Duration`]. Negative values
/// become zero.
pub fn millis_to_duration(ms: i64) -> Duration {
    Duration::from_millis(ms.max(0) as u64)
}

/// Time a job spent queued: until it started, or until `now` if it has not.
pub fn wait_time(created_at: Timestamp, started_at: Option<Timestamp>, now: Timestamp) -> Duration {
    millis_to_duration(elapsed_ms(created_at, started_at.unwrap_or(now)))
}

/// Run time of a finished job, `None` until both ends are known.
pub fn run_time(started_at: Option<Timestamp>, completed_at: Option<Timestamp>) -> Option<Duration> {
    match (started_at, completed_at) {
        (Some(start), Some(end)) => Some(millis_to_duration(elapsed_ms(start, end))),
        _ => None,
    }
}
