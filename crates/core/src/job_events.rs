//! Event type names for job lifecycle notifications.
//!
//! Used by the worker and intake when publishing on the event bus.

/// A new Pending job was stored.
pub const EVENT_JOB_CREATED: &str = "job.created";

/// A job's status or timestamps changed (claim or terminal transition).
pub const EVENT_JOB_UPDATED: &str = "job.updated";
