//! Execution history model. One row per dispatch attempt.

use std::time::Duration;

use jobsched_core::job::millis_to_duration;
use jobsched_core::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `job_executions` table.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct Execution {
    pub id: DbId,
    pub job_id: DbId,
    pub started_at: Timestamp,
    pub completed_at: Option<Timestamp>,
    pub execution_time_ms: Option<i64>,
    pub success: bool,
    pub error_message: Option<String>,
}

impl Execution {
    /// Recorded execution time, once finalized.
    pub fn duration(&self) -> Option<Duration> {
        self.execution_time_ms.map(millis_to_duration)
    }

    pub fn is_finalized(&self) -> bool {
        self.completed_at.is_some()
    }
}

/// Final outcome written to an execution exactly once.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionUpdate {
    pub completed_at: Timestamp,
    pub execution_time_ms: i64,
    pub success: bool,
    pub error_message: Option<String>,
}
