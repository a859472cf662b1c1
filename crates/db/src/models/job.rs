//! Job entity model and DTOs.

use std::time::Duration;

use jobsched_core::job::{millis_to_duration, run_time, wait_time};
use jobsched_core::selection::ClaimKey;
use jobsched_core::{DbId, JobStatus, Priority, StatusId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::StoreError;

/// Maximum page size for job listing.
pub const MAX_LIMIT: i64 = 100;

/// Default page size for job listing.
pub const DEFAULT_LIMIT: i64 = 50;

/// A job as seen by the scheduler and by readers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Job {
    pub id: DbId,
    pub name: String,
    pub estimated_duration_ms: i64,
    pub priority: Priority,
    pub deadline: Timestamp,
    pub status: JobStatus,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
}

impl Job {
    /// The fields that decide claim order.
    pub fn claim_key(&self) -> ClaimKey {
        ClaimKey::new(self.id, self.priority, self.deadline)
    }

    /// How long the job body is expected to take.
    pub fn estimated_duration(&self) -> Duration {
        millis_to_duration(self.estimated_duration_ms)
    }

    /// Actual run time once the job has finished.
    pub fn duration(&self) -> Option<Duration> {
        run_time(self.started_at, self.completed_at)
    }

    /// Time spent waiting to be claimed.
    pub fn wait_time(&self, now: Timestamp) -> Duration {
        wait_time(self.created_at, self.started_at, now)
    }

    /// Whether `now` is past the deadline.
    pub fn is_overdue(&self, now: Timestamp) -> bool {
        now > self.deadline
    }
}

/// A row from the `jobs` table with raw lookup ids.
#[derive(Debug, Clone, FromRow)]
pub(crate) struct JobRow {
    pub id: DbId,
    pub name: String,
    pub estimated_duration_ms: i64,
    pub priority_id: StatusId,
    pub deadline: Timestamp,
    pub status_id: StatusId,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
}

impl TryFrom<JobRow> for Job {
    type Error = StoreError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            name: row.name,
            estimated_duration_ms: row.estimated_duration_ms,
            priority: Priority::try_from(row.priority_id)?,
            deadline: row.deadline,
            status: JobStatus::try_from(row.status_id)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
            started_at: row.started_at,
            completed_at: row.completed_at,
        })
    }
}

/// DTO for creating a new Pending job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewJob {
    pub name: String,
    pub estimated_duration_ms: i64,
    #[serde(default)]
    pub priority: Priority,
    pub deadline: Timestamp,
}

/// Partial update applied atomically to a single job.
///
/// `None` fields are left unchanged. When `only_if_status` is set the update
/// applies only if the job currently has that status; otherwise the store
/// reports that nothing was updated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobUpdate {
    pub status: Option<JobStatus>,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub only_if_status: Option<JobStatus>,
}

impl JobUpdate {
    /// Running -> Completed, guarded on the job still being Running.
    pub fn complete(at: Timestamp) -> Self {
        Self {
            status: Some(JobStatus::Completed),
            completed_at: Some(at),
            only_if_status: Some(JobStatus::Running),
            ..Self::default()
        }
    }

    /// Running -> Failed, guarded on the job still being Running.
    pub fn fail(at: Timestamp) -> Self {
        Self {
            status: Some(JobStatus::Failed),
            completed_at: Some(at),
            only_if_status: Some(JobStatus::Running),
            ..Self::default()
        }
    }
}

/// Query parameters for listing jobs.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobListQuery {
    /// Filter by status.
    pub status: Option<JobStatus>,
    /// Maximum number of results. Defaults to 50, capped at 100.
    pub limit: Option<i64>,
    /// Number of results to skip. Defaults to 0.
    pub offset: Option<i64>,
}

impl JobListQuery {
    /// Effective `(limit, offset)` after defaults and clamping.
    pub fn page(&self) -> (i64, i64) {
        let limit = self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        let offset = self.offset.unwrap_or(0).max(0);
        (limit, offset)
    }
}
