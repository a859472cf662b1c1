//! The job store contract shared by the scheduler and its collaborators.

use async_trait::async_trait;
use jobsched_core::DbId;

use crate::error::StoreError;
use crate::models::execution::{Execution, ExecutionUpdate};
use crate::models::job::{Job, JobListQuery, JobUpdate, NewJob};

/// Backend-agnostic job store.
///
/// The store is the single source of truth for job and execution state.
/// Every method reads or writes fresh state; implementations must not cache.
#[async_trait]
pub trait JobStore: Send + Sync {
    // ── Jobs ────────────────────────────────────────────────────────

    /// Insert a new Pending job.
    async fn create_job(&self, input: &NewJob) -> Result<Job, StoreError>;

    /// Read a job's current state.
    async fn get_job(&self, id: DbId) -> Result<Job, StoreError>;

    /// List jobs newest-first, optionally filtered by status.
    async fn list_jobs(&self, query: &JobListQuery) -> Result<Vec<Job>, StoreError>;

    /// Atomically claim up to `limit` Pending jobs in tier/deadline/id order,
    /// moving each to Running with `started_at` set in the same operation.
    ///
    /// Rows held by a concurrent claimer are skipped, never waited on.
    /// Returns the claimed jobs in claim order; empty when nothing is
    /// Pending or `limit` is zero.
    async fn select_and_claim(&self, limit: usize) -> Result<Vec<Job>, StoreError>;

    /// Apply a partial update to one job.
    ///
    /// Returns `Ok(None)` when `only_if_status` did not match. Status changes
    /// that break the lifecycle state machine are rejected with
    /// [`StoreError::Conflict`].
    async fn update_job(&self, id: DbId, update: &JobUpdate) -> Result<Option<Job>, StoreError>;

    /// Delete a job and its executions. Running jobs cannot be deleted.
    ///
    /// Returns `false` if the job did not exist.
    async fn delete_job(&self, id: DbId) -> Result<bool, StoreError>;

    // ── Executions ──────────────────────────────────────────────────

    /// Open a new execution record for `job_id` (`success = false`, not
    /// finalized).
    async fn create_execution(&self, job_id: DbId) -> Result<Execution, StoreError>;

    /// Finalize an execution. Returns `Ok(None)` if it was already
    /// finalized.
    async fn update_execution(
        &self,
        id: DbId,
        update: &ExecutionUpdate,
    ) -> Result<Option<Execution>, StoreError>;

    /// Executions of a job, newest first.
    async fn list_executions(&self, job_id: DbId) -> Result<Vec<Execution>, StoreError>;
}
