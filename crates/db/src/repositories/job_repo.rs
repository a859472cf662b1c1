//! Repository for the `jobs` table.
//!
//! Status and priority are written through their lookup ids; no raw
//! literals appear in the queries.

use chrono::Utc;
use jobsched_core::scheduling::state_machine;
use jobsched_core::selection::sort_claimed;
use jobsched_core::{DbId, JobStatus, StatusId};
use sqlx::PgPool;

use crate::error::StoreError;
use crate::models::job::{Job, JobListQuery, JobRow, JobUpdate, NewJob};

/// Column list for `jobs` queries.
const COLUMNS: &str = "\
    id, name, estimated_duration_ms, priority_id, deadline, status_id, \
    created_at, updated_at, started_at, completed_at";

/// Provides CRUD and claim operations for jobs.
pub struct JobRepo;

impl JobRepo {
    /// Create a new pending job.
    pub async fn create(pool: &PgPool, input: &NewJob) -> Result<Job, StoreError> {
        let query = format!(
            "INSERT INTO jobs (name, estimated_duration_ms, priority_id, deadline, status_id) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, JobRow>(&query)
            .bind(&input.name)
            .bind(input.estimated_duration_ms)
            .bind(input.priority.id())
            .bind(input.deadline)
            .bind(JobStatus::Pending.id())
            .fetch_one(pool)
            .await?;
        row.try_into()
    }

    /// Find a job by id.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Job>, StoreError> {
        let query = format!("SELECT {COLUMNS} FROM jobs WHERE id = $1");
        sqlx::query_as::<_, JobRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await?
            .map(Job::try_from)
            .transpose()
    }

    /// List jobs newest-first with optional status filter and pagination.
    pub async fn list(pool: &PgPool, params: &JobListQuery) -> Result<Vec<Job>, StoreError> {
        let (limit, offset) = params.page();
        let query = format!(
            "SELECT {COLUMNS} FROM jobs \
             WHERE ($1::SMALLINT IS NULL OR status_id = $1) \
             ORDER BY created_at DESC, id DESC \
             LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, JobRow>(&query)
            .bind(params.status.map(JobStatus::id))
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await?
            .into_iter()
            .map(Job::try_from)
            .collect()
    }

    /// Atomically claim up to `limit` pending jobs.
    ///
    /// Uses `SELECT FOR UPDATE SKIP LOCKED` so concurrent claimers never
    /// select the same row and never wait on each other's locks. Selection
    /// and the transition to Running happen in one statement.
    pub async fn claim(pool: &PgPool, limit: i64) -> Result<Vec<Job>, StoreError> {
        if limit <= 0 {
            return Ok(Vec::new());
        }

        let query = format!(
            "UPDATE jobs \
             SET status_id = $1, started_at = NOW(), updated_at = NOW() \
             WHERE status_id = $2 AND id IN ( \
                 SELECT id FROM jobs \
                 WHERE status_id = $2 \
                 ORDER BY priority_id ASC, deadline ASC, id ASC \
                 LIMIT $3 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING {COLUMNS}"
        );
        let rows = sqlx::query_as::<_, JobRow>(&query)
            .bind(JobStatus::Running.id())
            .bind(JobStatus::Pending.id())
            .bind(limit)
            .fetch_all(pool)
            .await?;

        let mut jobs = rows
            .into_iter()
            .map(Job::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        // RETURNING order is unspecified.
        sort_claimed(&mut jobs, Job::claim_key);
        Ok(jobs)
    }

    /// Apply a partial update under a row lock.
    ///
    /// Returns `Ok(None)` if `only_if_status` does not match the locked row.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        input: &JobUpdate,
    ) -> Result<Option<Job>, StoreError> {
        let mut tx = pool.begin().await?;

        let current: Option<StatusId> =
            sqlx::query_scalar("SELECT status_id FROM jobs WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        let current = current.ok_or_else(|| StoreError::job_not_found(id))?;
        let current = JobStatus::try_from(current)?;

        if let Some(expected) = input.only_if_status.filter(|expected| *expected != current) {
            tracing::debug!(job_id = id, %current, %expected, "Guarded job update skipped");
            return Ok(None);
        }

        let mut started_at = input.started_at;
        let mut completed_at = input.completed_at;
        if let Some(target) = input.status.filter(|target| *target != current) {
            state_machine::validate_transition(current, target)?;
            let now = Utc::now();
            if target == JobStatus::Running {
                started_at.get_or_insert(now);
            }
            if target.is_terminal() {
                completed_at.get_or_insert(now);
            }
        }

        let query = format!(
            "UPDATE jobs SET \
                 status_id = COALESCE($2, status_id), \
                 started_at = COALESCE($3, started_at), \
                 completed_at = COALESCE($4, completed_at), \
                 updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, JobRow>(&query)
            .bind(id)
            .bind(input.status.map(JobStatus::id))
            .bind(started_at)
            .bind(completed_at)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Job::try_from(row).map(Some)
    }

    /// Delete a job unless it is Running. Executions cascade.
    ///
    /// Returns `false` if the job does not exist.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, StoreError> {
        let mut tx = pool.begin().await?;

        let current: Option<StatusId> =
            sqlx::query_scalar("SELECT status_id FROM jobs WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        let Some(current) = current else {
            return Ok(false);
        };
        if current == JobStatus::Running.id() {
            return Err(StoreError::Conflict(format!(
                "Job {id} is running and cannot be deleted"
            )));
        }

        sqlx::query("DELETE FROM jobs WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(true)
    }
}
