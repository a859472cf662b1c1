//! Repository for the `job_executions` table.

use jobsched_core::DbId;
use sqlx::PgPool;

use crate::error::StoreError;
use crate::models::execution::{Execution, ExecutionUpdate};

/// Column list for `job_executions` queries.
const COLUMNS: &str = "\
    id, job_id, started_at, completed_at, execution_time_ms, success, error_message";

/// Provides create/finalize/list operations for execution history.
pub struct ExecutionRepo;

impl ExecutionRepo {
    /// Open an execution for `job_id` with `success = false`.
    pub async fn create(pool: &PgPool, job_id: DbId) -> Result<Execution, StoreError> {
        let query = format!(
            "INSERT INTO job_executions (job_id, started_at, success) \
             SELECT id, NOW(), FALSE FROM jobs WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Execution>(&query)
            .bind(job_id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| StoreError::job_not_found(job_id))
    }

    /// Write the final outcome. Only an unfinalized execution is updated.
    pub async fn finish(
        pool: &PgPool,
        id: DbId,
        input: &ExecutionUpdate,
    ) -> Result<Option<Execution>, StoreError> {
        let query = format!(
            "UPDATE job_executions SET \
                 completed_at = $2, \
                 execution_time_ms = $3, \
                 success = $4, \
                 error_message = $5 \
             WHERE id = $1 AND completed_at IS NULL \
             RETURNING {COLUMNS}"
        );
        let updated = sqlx::query_as::<_, Execution>(&query)
            .bind(id)
            .bind(input.completed_at)
            .bind(input.execution_time_ms)
            .bind(input.success)
            .bind(&input.error_message)
            .fetch_optional(pool)
            .await?;
        if updated.is_some() {
            return Ok(updated);
        }

        let exists: Option<DbId> = sqlx::query_scalar("SELECT id FROM job_executions WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?;
        match exists {
            Some(_) => Ok(None),
            None => Err(StoreError::execution_not_found(id)),
        }
    }

    /// All executions of a job, newest first.
    pub async fn list_by_job(pool: &PgPool, job_id: DbId) -> Result<Vec<Execution>, StoreError> {
        let query = format!(
            "SELECT {COLUMNS} FROM job_executions \
             WHERE job_id = $1 \
             ORDER BY started_at DESC, id DESC"
        );
        Ok(sqlx::query_as::<_, Execution>(&query)
            .bind(job_id)
            .fetch_all(pool)
            .await?)
    }
}
