//! Postgres-backed [`JobStore`].

use async_trait::async_trait;
use jobsched_core::DbId;
use sqlx::PgPool;

use crate::error::StoreError;
use crate::models::execution::{Execution, ExecutionUpdate};
use crate::models::job::{Job, JobListQuery, JobUpdate, NewJob};
use crate::repositories::{ExecutionRepo, JobRepo};
use crate::store::JobStore;

/// [`JobStore`] over a shared connection pool.
#[derive(Clone)]
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn create_job(&self, input: &NewJob) -> Result<Job, StoreError> {
        JobRepo::create(&self.pool, input).await
    }

    async fn get_job(&self, id: DbId) -> Result<Job, StoreError> {
        JobRepo::find_by_id(&self.pool, id)
            .await?
            .ok_or_else(|| StoreError::job_not_found(id))
    }

    async fn list_jobs(&self, query: &JobListQuery) -> Result<Vec<Job>, StoreError> {
        JobRepo::list(&self.pool, query).await
    }

    async fn select_and_claim(&self, limit: usize) -> Result<Vec<Job>, StoreError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        JobRepo::claim(&self.pool, limit).await
    }

    async fn update_job(&self, id: DbId, update: &JobUpdate) -> Result<Option<Job>, StoreError> {
        JobRepo::update(&self.pool, id, update).await
    }

    async fn delete_job(&self, id: DbId) -> Result<bool, StoreError> {
        JobRepo::delete(&self.pool, id).await
    }

    async fn create_execution(&self, job_id: DbId) -> Result<Execution, StoreError> {
        ExecutionRepo::create(&self.pool, job_id).await
    }

    async fn update_execution(
        &self,
        id: DbId,
        update: &ExecutionUpdate,
    ) -> Result<Option<Execution>, StoreError> {
        ExecutionRepo::finish(&self.pool, id, update).await
    }

    async fn list_executions(&self, job_id: DbId) -> Result<Vec<Execution>, StoreError> {
        ExecutionRepo::list_by_job(&self.pool, job_id).await
    }
}
