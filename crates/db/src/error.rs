use jobsched_core::{CoreError, DbId};

/// Errors returned by [`JobStore`](crate::JobStore) implementations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// A row held a lookup id that no enum variant maps to.
    #[error("Corrupt row: {0}")]
    Corrupt(String),
}

impl StoreError {
    pub fn job_not_found(id: DbId) -> Self {
        Self::NotFound { entity: "job", id }
    }

    pub fn execution_not_found(id: DbId) -> Self {
        Self::NotFound {
            entity: "execution",
            id,
        }
    }
}

impl From<CoreError> for StoreError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::NotFound { entity, id } => Self::NotFound { entity, id },
            CoreError::Validation(msg) => Self::Validation(msg),
            CoreError::Conflict(msg) => Self::Conflict(msg),
            CoreError::Internal(msg) => Self::Corrupt(msg),
        }
    }
}
