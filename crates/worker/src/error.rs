use jobsched_core::CoreError;
use jobsched_db::StoreError;

/// Errors surfaced by the scheduler, pool, intake and configuration.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Worker pool is shut down")]
    PoolShutDown,

    #[error("Invalid configuration for {key}: {message}")]
    Config { key: &'static str, message: String },
}

/// Outcome of a job body that did not finish normally.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BodyError {
    #[error("{0}")]
    Failed(String),

    #[error("Job body panicked: {0}")]
    Panicked(String),
}
