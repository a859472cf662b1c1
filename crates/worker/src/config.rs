//! Environment-driven configuration for the dispatcher.

use std::str::FromStr;
use std::time::Duration;

use jobsched_core::scheduling::{DEFAULT_CAPACITY, DEFAULT_POLL_INTERVAL};
use jobsched_db::DEFAULT_MAX_CONNECTIONS;

use crate::error::WorkerError;

/// Scheduler loop and worker pool settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Maximum number of jobs in flight at once (default: `3`).
    pub capacity: usize,
    /// Sleep between loop iterations (default: 1 s).
    pub poll_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl SchedulerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                      | Default |
    /// |------------------------------|---------|
    /// | `SCHEDULER_CAPACITY`         | `3`     |
    /// | `SCHEDULER_POLL_INTERVAL_MS` | `1000`  |
    pub fn from_env() -> Result<Self, WorkerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) but reads variables through
    /// `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, WorkerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let capacity = parse_or(&lookup, "SCHEDULER_CAPACITY", defaults.capacity)?;
        let poll_ms = parse_or(
            &lookup,
            "SCHEDULER_POLL_INTERVAL_MS",
            u64::try_from(defaults.poll_interval.as_millis()).unwrap_or(u64::MAX),
        )?;

        Self::default()
            .with_capacity(capacity)
            .and_then(|config| config.with_poll_interval(Duration::from_millis(poll_ms)))
    }

    pub fn with_capacity(mut self, capacity: usize) -> Result<Self, WorkerError> {
        if capacity == 0 {
            return Err(WorkerError::Config {
                key: "SCHEDULER_CAPACITY",
                message: "must be at least 1".to_string(),
            });
        }
        self.capacity = capacity;
        Ok(self)
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Result<Self, WorkerError> {
        if poll_interval.is_zero() {
            return Err(WorkerError::Config {
                key: "SCHEDULER_POLL_INTERVAL_MS",
                message: "must be greater than zero".to_string(),
            });
        }
        self.poll_interval = poll_interval;
        Ok(self)
    }
}

/// Postgres connection settings for the binary.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl DatabaseConfig {
    /// | Env Var                    | Default    |
    /// |----------------------------|------------|
    /// | `DATABASE_URL`             | (required) |
    /// | `DATABASE_MAX_CONNECTIONS` | `20`       |
    pub fn from_env() -> Result<Self, WorkerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, WorkerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = lookup("DATABASE_URL")
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| WorkerError::Config {
                key: "DATABASE_URL",
                message: "must be set".to_string(),
            })?;
        let max_connections =
            parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS)?;
        Ok(Self {
            url,
            max_connections,
        })
    }
}

fn parse_or<T, F>(lookup: &F, key: &'static str, default: T) -> Result<T, WorkerError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| WorkerError::Config {
            key,
            message: format!("{raw:?} is not valid: {e}"),
        }),
    }
}
