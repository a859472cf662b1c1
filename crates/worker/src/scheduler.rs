//! Scheduler loop.
//!
//! Polls the store every `poll_interval`, claims as many Pending jobs as
//! there are free worker slots, and hands them to the [`WorkerPool`].
//! Claiming is atomic in the store, so several schedulers may share one
//! store without double-dispatching a job.

use std::sync::{Arc, Mutex, MutexGuard};

use jobsched_core::DbId;
use jobsched_db::JobStore;
use jobsched_events::EventBus;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::body::JobBody;
use crate::config::SchedulerConfig;
use crate::error::WorkerError;
use crate::pool::{InFlightSet, JobRunner, Rejected, WorkerPool};

/// Handle to a running loop task.
struct LoopHandle {
    cancel: CancellationToken,
    // Detached on stop; kept so the task is owned by the scheduler.
    _task: JoinHandle<()>,
}

/// State shared between the scheduler handle and its loop task.
struct Dispatcher {
    config: SchedulerConfig,
    store: Arc<dyn JobStore>,
    runner: Arc<JobRunner>,
    pool: WorkerPool,
    in_flight: InFlightSet,
    /// Serializes dispatch iterations, so an old loop still finishing its
    /// last iteration after `stop()` cannot claim alongside a new one.
    dispatch_lock: tokio::sync::Mutex<()>,
}

impl Dispatcher {
    async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let poll_interval_ms =
            u64::try_from(self.config.poll_interval.as_millis()).unwrap_or(u64::MAX);
        tracing::info!(
            capacity = self.config.capacity,
            poll_interval_ms,
            "Scheduler started",
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Scheduler stopped");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.dispatch_once().await {
                        tracing::error!(error = %e, "Dispatch cycle failed");
                    }
                }
            }
        }
    }

    async fn dispatch_once(&self) -> Result<usize, WorkerError> {
        let _guard = self.dispatch_lock.lock().await;
        if !self.pool.is_accepting() {
            return Ok(0);
        }

        let available = self.config.capacity.saturating_sub(self.in_flight.len());
        if available == 0 {
            tracing::debug!(capacity = self.config.capacity, "All worker slots busy");
            return Ok(0);
        }

        let claimed = self.store.select_and_claim(available).await?;
        if claimed.is_empty() {
            tracing::debug!("No pending jobs");
            return Ok(0);
        }
        tracing::info!(
            claimed = claimed.len(),
            available,
            capacity = self.config.capacity,
            "Claimed jobs",
        );

        let mut dispatched = 0;
        for job in claimed {
            let job_id = job.id;
            let slot = self.in_flight.acquire(job_id);
            self.runner.publish_update(&job);

            if let Err(rejected) = self.pool.submit(Arc::clone(&self.runner), job, slot) {
                // Stopped between claim and submit. The job is already
                // Running, so run it inline rather than strand it.
                tracing::warn!(
                    job_id,
                    error = %rejected.reason,
                    "Pool closed after claim, running job inline",
                );
                let Rejected { job, slot, .. } = rejected;
                self.runner.execute(job).await;
                drop(slot);
            }
            dispatched += 1;
        }
        Ok(dispatched)
    }
}

/// Priority/deadline job scheduler.
///
/// Owns its worker pool and in-flight set. Create one per process (or per
/// test); there is no global instance.
///
/// ```rust,no_run
/// # use std::sync::Arc;
/// # use jobsched_db::MemoryJobStore;
/// # use jobsched_events::EventBus;
/// # use jobsched_worker::{Scheduler, SchedulerConfig, SimulatedWork};
/// # async fn demo() {
/// let scheduler = Scheduler::new(
///     SchedulerConfig::default(),
///     Arc::new(MemoryJobStore::new()),
///     Arc::new(EventBus::default()),
///     Arc::new(SimulatedWork),
/// );
/// scheduler.start();
/// // ...
/// scheduler.stop();
/// # }
/// ```
pub struct Scheduler {
    dispatcher: Arc<Dispatcher>,
    handle: Mutex<Option<LoopHandle>>,
}

impl Scheduler {
    pub fn new(
        config: SchedulerConfig,
        store: Arc<dyn JobStore>,
        bus: Arc<EventBus>,
        body: Arc<dyn JobBody>,
    ) -> Self {
        let runner = Arc::new(JobRunner::new(Arc::clone(&store), bus, body));
        let pool = WorkerPool::new(config.capacity);
        Self {
            dispatcher: Arc::new(Dispatcher {
                config,
                store,
                runner,
                pool,
                in_flight: InFlightSet::new(),
                dispatch_lock: tokio::sync::Mutex::new(()),
            }),
            handle: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.dispatcher.config
    }

    /// Start the polling loop on the current tokio runtime.
    ///
    /// Returns `false` (and does nothing) if the loop is already running.
    pub fn start(&self) -> bool {
        let mut handle = self.lock_handle();
        if handle.is_some() {
            return false;
        }

        self.dispatcher.pool.reopen();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(Arc::clone(&self.dispatcher).run(cancel.clone()));
        *handle = Some(LoopHandle {
            cancel,
            _task: task,
        });
        true
    }

    /// Stop the polling loop and close the pool to new jobs.
    ///
    /// Does not wait for jobs already running; they finish and release
    /// their slots on their own. Returns `false` if the loop was not
    /// running.
    pub fn stop(&self) -> bool {
        let Some(handle) = self.lock_handle().take() else {
            return false;
        };
        handle.cancel.cancel();
        self.dispatcher.pool.shutdown();
        true
    }

    pub fn is_running(&self) -> bool {
        self.lock_handle().is_some()
    }

    /// Run one dispatch iteration now and return how many jobs were
    /// dispatched.
    pub async fn dispatch_once(&self) -> Result<usize, WorkerError> {
        self.dispatcher.dispatch_once().await
    }

    pub fn in_flight_count(&self) -> usize {
        self.dispatcher.in_flight.len()
    }

    /// Ids of the jobs currently occupying a worker slot, ascending.
    pub fn in_flight_ids(&self) -> Vec<DbId> {
        self.dispatcher.in_flight.ids()
    }

    fn lock_handle(&self) -> MutexGuard<'_, Option<LoopHandle>> {
        self.handle.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
