use std::sync::Arc;

use anyhow::Context;
use jobsched_db::{JobStore, PgJobStore};
use jobsched_events::EventBus;
use jobsched_worker::{DatabaseConfig, Scheduler, SchedulerConfig, SimulatedWork};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "jobsched_worker=debug,jobsched_db=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = SchedulerConfig::from_env()?;
    let db_config = DatabaseConfig::from_env()?;
    let poll_interval_ms = u64::try_from(config.poll_interval.as_millis()).unwrap_or(u64::MAX);
    tracing::info!(
        capacity = config.capacity,
        poll_interval_ms,
        "Loaded scheduler configuration",
    );

    // --- Database ---
    let pool = jobsched_db::create_pool(&db_config.url, db_config.max_connections)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Database connection pool created");

    jobsched_db::health_check(&pool)
        .await
        .context("Database health check failed")?;
    tracing::info!("Database health check passed");

    jobsched_db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database migrations applied");

    // --- Event bus ---
    let event_bus = Arc::new(EventBus::default());
    let log_handle = tokio::spawn(log_events(event_bus.subscribe()));

    // --- Scheduler ---
    let store: Arc<dyn JobStore> = Arc::new(PgJobStore::new(pool));
    let scheduler = Scheduler::new(config, store, Arc::clone(&event_bus), Arc::new(SimulatedWork));
    scheduler.start();

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    tracing::info!("Shutdown signal received");

    scheduler.stop();
    log_handle.abort();

    let in_flight = scheduler.in_flight_ids();
    if !in_flight.is_empty() {
        tracing::warn!(?in_flight, "Exiting with jobs still running");
    }
    Ok(())
}

/// Log every lifecycle event published on the bus.
async fn log_events(mut rx: tokio::sync::broadcast::Receiver<jobsched_events::JobEvent>) {
    loop {
        match rx.recv().await {
            Ok(event) => tracing::debug!(
                event_type = %event.event_type,
                job_id = event.job_id,
                status = ?event.status,
                "Job event",
            ),
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Event logger lagged");
            }
            Err(RecvError::Closed) => break,
        }
    }
}
