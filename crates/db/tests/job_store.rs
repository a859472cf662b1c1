//! Postgres store tests. They need a live database:
//! `DATABASE_URL=... cargo test -p jobsched-db -- --ignored`.

use std::collections::HashSet;

use assert_matches::assert_matches;
use chrono::{Duration, Utc};
use jobsched_core::{JobStatus, Priority};
use jobsched_db::models::execution::ExecutionUpdate;
use jobsched_db::models::job::{JobListQuery, JobUpdate, NewJob};
use jobsched_db::{JobStore, PgJobStore, StoreError};
use sqlx::PgPool;

fn new_job(name: &str, priority: Priority, deadline_secs: i64) -> NewJob {
    NewJob {
        name: name.to_string(),
        estimated_duration_ms: 250,
        priority,
        deadline: Utc::now() + Duration::seconds(deadline_secs),
    }
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_bootstrap_seeds_lookup_tables(pool: PgPool) {
    jobsched_db::health_check(&pool).await.unwrap();

    for (table, expected) in [("job_statuses", 4_i64), ("job_priorities", 3)] {
        let count: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(&pool)
            .await
            .unwrap_or_else(|e| panic!("{table} query failed: {e}"));
        assert_eq!(count.0, expected, "{table} seed rows");
    }
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_create_and_get(pool: PgPool) {
    let store = PgJobStore::new(pool);
    let created = store
        .create_job(&new_job("render", Priority::High, 60))
        .await
        .unwrap();

    assert_eq!(created.status, JobStatus::Pending);
    assert_eq!(created.priority, Priority::High);
    assert!(created.started_at.is_none());

    let fetched = store.get_job(created.id).await.unwrap();
    assert_eq!(fetched.id, created.id);
    assert_eq!(fetched.name, "render");

    assert_matches!(
        store.get_job(created.id + 1000).await,
        Err(StoreError::NotFound { entity: "job", .. })
    );
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_claim_follows_tier_then_deadline(pool: PgPool) {
    let store = PgJobStore::new(pool);
    let low_urgent = store.create_job(&new_job("low", Priority::Low, 1)).await.unwrap();
    let medium_late = store
        .create_job(&new_job("medium-late", Priority::Medium, 500))
        .await
        .unwrap();
    let medium_early = store
        .create_job(&new_job("medium-early", Priority::Medium, 50))
        .await
        .unwrap();
    let high = store
        .create_job(&new_job("high", Priority::High, 86_400))
        .await
        .unwrap();

    let claimed = store.select_and_claim(3).await.unwrap();
    let ids: Vec<_> = claimed.iter().map(|j| j.id).collect();
    assert_eq!(ids, vec![high.id, medium_early.id, medium_late.id]);
    assert!(claimed
        .iter()
        .all(|j| j.status == JobStatus::Running && j.started_at.is_some()));

    let left = store.get_job(low_urgent.id).await.unwrap();
    assert_eq!(left.status, JobStatus::Pending);
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_concurrent_claims_are_disjoint(pool: PgPool) {
    let store = PgJobStore::new(pool);
    for i in 0..30 {
        store
            .create_job(&new_job(&format!("job-{i}"), Priority::Medium, 60 + i))
            .await
            .unwrap();
    }

    let mut handles = Vec::new();
    for _ in 0..6 {
        let store = store.clone();
        handles.push(tokio::spawn(async move { store.select_and_claim(4).await }));
    }

    let mut seen = HashSet::new();
    for handle in handles {
        for job in handle.await.unwrap().unwrap() {
            assert!(seen.insert(job.id), "job {} claimed twice", job.id);
        }
    }
    assert!(seen.len() <= 24);

    let running = store
        .list_jobs(&JobListQuery {
            status: Some(JobStatus::Running),
            limit: Some(100),
            offset: None,
        })
        .await
        .unwrap();
    assert_eq!(running.len(), seen.len());
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_guarded_update_and_transitions(pool: PgPool) {
    let store = PgJobStore::new(pool);
    let job = store.create_job(&new_job("a", Priority::Low, 60)).await.unwrap();

    // Not Running yet, so the guarded completion is a no-op.
    let skipped = store
        .update_job(job.id, &JobUpdate::complete(Utc::now()))
        .await
        .unwrap();
    assert!(skipped.is_none());

    let illegal = JobUpdate {
        status: Some(JobStatus::Failed),
        ..JobUpdate::default()
    };
    assert_matches!(
        store.update_job(job.id, &illegal).await,
        Err(StoreError::Conflict(_))
    );

    store.select_and_claim(1).await.unwrap();
    let done = store
        .update_job(job.id, &JobUpdate::complete(Utc::now()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(done.status, JobStatus::Completed);
    assert!(done.completed_at.is_some());
    assert!(done.duration().is_some());
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_execution_lifecycle_and_cascade(pool: PgPool) {
    let store = PgJobStore::new(pool);
    store.create_job(&new_job("a", Priority::High, 60)).await.unwrap();
    let job = store.select_and_claim(1).await.unwrap().remove(0);

    let execution = store.create_execution(job.id).await.unwrap();
    assert!(!execution.success);
    assert!(!execution.is_finalized());

    assert_matches!(
        store.delete_job(job.id).await,
        Err(StoreError::Conflict(_))
    );

    let update = ExecutionUpdate {
        completed_at: Utc::now(),
        execution_time_ms: 5,
        success: false,
        error_message: Some("boom".to_string()),
    };
    let finished = store
        .update_execution(execution.id, &update)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(finished.error_message.as_deref(), Some("boom"));
    assert!(store
        .update_execution(execution.id, &update)
        .await
        .unwrap()
        .is_none());

    store
        .update_job(job.id, &JobUpdate::fail(Utc::now()))
        .await
        .unwrap();
    assert!(store.delete_job(job.id).await.unwrap());
    assert!(store.list_executions(job.id).await.unwrap().is_empty());
}
