mod common;

use chrono::{Duration, TimeZone, Utc};
use logctl::auth::Role;
use logctl::core::{DeleteEngine, DeleteOutcome, OperationFilters, ACTIVITIES, TRANSACTIONS};
use logctl::joblog::{JobLogger, JobLogsRepo, JobStatus, JobType};
use serial_test::serial;

fn reference_now() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 10, 15, 12, 0, 0).unwrap()
}

fn older_than_30_days_filter(now: chrono::DateTime<Utc>) -> OperationFilters {
    OperationFilters {
        date_start: None,
        date_end: Some((now - Duration::days(31)).format("%Y%m%d%H%M%S").to_string()),
        date_comparison: Some(logctl::core::model::DateComparison::OlderThan),
        limit: None,
    }
}

async fn insert_archived_activity(pool: &sqlx::PgPool, activity_id: &str, posted_time: &str) {
    sqlx::query(
        r#"INSERT INTO dsiactivitiesarchive ("ActivityID", "ActivityType", "PostedTime", "Description")
           VALUES ($1, 'test', $2, 'test row')"#,
    )
    .bind(activity_id)
    .bind(posted_time)
    .execute(pool)
    .await
    .expect("failed to insert archived activity");
}

async fn insert_archived_transaction(pool: &sqlx::PgPool, guid: &str, when_received: &str) {
    sqlx::query(
        r#"INSERT INTO dsitransactionlogarchive ("GUID", "TransactionType", "WhenReceived")
           VALUES ($1, 'test', $2)"#,
    )
    .bind(guid)
    .bind(when_received)
    .execute(pool)
    .await
    .expect("failed to insert archived transaction");
}

/// P5: deleting archive rows newer than the 30-day retention floor is
/// refused outright, and nothing is removed.
#[tokio::test]
#[serial]
async fn delete_refuses_rows_inside_retention_floor() {
    let pool = common::setup_db().await;
    let now = reference_now();
    let recent = (now - Duration::days(10)).format("%Y%m%d%H%M%S").to_string();
    insert_archived_activity(&pool, "A1", &recent).await;

    let filters = OperationFilters {
        date_start: None,
        date_end: Some(recent),
        date_comparison: Some(logctl::core::model::DateComparison::OlderThan),
        limit: None,
    };

    let job_logger = JobLogger::new(pool.clone());
    let engine = DeleteEngine::new(pool.clone(), job_logger, 30, 5);

    let err = engine
        .delete(Role::Admin, ACTIVITIES.archive_table, filters, "test", true, now)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "SafetyRuleViolation");
    assert_eq!(common::count_rows(&pool, "dsiactivitiesarchive").await, 1);

    let repo = JobLogsRepo::new(pool.clone());
    let summary = repo.summary_stats().await.unwrap();
    assert!(summary
        .by_status
        .iter()
        .all(|(status, count)| status != JobStatus::Success.as_str() || *count == 0));
}

/// Invariant 1: DELETE can never target a main table, only its archive
/// counterpart.
#[tokio::test]
#[serial]
async fn delete_rejects_main_table_target() {
    let pool = common::setup_db().await;
    let now = reference_now();

    let job_logger = JobLogger::new(pool.clone());
    let engine = DeleteEngine::new(pool.clone(), job_logger, 30, 5);

    let err = engine
        .delete(Role::Admin, ACTIVITIES.main_table, older_than_30_days_filter(now), "test", false, now)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "ValidationError");
}

/// Deleting archive rows past the retention floor removes exactly the
/// matching rows and writes one SUCCESS job-log row (P7).
#[tokio::test]
#[serial]
async fn delete_removes_eligible_archive_rows() {
    let pool = common::setup_db().await;
    let now = reference_now();
    let old = (now - Duration::days(40)).format("%Y%m%d%H%M%S").to_string();

    for i in 0..4 {
        insert_archived_activity(&pool, &format!("A{i}"), &old).await;
    }

    let job_logger = JobLogger::new(pool.clone());
    let engine = DeleteEngine::new(pool.clone(), job_logger, 30, 5);

    let outcome = engine
        .delete(Role::Admin, ACTIVITIES.archive_table, older_than_30_days_filter(now), "test", true, now)
        .await
        .unwrap();

    match outcome {
        DeleteOutcome::Executed { records_deleted, .. } => assert_eq!(records_deleted, 4),
        DeleteOutcome::Preview { .. } => panic!("expected executed outcome"),
    }
    assert_eq!(common::count_rows(&pool, "dsiactivitiesarchive").await, 0);

    let repo = JobLogsRepo::new(pool.clone());
    let rows = repo
        .search(&logctl::joblog::JobLogQuery {
            job_type: Some(JobType::Delete.as_str().to_string()),
            limit: 10,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status, JobStatus::Success.as_str());
    assert_eq!(rows[0].records_affected, Some(4));
}

/// P3-analogue for DELETE: a preview with matches requires confirmation
/// and removes nothing.
#[tokio::test]
#[serial]
async fn delete_preview_requires_confirmation_and_removes_nothing() {
    let pool = common::setup_db().await;
    let now = reference_now();
    let old = (now - Duration::days(40)).format("%Y%m%d%H%M%S").to_string();
    insert_archived_transaction(&pool, "guid-1", &old).await;

    let job_logger = JobLogger::new(pool.clone());
    let engine = DeleteEngine::new(pool.clone(), job_logger, 30, 5);

    let outcome = engine
        .delete(Role::Admin, TRANSACTIONS.archive_table, older_than_30_days_filter(now), "test", false, now)
        .await
        .unwrap();

    match outcome {
        DeleteOutcome::Preview {
            preview_count,
            requires_confirmation,
            ..
        } => {
            assert_eq!(preview_count, 1);
            assert!(requires_confirmation);
        }
        DeleteOutcome::Executed { .. } => panic!("expected preview outcome"),
    }
    assert_eq!(common::count_rows(&pool, "dsitransactionlogarchive").await, 1);
}

/// Monitor role cannot delete from an archive table at all.
#[tokio::test]
#[serial]
async fn monitor_role_cannot_delete() {
    let pool = common::setup_db().await;
    let now = reference_now();

    let job_logger = JobLogger::new(pool.clone());
    let engine = DeleteEngine::new(pool.clone(), job_logger, 30, 5);

    let err = engine
        .delete(Role::Monitor, ACTIVITIES.archive_table, older_than_30_days_filter(now), "test", false, now)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "PermissionDenied");
}
