mod common;

use chrono::{Duration, TimeZone, Utc};
use logctl::auth::Role;
use logctl::core::{ArchiveEngine, ArchiveOutcome, OperationFilters, ACTIVITIES, TRANSACTIONS};
use logctl::joblog::{JobLogger, JobLogsRepo, JobStatus, JobType};
use serial_test::serial;

fn reference_now() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 10, 15, 12, 0, 0).unwrap()
}

fn older_than_7_days_filter(now: chrono::DateTime<Utc>) -> OperationFilters {
    OperationFilters {
        date_start: None,
        date_end: Some((now - Duration::days(8)).format("%Y%m%d%H%M%S").to_string()),
        date_comparison: Some(logctl::core::model::DateComparison::OlderThan),
        limit: None,
    }
}

/// P1/P2/P8: a successful archive moves every eligible non-duplicate row,
/// leaves only duplicates behind, never archives a key twice, and running
/// the same call again archives nothing further.
#[tokio::test]
#[serial]
async fn archive_moves_eligible_rows_and_is_idempotent() {
    let pool = common::setup_db().await;
    let now = reference_now();
    let old = (now - Duration::days(10)).format("%Y%m%d%H%M%S").to_string();

    for i in 0..5 {
        common::insert_activity(&pool, &format!("A{i}"), &old).await;
    }

    let job_logger = JobLogger::new(pool.clone());
    let engine = ArchiveEngine::new(pool.clone(), job_logger, 7, 5, 1000);

    let outcome = engine
        .archive(Role::Admin, ACTIVITIES.main_table, older_than_7_days_filter(now), "test", true, now)
        .await
        .expect("archive should succeed");

    let (archived, deleted, skipped) = match outcome {
        ArchiveOutcome::Executed {
            records_archived,
            records_deleted,
            records_skipped,
            ..
        } => (records_archived, records_deleted, records_skipped),
        ArchiveOutcome::Preview { .. } => panic!("expected executed outcome"),
    };

    assert_eq!(archived, 5);
    assert_eq!(skipped, 0);
    assert_eq!(archived + skipped, deleted);

    let remaining_main = common::count_rows(&pool, "dsiactivities").await;
    assert_eq!(remaining_main, 0);
    let archived_count = common::count_rows(&pool, "dsiactivitiesarchive").await;
    assert_eq!(archived_count, 5);

    // P8: running the identical archive again finds nothing left in main.
    let second = engine
        .archive(Role::Admin, ACTIVITIES.main_table, older_than_7_days_filter(now), "test", true, now)
        .await
        .expect("second archive call should also succeed");

    match second {
        ArchiveOutcome::Executed { records_archived, .. } => assert_eq!(records_archived, 0),
        ArchiveOutcome::Preview { .. } => panic!("expected executed outcome"),
    }
}

/// P2/Boundary: a transaction row already present in the archive is
/// skipped, not duplicated, and the main row is left behind since it was
/// never actually archived.
#[tokio::test]
#[serial]
async fn archive_skips_rows_already_present_in_archive() {
    let pool = common::setup_db().await;
    let now = reference_now();
    let old = (now - Duration::days(10)).format("%Y%m%d%H%M%S").to_string();

    common::insert_transaction(&pool, Some("dup-guid"), &old).await;
    sqlx::query(
        r#"INSERT INTO dsitransactionlogarchive ("GUID", "TransactionType", "WhenReceived") VALUES ($1, 'test', $2)"#,
    )
    .bind("dup-guid")
    .bind(&old)
    .execute(&pool)
    .await
    .unwrap();

    let job_logger = JobLogger::new(pool.clone());
    let engine = ArchiveEngine::new(pool.clone(), job_logger, 7, 5, 1000);

    let outcome = engine
        .archive(Role::Admin, TRANSACTIONS.main_table, older_than_7_days_filter(now), "test", true, now)
        .await
        .unwrap();

    match outcome {
        ArchiveOutcome::Executed {
            records_archived,
            records_skipped,
            ..
        } => {
            assert_eq!(records_archived, 0);
            assert_eq!(records_skipped, 1);
        }
        ArchiveOutcome::Preview { .. } => panic!("expected executed outcome"),
    }

    // the skipped row is a genuine duplicate that is still in main.
    assert_eq!(common::count_rows(&pool, "dsitransactionlog").await, 1);
}

/// Boundary: a transaction row with a NULL GUID is excluded from both the
/// insert and the delete. It can never be matched against the archive.
#[tokio::test]
#[serial]
async fn archive_never_touches_null_guid_transactions() {
    let pool = common::setup_db().await;
    let now = reference_now();
    let old = (now - Duration::days(10)).format("%Y%m%d%H%M%S").to_string();

    common::insert_transaction(&pool, None, &old).await;

    let job_logger = JobLogger::new(pool.clone());
    let engine = ArchiveEngine::new(pool.clone(), job_logger, 7, 5, 1000);

    let outcome = engine
        .archive(Role::Admin, TRANSACTIONS.main_table, older_than_7_days_filter(now), "test", true, now)
        .await
        .unwrap();

    match outcome {
        ArchiveOutcome::Executed { records_archived, .. } => assert_eq!(records_archived, 0),
        ArchiveOutcome::Preview { .. } => panic!("expected executed outcome"),
    }
    assert_eq!(common::count_rows(&pool, "dsitransactionlog").await, 1);
    assert_eq!(common::count_rows(&pool, "dsitransactionlogarchive").await, 0);
}

/// P3: a preview with matching rows always requires confirmation and
/// never moves anything.
#[tokio::test]
#[serial]
async fn preview_requires_confirmation_and_moves_nothing() {
    let pool = common::setup_db().await;
    let now = reference_now();
    let old = (now - Duration::days(10)).format("%Y%m%d%H%M%S").to_string();
    common::insert_activity(&pool, "A1", &old).await;

    let job_logger = JobLogger::new(pool.clone());
    let engine = ArchiveEngine::new(pool.clone(), job_logger, 7, 5, 1000);

    let outcome = engine
        .archive(Role::Admin, ACTIVITIES.main_table, older_than_7_days_filter(now), "test", false, now)
        .await
        .unwrap();

    match outcome {
        ArchiveOutcome::Preview {
            preview_count,
            requires_confirmation,
            ..
        } => {
            assert_eq!(preview_count, 1);
            assert!(requires_confirmation);
        }
        ArchiveOutcome::Executed { .. } => panic!("expected preview outcome"),
    }

    assert_eq!(common::count_rows(&pool, "dsiactivities").await, 1);
    assert_eq!(common::count_rows(&pool, "dsiactivitiesarchive").await, 0);
}

/// Boundary: an empty filter match previews as zero with no confirmation
/// required.
#[tokio::test]
#[serial]
async fn preview_with_no_matches_does_not_require_confirmation() {
    let pool = common::setup_db().await;
    let now = reference_now();

    let job_logger = JobLogger::new(pool.clone());
    let engine = ArchiveEngine::new(pool.clone(), job_logger, 7, 5, 1000);

    let outcome = engine
        .archive(Role::Admin, ACTIVITIES.main_table, older_than_7_days_filter(now), "test", false, now)
        .await
        .unwrap();

    match outcome {
        ArchiveOutcome::Preview {
            preview_count,
            requires_confirmation,
            ..
        } => {
            assert_eq!(preview_count, 0);
            assert!(!requires_confirmation);
        }
        ArchiveOutcome::Executed { .. } => panic!("expected preview outcome"),
    }
}

/// P4: archiving rows newer than the 7-day retention floor is refused
/// outright, and no job-log SUCCESS row is ever written for it.
#[tokio::test]
#[serial]
async fn archive_refuses_rows_inside_retention_floor() {
    let pool = common::setup_db().await;
    let now = reference_now();
    let recent = (now - Duration::days(1)).format("%Y%m%d%H%M%S").to_string();
    common::insert_activity(&pool, "A1", &recent).await;

    let filters = OperationFilters {
        date_start: None,
        date_end: Some(recent),
        date_comparison: Some(logctl::core::model::DateComparison::OlderThan),
        limit: None,
    };

    let job_logger = JobLogger::new(pool.clone());
    let engine = ArchiveEngine::new(pool.clone(), job_logger, 7, 5, 1000);

    let err = engine
        .archive(Role::Admin, ACTIVITIES.main_table, filters, "test", true, now)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "SafetyRuleViolation");
    assert_eq!(common::count_rows(&pool, "dsiactivities").await, 1);

    let repo = JobLogsRepo::new(pool.clone());
    let summary = repo.summary_stats().await.unwrap();
    assert!(summary
        .by_status
        .iter()
        .all(|(status, count)| status != JobStatus::Success.as_str() || *count == 0));
}

/// Boundary: `limit: N` archives and deletes exactly N rows, the oldest
/// first.
#[tokio::test]
#[serial]
async fn archive_respects_limit_oldest_first() {
    let pool = common::setup_db().await;
    let now = reference_now();

    for i in 0..10 {
        let posted = (now - Duration::days(10 + i)).format("%Y%m%d%H%M%S").to_string();
        common::insert_activity(&pool, &format!("A{i}"), &posted).await;
    }

    let filters = OperationFilters {
        date_start: None,
        date_end: Some((now - Duration::days(8)).format("%Y%m%d%H%M%S").to_string()),
        date_comparison: Some(logctl::core::model::DateComparison::OlderThan),
        limit: Some(3),
    };

    let job_logger = JobLogger::new(pool.clone());
    let engine = ArchiveEngine::new(pool.clone(), job_logger, 7, 5, 1000);

    let outcome = engine
        .archive(Role::Admin, ACTIVITIES.main_table, filters, "test", true, now)
        .await
        .unwrap();

    match outcome {
        ArchiveOutcome::Executed { records_archived, .. } => assert_eq!(records_archived, 3),
        ArchiveOutcome::Preview { .. } => panic!("expected executed outcome"),
    }
    assert_eq!(common::count_rows(&pool, "dsiactivities").await, 7);
    assert_eq!(common::count_rows(&pool, "dsiactivitiesarchive").await, 3);
}

/// P7: a successful archive writes exactly one job-log row, finished_at
/// at or after started_at, status SUCCESS.
#[tokio::test]
#[serial]
async fn archive_writes_exactly_one_job_log_row() {
    let pool = common::setup_db().await;
    let now = reference_now();
    let old = (now - Duration::days(10)).format("%Y%m%d%H%M%S").to_string();
    common::insert_activity(&pool, "A1", &old).await;

    let job_logger = JobLogger::new(pool.clone());
    let engine = ArchiveEngine::new(pool.clone(), job_logger, 7, 5, 1000);

    engine
        .archive(Role::Admin, ACTIVITIES.main_table, older_than_7_days_filter(now), "test", true, now)
        .await
        .unwrap();

    let repo = JobLogsRepo::new(pool.clone());
    let rows = repo
        .search(&logctl::joblog::JobLogQuery {
            job_type: Some(JobType::Archive.as_str().to_string()),
            limit: 10,
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(row.status, JobStatus::Success.as_str());
    let finished = row.finished_at.expect("finished_at should be set");
    assert!(finished >= row.started_at);
}

/// Monitor role cannot archive at all, regardless of what it would find.
#[tokio::test]
#[serial]
async fn monitor_role_cannot_archive() {
    let pool = common::setup_db().await;
    let now = reference_now();

    let job_logger = JobLogger::new(pool.clone());
    let engine = ArchiveEngine::new(pool.clone(), job_logger, 7, 5, 1000);

    let err = engine
        .archive(Role::Monitor, ACTIVITIES.main_table, older_than_7_days_filter(now), "test", false, now)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "PermissionDenied");
}
