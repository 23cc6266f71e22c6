use chrono::{Duration, Utc};
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::env;

use logctl::core::{ACTIVITIES, TRANSACTIONS};
use logctl::joblog::{JobLog, JobLogger};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!(
            "logctladmin <command>\n\
             Commands:\n\
             - reset\n\
             - seed <n>\n\
             - demo\n\
             - timeline <job_log_id>\n\
             - demo-timeline\n\
             \n\
             Uses DATABASE_URL or TEST_DATABASE_URL.\n"
        );
        std::process::exit(2);
    }

    let url = env::var("DATABASE_URL")
        .or_else(|_| env::var("TEST_DATABASE_URL"))
        .expect("DATABASE_URL or TEST_DATABASE_URL must be set");

    let pool = PgPoolOptions::new().max_connections(5).connect(&url).await?;

    match args[1].as_str() {
        "reset" => reset(&pool).await?,
        "seed" => {
            let n: i64 = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(10);
            seed(&pool, n).await?;
        }
        "demo" => {
            reset(&pool).await?;
            seed(&pool, 20).await?;
            show_counts(&pool).await?;
        }
        "timeline" => {
            let id: i64 = args
                .get(2)
                .expect("usage: logctladmin timeline <job_log_id>")
                .parse()?;
            print_timeline(&pool, id).await?;
        }
        "demo-timeline" => {
            reset(&pool).await?;
            seed(&pool, 20).await?;
            let job_id = run_demo_archive(&pool).await?;
            println!("\n=== TIMELINE for job_log {job_id} ===");
            print_timeline(&pool, job_id).await?;
        }
        other => {
            eprintln!("Unknown command: {other}");
            std::process::exit(2);
        }
    }

    Ok(())
}

async fn reset(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        TRUNCATE TABLE
            job_logs,
            dsiactivitiesarchive,
            dsiactivities,
            dsitransactionlogarchive,
            dsitransactionlog
        RESTART IDENTITY CASCADE
        "#,
    )
    .execute(pool)
    .await?;

    println!("reset OK");
    Ok(())
}

// Seeds n activity rows and n transaction rows with timestamps spread
// backwards from today, so a demo archive/delete run has rows on both
// sides of the retention floor.
async fn seed(pool: &PgPool, n: i64) -> anyhow::Result<()> {
    for i in 0..n {
        let posted = Utc::now() - Duration::days(i);
        let posted_str = posted.format("%Y%m%d%H%M%S").to_string();

        sqlx::query(
            r#"
            INSERT INTO dsiactivities ("ActivityID", "ActivityType", "PostedTime", "Description")
            VALUES ($1, 'demo', $2, 'seeded by logctladmin')
            "#,
        )
        .bind(1000 + i)
        .bind(&posted_str)
        .execute(pool)
        .await?;

        let guid = uuid::Uuid::new_v4().to_string();
        sqlx::query(
            r#"
            INSERT INTO dsitransactionlog ("GUID", "TransactionType", "WhenReceived")
            VALUES ($1, 'demo', $2)
            "#,
        )
        .bind(&guid)
        .bind(&posted_str)
        .execute(pool)
        .await?;

        println!("+ seeded activity {} / transaction {guid} at {posted_str}", 1000 + i);
    }
    Ok(())
}

async fn show_counts(pool: &PgPool) -> anyhow::Result<()> {
    for table in [
        ACTIVITIES.main_table,
        ACTIVITIES.archive_table,
        TRANSACTIONS.main_table,
        TRANSACTIONS.archive_table,
    ] {
        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(pool)
            .await?;
        println!("{table}: {count}");
    }
    Ok(())
}

// Same code path the chat orchestrator drives, invoked directly for a demo
// timeline.
async fn run_demo_archive(pool: &PgPool) -> anyhow::Result<i64> {
    let job_logger = JobLogger::new(pool.clone());
    let engine = logctl::core::ArchiveEngine::new(pool.clone(), job_logger, 7, 5, 1000);

    let outcome = engine
        .archive(
            logctl::auth::Role::Admin,
            ACTIVITIES.main_table,
            logctl::core::OperationFilters::default(),
            "logctladmin demo-timeline",
            true,
            Utc::now(),
        )
        .await?;

    match outcome {
        logctl::core::ArchiveOutcome::Executed { job_log_id, .. } => Ok(job_log_id),
        logctl::core::ArchiveOutcome::Preview { .. } => {
            anyhow::bail!("expected an executed archive outcome, got a preview")
        }
    }
}

async fn print_timeline(pool: &PgPool, job_log_id: i64) -> anyhow::Result<()> {
    let log: JobLog = sqlx::query_as(
        r#"
        SELECT id, schema_name, job_type, table_name, status, source, reason, records_affected, started_at, finished_at
        FROM job_logs
        WHERE id = $1
        "#,
    )
    .bind(job_log_id)
    .fetch_one(pool)
    .await?;

    println!(
        "JOB_LOG: id={} type={} table={} status={} source={} started_at={} finished_at={:?} records_affected={:?} reason={:?}",
        log.id,
        log.job_type,
        log.table_name,
        log.status,
        log.source,
        log.started_at,
        log.finished_at,
        log.records_affected,
        log.reason,
    );

    Ok(())
}
