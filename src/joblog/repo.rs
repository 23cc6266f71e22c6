use sqlx::{PgPool, Postgres, Transaction};

use crate::joblog::model::{JobLogHandle, JobSource, JobStatus, JobType};

// Opens and closes `job_logs` rows. `open`/`close` run inside the caller's
// transaction; `record_failure_fresh` opens its own, for use after the
// caller's transaction has already rolled back.
#[derive(Clone)]
pub struct JobLogger {
    pool: PgPool,
}

impl JobLogger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn open(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        job_type: JobType,
        table_name: &str,
        schema_name: Option<&str>,
        source: JobSource,
        reason: Option<&str>,
    ) -> anyhow::Result<JobLogHandle> {
        let rec: (i64,) = sqlx::query_as(
            r#"
            INSERT INTO job_logs (schema_name, job_type, table_name, status, source, reason, started_at)
            VALUES ($1, $2, $3, $4, $5, $6, now())
            RETURNING id
            "#,
        )
        .bind(schema_name)
        .bind(job_type.as_str())
        .bind(table_name)
        .bind(JobStatus::InProgress.as_str())
        .bind(source.as_str())
        .bind(reason)
        .fetch_one(&mut **tx)
        .await?;

        Ok(JobLogHandle { id: rec.0 })
    }

    pub async fn close(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        handle: JobLogHandle,
        status: JobStatus,
        records_affected: i64,
        reason: Option<&str>,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE job_logs
            SET status = $2, records_affected = $3, reason = $4, finished_at = now()
            WHERE id = $1
            "#,
        )
        .bind(handle.id)
        .bind(status.as_str())
        .bind(records_affected)
        .bind(reason)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    // Writes a complete IN_PROGRESS -> FAILED job-log in one fresh
    // transaction, independent of whatever just rolled back.
    pub async fn record_failure_fresh(
        &self,
        job_type: JobType,
        table_name: &str,
        source: JobSource,
        error: &str,
    ) -> anyhow::Result<JobLogHandle> {
        let mut tx = self.pool.begin().await?;
        let handle = self
            .open(&mut tx, job_type, table_name, None, source, None)
            .await?;
        self.close(&mut tx, handle, JobStatus::Failed, 0, Some(error))
            .await?;
        tx.commit().await?;
        Ok(handle)
    }

    // For an operation that never opened a transaction at all.
    pub async fn log_failed(
        &self,
        job_type: JobType,
        table_name: &str,
        source: JobSource,
        error: &str,
    ) -> anyhow::Result<JobLogHandle> {
        self.record_failure_fresh(job_type, table_name, source, error)
            .await
    }
}
