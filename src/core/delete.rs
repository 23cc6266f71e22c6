use chrono::{DateTime, Utc};
use sqlx::{Postgres, PgPool, QueryBuilder};

use crate::auth::Role;
use crate::core::filters::push_date_filter;
use crate::core::model::{table_def, DateComparison, DeleteOutcome, OperationFilters};
use crate::error::{AppError, AppResult};
use crate::joblog::{JobLogger, JobSource, JobStatus, JobType};

pub struct DeleteEngine {
    pool: PgPool,
    job_logger: JobLogger,
    retention_days: i64,
    preview_sample_size: i64,
}

impl DeleteEngine {
    pub fn new(pool: PgPool, job_logger: JobLogger, retention_days: i64, preview_sample_size: i64) -> Self {
        Self {
            pool,
            job_logger,
            retention_days,
            preview_sample_size,
        }
    }

    // DELETE-FROM-ARCHIVE algorithm (§4.D'): same skeleton as ARCHIVE, but
    // the target must already be an archive table, the retention floor is
    // 30 days rather than 7, and there's no duplicate-exclusion logic.
    pub async fn delete(
        &self,
        role: Role,
        table: &str,
        mut filters: OperationFilters,
        reason: &str,
        confirmed: bool,
        now: DateTime<Utc>,
    ) -> AppResult<DeleteOutcome> {
        if !role.can("delete_archive") {
            return Err(AppError::PermissionDenied {
                role: role.as_str().to_string(),
                action: "delete_archive".to_string(),
            });
        }

        let def = table_def(table).ok_or_else(|| AppError::ValidationError(format!("unknown table '{table}'")))?;
        if !crate::core::model::is_archive_table(table) {
            return Err(AppError::ValidationError(
                "DELETE can only target an archive table".to_string(),
            ));
        }

        let retention_floor = now - chrono::Duration::days(self.retention_days);

        if let Some(end) = &filters.date_end {
            let cutoff_day = &end[..8.min(end.len())];
            if let Ok(filter_date) = chrono::NaiveDate::parse_from_str(cutoff_day, "%Y%m%d") {
                if filter_date > retention_floor.date_naive() {
                    return Err(AppError::SafetyRuleViolation(format!(
                        "can only delete archive records older than {} days; cutoff {} is too recent",
                        self.retention_days,
                        filter_date.format("%Y-%m-%d")
                    )));
                }
            }
        } else {
            filters.date_end = Some(retention_floor.format("%Y%m%d%H%M%S").to_string());
            filters.date_comparison = Some(DateComparison::OlderThan);
        }

        if !confirmed {
            return self.preview(def, &filters).await;
        }

        let mut tx = self.pool.begin().await.map_err(AppError::from)?;
        let job_handle = self
            .job_logger
            .open(&mut tx, JobType::Delete, def.archive_table, None, JobSource::Chatbot, Some(reason))
            .await;

        let job_handle = match job_handle {
            Ok(h) => h,
            Err(e) => {
                let _ = tx.rollback().await;
                self.job_logger
                    .record_failure_fresh(JobType::Delete, def.archive_table, JobSource::Chatbot, &e.to_string())
                    .await
                    .ok();
                return Err(AppError::Internal(e.to_string()));
            }
        };

        let mut delete_builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!(r#"DELETE FROM {} WHERE 1=1"#, def.archive_table));
        push_date_filter(&mut delete_builder, def, &filters);

        let result = delete_builder.build().execute(&mut *tx).await;

        match result {
            Ok(r) => {
                let deleted = r.rows_affected() as i64;
                let close_reason = format!("Delete completed - Deleted: {deleted}");
                if let Err(e) = self
                    .job_logger
                    .close(&mut tx, job_handle, JobStatus::Success, deleted, Some(&close_reason))
                    .await
                {
                    let _ = tx.rollback().await;
                    self.job_logger
                        .record_failure_fresh(JobType::Delete, def.archive_table, JobSource::Chatbot, &e.to_string())
                        .await
                        .ok();
                    return Err(AppError::Internal(e.to_string()));
                }

                if let Err(e) = tx.commit().await {
                    self.job_logger
                        .record_failure_fresh(JobType::Delete, def.archive_table, JobSource::Chatbot, &e.to_string())
                        .await
                        .ok();
                    return Err(AppError::from(e));
                }

                Ok(DeleteOutcome::Executed {
                    records_deleted: deleted,
                    job_log_id: job_handle.id,
                })
            }
            Err(e) => {
                let _ = tx.rollback().await;
                self.job_logger
                    .record_failure_fresh(JobType::Delete, def.archive_table, JobSource::Chatbot, &e.to_string())
                    .await
                    .ok();
                Err(AppError::from(e))
            }
        }
    }

    async fn preview(
        &self,
        def: crate::core::model::TableDef,
        filters: &OperationFilters,
    ) -> AppResult<DeleteOutcome> {
        let mut count_builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!(r#"SELECT COUNT(*) FROM {} WHERE 1=1"#, def.archive_table));
        push_date_filter(&mut count_builder, def, filters);
        let (count,): (i64,) = count_builder
            .build_query_as()
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::from)?;

        let mut sample_builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT * FROM {} WHERE 1=1", def.archive_table));
        push_date_filter(&mut sample_builder, def, filters);
        sample_builder.push(" LIMIT ").push_bind(self.preview_sample_size);

        let sample_rows = sample_builder
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::from)?;
        let sample = sample_rows.iter().map(crate::core::rowfmt::row_to_json).collect();

        Ok(DeleteOutcome::Preview {
            preview_count: count,
            sample,
            requires_confirmation: count > 0,
        })
    }
}
