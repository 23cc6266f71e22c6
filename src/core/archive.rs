use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::auth::Role;
use crate::core::duplicates::{self, push_exclusion};
use crate::core::filters::{order_limit_literal, push_date_filter, push_order_and_limit, where_literal};
use crate::core::model::{table_def, ArchiveOutcome, DateComparison, OperationFilters};
use crate::error::{AppError, AppResult};
use crate::joblog::{JobLogger, JobSource, JobStatus, JobType};

pub struct ArchiveEngine {
    pool: PgPool,
    job_logger: JobLogger,
    retention_days: i64,
    preview_sample_size: i64,
    duplicate_probe_batch: usize,
}

impl ArchiveEngine {
    pub fn new(
        pool: PgPool,
        job_logger: JobLogger,
        retention_days: i64,
        preview_sample_size: i64,
        duplicate_probe_batch: usize,
    ) -> Self {
        Self {
            pool,
            job_logger,
            retention_days,
            preview_sample_size,
            duplicate_probe_batch,
        }
    }

    // ARCHIVE algorithm from the component design (§4.D): authorize, gate
    // retention, preview-or-execute, duplicate-safe insert, bounded source
    // delete, all inside one transaction when confirmed.
    pub async fn archive(
        &self,
        role: Role,
        table: &str,
        mut filters: OperationFilters,
        reason: &str,
        confirmed: bool,
        now: DateTime<Utc>,
    ) -> AppResult<ArchiveOutcome> {
        if !role.can("archive") {
            return Err(AppError::PermissionDenied {
                role: role.as_str().to_string(),
                action: "archive".to_string(),
            });
        }

        let def = table_def(table).ok_or_else(|| AppError::ValidationError(format!("unknown table '{table}'")))?;
        if crate::core::model::is_archive_table(table) {
            return Err(AppError::ValidationError(
                "ARCHIVE cannot target an archive table".to_string(),
            ));
        }

        let retention_floor = now - chrono::Duration::days(self.retention_days);

        if let Some(end) = &filters.date_end {
            let cutoff_day = &end[..8.min(end.len())];
            if let Ok(filter_date) = chrono::NaiveDate::parse_from_str(cutoff_day, "%Y%m%d") {
                if filter_date > retention_floor.date_naive() {
                    return Err(AppError::SafetyRuleViolation(format!(
                        "can only archive records older than {} days; cutoff {} is too recent",
                        self.retention_days,
                        filter_date.format("%Y-%m-%d")
                    )));
                }
            }
        } else {
            // No explicit cutoff: synthesize the default retention boundary.
            filters.date_end = Some(retention_floor.format("%Y%m%d%H%M%S").to_string());
            filters.date_comparison = Some(DateComparison::OlderThan);
        }

        if !confirmed {
            return self.preview(def, &filters).await;
        }

        let mut tx = self.pool.begin().await.map_err(AppError::from)?;
        let job_handle = self
            .job_logger
            .open(
                &mut tx,
                JobType::Archive,
                def.main_table,
                None,
                JobSource::Chatbot,
                Some(reason),
            )
            .await;

        let job_handle = match job_handle {
            Ok(h) => h,
            Err(e) => {
                let _ = tx.rollback().await;
                self.job_logger
                    .record_failure_fresh(JobType::Archive, def.main_table, JobSource::Chatbot, &e.to_string())
                    .await
                    .ok();
                return Err(AppError::Internal(e.to_string()));
            }
        };

        let outcome = self.execute(&mut tx, def, &filters).await;

        match outcome {
            Ok((archived, skipped)) => {
                let deleted_reported = archived + skipped;
                let close_reason = format!(
                    "Archive completed - Archived: {archived}, Deleted: {deleted_reported}, Skipped duplicates: {skipped}"
                );
                if let Err(e) = self
                    .job_logger
                    .close(&mut tx, job_handle, JobStatus::Success, archived, Some(&close_reason))
                    .await
                {
                    let _ = tx.rollback().await;
                    self.job_logger
                        .record_failure_fresh(JobType::Archive, def.main_table, JobSource::Chatbot, &e.to_string())
                        .await
                        .ok();
                    return Err(AppError::Internal(e.to_string()));
                }

                if let Err(e) = tx.commit().await {
                    self.job_logger
                        .record_failure_fresh(JobType::Archive, def.main_table, JobSource::Chatbot, &e.to_string())
                        .await
                        .ok();
                    return Err(AppError::from(e));
                }

                match duplicates::post_commit_conflict_count(&self.pool, def).await {
                    Ok(n) if n > 0 => {
                        tracing::warn!(table = def.main_table, conflicts = n, "post-commit duplicate conflicts detected");
                    }
                    Ok(_) => {}
                    Err(e) => tracing::warn!(table = def.main_table, error = %e, "post-commit conflict check failed"),
                }

                Ok(ArchiveOutcome::Executed {
                    records_archived: archived,
                    records_deleted: deleted_reported,
                    records_skipped: skipped,
                    job_log_id: job_handle.id,
                })
            }
            Err(e) => {
                let _ = tx.rollback().await;
                self.job_logger
                    .record_failure_fresh(JobType::Archive, def.main_table, JobSource::Chatbot, &e.to_string())
                    .await
                    .ok();
                Err(AppError::Internal(e.to_string()))
            }
        }
    }

    async fn preview(
        &self,
        def: crate::core::model::TableDef,
        filters: &OperationFilters,
    ) -> AppResult<ArchiveOutcome> {
        let mut count_builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!(r#"SELECT COUNT(*) FROM {} WHERE 1=1"#, def.main_table));
        push_date_filter(&mut count_builder, def, filters);
        let (count,): (i64,) = count_builder
            .build_query_as()
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::from)?;

        let mut sample_builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT * FROM {} WHERE 1=1",
            def.main_table
        ));
        push_date_filter(&mut sample_builder, def, filters);
        sample_builder.push(" LIMIT ").push_bind(self.preview_sample_size);

        let sample_rows = sample_builder
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::from)?;
        let sample = sample_rows
            .iter()
            .map(crate::core::rowfmt::row_to_json)
            .collect();

        Ok(ArchiveOutcome::Preview {
            preview_count: count,
            sample,
            requires_confirmation: count > 0,
        })
    }

    // Duplicate probe, insert, bounded delete. Returns (archived_count, skipped_count).
    async fn execute(
        &self,
        tx: &mut sqlx::Transaction<'_, Postgres>,
        def: crate::core::model::TableDef,
        filters: &OperationFilters,
    ) -> anyhow::Result<(i64, i64)> {
        let where_sql = where_literal(def, filters);
        let order_limit_sql = order_limit_literal(def, filters);

        let probe = if def.is_single_guid_keyed() {
            let candidates = duplicates::candidate_guids(tx, def, &where_sql, &order_limit_sql).await?;
            duplicates::probe_transactions(tx, def, &candidates, self.duplicate_probe_batch).await?
        } else {
            let candidates = duplicates::candidate_activity_keys(tx, def, &where_sql, &order_limit_sql).await?;
            duplicates::probe_activities(tx, def, &candidates, self.duplicate_probe_batch).await?
        };

        let columns = def.columns.join(", ");
        let mut insert_builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            r#"INSERT INTO {} ({}) SELECT {} FROM {} WHERE 1=1"#,
            def.archive_table, columns, columns, def.main_table
        ));
        push_date_filter(&mut insert_builder, def, filters);
        push_exclusion(&mut insert_builder, def, &probe);

        if def.is_single_guid_keyed() {
            insert_builder.push(format!(
                r#" AND NOT EXISTS (SELECT 1 FROM {} arch WHERE arch."GUID" = {}."GUID") AND {}."GUID" IS NOT NULL"#,
                def.archive_table, def.main_table, def.main_table
            ));
        }
        push_order_and_limit(&mut insert_builder, def, filters);

        let archived_count = match insert_builder.build().execute(&mut **tx).await {
            Ok(result) => result.rows_affected() as i64,
            Err(e) => return Err(e.into()),
        };

        // Bounded source delete: the exact same filter + exclusion, so a
        // row is removed from main if and only if it was just archived.
        let mut delete_builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!(r#"DELETE FROM {} WHERE 1=1"#, def.main_table));
        push_date_filter(&mut delete_builder, def, filters);
        push_exclusion(&mut delete_builder, def, &probe);
        if def.is_single_guid_keyed() {
            // A null-GUID row can never be matched against the archive, so
            // it was also never archived; keep it in main, same as a
            // genuine duplicate.
            delete_builder.push(r#" AND "GUID" IS NOT NULL"#);
        }

        if filters.limit.is_some() {
            // Scope the delete to the same ordered top-N primary keys the
            // insert just archived, via a correlated subquery.
            let order_limit = order_limit_literal(def, filters);
            let mut scoped: QueryBuilder<Postgres> = QueryBuilder::new(format!(
                r#"DELETE FROM {} WHERE "{}" IN (SELECT "{}" FROM (SELECT "{}" FROM {} WHERE 1=1"#,
                def.main_table, def.ordering_key, def.ordering_key, def.ordering_key, def.main_table
            ));
            push_date_filter(&mut scoped, def, filters);
            push_exclusion(&mut scoped, def, &probe);
            if def.is_single_guid_keyed() {
                scoped.push(r#" AND "GUID" IS NOT NULL"#);
            }
            scoped.push(format!(" {order_limit}) AS limited_records)"));
            scoped.build().execute(&mut **tx).await?;
        } else {
            delete_builder.build().execute(&mut **tx).await?;
        }

        Ok((archived_count, probe.skipped_count))
    }
}
