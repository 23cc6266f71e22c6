use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use sqlx::{PgPool, QueryBuilder};

use crate::joblog::model::JobLog;

static LAST_N_UNIT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^last_(\d+)_(minutes?|hours?|days?)$").unwrap());
static FROM_TO_RANGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^from_(\d{1,2})/(\d{1,2})/(\d{4})_to_(\d{1,2})/(\d{1,2})/(\d{4})$").unwrap()
});

// Unknown shortcuts resolve to None, leaving started_after/started_before
// untouched.
pub fn resolve_date_range(
    range: &str,
    now: DateTime<Utc>,
) -> Option<(Option<DateTime<Utc>>, Option<DateTime<Utc>>)> {
    let today = now.date_naive();

    match range {
        "today" => {
            let start = today.and_hms_opt(0, 0, 0)?;
            Some((Some(Utc.from_utc_datetime(&start)), Some(now)))
        }
        "yesterday" => {
            let y = today - Duration::days(1);
            let start = y.and_hms_opt(0, 0, 0)?;
            let end = y.and_hms_opt(23, 59, 59)?;
            Some((Some(Utc.from_utc_datetime(&start)), Some(Utc.from_utc_datetime(&end))))
        }
        "this_week" => {
            let weekday = today.weekday().num_days_from_monday() as i64;
            let start = (today - Duration::days(weekday)).and_hms_opt(0, 0, 0)?;
            Some((Some(Utc.from_utc_datetime(&start)), Some(now)))
        }
        "this_month" => {
            let start = NaiveDate::from_ymd_opt(today.year(), today.month(), 1)?.and_hms_opt(0, 0, 0)?;
            Some((Some(Utc.from_utc_datetime(&start)), Some(now)))
        }
        "last_7_days" => Some((Some(now - Duration::days(7)), Some(now))),
        "last_30_days" => Some((Some(now - Duration::days(30)), Some(now))),
        "last_month" => {
            let (py, pm) = if today.month() == 1 {
                (today.year() - 1, 12)
            } else {
                (today.year(), today.month() - 1)
            };
            let start = NaiveDate::from_ymd_opt(py, pm, 1)?.and_hms_opt(0, 0, 0)?;
            let end = NaiveDate::from_ymd_opt(today.year(), today.month(), 1)?.and_hms_opt(0, 0, 0)?;
            Some((Some(Utc.from_utc_datetime(&start)), Some(Utc.from_utc_datetime(&end))))
        }
        other => {
            if let Some(caps) = LAST_N_UNIT.captures(other) {
                let n: i64 = caps[1].parse().ok()?;
                let unit = caps[2].to_lowercase();
                let delta = if unit.starts_with("minute") {
                    Duration::minutes(n)
                } else if unit.starts_with("hour") {
                    Duration::hours(n)
                } else {
                    Duration::days(n)
                };
                return Some((Some(now - delta), Some(now)));
            }
            if let Some(caps) = FROM_TO_RANGE.captures(other) {
                let from = NaiveDate::from_ymd_opt(
                    caps[3].parse().ok()?,
                    caps[1].parse().ok()?,
                    caps[2].parse().ok()?,
                )?
                .and_hms_opt(0, 0, 0)?;
                let to = NaiveDate::from_ymd_opt(
                    caps[6].parse().ok()?,
                    caps[4].parse().ok()?,
                    caps[5].parse().ok()?,
                )?
                .and_hms_opt(23, 59, 59)?;
                return Some((Some(Utc.from_utc_datetime(&from)), Some(Utc.from_utc_datetime(&to))));
            }
            None
        }
    }
}

// Every field optional, filters compose with AND. Built with QueryBuilder
// rather than enumerating every combination by hand.
#[derive(Debug, Clone, Default)]
pub struct JobLogQuery {
    pub status: Option<String>,
    pub job_type: Option<String>,
    pub table_name: Option<String>,
    pub schema_name: Option<String>,
    pub source: Option<String>,
    pub id: Option<i64>,
    pub min_records_affected: Option<i64>,
    pub max_records_affected: Option<i64>,
    pub started_after: Option<DateTime<Utc>>,
    pub started_before: Option<DateTime<Utc>>,
    pub finished_after: Option<DateTime<Utc>>,
    pub finished_before: Option<DateTime<Utc>>,
    pub reason_contains: Option<String>,

    pub failed_only: bool,
    pub successful_only: bool,
    pub in_progress_only: bool,
    pub zero_records_only: bool,
    pub has_records_only: bool,
    pub chatbot_only: bool,
    pub script_only: bool,

    pub order_by: Option<String>,
    pub order_desc: bool,
    pub limit: i64,
    pub offset: i64,
}

const ORDERABLE_COLUMNS: &[&str] = &[
    "id",
    "job_type",
    "table_name",
    "status",
    "source",
    "records_affected",
    "started_at",
    "finished_at",
];

impl JobLogQuery {
    fn order_column(&self) -> &str {
        match &self.order_by {
            Some(col) if ORDERABLE_COLUMNS.contains(&col.as_str()) => col.as_str(),
            _ => "started_at",
        }
    }
}

#[derive(Clone)]
pub struct JobLogsRepo {
    pool: PgPool,
}

impl JobLogsRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn search(&self, q: &JobLogQuery) -> anyhow::Result<Vec<JobLog>> {
        let mut builder: QueryBuilder<sqlx::Postgres> = QueryBuilder::new(
            "SELECT id, schema_name, job_type, table_name, status, source, reason, records_affected, started_at, finished_at FROM job_logs WHERE 1=1",
        );

        if let Some(v) = &q.status {
            builder.push(" AND status = ").push_bind(v.clone());
        }
        if let Some(v) = &q.job_type {
            builder.push(" AND job_type = ").push_bind(v.clone());
        }
        if let Some(v) = &q.table_name {
            builder.push(" AND table_name = ").push_bind(v.clone());
        }
        if let Some(v) = &q.schema_name {
            builder.push(" AND schema_name = ").push_bind(v.clone());
        }
        if let Some(v) = &q.source {
            builder.push(" AND source = ").push_bind(v.clone());
        }
        if let Some(v) = q.id {
            builder.push(" AND id = ").push_bind(v);
        }
        if let Some(v) = q.min_records_affected {
            builder
                .push(" AND records_affected >= ")
                .push_bind(v);
        }
        if let Some(v) = q.max_records_affected {
            builder
                .push(" AND records_affected <= ")
                .push_bind(v);
        }
        if let Some(v) = q.started_after {
            builder.push(" AND started_at >= ").push_bind(v);
        }
        if let Some(v) = q.started_before {
            builder.push(" AND started_at <= ").push_bind(v);
        }
        if let Some(v) = q.finished_after {
            builder.push(" AND finished_at >= ").push_bind(v);
        }
        if let Some(v) = q.finished_before {
            builder.push(" AND finished_at <= ").push_bind(v);
        }
        if let Some(v) = &q.reason_contains {
            builder
                .push(" AND reason ILIKE ")
                .push_bind(format!("%{v}%"));
        }

        if q.failed_only {
            builder.push(" AND status = 'FAILED'");
        }
        if q.successful_only {
            builder.push(" AND status = 'SUCCESS'");
        }
        if q.in_progress_only {
            builder.push(" AND status = 'IN_PROGRESS'");
        }
        if q.zero_records_only {
            builder.push(" AND COALESCE(records_affected, 0) = 0");
        }
        if q.has_records_only {
            builder.push(" AND COALESCE(records_affected, 0) > 0");
        }
        if q.chatbot_only {
            builder.push(" AND source = 'CHATBOT'");
        }
        if q.script_only {
            builder.push(" AND source = 'SCRIPT'");
        }

        let direction = if q.order_desc { "DESC" } else { "ASC" };
        builder.push(format!(" ORDER BY {} {}", q.order_column(), direction));

        let limit = q.limit.clamp(1, 500);
        builder.push(" LIMIT ").push_bind(limit);
        builder.push(" OFFSET ").push_bind(q.offset.max(0));

        let rows = builder
            .build_query_as::<JobLog>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    // Totals by status, totals by job_type, and a last-24h breakdown.
    pub async fn summary_stats(&self) -> anyhow::Result<JobLogSummary> {
        let by_status: Vec<(String, i64)> = sqlx::query_as(
            "SELECT status, COUNT(*) FROM job_logs GROUP BY status",
        )
        .fetch_all(&self.pool)
        .await?;

        let by_job_type: Vec<(String, i64)> = sqlx::query_as(
            "SELECT job_type, COUNT(*) FROM job_logs GROUP BY job_type",
        )
        .fetch_all(&self.pool)
        .await?;

        let last_24h: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM job_logs WHERE started_at >= now() - interval '24 hours'",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(JobLogSummary {
            by_status,
            by_job_type,
            last_24h: last_24h.0,
        })
    }
}

#[derive(Debug, Clone)]
pub struct JobLogSummary {
    pub by_status: Vec<(String, i64)>,
    pub by_job_type: Vec<(String, i64)>,
    pub last_24h: i64,
}
