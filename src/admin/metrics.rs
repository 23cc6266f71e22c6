use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use sqlx::PgPool;

use crate::joblog::JobLogsRepo;

#[derive(Clone)]
pub struct AdminState {
    pub pool: PgPool,
}

#[derive(Serialize)]
pub struct Metrics {
    pub now_utc: String,
    pub by_status: Vec<StatusCount>,
    pub by_job_type: Vec<JobTypeCount>,
    pub last_24h: i64,
}

#[derive(Serialize)]
pub struct StatusCount {
    pub status: String,
    pub count: i64,
}

#[derive(Serialize)]
pub struct JobTypeCount {
    pub job_type: String,
    pub count: i64,
}

// Totals by status, totals by job type, and a last-24h breakdown, for the
// region whose pool is bound into this handler's state (SPEC_FULL §B.4).
pub async fn metrics(State(st): State<AdminState>) -> Result<Json<Metrics>, (StatusCode, String)> {
    let repo = JobLogsRepo::new(st.pool);
    let summary = repo.summary_stats().await.map_err(db_err)?;

    Ok(Json(Metrics {
        now_utc: chrono::Utc::now().to_rfc3339(),
        by_status: summary
            .by_status
            .into_iter()
            .map(|(status, count)| StatusCount { status, count })
            .collect(),
        by_job_type: summary
            .by_job_type
            .into_iter()
            .map(|(job_type, count)| JobTypeCount { job_type, count })
            .collect(),
        last_24h: summary.last_24h,
    }))
}

fn db_err(e: anyhow::Error) -> (StatusCode, String) {
    (StatusCode::INTERNAL_SERVER_ERROR, format!("db error: {e}"))
}
