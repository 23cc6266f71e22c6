use axum::response::Html;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::admin::{AdminState, Metrics};
use crate::api::models::{
    ChatRequestBody, ConfirmRequestBody, JobLogQueryParams, RegionConfigView, UpsertRegionConfigRequest,
};
use crate::auth::Role;
use crate::error::AppError;
use crate::joblog::{resolve_date_range, JobLogQuery, JobLogsRepo};
use crate::orchestrator::{ChatRequest, ChatResponse, Orchestrator};
use crate::region::{ConnectionStatus, RegionConfigRepo, RegionSessionManager};
use crate::router::tool::match_confirm_literal;

pub mod models;

#[derive(Clone)]
pub struct ApiState {
    pub orchestrator: Orchestrator,
    pub region: RegionSessionManager,
    pub region_config: RegionConfigRepo,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/", get(admin_index))
        .route("/chat", post(chat))
        .route("/chat/confirm", post(confirm))
        .route("/regions", get(list_region_status))
        .route("/regions/:region/connect", post(connect_region))
        .route("/regions/:region/disconnect", post(disconnect_region))
        .route("/regions/:region/test", get(test_region))
        .route("/region-config", get(list_region_config))
        .route("/region-config/:region", post(upsert_region_config).delete(delete_region_config))
        .route("/job-logs", get(list_job_logs))
        .route("/job-logs/summary", get(job_log_summary))
        .route("/health", get(health))
        .with_state(state)
}

const ADMIN_HTML: &str = r#"<!doctype html>
<html lang="en">
<head>
  <meta charset="utf-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1" />
  <title>Log Controller</title>
</head>
<body>
  <h1>Data-Lifecycle Controller</h1>
  <p>POST /chat with { message, session_id, role, region } to talk to the controller.</p>
  <p>GET /regions for connection status, GET /job-logs for the audit trail.</p>
</body>
</html>"#;

pub async fn admin_index() -> Html<&'static str> {
    Html(ADMIN_HTML)
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

fn bad_request(msg: impl Into<String>) -> (StatusCode, Json<ErrorBody>) {
    (StatusCode::BAD_REQUEST, Json(ErrorBody { error: msg.into() }))
}

fn app_err(e: AppError) -> (StatusCode, Json<ErrorBody>) {
    let status = match e.kind() {
        "PermissionDenied" => StatusCode::FORBIDDEN,
        "InvalidRegion" | "NotConnected" => StatusCode::BAD_REQUEST,
        "ValidationError" | "SafetyRuleViolation" | "SQLSafetyViolation" | "ParseFailure" => StatusCode::UNPROCESSABLE_ENTITY,
        "DBUnavailable" | "Timeout" => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(ErrorBody { error: e.to_string() }))
}

fn internal_err(e: anyhow::Error) -> (StatusCode, Json<ErrorBody>) {
    (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorBody { error: e.to_string() }))
}

fn parse_role(role: &str) -> Result<Role, (StatusCode, Json<ErrorBody>)> {
    Role::parse(role).ok_or_else(|| bad_request(format!("unknown role '{role}'")))
}

pub async fn chat(
    State(state): State<ApiState>,
    Json(body): Json<ChatRequestBody>,
) -> Result<Json<ChatResponse>, (StatusCode, Json<ErrorBody>)> {
    let role = parse_role(&body.role)?;
    let response = state
        .orchestrator
        .chat(ChatRequest {
            message: body.message,
            session_id: body.session_id,
            user_id: body.user_id,
            role,
            region: body.region,
        })
        .await;
    Ok(Json(response))
}

pub async fn confirm(
    State(state): State<ApiState>,
    Json(body): Json<ConfirmRequestBody>,
) -> Result<Json<ChatResponse>, (StatusCode, Json<ErrorBody>)> {
    let role = parse_role(&body.role)?;
    let literal = match_confirm_literal(&body.literal).ok_or_else(|| {
        bad_request("literal must be one of CONFIRM ARCHIVE, CONFIRM DELETE, CANCEL")
    })?;
    let response = state
        .orchestrator
        .confirm_operation(
            ChatRequest {
                message: String::new(),
                session_id: body.session_id,
                user_id: body.user_id,
                role,
                region: body.region,
            },
            literal,
        )
        .await;
    Ok(Json(response))
}

pub async fn list_region_status(State(state): State<ApiState>) -> Json<Vec<ConnectionStatus>> {
    Json(state.region.connection_status().await)
}

pub async fn connect_region(
    State(state): State<ApiState>,
    Path(region): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorBody>)> {
    state.region.connect(&region).await.map_err(app_err)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn disconnect_region(
    State(state): State<ApiState>,
    Path(region): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorBody>)> {
    state.region.disconnect(&region).await.map_err(app_err)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn test_region(
    State(state): State<ApiState>,
    Path(region): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorBody>)> {
    let counts = state.region.test_connection(&region).await.map_err(app_err)?;
    Ok(Json(counts.counts))
}

pub async fn list_region_config(
    State(state): State<ApiState>,
) -> Result<Json<Vec<RegionConfigView>>, (StatusCode, Json<ErrorBody>)> {
    let rows = state.region_config.list().await.map_err(internal_err)?;
    Ok(Json(rows.into_iter().map(RegionConfigView::from).collect()))
}

pub async fn upsert_region_config(
    State(state): State<ApiState>,
    Path(region): Path<String>,
    Json(body): Json<UpsertRegionConfigRequest>,
) -> Result<Json<RegionConfigView>, (StatusCode, Json<ErrorBody>)> {
    let row = state
        .region_config
        .upsert(&region, &body.connection_string, body.is_active, body.connection_notes.as_deref())
        .await
        .map_err(internal_err)?;
    Ok(Json(RegionConfigView::from(row)))
}

pub async fn delete_region_config(
    State(state): State<ApiState>,
    Path(region): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorBody>)> {
    state.region_config.delete(&region).await.map_err(internal_err)?;
    Ok(StatusCode::NO_CONTENT)
}

// region selects which pool to query since job_logs lives alongside the
// archive/delete tables it describes, not in the central catalog pool.
pub async fn list_job_logs(
    State(state): State<ApiState>,
    Query(q): Query<JobLogQueryParams>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorBody>)> {
    let pool = state.region.session(&q.region).await.map_err(app_err)?;
    let repo = JobLogsRepo::new(pool);

    let mut query = JobLogQuery {
        status: q.status,
        job_type: q.job_type,
        table_name: q.table_name,
        source: q.source,
        failed_only: q.failed_only.unwrap_or(false),
        successful_only: q.successful_only.unwrap_or(false),
        limit: q.limit.unwrap_or(100),
        offset: q.offset.unwrap_or(0),
        ..Default::default()
    };

    if let Some(range) = &q.date_range {
        if let Some((after, before)) = resolve_date_range(range, chrono::Utc::now()) {
            query.started_after = after;
            query.started_before = before;
        }
    }

    let rows = repo.search(&query).await.map_err(internal_err)?;
    Ok(Json(rows))
}

// Reuses the same pool resolution as list_job_logs.
pub async fn job_log_summary(
    State(state): State<ApiState>,
    Query(q): Query<JobLogQueryParams>,
) -> Result<Json<Metrics>, (StatusCode, Json<ErrorBody>)> {
    let pool = state.region.session(&q.region).await.map_err(app_err)?;
    crate::admin::metrics::metrics(State(AdminState { pool }))
        .await
        .map_err(|(status, msg)| (status, Json(ErrorBody { error: msg })))
}

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}
