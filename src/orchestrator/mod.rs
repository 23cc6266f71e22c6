//! Chat Orchestrator (spec §4.G): the single entry point chat clients call.
//! Routes an utterance through the Intent Router, dispatches the resolved
//! tool against the caller's region, folds the outcome into a structured
//! card, and persists operational turns so the next message in the same
//! session can inherit context or recover a pending confirmation.
//!
//! Every tool dispatch returns `Result`, never panics or propagates an
//! exception across this boundary. `AppError` always resolves to either
//! an `access_denied_card` or an `error_card` (§7: "Core returns
//! `{success:false, error}` rather than throwing").

pub mod card;
pub use card::Card;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use sqlx::PgPool;

use crate::auth::Role;
use crate::chatlog::{ChatLogRepo, ChatTurn, NewChatTurn};
use crate::config::Config;
use crate::core::{
    self,
    model::{table_def, ArchiveOutcome, DateComparison, DeleteOutcome, OperationFilters, ACTIVITIES, TRANSACTIONS},
    ArchiveEngine, DeleteEngine,
};
use crate::dateparse::{self, Operation};
use crate::error::{AppError, AppResult};
use crate::joblog::JobLogger;
use crate::region::RegionSessionManager;
use crate::router::{self, ConfirmLiteral, ConversationContext, RouterDecision, RouterFilters, Tool};
use crate::sql::{self, HeuristicSqlCompiler, SqlCompiler};

#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub message: String,
    pub session_id: String,
    pub user_id: Option<String>,
    pub role: Role,
    pub region: String,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ChatResponse {
    pub card: Card,
    pub text: String,
    pub requires_confirmation: bool,
}

impl ChatResponse {
    fn from_card(card: Card) -> Self {
        let text = card.render_text();
        let requires_confirmation = card.requires_confirmation();
        Self {
            card,
            text,
            requires_confirmation,
        }
    }
}

// operation_type.is_none() means a conversational turn (greetings,
// clarifications, cancellations), never persisted.
#[derive(Debug, Clone, Default)]
struct TurnMeta {
    operation_type: Option<String>,
    table_name: Option<String>,
    filters_applied: Option<Value>,
    records_affected: Option<i64>,
    operation_status: Option<String>,
    error_message: Option<String>,
}

#[derive(Clone)]
pub struct Orchestrator {
    region: RegionSessionManager,
    chatlog: ChatLogRepo,
    config: Config,
    sql_compiler: Arc<dyn SqlCompiler>,
}

impl Orchestrator {
    pub fn new(region: RegionSessionManager, chatlog: ChatLogRepo, config: Config) -> Self {
        Self {
            region,
            chatlog,
            config,
            sql_compiler: Arc::new(HeuristicSqlCompiler),
        }
    }

    /// Swaps in a different `SqlCompiler`, the seam a real LLM-backed
    /// implementation would plug into, and what tests use to fake one.
    pub fn with_sql_compiler(mut self, compiler: Arc<dyn SqlCompiler>) -> Self {
        self.sql_compiler = compiler;
        self
    }

    pub async fn chat(&self, req: ChatRequest) -> ChatResponse {
        let now = Utc::now();
        let last_turn = self.chatlog.last_operational_turn(&req.session_id).await.ok().flatten();
        let ctx = last_turn
            .as_ref()
            .map(|t| ConversationContext::from_last_turn(t.table_name.clone(), t.filters_applied.clone(), t.operation_type.clone()))
            .unwrap_or_default();

        let decision = router::route(&req.message, &ctx, now);

        let (card, meta) = match decision {
            RouterDecision::Refuse { message } => (Card::Welcome { message }, TurnMeta::default()),
            RouterDecision::Clarify { message } => (Card::Clarification { message }, TurnMeta::default()),
            RouterDecision::Confirm(literal) => self.handle_confirm(literal, &req, last_turn.as_ref(), now).await,
            RouterDecision::Dispatch(tool) => self.dispatch(tool, &req, now).await,
        };

        self.persist_turn(&req, &card, &meta).await;
        ChatResponse::from_card(card)
    }

    // For clients sending a confirmation literal directly instead of a chat message.
    pub async fn confirm_operation(&self, req: ChatRequest, literal: ConfirmLiteral) -> ChatResponse {
        let message = match literal {
            ConfirmLiteral::ConfirmArchive => "CONFIRM ARCHIVE",
            ConfirmLiteral::ConfirmDelete => "CONFIRM DELETE",
            ConfirmLiteral::Cancel => "CANCEL",
        };
        self.chat(ChatRequest {
            message: message.to_string(),
            ..req
        })
        .await
    }

    async fn dispatch(&self, tool: Tool, req: &ChatRequest, now: DateTime<Utc>) -> (Card, TurnMeta) {
        let pool = match self.region.session(&req.region).await {
            Ok(p) => p,
            Err(e) => return self.error_outcome(e, tool.name(), tool.table().map(str::to_string), &RouterFilters::default()),
        };

        match tool {
            Tool::GetTableStats { table, filters } => self.handle_get_table_stats(&pool, table, filters, now).await,
            Tool::ArchiveRecords { table, filters } => {
                self.handle_archive(req.role, &pool, table, filters, &req.session_id, now).await
            }
            Tool::DeleteArchivedRecords { table, filters } => {
                self.handle_delete(req.role, &pool, table, filters, &req.session_id, now).await
            }
            Tool::RegionStatus => self.handle_region_status().await,
            Tool::HealthCheck => self.handle_health_check(&req.region).await,
            Tool::ExecuteSqlQuery { user_prompt } => self.handle_execute_sql(&pool, &user_prompt, now).await,
        }
    }

    async fn handle_confirm(
        &self,
        literal: ConfirmLiteral,
        req: &ChatRequest,
        last_turn: Option<&ChatTurn>,
        now: DateTime<Utc>,
    ) -> (Card, TurnMeta) {
        if literal == ConfirmLiteral::Cancel {
            return (
                Card::Cancelled {
                    message: "Operation cancelled.".to_string(),
                },
                TurnMeta::default(),
            );
        }

        if !req.role.can("confirm_operations") {
            return self.error_outcome(
                AppError::PermissionDenied {
                    role: req.role.as_str().to_string(),
                    action: "confirm_operations".to_string(),
                },
                "confirm_operation",
                None,
                &RouterFilters::default(),
            );
        }

        let expected_op = match literal {
            ConfirmLiteral::ConfirmArchive => "archive_records",
            ConfirmLiteral::ConfirmDelete => "delete_archived_records",
            ConfirmLiteral::Cancel => unreachable!("handled above"),
        };

        let Some(turn) = last_turn else {
            return (
                Card::Clarification {
                    message: "There's nothing pending to confirm.".to_string(),
                },
                TurnMeta::default(),
            );
        };
        let Some(table) = turn.table_name.clone() else {
            return (
                Card::Clarification {
                    message: "There's nothing pending to confirm.".to_string(),
                },
                TurnMeta::default(),
            );
        };
        if turn.operation_type.as_deref() != Some(expected_op) {
            return (
                Card::Clarification {
                    message: "That confirmation doesn't match the pending operation. Try the request again.".to_string(),
                },
                TurnMeta::default(),
            );
        }

        let mut filters: RouterFilters = turn
            .filters_applied
            .clone()
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default();
        filters.confirmed = true;

        let pool = match self.region.session(&req.region).await {
            Ok(p) => p,
            Err(e) => return self.error_outcome(e, expected_op, Some(table), &filters),
        };

        match literal {
            ConfirmLiteral::ConfirmArchive => self.handle_archive(req.role, &pool, table, filters, &req.session_id, now).await,
            ConfirmLiteral::ConfirmDelete => self.handle_delete(req.role, &pool, table, filters, &req.session_id, now).await,
            ConfirmLiteral::Cancel => unreachable!("handled above"),
        }
    }

    async fn handle_get_table_stats(
        &self,
        pool: &PgPool,
        table: Option<String>,
        filters: RouterFilters,
        now: DateTime<Utc>,
    ) -> (Card, TurnMeta) {
        let resolved = match resolve_filters(filters.date_filter.as_deref(), filters.limit, now) {
            Ok(f) => f,
            Err(e) => return self.error_outcome(e, "get_table_stats", table, &filters),
        };

        match &table {
            Some(t) => {
                let def = match table_def(t) {
                    Some(d) => d,
                    None => {
                        return self.error_outcome(
                            AppError::ValidationError(format!("unknown table '{t}'")),
                            "get_table_stats",
                            table,
                            &filters,
                        )
                    }
                };
                match core::count_rows(pool, t, def, &resolved).await {
                    Ok(count) => (
                        Card::Stats {
                            table: Some(t.clone()),
                            counts: json!({ t.clone(): count }),
                        },
                        TurnMeta {
                            operation_type: Some("get_table_stats".to_string()),
                            table_name: Some(t.clone()),
                            filters_applied: serde_json::to_value(&filters).ok(),
                            records_affected: Some(count),
                            operation_status: Some("success".to_string()),
                            error_message: None,
                        },
                    ),
                    Err(e) => self.error_outcome(e, "get_table_stats", table, &filters),
                }
            }
            None => {
                let mut counts = serde_json::Map::new();
                for def in [ACTIVITIES, TRANSACTIONS] {
                    for physical in [def.main_table, def.archive_table] {
                        match core::count_rows(pool, physical, def, &resolved).await {
                            Ok(c) => {
                                counts.insert(physical.to_string(), json!(c));
                            }
                            Err(e) => return self.error_outcome(e, "get_table_stats", None, &filters),
                        }
                    }
                }
                (
                    Card::Stats {
                        table: None,
                        counts: Value::Object(counts),
                    },
                    TurnMeta {
                        operation_type: Some("get_table_stats".to_string()),
                        table_name: None,
                        filters_applied: serde_json::to_value(&filters).ok(),
                        records_affected: None,
                        operation_status: Some("success".to_string()),
                        error_message: None,
                    },
                )
            }
        }
    }

    async fn handle_archive(
        &self,
        role: Role,
        pool: &PgPool,
        table: String,
        filters: RouterFilters,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> (Card, TurnMeta) {
        let mut resolved = match resolve_filters(filters.date_filter.as_deref(), filters.limit, now) {
            Ok(f) => f,
            Err(e) => return self.error_outcome(e, "archive_records", Some(table), &filters),
        };
        resolved.limit = filters.limit;

        let job_logger = JobLogger::new(pool.clone());
        let engine = ArchiveEngine::new(
            pool.clone(),
            job_logger,
            self.config.archive_retention_days,
            self.config.preview_sample_size,
            self.config.duplicate_probe_batch,
        );
        let reason = format!("chat session {session_id}");

        match engine.archive(role, &table, resolved, &reason, filters.confirmed, now).await {
            Ok(ArchiveOutcome::Preview {
                preview_count,
                requires_confirmation: false,
                ..
            }) => (
                Card::Success {
                    tool: "archive_records".to_string(),
                    table: table.clone(),
                    records_archived: Some(0),
                    records_deleted: 0,
                    records_skipped: Some(0),
                    job_log_id: None,
                },
                TurnMeta {
                    operation_type: Some("archive_records".to_string()),
                    table_name: Some(table),
                    filters_applied: serde_json::to_value(&filters).ok(),
                    records_affected: Some(preview_count),
                    operation_status: Some("success".to_string()),
                    error_message: None,
                },
            ),
            Ok(ArchiveOutcome::Preview { preview_count, sample, .. }) => (
                Card::Confirmation {
                    tool: "archive_records".to_string(),
                    table: table.clone(),
                    preview_count,
                    sample,
                },
                TurnMeta {
                    operation_type: Some("archive_records".to_string()),
                    table_name: Some(table),
                    filters_applied: serde_json::to_value(&filters).ok(),
                    records_affected: Some(preview_count),
                    operation_status: Some("preview".to_string()),
                    error_message: None,
                },
            ),
            Ok(ArchiveOutcome::Executed {
                records_archived,
                records_deleted,
                records_skipped,
                job_log_id,
            }) => (
                Card::Success {
                    tool: "archive_records".to_string(),
                    table: table.clone(),
                    records_archived: Some(records_archived),
                    records_deleted,
                    records_skipped: Some(records_skipped),
                    job_log_id: Some(job_log_id),
                },
                TurnMeta {
                    operation_type: Some("archive_records".to_string()),
                    table_name: Some(table),
                    filters_applied: serde_json::to_value(&filters).ok(),
                    records_affected: Some(records_deleted),
                    operation_status: Some("success".to_string()),
                    error_message: None,
                },
            ),
            Err(e) => self.error_outcome(e, "archive_records", Some(table), &filters),
        }
    }

    async fn handle_delete(
        &self,
        role: Role,
        pool: &PgPool,
        table: String,
        filters: RouterFilters,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> (Card, TurnMeta) {
        let mut resolved = match resolve_filters(filters.date_filter.as_deref(), filters.limit, now) {
            Ok(f) => f,
            Err(e) => return self.error_outcome(e, "delete_archived_records", Some(table), &filters),
        };
        resolved.limit = filters.limit;

        let job_logger = JobLogger::new(pool.clone());
        let engine = DeleteEngine::new(pool.clone(), job_logger, self.config.delete_retention_days, self.config.preview_sample_size);
        let reason = format!("chat session {session_id}");

        match engine.delete(role, &table, resolved, &reason, filters.confirmed, now).await {
            Ok(DeleteOutcome::Preview {
                preview_count,
                requires_confirmation: false,
                ..
            }) => (
                Card::Success {
                    tool: "delete_archived_records".to_string(),
                    table: table.clone(),
                    records_archived: None,
                    records_deleted: 0,
                    records_skipped: None,
                    job_log_id: None,
                },
                TurnMeta {
                    operation_type: Some("delete_archived_records".to_string()),
                    table_name: Some(table),
                    filters_applied: serde_json::to_value(&filters).ok(),
                    records_affected: Some(preview_count),
                    operation_status: Some("success".to_string()),
                    error_message: None,
                },
            ),
            Ok(DeleteOutcome::Preview { preview_count, sample, .. }) => (
                Card::Confirmation {
                    tool: "delete_archived_records".to_string(),
                    table: table.clone(),
                    preview_count,
                    sample,
                },
                TurnMeta {
                    operation_type: Some("delete_archived_records".to_string()),
                    table_name: Some(table),
                    filters_applied: serde_json::to_value(&filters).ok(),
                    records_affected: Some(preview_count),
                    operation_status: Some("preview".to_string()),
                    error_message: None,
                },
            ),
            Ok(DeleteOutcome::Executed { records_deleted, job_log_id }) => (
                Card::Success {
                    tool: "delete_archived_records".to_string(),
                    table: table.clone(),
                    records_archived: None,
                    records_deleted,
                    records_skipped: None,
                    job_log_id: Some(job_log_id),
                },
                TurnMeta {
                    operation_type: Some("delete_archived_records".to_string()),
                    table_name: Some(table),
                    filters_applied: serde_json::to_value(&filters).ok(),
                    records_affected: Some(records_deleted),
                    operation_status: Some("success".to_string()),
                    error_message: None,
                },
            ),
            Err(e) => self.error_outcome(e, "delete_archived_records", Some(table), &filters),
        }
    }

    async fn handle_region_status(&self) -> (Card, TurnMeta) {
        let statuses = self.region.connection_status().await;
        let regions: Vec<Value> = statuses
            .into_iter()
            .map(|s| {
                json!({
                    "region": s.region,
                    "connected": s.connected,
                    "last_connected_at": s.last_connected_at,
                })
            })
            .collect();
        (Card::RegionStatus { regions: Value::Array(regions) }, TurnMeta::default())
    }

    async fn handle_health_check(&self, region: &str) -> (Card, TurnMeta) {
        match self.region.test_connection(region).await {
            Ok(counts) => (
                Card::Health {
                    region: region.to_string(),
                    counts: json!(counts.counts),
                },
                TurnMeta::default(),
            ),
            Err(e) => self.error_outcome(e, "health_check", None, &RouterFilters::default()),
        }
    }

    async fn handle_execute_sql(&self, pool: &PgPool, user_prompt: &str, now: DateTime<Utc>) -> (Card, TurnMeta) {
        let generated = match self.sql_compiler.compile(user_prompt, now) {
            Ok(sql) => sql,
            Err(e) => return self.error_outcome(e, "execute_sql_query", None, &RouterFilters::default()),
        };

        match sql::execute(pool, &generated, self.config.sql_row_cap).await {
            Ok(result) => (
                Card::SqlResults {
                    columns: result.columns,
                    rows: result.rows,
                    row_count: result.row_count,
                    generated_sql: result.generated_sql,
                },
                TurnMeta {
                    operation_type: Some("execute_sql_query".to_string()),
                    table_name: None,
                    filters_applied: None,
                    records_affected: Some(result.row_count as i64),
                    operation_status: Some("success".to_string()),
                    error_message: None,
                },
            ),
            Err(e) => self.error_outcome(e, "execute_sql_query", None, &RouterFilters::default()),
        }
    }

    fn error_outcome(&self, err: AppError, op: &str, table: Option<String>, filters: &RouterFilters) -> (Card, TurnMeta) {
        let meta = TurnMeta {
            operation_type: Some(op.to_string()),
            table_name: table,
            filters_applied: serde_json::to_value(filters).ok(),
            records_affected: None,
            operation_status: Some("error".to_string()),
            error_message: Some(err.to_string()),
        };
        let card = match &err {
            AppError::PermissionDenied { .. } => Card::AccessDenied { message: err.to_string() },
            _ => Card::Error {
                kind: err.kind().to_string(),
                message: err.to_string(),
            },
        };
        (card, meta)
    }

    async fn persist_turn(&self, req: &ChatRequest, card: &Card, meta: &TurnMeta) {
        if meta.operation_type.is_none() {
            return;
        }
        let new_turn = NewChatTurn {
            session_id: req.session_id.clone(),
            user_id: req.user_id.clone(),
            user_role: Some(req.role.as_str().to_string()),
            region: Some(req.region.clone()),
            message_type: "operation".to_string(),
            user_message: req.message.clone(),
            bot_response: card.render_text(),
            operation_type: meta.operation_type.clone(),
            table_name: meta.table_name.clone(),
            filters_applied: meta.filters_applied.clone(),
            records_affected: meta.records_affected,
            operation_status: meta.operation_status.clone(),
            error_message: meta.error_message.clone(),
        };
        if let Err(e) = self.chatlog.insert(&new_turn).await {
            tracing::warn!(error = %e, session_id = %req.session_id, "failed to persist chat turn");
        }
    }
}

// A phrase that fails to parse is a hard error, not a silently-dropped
// filter: a retention gate must never run against a wider range than the
// caller actually asked for.
fn resolve_filters(date_phrase: Option<&str>, limit: Option<i64>, now: DateTime<Utc>) -> AppResult<OperationFilters> {
    let mut filters = OperationFilters {
        limit,
        ..Default::default()
    };

    let Some(phrase) = date_phrase else {
        return Ok(filters);
    };

    let parsed = dateparse::parse(phrase, now).map_err(|f| AppError::ParseFailure(f.message))?;
    let range = parsed.activities_transactions();

    match parsed.operation {
        Operation::Between | Operation::Equals => {
            filters.date_start = range.start;
            filters.date_end = range.end;
        }
        Operation::LessThan => {
            filters.date_end = range.end;
            filters.date_comparison = Some(DateComparison::OlderThan);
        }
        Operation::GreaterThan => {
            filters.date_start = range.start;
        }
    }

    Ok(filters)
}
