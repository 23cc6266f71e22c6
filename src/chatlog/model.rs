use chrono::{DateTime, Utc};
use serde_json::Value;

// One row of the append-only chatops_log table (spec §3's ChatTurn, §6's
// chatops_log). Only operational turns are persisted.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ChatTurn {
    pub id: i64,
    pub session_id: String,
    pub user_id: Option<String>,
    pub user_role: Option<String>,
    pub region: Option<String>,
    pub message_type: String,
    pub user_message: String,
    pub bot_response: String,
    pub operation_type: Option<String>,
    pub table_name: Option<String>,
    pub filters_applied: Option<Value>,
    pub records_affected: Option<i64>,
    pub operation_status: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub error_message: Option<String>,
}

// filters_applied and table_name are stored so a later confirmation turn
// can recover them without re-parsing the user's earlier message.
#[derive(Debug, Clone, Default)]
pub struct NewChatTurn {
    pub session_id: String,
    pub user_id: Option<String>,
    pub user_role: Option<String>,
    pub region: Option<String>,
    pub message_type: String,
    pub user_message: String,
    pub bot_response: String,
    pub operation_type: Option<String>,
    pub table_name: Option<String>,
    pub filters_applied: Option<Value>,
    pub records_affected: Option<i64>,
    pub operation_status: Option<String>,
    pub error_message: Option<String>,
}
