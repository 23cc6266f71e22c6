use serde::Serialize;
use serde_json::Value;

// Structured result types from spec §4.G's Format state. Every chat turn
// resolves to exactly one card.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum Card {
    #[serde(rename = "welcome_card")]
    Welcome { message: String },

    #[serde(rename = "clarification_card")]
    Clarification { message: String },

    #[serde(rename = "access_denied_card")]
    AccessDenied { message: String },

    #[serde(rename = "error_card")]
    Error { kind: String, message: String },

    #[serde(rename = "cancelled_card")]
    Cancelled { message: String },

    #[serde(rename = "stats_card")]
    Stats {
        table: Option<String>,
        counts: Value,
    },

    #[serde(rename = "confirmation_card")]
    Confirmation {
        tool: String,
        table: String,
        preview_count: i64,
        sample: Vec<Value>,
    },

    #[serde(rename = "success_card")]
    Success {
        tool: String,
        table: String,
        records_archived: Option<i64>,
        records_deleted: i64,
        records_skipped: Option<i64>,
        job_log_id: Option<i64>,
    },

    #[serde(rename = "sql_query_results")]
    SqlResults {
        columns: Vec<String>,
        rows: Vec<Value>,
        row_count: usize,
        generated_sql: String,
    },

    #[serde(rename = "region_status_card")]
    RegionStatus { regions: Value },

    #[serde(rename = "health_card")]
    Health { region: String, counts: Value },
}

impl Card {
    pub fn requires_confirmation(&self) -> bool {
        matches!(self, Card::Confirmation { .. })
    }

    // Plain-text rendering for clients that don't consume the structured card.
    pub fn render_text(&self) -> String {
        match self {
            Card::Welcome { message } => message.clone(),
            Card::Clarification { message } => message.clone(),
            Card::AccessDenied { message } => message.clone(),
            Card::Error { message, .. } => format!("Error: {message}"),
            Card::Cancelled { message } => message.clone(),
            Card::Stats { table, counts } => match table {
                Some(t) => format!("{t}: {counts}"),
                None => format!("Table summary: {counts}"),
            },
            Card::Confirmation {
                tool,
                table,
                preview_count,
                ..
            } => format!(
                "{tool} on {table} would affect {preview_count} row(s). Reply CONFIRM ARCHIVE / CONFIRM DELETE to proceed, or CANCEL."
            ),
            Card::Success {
                tool,
                table,
                records_archived,
                records_deleted,
                records_skipped,
                job_log_id,
            } => format!(
                "{tool} on {table} completed: archived={:?} deleted={records_deleted} skipped={:?} job_log_id={:?}",
                records_archived, records_skipped, job_log_id
            ),
            Card::SqlResults { row_count, generated_sql, .. } => {
                format!("{row_count} row(s): {generated_sql}")
            }
            Card::RegionStatus { regions } => format!("Region status: {regions}"),
            Card::Health { region, counts } => format!("{region} is healthy: {counts}"),
        }
    }
}
