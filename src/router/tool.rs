use serde::{Deserialize, Serialize};

// date_filter is the raw phrase (e.g. "older than 7 days"); resolved later
// by the Date-Expression Parser, never here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouterFilters {
    pub date_filter: Option<String>,
    pub limit: Option<i64>,
    pub confirmed: bool,
}

// Fixed tool vocabulary from spec §4.E / design note §9: a closed sum type
// so the orchestrator pattern-matches instead of string-dispatching.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "tool", rename_all = "snake_case")]
pub enum Tool {
    GetTableStats {
        table: Option<String>,
        filters: RouterFilters,
    },
    ArchiveRecords {
        table: String,
        filters: RouterFilters,
    },
    DeleteArchivedRecords {
        table: String,
        filters: RouterFilters,
    },
    RegionStatus,
    HealthCheck,
    ExecuteSqlQuery {
        user_prompt: String,
    },
}

impl Tool {
    pub fn table(&self) -> Option<&str> {
        match self {
            Tool::GetTableStats { table, .. } => table.as_deref(),
            Tool::ArchiveRecords { table, .. } => Some(table),
            Tool::DeleteArchivedRecords { table, .. } => Some(table),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Tool::GetTableStats { .. } => "get_table_stats",
            Tool::ArchiveRecords { .. } => "archive_records",
            Tool::DeleteArchivedRecords { .. } => "delete_archived_records",
            Tool::RegionStatus => "region_status",
            Tool::HealthCheck => "health_check",
            Tool::ExecuteSqlQuery { .. } => "execute_sql_query",
        }
    }
}

// Confirmation literals from spec §4.E, matched case-insensitively ahead of
// the routing decision tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmLiteral {
    ConfirmArchive,
    ConfirmDelete,
    Cancel,
}

pub fn match_confirm_literal(utterance: &str) -> Option<ConfirmLiteral> {
    let normalized = utterance.trim().to_uppercase();
    match normalized.as_str() {
        "CONFIRM ARCHIVE" => Some(ConfirmLiteral::ConfirmArchive),
        "CONFIRM DELETE" => Some(ConfirmLiteral::ConfirmDelete),
        "CANCEL" | "ABORT" | "NO" => Some(ConfirmLiteral::Cancel),
        _ => None,
    }
}

#[derive(Debug, Clone)]
pub enum RouterDecision {
    Dispatch(Tool),
    // Orchestrator must recover the prior preview turn's table/filters and
    // re-invoke the same tool.
    Confirm(ConfirmLiteral),
    Clarify { message: String },
    Refuse { message: String },
}
