use crate::router::tool::RouterFilters;

// Short conversational memory the router consults for anaphora resolution
// ("delete them", "archive those") and the confirmation protocol. Computed
// from the last N persisted operational turns (design note §9), never
// reconstructed by re-parsing a prior textual reply.
#[derive(Debug, Clone, Default)]
pub struct ConversationContext {
    pub last_table: Option<String>,
    pub last_filters: Option<RouterFilters>,
    pub last_operation: Option<String>,
    pub has_job_logs_context: bool,
}

impl ConversationContext {
    pub fn from_last_turn(
        table_name: Option<String>,
        filters_applied: Option<serde_json::Value>,
        operation_type: Option<String>,
    ) -> Self {
        let last_filters = filters_applied.and_then(|v| serde_json::from_value(v).ok());
        let has_job_logs_context = operation_type.as_deref() == Some("get_job_summary_stats")
            || operation_type.as_deref() == Some("job_logs_query");
        Self {
            last_table: table_name,
            last_filters,
            last_operation: operation_type,
            has_job_logs_context,
        }
    }
}
