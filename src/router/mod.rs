//! Intent Router (spec §4.E): maps an utterance plus short conversational
//! context to one of the fixed tools, a clarification, or a refusal. The
//! router never invents a table or a date range it cannot see evidence
//! for in the utterance or the carried-forward context. Ambiguous input
//! always yields a typed clarification, not a guess (§8's boundary: "never
//! a fabricated operation").

pub mod context;
pub mod tool;

pub use context::ConversationContext;
pub use tool::{match_confirm_literal, ConfirmLiteral, RouterDecision, RouterFilters, Tool};

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::dateparse;

static WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

fn normalize(utterance: &str) -> String {
    WS.replace_all(&utterance.to_lowercase(), " ").trim().to_string()
}

fn contains_word(text: &str, word: &str) -> bool {
    let pattern = format!(r"\b{}\b", regex::escape(word));
    Regex::new(&pattern).unwrap().is_match(text)
}

// Returns (table, explicitly_mentioned); explicitly_mentioned=false means
// the binding, if any, came from ctx.last_table.
fn bind_table(text: &str, ctx: &ConversationContext) -> (Option<String>, bool) {
    if contains_word(text, "dsiactivitiesarchive") {
        return (Some("dsiactivitiesarchive".to_string()), true);
    }
    if contains_word(text, "dsitransactionlogarchive") {
        return (Some("dsitransactionlogarchive".to_string()), true);
    }
    if contains_word(text, "dsiactivities") {
        return (Some("dsiactivities".to_string()), true);
    }
    if contains_word(text, "dsitransactionlog") {
        return (Some("dsitransactionlog".to_string()), true);
    }
    if contains_word(text, "activities") || contains_word(text, "activity") {
        return (Some("dsiactivities".to_string()), true);
    }
    if contains_word(text, "transactions") || contains_word(text, "transaction") {
        return (Some("dsitransactionlog".to_string()), true);
    }
    (ctx.last_table.clone(), false)
}

// Invariant 1: DELETE only ever targets an archive table.
fn archive_counterpart(table: &str) -> String {
    match crate::core::model::table_def(table) {
        Some(def) => def.archive_table.to_string(),
        None => table.to_string(),
    }
}

// If the Date-Expression Parser can resolve something out of the whole
// utterance, the phrase is carried forward verbatim for the downstream
// consumer to resolve again with the same `now`.
fn detect_date_filter(text: &str, now: DateTime<Utc>) -> Option<String> {
    dateparse::parse(text, now).ok().map(|_| text.to_string())
}

const STATS_WORDS: &[&str] = &["count", "counts", "how many", "statistics", "stats"];
const ARCHIVE_WORDS: &[&str] = &["archive"];
const DELETE_WORDS: &[&str] = &["delete", "purge", "remove"];
const JOB_WORDS: &[&str] = &["job", "jobs", "job log", "job logs", "joblog"];
const NON_DATE_PREDICATE_WORDS: &[&str] =
    &["where", "failed", "error", "errors", "successful", "equals", "status"];
const REGION_WORDS: &[&str] = &["region status", "connection status", "regions", "which regions"];
const HEALTH_WORDS: &[&str] = &["health check", "are you healthy", "healthy", "ping"];
const GREETING_WORDS: &[&str] = &["hello", "hi", "hey", "good morning", "good afternoon", "good evening", "thanks", "thank you"];
const DESTRUCTIVE_OUT_OF_SCOPE: &[&str] =
    &["drop table", "truncate", "delete everything", "delete all", "wipe database", "drop database"];

fn any_word(text: &str, words: &[&str]) -> bool {
    words.iter().any(|w| {
        if w.contains(' ') {
            text.contains(w)
        } else {
            contains_word(text, w)
        }
    })
}

// Routing decision tree from spec §4.E. `now` anchors date-phrase
// resolution so this stays a pure function of its inputs.
pub fn route(utterance: &str, ctx: &ConversationContext, now: DateTime<Utc>) -> RouterDecision {
    if let Some(literal) = match_confirm_literal(utterance) {
        return RouterDecision::Confirm(literal);
    }

    let text = normalize(utterance);
    if text.is_empty() {
        return RouterDecision::Refuse {
            message: "I didn't catch a request there. Try asking me to check stats, archive old records, or check region status.".to_string(),
        };
    }

    if any_word(&text, DESTRUCTIVE_OUT_OF_SCOPE) {
        return RouterDecision::Refuse {
            message: "I can't run destructive operations outside archive/delete-from-archive. Try \"archive records older than 7 days\" or \"delete archived records older than 30 days\" instead.".to_string(),
        };
    }

    if any_word(&text, GREETING_WORDS) && !any_word(&text, ARCHIVE_WORDS) && !any_word(&text, DELETE_WORDS) {
        return RouterDecision::Refuse {
            message: "Hello! I can check table statistics, archive old records, delete archived records, or report region status. What would you like to do?".to_string(),
        };
    }

    let (table, _explicit) = bind_table(&text, ctx);
    // Inherit the prior turn's filter too, not just the table, when this
    // utterance has no date phrase of its own ("archive them" after "count
    // transactions older than 3 months" keeps that filter).
    let date_filter = detect_date_filter(&text, now)
        .or_else(|| ctx.last_filters.as_ref().and_then(|f| f.date_filter.clone()));
    let inherited_limit = ctx.last_filters.as_ref().and_then(|f| f.limit);
    let has_non_date_predicate = any_word(&text, NON_DATE_PREDICATE_WORDS);
    let has_job_mention = any_word(&text, JOB_WORDS);
    let is_count_intent = any_word(&text, STATS_WORDS);
    let is_delete_intent = any_word(&text, DELETE_WORDS) && (text.contains("archiv") || ctx.last_table.is_some());
    let is_archive_intent = !is_delete_intent && any_word(&text, ARCHIVE_WORDS);

    if is_count_intent && !has_non_date_predicate && !has_job_mention {
        let filters = RouterFilters {
            date_filter,
            limit: None,
            confirmed: false,
        };
        return RouterDecision::Dispatch(Tool::GetTableStats { table, filters });
    }

    if is_archive_intent {
        return match table {
            Some(table) => RouterDecision::Dispatch(Tool::ArchiveRecords {
                table,
                filters: RouterFilters {
                    date_filter,
                    limit: extract_limit(&text).or(inherited_limit),
                    confirmed: false,
                },
            }),
            None => RouterDecision::Clarify {
                message: "Archive which table, activities or transactions?".to_string(),
            },
        };
    }

    if is_delete_intent {
        return match table {
            Some(table) => RouterDecision::Dispatch(Tool::DeleteArchivedRecords {
                table: archive_counterpart(&table),
                filters: RouterFilters {
                    date_filter,
                    limit: extract_limit(&text).or(inherited_limit),
                    confirmed: false,
                },
            }),
            None => RouterDecision::Clarify {
                message: "Delete from which archive table, activities or transactions?".to_string(),
            },
        };
    }

    if has_job_mention || has_non_date_predicate {
        return RouterDecision::Dispatch(Tool::ExecuteSqlQuery {
            user_prompt: utterance.to_string(),
        });
    }

    if any_word(&text, HEALTH_WORDS) {
        return RouterDecision::Dispatch(Tool::HealthCheck);
    }

    if any_word(&text, REGION_WORDS) {
        return RouterDecision::Dispatch(Tool::RegionStatus);
    }

    RouterDecision::Clarify {
        message: "I'm not sure what you'd like me to do. I can report stats, archive old records, delete archived records, or show region status.".to_string(),
    }
}

static LIMIT_N: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b(?:oldest|first|limit)\s+(\d+)\b").unwrap());

fn extract_limit(text: &str) -> Option<i64> {
    LIMIT_N.captures(text).and_then(|c| c[1].parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn archive_old_activities() {
        let ctx = ConversationContext::default();
        match route("archive activities older than 7 days", &ctx, now()) {
            RouterDecision::Dispatch(Tool::ArchiveRecords { table, filters }) => {
                assert_eq!(table, "dsiactivities");
                assert!(filters.date_filter.is_some());
            }
            other => panic!("unexpected decision: {other:?}"),
        }
    }

    #[test]
    fn delete_archived_transactions_binds_archive_table() {
        let ctx = ConversationContext::default();
        match route("delete archived transactions from yesterday", &ctx, now()) {
            RouterDecision::Dispatch(Tool::DeleteArchivedRecords { table, .. }) => {
                assert_eq!(table, "dsitransactionlogarchive");
            }
            other => panic!("unexpected decision: {other:?}"),
        }
    }

    #[test]
    fn sql_escape_for_status_keyword() {
        let ctx = ConversationContext::default();
        match route("count all errors in transactions in september", &ctx, now()) {
            RouterDecision::Dispatch(Tool::ExecuteSqlQuery { .. }) => {}
            other => panic!("unexpected decision: {other:?}"),
        }
    }

    #[test]
    fn context_inheritance_for_them() {
        let ctx = ConversationContext {
            last_table: Some("dsitransactionlog".to_string()),
            last_filters: Some(RouterFilters {
                date_filter: Some("older than 3 months".to_string()),
                limit: None,
                confirmed: false,
            }),
            last_operation: Some("get_table_stats".to_string()),
            has_job_logs_context: false,
        };
        match route("archive them", &ctx, now()) {
            RouterDecision::Dispatch(Tool::ArchiveRecords { table, filters }) => {
                assert_eq!(table, "dsitransactionlog");
                assert_eq!(filters.date_filter.as_deref(), Some("older than 3 months"));
            }
            other => panic!("unexpected decision: {other:?}"),
        }
    }

    #[test]
    fn confirm_archive_literal_short_circuits() {
        let ctx = ConversationContext::default();
        match route("CONFIRM ARCHIVE", &ctx, now()) {
            RouterDecision::Confirm(ConfirmLiteral::ConfirmArchive) => {}
            other => panic!("unexpected decision: {other:?}"),
        }
    }

    #[test]
    fn ambiguous_without_table_asks_to_clarify() {
        let ctx = ConversationContext::default();
        match route("archive old stuff", &ctx, now()) {
            RouterDecision::Clarify { .. } => {}
            other => panic!("unexpected decision: {other:?}"),
        }
    }

    #[test]
    fn greeting_is_refused_conversationally() {
        let ctx = ConversationContext::default();
        match route("hello there", &ctx, now()) {
            RouterDecision::Refuse { .. } => {}
            other => panic!("unexpected decision: {other:?}"),
        }
    }

    #[test]
    fn destructive_request_is_refused() {
        let ctx = ConversationContext::default();
        match route("please drop table dsiactivities", &ctx, now()) {
            RouterDecision::Refuse { .. } => {}
            other => panic!("unexpected decision: {other:?}"),
        }
    }

    #[test]
    fn stats_request_with_only_date_filter() {
        let ctx = ConversationContext::default();
        match route("count transactions older than 3 months", &ctx, now()) {
            RouterDecision::Dispatch(Tool::GetTableStats { table, .. }) => {
                assert_eq!(table.as_deref(), Some("dsitransactionlog"));
            }
            other => panic!("unexpected decision: {other:?}"),
        }
    }
}
