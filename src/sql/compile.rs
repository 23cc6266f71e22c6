//! Compiles the Intent Router's SQL escape hatch (spec §4.E item 6,
//! `execute_sql_query`) from a free-form prompt into a candidate SELECT.
//!
//! The real system delegates this to an LLM call, out of this core's
//! scope (spec §1). `SqlCompiler` is the seam the orchestrator holds
//! instead of an implicit singleton (design note §9), so a real
//! LLM-backed compiler drops in without touching the orchestrator.
//! `HeuristicSqlCompiler` is a deterministic stand-in for the fixed
//! vocabulary this system actually supports.

use chrono::{DateTime, Utc};

use crate::dateparse;
use crate::error::{AppError, AppResult};

pub trait SqlCompiler: Send + Sync {
    fn compile(&self, prompt: &str, now: DateTime<Utc>) -> AppResult<String>;
}

#[derive(Debug, Clone, Default)]
pub struct HeuristicSqlCompiler;

impl SqlCompiler for HeuristicSqlCompiler {
    fn compile(&self, prompt: &str, now: DateTime<Utc>) -> AppResult<String> {
        let lower = prompt.to_lowercase();

        let wants_jobs = lower.contains("job");
        let is_count = lower.contains("count") || lower.contains("how many");

        let (table, time_column) = if wants_jobs {
            ("job_logs", "started_at")
        } else if lower.contains("archivedactivities") || lower.contains("dsiactivitiesarchive") {
            ("dsiactivitiesarchive", "\"PostedTime\"")
        } else if lower.contains("activit") {
            ("dsiactivities", "\"PostedTime\"")
        } else if lower.contains("dsitransactionlogarchive") {
            ("dsitransactionlogarchive", "\"WhenReceived\"")
        } else if lower.contains("transaction") {
            ("dsitransactionlog", "\"WhenReceived\"")
        } else {
            return Err(AppError::ParseFailure(
                "could not determine which table this query refers to".to_string(),
            ));
        };

        let mut predicates: Vec<String> = Vec::new();

        if wants_jobs {
            if lower.contains("failed") || lower.contains("error") {
                predicates.push("status = 'FAILED'".to_string());
            } else if lower.contains("successful") || lower.contains("succeeded") {
                predicates.push("status = 'SUCCESS'".to_string());
            } else if lower.contains("in progress") || lower.contains("running") {
                predicates.push("status = 'IN_PROGRESS'".to_string());
            }
        } else if lower.contains("error") {
            predicates.push("\"ErrorsOut\" IS NOT NULL AND \"ErrorsOut\" <> ''".to_string());
        }

        if let Ok(parsed) = dateparse::parse(prompt, now) {
            let range = if wants_jobs {
                parsed.job_logs()
            } else {
                parsed.activities_transactions()
            };
            match (range.start, range.end) {
                (Some(s), Some(e)) => predicates.push(format!("{time_column} BETWEEN '{s}' AND '{e}'")),
                (None, Some(e)) => predicates.push(format!("{time_column} < '{e}'")),
                (Some(s), None) => predicates.push(format!("{time_column} >= '{s}'")),
                (None, None) => {}
            }
        }

        let select = if is_count { "SELECT COUNT(*)" } else { "SELECT *" };
        let where_clause = if predicates.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", predicates.join(" AND "))
        };

        Ok(format!("{select} FROM {table}{where_clause}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn compiles_count_errors_in_transactions_in_september() {
        let sql = HeuristicSqlCompiler
            .compile("count all errors in transactions in september", now())
            .unwrap();
        assert!(sql.starts_with("SELECT COUNT(*)"));
        assert!(sql.contains("FROM dsitransactionlog"));
        assert!(sql.contains("ErrorsOut"));
    }

    #[test]
    fn compiles_failed_jobs_query() {
        let sql = HeuristicSqlCompiler.compile("show me failed jobs", now()).unwrap();
        assert!(sql.contains("FROM job_logs"));
        assert!(sql.contains("status = 'FAILED'"));
    }

    #[test]
    fn unrecognized_table_fails_to_compile() {
        let err = HeuristicSqlCompiler.compile("what is the weather today", now()).unwrap_err();
        assert_eq!(err.kind(), "ParseFailure");
    }
}
