//! Safe-SQL Executor (spec §4.F): the sole gate between an LLM-produced
//! query string and the database. Validation never trusts the caller;
//! every check in `validate` runs against a masked copy of the query so
//! keywords hiding inside string literals can't fool the forbidden-word
//! scan, and word-boundary matching means `ROLLBACK` doesn't trip a rule
//! meant for `DROP` appearing as a substring of some identifier.

pub mod compile;
pub use compile::{HeuristicSqlCompiler, SqlCompiler};

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use sqlx::{PgPool, Row};

use crate::core::rowfmt;
use crate::error::{AppError, AppResult};

const FORBIDDEN_KEYWORDS: &[&str] = &[
    "INSERT",
    "UPDATE",
    "DELETE",
    "DROP",
    "ALTER",
    "TRUNCATE",
    "CREATE",
    "EXEC",
    "EXECUTE",
    "MERGE",
    "BULK",
    "OPENROWSET",
    "GRANT",
    "REVOKE",
    "CALL",
    "DO",
];

// Columns stored as fixed-width YYYYMMDDHHMMSS; any of these in a result
// row gets the human-readable rewrite.
const KNOWN_DATE_COLUMNS: &[&str] = &["PostedTime", "PostedTimeUTC", "WhenReceived", "WhenProcessed", "WhenExtracted"];

static STRING_LITERAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"'(?:[^'\\]|\\.)*'").unwrap());
static LEADING_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*").unwrap());
static LIMIT_CLAUSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\blimit\s+\d+\b").unwrap());

fn mask_literals(sql: &str) -> String {
    STRING_LITERAL
        .replace_all(sql, |caps: &regex::Captures| " ".repeat(caps[0].len()))
        .into_owned()
}

fn word_boundary_contains(haystack: &str, word: &str) -> bool {
    let pattern = format!(r"(?i)\b{}\b", regex::escape(word));
    Regex::new(&pattern).unwrap().is_match(haystack)
}

#[derive(Debug, Clone)]
pub struct ValidatedQuery {
    pub sql: String,
    pub row_cap: i64,
}

// Five-step validation from §4.F, in order. Any failure returns
// SQLSafetyViolation and the caller executes nothing.
pub fn validate(raw_sql: &str, row_cap: i64) -> AppResult<ValidatedQuery> {
    let masked = mask_literals(raw_sql);

    for kw in FORBIDDEN_KEYWORDS {
        if word_boundary_contains(&masked, kw) {
            return Err(AppError::SqlSafetyViolation(format!(
                "forbidden keyword '{kw}' is not allowed in generated queries"
            )));
        }
    }

    let after_ws = LEADING_WS.replace(&masked, "");
    let first_token: String = after_ws
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_')
        .collect();
    if !first_token.eq_ignore_ascii_case("SELECT") {
        return Err(AppError::SqlSafetyViolation(
            "only SELECT statements are permitted".to_string(),
        ));
    }

    // Strip one trailing semicolon (and any trailing whitespace around
    // it), then reject anything that still contains a statement
    // separator: a second semicolon means multiple statements.
    let trimmed = raw_sql.trim();
    let single_stmt = trimmed.strip_suffix(';').unwrap_or(trimmed).trim();
    let single_stmt_masked = mask_literals(single_stmt);
    if single_stmt_masked.contains(';') {
        return Err(AppError::SqlSafetyViolation(
            "multiple statements are not permitted".to_string(),
        ));
    }

    let sql = if LIMIT_CLAUSE.is_match(&single_stmt_masked) {
        single_stmt.to_string()
    } else {
        format!("{single_stmt} LIMIT {row_cap}")
    };

    Ok(ValidatedQuery { sql, row_cap })
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct SqlExecutionResult {
    pub columns: Vec<String>,
    pub rows: Vec<Value>,
    pub row_count: usize,
    pub generated_sql: String,
}

pub async fn execute(pool: &PgPool, raw_sql: &str, row_cap: i64) -> AppResult<SqlExecutionResult> {
    let validated = validate(raw_sql, row_cap)?;

    let rows = sqlx::query(&validated.sql)
        .fetch_all(pool)
        .await
        .map_err(AppError::from)?;

    let columns = rows
        .first()
        .map(|r| r.columns().iter().map(|c| c.name().to_string()).collect())
        .unwrap_or_default();

    let json_rows: Vec<Value> = rows
        .iter()
        .map(|row| {
            let mut obj = rowfmt::row_to_json(row);
            if let Value::Object(map) = &mut obj {
                for col in KNOWN_DATE_COLUMNS {
                    if let Some(Value::String(s)) = map.get(*col) {
                        let rewritten = rowfmt::format_database_date(s);
                        map.insert((*col).to_string(), Value::String(rewritten));
                    }
                }
            }
            obj
        })
        .collect();

    Ok(SqlExecutionResult {
        row_count: json_rows.len(),
        columns,
        rows: json_rows,
        generated_sql: validated.sql,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_select() {
        let v = validate("SELECT * FROM dsitransactionlog", 100).unwrap();
        assert!(v.sql.ends_with("LIMIT 100"));
    }

    #[test]
    fn rejects_insert() {
        let err = validate("INSERT INTO dsiactivities VALUES (1)", 100).unwrap_err();
        assert_eq!(err.kind(), "SQLSafetyViolation");
    }

    #[test]
    fn rejects_non_select_first_token() {
        let err = validate("DELETE FROM dsiactivitiesarchive", 100).unwrap_err();
        assert_eq!(err.kind(), "SQLSafetyViolation");
    }

    #[test]
    fn keyword_inside_string_literal_is_ignored() {
        let v = validate(
            "SELECT * FROM dsiactivities WHERE description = 'please DROP by today'",
            100,
        )
        .unwrap();
        assert!(v.sql.contains("please DROP by today"));
    }

    #[test]
    fn rejects_multiple_statements() {
        let err = validate("SELECT 1; DROP TABLE dsiactivities", 100).unwrap_err();
        assert_eq!(err.kind(), "SQLSafetyViolation");
    }

    #[test]
    fn strips_trailing_semicolon() {
        let v = validate("SELECT 1;", 100).unwrap();
        assert!(!v.sql.trim_end().ends_with(';'));
    }

    #[test]
    fn existing_limit_is_not_duplicated() {
        let v = validate("SELECT * FROM dsiactivities LIMIT 10", 100).unwrap();
        assert_eq!(v.sql.matches("LIMIT").count(), 1);
    }

    #[test]
    fn rejects_exec() {
        let err = validate("EXEC sp_whatever", 100).unwrap_err();
        assert_eq!(err.kind(), "SQLSafetyViolation");
    }
}
