use sqlx::{Postgres, QueryBuilder};

use crate::core::model::{DateComparison, OperationFilters, TableDef};

// Appends the date filter onto a `WHERE 1=1` builder. Shared by the
// candidate-selection query, the archive INSERT's SELECT, and the mirrored
// DELETE so all three agree on what's in scope.
pub fn push_date_filter(builder: &mut QueryBuilder<'_, Postgres>, table: TableDef, filters: &OperationFilters) {
    match (&filters.date_start, &filters.date_end) {
        (Some(start), Some(end)) => {
            builder
                .push(format!(r#" AND "{}" BETWEEN "#, table.time_column))
                .push_bind(start.clone())
                .push(" AND ")
                .push_bind(end.clone());
        }
        (None, Some(end)) => {
            let op = match filters.date_comparison {
                Some(DateComparison::OlderThan) => "<",
                _ => "<=",
            };
            builder
                .push(format!(r#" AND "{}" {} "#, table.time_column, op))
                .push_bind(end.clone());
        }
        (Some(start), None) => {
            builder
                .push(format!(r#" AND "{}" >= "#, table.time_column))
                .push_bind(start.clone());
        }
        (None, None) => {}
    }
}

// "oldest N records" -> ORDER BY <time_column> ASC LIMIT N.
pub fn push_order_and_limit(builder: &mut QueryBuilder<'_, Postgres>, table: TableDef, filters: &OperationFilters) {
    if let Some(limit) = filters.limit {
        builder
            .push(format!(r#" ORDER BY "{}" ASC LIMIT "#, table.time_column))
            .push_bind(limit);
    }
}

// Same clause, unbound, for call sites building queries with `format!`
// instead of `QueryBuilder` (duplicate probing reuses the literal limit
// inside a correlated subquery).
pub fn order_limit_literal(table: TableDef, filters: &OperationFilters) -> String {
    match filters.limit {
        Some(limit) => format!(r#"ORDER BY "{}" ASC LIMIT {}"#, table.time_column, limit),
        None => String::new(),
    }
}

// date_start/date_end are always 14-digit YYYYMMDDHHMMSS by the time they
// get here. Reject anything else before it gets interpolated via format!.
fn digits14(s: &str) -> Option<&str> {
    (s.len() == 14 && s.bytes().all(|b| b.is_ascii_digit())).then_some(s)
}

// Unbound WHERE fragment for the candidate-key probes in `core::duplicates`.
// Safe only because digits14 rejects anything that isn't a validated
// 14-digit string; an invalid value falls back to "1=0" rather than being
// interpolated unchecked.
pub fn where_literal(table: TableDef, filters: &OperationFilters) -> String {
    match (&filters.date_start, &filters.date_end) {
        (Some(start), Some(end)) => match (digits14(start), digits14(end)) {
            (Some(s), Some(e)) => format!(r#""{}" BETWEEN '{}' AND '{}'"#, table.time_column, s, e),
            _ => "1=0".to_string(),
        },
        (None, Some(end)) => match digits14(end) {
            Some(e) => {
                let op = match filters.date_comparison {
                    Some(DateComparison::OlderThan) => "<",
                    _ => "<=",
                };
                format!(r#""{}" {} '{}'"#, table.time_column, op, e)
            }
            None => "1=0".to_string(),
        },
        (Some(start), None) => match digits14(start) {
            Some(s) => format!(r#""{}" >= '{}'"#, table.time_column, s),
            None => "1=0".to_string(),
        },
        (None, None) => "1=1".to_string(),
    }
}
