use sqlx::{Column, Row, TypeInfo};
use sqlx::postgres::PgRow;

// Best-effort by declared column type. Used for preview samples and the
// Safe-SQL Executor's result rows, where the column set isn't known at
// compile time.
pub fn row_to_json(row: &PgRow) -> serde_json::Value {
    let mut obj = serde_json::Map::new();
    for col in row.columns() {
        let name = col.name().to_string();
        let value = decode_cell(row, col);
        obj.insert(name, value);
    }
    serde_json::Value::Object(obj)
}

fn decode_cell(row: &PgRow, col: &sqlx::postgres::PgColumn) -> serde_json::Value {
    let idx = col.ordinal();
    let type_name = col.type_info().name();

    macro_rules! try_get {
        ($t:ty) => {
            row.try_get::<Option<$t>, _>(idx).ok().flatten()
        };
    }

    match type_name {
        "INT2" | "INT4" => try_get!(i32)
            .map(|v| serde_json::json!(v))
            .unwrap_or(serde_json::Value::Null),
        "INT8" => try_get!(i64)
            .map(|v| serde_json::json!(v))
            .unwrap_or(serde_json::Value::Null),
        "FLOAT4" | "FLOAT8" | "NUMERIC" => try_get!(f64)
            .map(|v| serde_json::json!(v))
            .unwrap_or(serde_json::Value::Null),
        "BOOL" => try_get!(bool)
            .map(|v| serde_json::json!(v))
            .unwrap_or(serde_json::Value::Null),
        "TIMESTAMPTZ" => row
            .try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(idx)
            .ok()
            .flatten()
            .map(|v| serde_json::json!(v.to_rfc3339()))
            .unwrap_or(serde_json::Value::Null),
        "TIMESTAMP" => row
            .try_get::<Option<chrono::NaiveDateTime>, _>(idx)
            .ok()
            .flatten()
            .map(|v| serde_json::json!(v.to_string()))
            .unwrap_or(serde_json::Value::Null),
        "JSON" | "JSONB" => row
            .try_get::<Option<serde_json::Value>, _>(idx)
            .ok()
            .flatten()
            .unwrap_or(serde_json::Value::Null),
        _ => try_get!(String)
            .map(serde_json::Value::String)
            .unwrap_or(serde_json::Value::Null),
    }
}

// Rewrites a 14-digit numeric string into YYYY-MM-DD HH:MM:SS (§4.F).
pub fn format_database_date(value: &str) -> String {
    if value.len() == 14 && value.bytes().all(|b| b.is_ascii_digit()) {
        format!(
            "{}-{}-{} {}:{}:{}",
            &value[0..4],
            &value[4..6],
            &value[6..8],
            &value[8..10],
            &value[10..12],
            &value[12..14]
        )
    } else if value.len() == 8 && value.bytes().all(|b| b.is_ascii_digit()) {
        format!("{}-{}-{}", &value[0..4], &value[4..6], &value[6..8])
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_full_timestamp() {
        assert_eq!(format_database_date("20251015120000"), "2025-10-15 12:00:00");
    }

    #[test]
    fn formats_date_only() {
        assert_eq!(format_database_date("20251015"), "2025-10-15");
    }

    #[test]
    fn leaves_non_date_strings_untouched() {
        assert_eq!(format_database_date("hello"), "hello");
    }
}
