use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};

use crate::core::model::TableDef;

// existing_guids/existing_activity_keys carry the matched keys so the
// archive INSERT and the mirrored DELETE exclusion reference the same set.
#[derive(Debug, Clone, Default)]
pub struct DuplicateProbe {
    pub skipped_count: i64,
    pub existing_guids: Vec<String>,
    pub existing_activity_keys: Vec<(String, String)>,
}

pub async fn probe_transactions(
    tx: &mut Transaction<'_, Postgres>,
    table: TableDef,
    candidate_guids: &[String],
    batch_size: usize,
) -> anyhow::Result<DuplicateProbe> {
    if candidate_guids.is_empty() {
        return Ok(DuplicateProbe::default());
    }

    let mut existing = Vec::new();
    for chunk in candidate_guids.chunks(batch_size.max(1)) {
        let sql = format!(
            r#"SELECT "GUID" FROM {} WHERE "GUID" = ANY($1)"#,
            table.archive_table
        );
        let found: Vec<String> = sqlx::query_scalar(&sql)
            .bind(chunk)
            .fetch_all(&mut **tx)
            .await?;
        existing.extend(found);
    }

    Ok(DuplicateProbe {
        skipped_count: existing.len() as i64,
        existing_guids: existing,
        existing_activity_keys: Vec::new(),
    })
}

pub async fn probe_activities(
    tx: &mut Transaction<'_, Postgres>,
    table: TableDef,
    candidates: &[(String, String)],
    batch_size: usize,
) -> anyhow::Result<DuplicateProbe> {
    if candidates.is_empty() {
        return Ok(DuplicateProbe::default());
    }

    let mut existing = Vec::new();
    for chunk in candidates.chunks(batch_size.max(1)) {
        let ids: Vec<&str> = chunk.iter().map(|(a, _)| a.as_str()).collect();
        let times: Vec<&str> = chunk.iter().map(|(_, p)| p.as_str()).collect();
        let sql = format!(
            r#"
            SELECT a."ActivityID", a."PostedTime"
            FROM {} a
            JOIN unnest($1::text[], $2::text[]) AS c(activity_id, posted_time)
              ON a."ActivityID" = c.activity_id AND a."PostedTime" = c.posted_time
            "#,
            table.archive_table
        );
        let found: Vec<(String, String)> = sqlx::query_as(&sql)
            .bind(&ids)
            .bind(&times)
            .fetch_all(&mut **tx)
            .await?;
        existing.extend(found);
    }

    Ok(DuplicateProbe {
        skipped_count: existing.len() as i64,
        existing_guids: Vec::new(),
        existing_activity_keys: existing,
    })
}

pub async fn candidate_guids(
    tx: &mut Transaction<'_, Postgres>,
    table: TableDef,
    where_sql: &str,
    order_limit_sql: &str,
) -> anyhow::Result<Vec<String>> {
    let sql = format!(
        r#"SELECT "GUID" FROM {} WHERE ({}) AND "GUID" IS NOT NULL {}"#,
        table.main_table, where_sql, order_limit_sql
    );
    let rows: Vec<String> = sqlx::query_scalar(&sql).fetch_all(&mut **tx).await?;
    Ok(rows)
}

pub async fn candidate_activity_keys(
    tx: &mut Transaction<'_, Postgres>,
    table: TableDef,
    where_sql: &str,
    order_limit_sql: &str,
) -> anyhow::Result<Vec<(String, String)>> {
    let sql = format!(
        r#"SELECT "ActivityID", "PostedTime" FROM {} WHERE ({}) {}"#,
        table.main_table, where_sql, order_limit_sql
    );
    let rows: Vec<(String, String)> = sqlx::query_as(&sql).fetch_all(&mut **tx).await?;
    Ok(rows)
}

// Same exclusion predicate reused by both the archive INSERT's SELECT and
// the mirrored main-table DELETE.
pub fn push_exclusion(builder: &mut QueryBuilder<'_, Postgres>, table: TableDef, probe: &DuplicateProbe) {
    if table.is_single_guid_keyed() {
        if !probe.existing_guids.is_empty() {
            builder
                .push(r#" AND "GUID" != ALL("#)
                .push_bind(probe.existing_guids.clone())
                .push(")");
        }
    } else if !probe.existing_activity_keys.is_empty() {
        builder.push(" AND NOT (");
        for (i, (activity_id, posted_time)) in probe.existing_activity_keys.iter().enumerate() {
            if i > 0 {
                builder.push(" OR ");
            }
            builder
                .push(r#"("ActivityID" = "#)
                .push_bind(activity_id.clone())
                .push(r#" AND "PostedTime" = "#)
                .push_bind(posted_time.clone())
                .push(")");
        }
        builder.push(")");
    }
}

// Post-commit check: a non-zero join between main and archive on the
// duplicate key means a race slipped through. Logged, not fatal.
pub async fn post_commit_conflict_count(pool: &PgPool, table: TableDef) -> anyhow::Result<i64> {
    if table.is_single_guid_keyed() {
        let sql = format!(
            r#"
            SELECT COUNT(*) FROM {} m
            INNER JOIN {} a ON m."GUID" = a."GUID"
            WHERE m."GUID" IS NOT NULL
            "#,
            table.main_table, table.archive_table
        );
        let (count,): (i64,) = sqlx::query_as(&sql).fetch_one(pool).await?;
        Ok(count)
    } else {
        Ok(0)
    }
}
