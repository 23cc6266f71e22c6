use chrono::{DateTime, Utc};
use sqlx::PgPool;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RegionConfig {
    pub id: i64,
    pub region: String,
    pub connection_string: String,
    pub is_active: bool,
    pub is_connected: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_connected_at: Option<DateTime<Utc>>,
    pub connection_notes: Option<String>,
}

#[derive(Clone)]
pub struct RegionConfigRepo {
    pool: PgPool,
}

impl RegionConfigRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list(&self) -> anyhow::Result<Vec<RegionConfig>> {
        let rows = sqlx::query_as::<_, RegionConfig>(
            r#"
            SELECT id, region, connection_string, is_active, is_connected,
                   created_at, updated_at, last_connected_at, connection_notes
            FROM region_config
            ORDER BY region ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn get(&self, region: &str) -> anyhow::Result<Option<RegionConfig>> {
        let row = sqlx::query_as::<_, RegionConfig>(
            r#"
            SELECT id, region, connection_string, is_active, is_connected,
                   created_at, updated_at, last_connected_at, connection_notes
            FROM region_config
            WHERE region = $1
            "#,
        )
        .bind(region)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn upsert(
        &self,
        region: &str,
        connection_string: &str,
        is_active: bool,
        connection_notes: Option<&str>,
    ) -> anyhow::Result<RegionConfig> {
        let row = sqlx::query_as::<_, RegionConfig>(
            r#"
            INSERT INTO region_config (region, connection_string, is_active, connection_notes)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (region) DO UPDATE SET
                connection_string = EXCLUDED.connection_string,
                is_active = EXCLUDED.is_active,
                connection_notes = EXCLUDED.connection_notes,
                updated_at = now()
            RETURNING id, region, connection_string, is_active, is_connected,
                      created_at, updated_at, last_connected_at, connection_notes
            "#,
        )
        .bind(region)
        .bind(connection_string)
        .bind(is_active)
        .bind(connection_notes)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn delete(&self, region: &str) -> anyhow::Result<u64> {
        let rows = sqlx::query("DELETE FROM region_config WHERE region = $1")
            .bind(region)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(rows)
    }

    pub async fn mark_connected(&self, region: &str, connected: bool) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE region_config
            SET is_connected = $2,
                last_connected_at = CASE WHEN $2 THEN now() ELSE last_connected_at END,
                updated_at = now()
            WHERE region = $1
            "#,
        )
        .bind(region)
        .bind(connected)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // Caller falls back to a fixed default list when this is empty.
    pub async fn known_regions(&self) -> anyhow::Result<Vec<String>> {
        let regions: Vec<String> = sqlx::query_scalar("SELECT region FROM region_config ORDER BY region ASC")
            .fetch_all(&self.pool)
            .await?;
        Ok(regions)
    }
}

/// Fallback region list when `region_config` has no rows yet.
pub const DEFAULT_REGIONS: &[&str] = &["US", "EU", "APAC", "MEA"];
