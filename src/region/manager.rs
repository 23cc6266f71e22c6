use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tokio::sync::RwLock;

use crate::error::{AppError, AppResult};
use crate::region::config_repo::{RegionConfigRepo, DEFAULT_REGIONS};

// A missing archive table is reported as a zero count, not an error. A
// region can be freshly provisioned and not yet have archived anything.
pub const KNOWN_TABLES: &[&str] = &[
    "dsiactivities",
    "dsiactivitiesarchive",
    "dsitransactionlog",
    "dsitransactionlogarchive",
];

struct RegionEntry {
    pool: PgPool,
    connected: bool,
    last_connected_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct ConnectionStatus {
    pub region: String,
    pub connected: bool,
    pub last_connected_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct TableCounts {
    pub region: String,
    pub counts: HashMap<String, i64>,
}

// region -> {engine, connected}. connect/disconnect take the write lock;
// session takes only a read lock.
#[derive(Clone)]
pub struct RegionSessionManager {
    config_repo: RegionConfigRepo,
    entries: Arc<RwLock<HashMap<String, RegionEntry>>>,
}

impl RegionSessionManager {
    pub fn new(config_repo: RegionConfigRepo) -> Self {
        Self {
            config_repo,
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    // Calling connect on an already-connected region is a no-op that still
    // re-verifies reachability.
    pub async fn connect(&self, region: &str) -> AppResult<()> {
        let cfg = self
            .config_repo
            .get(region)
            .await
            .map_err(|e| AppError::Internal(e.to_string()))?
            .ok_or_else(|| AppError::InvalidRegion(region.to_string()))?;

        if !cfg.is_active {
            return Err(AppError::InvalidRegion(region.to_string()));
        }

        {
            let entries = self.entries.read().await;
            if let Some(entry) = entries.get(region) {
                if entry.connected {
                    sqlx::query("SELECT 1")
                        .execute(&entry.pool)
                        .await
                        .map_err(|e| AppError::DbUnavailable(e.to_string()))?;
                    return Ok(());
                }
            }
        }

        let pool = crate::db::make_pool(&cfg.connection_string)
            .await
            .map_err(|e| AppError::DbUnavailable(e.to_string()))?;
        sqlx::query("SELECT 1")
            .execute(&pool)
            .await
            .map_err(|e| AppError::DbUnavailable(e.to_string()))?;

        let now = Utc::now();
        {
            let mut entries = self.entries.write().await;
            entries.insert(
                region.to_string(),
                RegionEntry {
                    pool,
                    connected: true,
                    last_connected_at: Some(now),
                },
            );
        }

        self.config_repo
            .mark_connected(region, true)
            .await
            .map_err(|e| AppError::Internal(e.to_string()))?;

        Ok(())
    }

    pub async fn disconnect(&self, region: &str) -> AppResult<()> {
        let mut entries = self.entries.write().await;
        entries.remove(region);
        drop(entries);

        self.config_repo
            .mark_connected(region, false)
            .await
            .map_err(|e| AppError::Internal(e.to_string()))?;
        Ok(())
    }

    // Fails with NotConnected if the region is not live.
    pub async fn session(&self, region: &str) -> AppResult<PgPool> {
        let entries = self.entries.read().await;
        match entries.get(region) {
            Some(entry) if entry.connected => Ok(entry.pool.clone()),
            _ => Err(AppError::NotConnected(region.to_string())),
        }
    }

    pub async fn is_connected(&self, region: &str) -> bool {
        let entries = self.entries.read().await;
        entries.get(region).map(|e| e.connected).unwrap_or(false)
    }

    pub async fn list_regions(&self) -> Vec<String> {
        let known = self
            .config_repo
            .known_regions()
            .await
            .unwrap_or_default();
        if known.is_empty() {
            DEFAULT_REGIONS.iter().map(|s| s.to_string()).collect()
        } else {
            known
        }
    }

    pub async fn connection_status(&self) -> Vec<ConnectionStatus> {
        let regions = self.list_regions().await;
        let entries = self.entries.read().await;
        regions
            .into_iter()
            .map(|region| {
                let (connected, last_connected_at) = entries
                    .get(&region)
                    .map(|e| (e.connected, e.last_connected_at))
                    .unwrap_or((false, None));
                ConnectionStatus {
                    region,
                    connected,
                    last_connected_at,
                }
            })
            .collect()
    }

    // A table that doesn't exist in this region's schema contributes a
    // zero count rather than failing the whole probe.
    pub async fn test_connection(&self, region: &str) -> AppResult<TableCounts> {
        let pool = self.session(region).await?;
        sqlx::query("SELECT 1")
            .execute(&pool)
            .await
            .map_err(|e| AppError::DbUnavailable(e.to_string()))?;

        let mut counts = HashMap::new();
        for table in KNOWN_TABLES {
            let sql = format!("SELECT COUNT(*) FROM {table}");
            let count: Result<i64, sqlx::Error> =
                sqlx::query_scalar(&sql).fetch_one(&pool).await;
            counts.insert((*table).to_string(), count.unwrap_or(0));
        }

        Ok(TableCounts {
            region: region.to_string(),
            counts,
        })
    }
}
