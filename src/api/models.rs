use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::region::RegionConfig;

#[derive(Debug, Deserialize)]
pub struct ChatRequestBody {
    pub message: String,
    pub session_id: String,
    pub user_id: Option<String>,
    pub role: String,
    pub region: String,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmRequestBody {
    pub literal: String,
    pub session_id: String,
    pub user_id: Option<String>,
    pub role: String,
    pub region: String,
}

#[derive(Debug, Deserialize)]
pub struct UpsertRegionConfigRequest {
    pub connection_string: String,
    pub is_active: bool,
    pub connection_notes: Option<String>,
}

// connection_string carries database credentials and never leaves this
// service; the admin surface only confirms a region is configured.
#[derive(Debug, Clone, Serialize)]
pub struct RegionConfigView {
    pub region: String,
    pub is_active: bool,
    pub is_connected: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_connected_at: Option<DateTime<Utc>>,
    pub connection_notes: Option<String>,
}

impl From<RegionConfig> for RegionConfigView {
    fn from(c: RegionConfig) -> Self {
        Self {
            region: c.region,
            is_active: c.is_active,
            is_connected: c.is_connected,
            created_at: c.created_at,
            updated_at: c.updated_at,
            last_connected_at: c.last_connected_at,
            connection_notes: c.connection_notes,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct JobLogQueryParams {
    pub region: String,
    pub status: Option<String>,
    pub job_type: Option<String>,
    pub table_name: Option<String>,
    pub source: Option<String>,
    pub date_range: Option<String>,
    pub failed_only: Option<bool>,
    pub successful_only: Option<bool>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}
