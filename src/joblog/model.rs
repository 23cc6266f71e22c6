use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobType {
    Archive,
    Delete,
    Other,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::Archive => "ARCHIVE",
            JobType::Delete => "DELETE",
            JobType::Other => "OTHER",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    InProgress,
    Success,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::InProgress => "IN_PROGRESS",
            JobStatus::Success => "SUCCESS",
            JobStatus::Failed => "FAILED",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobSource {
    Script,
    Chatbot,
}

impl JobSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobSource::Script => "SCRIPT",
            JobSource::Chatbot => "CHATBOT",
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct JobLog {
    pub id: i64,
    pub schema_name: Option<String>,
    pub job_type: String,
    pub table_name: String,
    pub status: String,
    pub source: String,
    pub reason: Option<String>,
    pub records_affected: Option<i64>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

// Exactly one close (or record_failure_fresh, on the rollback path) must
// be issued per handle.
#[derive(Debug, Clone, Copy)]
pub struct JobLogHandle {
    pub id: i64,
}
