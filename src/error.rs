use thiserror::Error;

// Repo-level code returns anyhow::Result internally; at each service
// boundary the anyhow error folds into Internal unless a more specific
// variant already applies.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("region '{0}' is not registered")]
    InvalidRegion(String),

    #[error("region '{0}' is not connected")]
    NotConnected(String),

    #[error("permission denied: role '{role}' cannot perform '{action}'")]
    PermissionDenied { role: String, action: String },

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("safety rule violation: {0}")]
    SafetyRuleViolation(String),

    #[error("SQL safety violation: {0}")]
    SqlSafetyViolation(String),

    #[error("duplicate key encountered for {table}: {key}")]
    DuplicateKey { table: String, key: String },

    #[error("database unavailable: {0}")]
    DbUnavailable(String),

    #[error("operation timed out: {0}")]
    Timeout(String),

    #[error("parse failure: {0}")]
    ParseFailure(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    // Lets the orchestrator pick the right error_card variant without
    // string-matching Display output.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::InvalidRegion(_) => "InvalidRegion",
            AppError::NotConnected(_) => "NotConnected",
            AppError::PermissionDenied { .. } => "PermissionDenied",
            AppError::ValidationError(_) => "ValidationError",
            AppError::SafetyRuleViolation(_) => "SafetyRuleViolation",
            AppError::SqlSafetyViolation(_) => "SQLSafetyViolation",
            AppError::DuplicateKey { .. } => "DuplicateKey",
            AppError::DbUnavailable(_) => "DBUnavailable",
            AppError::Timeout(_) => "Timeout",
            AppError::ParseFailure(_) => "ParseFailure",
            AppError::Internal(_) => "Internal",
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::PoolTimedOut => AppError::Timeout(e.to_string()),
            sqlx::Error::Io(_) | sqlx::Error::PoolClosed => AppError::DbUnavailable(e.to_string()),
            sqlx::Error::Database(ref db_err) if db_err.code().as_deref() == Some("23505") => {
                AppError::DuplicateKey {
                    table: "unknown".to_string(),
                    key: db_err.message().to_string(),
                }
            }
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(e: anyhow::Error) -> Self {
        AppError::Internal(e.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;
