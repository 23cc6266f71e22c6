use serde::{Deserialize, Serialize};

// Admin gets the full surface; Monitor is read-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Monitor,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Monitor => "monitor",
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        match s.to_ascii_lowercase().as_str() {
            "admin" => Some(Role::Admin),
            "monitor" => Some(Role::Monitor),
            _ => None,
        }
    }

    // Admin: select, archive, delete_archive, confirm_operations.
    // Monitor: select only.
    pub fn can(&self, action: &str) -> bool {
        match self {
            Role::Admin => matches!(
                action,
                "select" | "archive" | "delete_archive" | "confirm_operations"
            ),
            Role::Monitor => matches!(action, "select"),
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct User {
    pub user_id: i64,
    pub username: String,
    #[sqlx(try_from = "String")]
    pub role: RoleColumn,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub oauth_provider: Option<String>,
    pub oauth_id: Option<String>,
    pub email: Option<String>,
    pub display_name: Option<String>,
}

// sqlx::FromRow needs a concrete TryFrom<String> type to decode the Role
// text column into; Role itself stays a plain enum elsewhere so .can()
// reads naturally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleColumn(pub Role);

impl TryFrom<String> for RoleColumn {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Role::parse(&value)
            .map(RoleColumn)
            .ok_or_else(|| format!("unknown role '{value}'"))
    }
}

impl From<RoleColumn> for Role {
    fn from(value: RoleColumn) -> Self {
        value.0
    }
}
