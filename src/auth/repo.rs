use sqlx::PgPool;

use crate::auth::models::{Role, User};
use crate::auth::password::verify_password;

#[derive(Clone)]
pub struct UsersRepo {
    pool: PgPool,
}

impl UsersRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT user_id, username, role::text AS role, password_hash,
                   oauth_provider, oauth_id, email, display_name
            FROM users WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    pub async fn find_by_id(&self, user_id: i64) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT user_id, username, role::text AS role, password_hash,
                   oauth_provider, oauth_id, email, display_name
            FROM users WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    pub async fn create(
        &self,
        username: &str,
        role: Role,
        password: Option<&str>,
        email: Option<&str>,
        display_name: Option<&str>,
    ) -> anyhow::Result<User> {
        let password_hash = match password {
            Some(p) => Some(crate::auth::password::hash_password(p)?),
            None => None,
        };

        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, role, password_hash, email, display_name)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING user_id, username, role::text AS role, password_hash,
                      oauth_provider, oauth_id, email, display_name
            "#,
        )
        .bind(username)
        .bind(role.as_str())
        .bind(password_hash)
        .bind(email)
        .bind(display_name)
        .fetch_one(&self.pool)
        .await?;
        Ok(user)
    }

    // OAuth-only accounts (password_hash IS NULL) never match.
    pub async fn authenticate(&self, username: &str, password: &str) -> anyhow::Result<Option<User>> {
        let Some(user) = self.find_by_username(username).await? else {
            return Ok(None);
        };
        let Some(hash) = &user.password_hash else {
            return Ok(None);
        };
        if verify_password(password, hash)? {
            Ok(Some(user))
        } else {
            Ok(None)
        }
    }
}
