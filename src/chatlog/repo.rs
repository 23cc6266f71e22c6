use sqlx::PgPool;

use crate::chatlog::model::{ChatTurn, NewChatTurn};

// Append-only store for ChatTurns, plus the lookup the router's short
// context and the confirmation protocol both depend on.
#[derive(Clone)]
pub struct ChatLogRepo {
    pool: PgPool,
}

impl ChatLogRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, turn: &NewChatTurn) -> anyhow::Result<ChatTurn> {
        let row = sqlx::query_as::<_, ChatTurn>(
            r#"
            INSERT INTO chatops_log (
                session_id, user_id, user_role, region, message_type,
                user_message, bot_response, operation_type, table_name,
                filters_applied, records_affected, operation_status,
                timestamp, error_message
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, now(), $13)
            RETURNING id, session_id, user_id, user_role, region, message_type,
                      user_message, bot_response, operation_type, table_name,
                      filters_applied, records_affected, operation_status,
                      timestamp, error_message
            "#,
        )
        .bind(&turn.session_id)
        .bind(&turn.user_id)
        .bind(&turn.user_role)
        .bind(&turn.region)
        .bind(&turn.message_type)
        .bind(&turn.user_message)
        .bind(&turn.bot_response)
        .bind(&turn.operation_type)
        .bind(&turn.table_name)
        .bind(&turn.filters_applied)
        .bind(turn.records_affected)
        .bind(&turn.operation_status)
        .bind(&turn.error_message)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    // Basis for both context inheritance ("archive them") and the
    // confirmation protocol ("CONFIRM ARCHIVE" recovers this turn's table
    // and filters).
    pub async fn last_operational_turn(&self, session_id: &str) -> anyhow::Result<Option<ChatTurn>> {
        let row = sqlx::query_as::<_, ChatTurn>(
            r#"
            SELECT id, session_id, user_id, user_role, region, message_type,
                   user_message, bot_response, operation_type, table_name,
                   filters_applied, records_affected, operation_status,
                   timestamp, error_message
            FROM chatops_log
            WHERE session_id = $1 AND table_name IS NOT NULL
            ORDER BY timestamp DESC
            LIMIT 1
            "#,
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn recent_turns(&self, session_id: &str, limit: i64) -> anyhow::Result<Vec<ChatTurn>> {
        let rows = sqlx::query_as::<_, ChatTurn>(
            r#"
            SELECT id, session_id, user_id, user_role, region, message_type,
                   user_message, bot_response, operation_type, table_name,
                   filters_applied, records_affected, operation_status,
                   timestamp, error_message
            FROM chatops_log
            WHERE session_id = $1
            ORDER BY timestamp DESC
            LIMIT $2
            "#,
        )
        .bind(session_id)
        .bind(limit.clamp(1, 50))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
