//! Message log.

use super::{db_err, parse_ts, ts, SqliteStore};
use sentinels_core::{error::SentinelError, model::MessageLogEntry};

impl SqliteStore {
    pub async fn log_message(&self, entry: &MessageLogEntry) -> Result<(), SentinelError> {
        sqlx::query(
            "INSERT INTO message_logs (agent_id, telegram_user_id, user_message, bot_response, \
             response_time_ms, created_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&entry.agent_id)
        .bind(entry.telegram_user_id)
        .bind(&entry.user_message)
        .bind(&entry.bot_response)
        .bind(entry.response_time_ms)
        .bind(ts(entry.created_at))
        .execute(&self.pool)
        .await
        .map_err(db_err("log message"))?;
        Ok(())
    }

    /// Newest first.
    pub async fn recent_messages(
        &self,
        agent_id: &str,
        limit: u32,
    ) -> Result<Vec<MessageLogEntry>, SentinelError> {
        let rows: Vec<(Option<String>, i64, String, String, i64, String)> = sqlx::query_as(
            "SELECT agent_id, telegram_user_id, user_message, bot_response, response_time_ms, \
             created_at FROM message_logs WHERE agent_id = ? \
             ORDER BY created_at DESC, id DESC LIMIT ?",
        )
        .bind(agent_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err("recent messages"))?;

        rows.into_iter()
            .map(
                |(agent_id, telegram_user_id, user_message, bot_response, ms, created_at)| {
                    Ok(MessageLogEntry {
                        agent_id,
                        telegram_user_id,
                        user_message,
                        bot_response,
                        response_time_ms: ms,
                        created_at: parse_ts(&created_at)?,
                    })
                },
            )
            .collect()
    }
}
