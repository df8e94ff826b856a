//! Owner notifications.

use super::{db_err, parse_ts, ts, SqliteStore};
use chrono::{DateTime, Utc};
use sentinels_core::{
    error::SentinelError,
    model::{NewNotification, Notification, NotificationKind},
};

#[derive(sqlx::FromRow)]
struct NotificationRow {
    id: String,
    user_id: String,
    agent_id: Option<String>,
    #[sqlx(rename = "type")]
    kind: String,
    title: String,
    message: String,
    read: bool,
    created_at: String,
}

impl NotificationRow {
    fn into_notification(self) -> Result<Notification, SentinelError> {
        Ok(Notification {
            kind: NotificationKind::parse(&self.kind).unwrap_or(NotificationKind::Info),
            created_at: parse_ts(&self.created_at)?,
            id: self.id,
            user_id: self.user_id,
            agent_id: self.agent_id,
            title: self.title,
            message: self.message,
            read: self.read,
        })
    }
}

impl SqliteStore {
    pub async fn create_notification(
        &self,
        n: NewNotification,
    ) -> Result<Notification, SentinelError> {
        sqlx::query(
            "INSERT INTO notifications (id, user_id, agent_id, type, title, message, read, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&n.id)
        .bind(&n.user_id)
        .bind(&n.agent_id)
        .bind(n.kind.as_str())
        .bind(&n.title)
        .bind(&n.message)
        .bind(n.read)
        .bind(ts(n.created_at))
        .execute(&self.pool)
        .await
        .map_err(db_err("create notification"))?;
        Ok(n.into_notification())
    }

    /// Newest first.
    pub async fn list_notifications(
        &self,
        user_id: &str,
    ) -> Result<Vec<Notification>, SentinelError> {
        let rows: Vec<NotificationRow> = sqlx::query_as(
            "SELECT id, user_id, agent_id, type, title, message, read, created_at \
             FROM notifications WHERE user_id = ? ORDER BY created_at DESC, rowid DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err("list notifications"))?;
        rows.into_iter()
            .map(NotificationRow::into_notification)
            .collect()
    }

    pub async fn mark_notification_read(
        &self,
        id: &str,
        user_id: &str,
    ) -> Result<bool, SentinelError> {
        let result = sqlx::query("UPDATE notifications SET read = 1 WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(db_err("mark notification read"))?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_notification(&self, id: &str, user_id: &str) -> Result<bool, SentinelError> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(db_err("delete notification"))?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn notification_exists_since(
        &self,
        user_id: &str,
        agent_id: &str,
        title: &str,
        since: DateTime<Utc>,
    ) -> Result<bool, SentinelError> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM notifications \
             WHERE user_id = ? AND agent_id = ? AND title = ? AND created_at >= ?",
        )
        .bind(user_id)
        .bind(agent_id)
        .bind(title)
        .bind(ts(since))
        .fetch_one(&self.pool)
        .await
        .map_err(db_err("notification dedup check"))?;
        Ok(count > 0)
    }
}
