//! SQLite-backed datastore.
//!
//! Split into focused submodules:
//! - `agents`: agent rows, deployment status, interaction counters
//! - `subscriptions`: subscription rows and expiry lookups
//! - `analytics`: message log
//! - `notifications`: owner notifications
//! - `airdrop`: registrations, users, task completions

mod agents;
mod airdrop;
mod analytics;
mod notifications;
mod subscriptions;

#[cfg(test)]
mod tests;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sentinels_core::{
    config::StoreConfig,
    error::SentinelError,
    model::{
        Agent, AirdropRegistration, DeploymentStatus, MessageLogEntry, NewAgent, NewNotification,
        NewSubscription, Notification, Subscription, TaskCompletion, UserProfile,
    },
    shellexpand,
    traits::Datastore,
};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use tracing::info;

/// Datastore backed by a local SQLite file.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the database at `store.db_path` and run migrations.
    pub async fn new(config: &StoreConfig) -> Result<Self, SentinelError> {
        let db_path = shellexpand(&config.db_path);

        if let Some(parent) = std::path::Path::new(&db_path).parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| SentinelError::Store(format!("failed to create data dir: {e}")))?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{db_path}"))
            .map_err(|e| SentinelError::Store(format!("invalid db path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(opts)
            .await
            .map_err(|e| SentinelError::Store(format!("failed to connect to sqlite: {e}")))?;

        Self::run_migrations(&pool).await?;
        info!("sqlite store initialized at {db_path}");

        Ok(Self { pool })
    }

    /// Fresh private database, gone when the store is dropped.
    pub async fn in_memory() -> Result<Self, SentinelError> {
        let opts = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| SentinelError::Store(format!("invalid db path: {e}")))?;
        // One connection: every pooled connection would get its own database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(opts)
            .await
            .map_err(|e| SentinelError::Store(format!("failed to open sqlite: {e}")))?;
        Self::run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    /// Run SQL migrations, tracking which have already been applied.
    async fn run_migrations(pool: &SqlitePool) -> Result<(), SentinelError> {
        sqlx::raw_sql(
            "CREATE TABLE IF NOT EXISTS _migrations (
                name TEXT PRIMARY KEY,
                applied_at TEXT NOT NULL DEFAULT (datetime('now'))
            );",
        )
        .execute(pool)
        .await
        .map_err(|e| SentinelError::Store(format!("failed to create migrations table: {e}")))?;

        let migrations: &[(&str, &str)] = &[
            ("001_init", include_str!("../../migrations/001_init.sql")),
            (
                "002_message_logs",
                include_str!("../../migrations/002_message_logs.sql"),
            ),
            (
                "003_notifications",
                include_str!("../../migrations/003_notifications.sql"),
            ),
            ("004_airdrop", include_str!("../../migrations/004_airdrop.sql")),
        ];

        for (name, sql) in migrations {
            let applied: Option<(String,)> =
                sqlx::query_as("SELECT name FROM _migrations WHERE name = ?")
                    .bind(name)
                    .fetch_optional(pool)
                    .await
                    .map_err(|e| {
                        SentinelError::Store(format!("failed to check migration {name}: {e}"))
                    })?;

            if applied.is_some() {
                continue;
            }

            sqlx::raw_sql(sql)
                .execute(pool)
                .await
                .map_err(|e| SentinelError::Store(format!("migration {name} failed: {e}")))?;

            sqlx::query("INSERT INTO _migrations (name) VALUES (?)")
                .bind(name)
                .execute(pool)
                .await
                .map_err(|e| {
                    SentinelError::Store(format!("failed to record migration {name}: {e}"))
                })?;
        }
        Ok(())
    }
}

/// Fixed-width RFC 3339 (`2026-01-02T03:04:05.678Z`) so text order is time order.
pub(crate) fn ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub(crate) fn parse_ts(s: &str) -> Result<DateTime<Utc>, SentinelError> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| SentinelError::Store(format!("bad timestamp {s:?}: {e}")))
}

pub(crate) fn db_err(op: &str) -> impl Fn(sqlx::Error) -> SentinelError + '_ {
    move |e| SentinelError::Store(format!("{op} failed: {e}"))
}

#[async_trait]
impl Datastore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn get_agent(&self, id: &str) -> Result<Option<Agent>, SentinelError> {
        SqliteStore::get_agent(self, id).await
    }

    async fn list_agents(&self, user_id: &str) -> Result<Vec<Agent>, SentinelError> {
        SqliteStore::list_agents(self, user_id).await
    }

    async fn create_agent(&self, agent: NewAgent) -> Result<Agent, SentinelError> {
        SqliteStore::create_agent(self, agent).await
    }

    async fn set_agent_status(
        &self,
        id: &str,
        status: DeploymentStatus,
        bot_username: Option<&str>,
    ) -> Result<bool, SentinelError> {
        SqliteStore::set_agent_status(self, id, status, bot_username).await
    }

    async fn record_agent_interaction(
        &self,
        id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), SentinelError> {
        SqliteStore::record_agent_interaction(self, id, at).await
    }

    async fn latest_subscription(
        &self,
        agent_id: &str,
    ) -> Result<Option<Subscription>, SentinelError> {
        SqliteStore::latest_subscription(self, agent_id).await
    }

    async fn create_subscription(
        &self,
        sub: NewSubscription,
    ) -> Result<Subscription, SentinelError> {
        SqliteStore::create_subscription(self, sub).await
    }

    async fn subscriptions_expiring_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Subscription>, SentinelError> {
        SqliteStore::subscriptions_expiring_before(self, cutoff).await
    }

    async fn log_message(&self, entry: &MessageLogEntry) -> Result<(), SentinelError> {
        SqliteStore::log_message(self, entry).await
    }

    async fn recent_messages(
        &self,
        agent_id: &str,
        limit: u32,
    ) -> Result<Vec<MessageLogEntry>, SentinelError> {
        SqliteStore::recent_messages(self, agent_id, limit).await
    }

    async fn create_notification(
        &self,
        notification: NewNotification,
    ) -> Result<Notification, SentinelError> {
        SqliteStore::create_notification(self, notification).await
    }

    async fn list_notifications(
        &self,
        user_id: &str,
    ) -> Result<Vec<Notification>, SentinelError> {
        SqliteStore::list_notifications(self, user_id).await
    }

    async fn mark_notification_read(
        &self,
        id: &str,
        user_id: &str,
    ) -> Result<bool, SentinelError> {
        SqliteStore::mark_notification_read(self, id, user_id).await
    }

    async fn delete_notification(&self, id: &str, user_id: &str) -> Result<bool, SentinelError> {
        SqliteStore::delete_notification(self, id, user_id).await
    }

    async fn notification_exists_since(
        &self,
        user_id: &str,
        agent_id: &str,
        title: &str,
        since: DateTime<Utc>,
    ) -> Result<bool, SentinelError> {
        SqliteStore::notification_exists_since(self, user_id, agent_id, title, since).await
    }

    async fn register_airdrop(
        &self,
        registration: AirdropRegistration,
    ) -> Result<Option<AirdropRegistration>, SentinelError> {
        SqliteStore::register_airdrop(self, registration).await
    }

    async fn list_airdrop_registrations(
        &self,
    ) -> Result<Vec<AirdropRegistration>, SentinelError> {
        SqliteStore::list_airdrop_registrations(self).await
    }

    async fn get_user(&self, wallet: &str) -> Result<Option<UserProfile>, SentinelError> {
        SqliteStore::get_user(self, wallet).await
    }

    async fn delete_user(&self, wallet: &str) -> Result<bool, SentinelError> {
        SqliteStore::delete_user(self, wallet).await
    }

    async fn complete_task(
        &self,
        wallet: &str,
        task_id: &str,
        points: i64,
    ) -> Result<TaskCompletion, SentinelError> {
        SqliteStore::complete_task(self, wallet, task_id, points).await
    }
}
