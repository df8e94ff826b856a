//! Airdrop registrations, participants, and task completions.

use super::{db_err, parse_ts, ts, SqliteStore};
use chrono::Utc;
use sentinels_core::{
    error::SentinelError,
    model::{AirdropRegistration, TaskCompletion, UserProfile},
};

#[derive(sqlx::FromRow)]
struct RegistrationRow {
    id: String,
    wallet_address: String,
    email: String,
    twitter_handle: Option<String>,
    telegram_handle: Option<String>,
    created_at: String,
}

impl RegistrationRow {
    fn into_registration(self) -> Result<AirdropRegistration, SentinelError> {
        Ok(AirdropRegistration {
            created_at: parse_ts(&self.created_at)?,
            id: self.id,
            wallet_address: self.wallet_address,
            email: self.email,
            twitter_handle: self.twitter_handle,
            telegram_handle: self.telegram_handle,
        })
    }
}

impl SqliteStore {
    /// Insert the registration and a zero-point user in one transaction.
    /// `None` when the wallet is already registered.
    pub async fn register_airdrop(
        &self,
        reg: AirdropRegistration,
    ) -> Result<Option<AirdropRegistration>, SentinelError> {
        let mut tx = self.pool.begin().await.map_err(db_err("begin"))?;

        let inserted = sqlx::query(
            "INSERT OR IGNORE INTO airdrop_registrations \
             (id, wallet_address, email, twitter_handle, telegram_handle, created_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&reg.id)
        .bind(&reg.wallet_address)
        .bind(&reg.email)
        .bind(&reg.twitter_handle)
        .bind(&reg.telegram_handle)
        .bind(ts(reg.created_at))
        .execute(&mut *tx)
        .await
        .map_err(db_err("register airdrop"))?;

        if inserted.rows_affected() == 0 {
            return Ok(None);
        }

        sqlx::query(
            "INSERT OR IGNORE INTO users (wallet_address, email, points, created_at) \
             VALUES (?, ?, 0, ?)",
        )
        .bind(&reg.wallet_address)
        .bind(&reg.email)
        .bind(ts(reg.created_at))
        .execute(&mut *tx)
        .await
        .map_err(db_err("create airdrop user"))?;

        tx.commit().await.map_err(db_err("commit"))?;
        Ok(Some(reg))
    }

    /// Newest first.
    pub async fn list_airdrop_registrations(
        &self,
    ) -> Result<Vec<AirdropRegistration>, SentinelError> {
        let rows: Vec<RegistrationRow> = sqlx::query_as(
            "SELECT id, wallet_address, email, twitter_handle, telegram_handle, created_at \
             FROM airdrop_registrations ORDER BY created_at DESC, rowid DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err("list airdrop registrations"))?;
        rows.into_iter()
            .map(RegistrationRow::into_registration)
            .collect()
    }

    pub async fn get_user(&self, wallet: &str) -> Result<Option<UserProfile>, SentinelError> {
        let row: Option<(String, Option<String>, i64, String)> = sqlx::query_as(
            "SELECT wallet_address, email, points, created_at FROM users WHERE wallet_address = ?",
        )
        .bind(wallet)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err("get user"))?;

        let Some((wallet_address, email, points, created_at)) = row else {
            return Ok(None);
        };

        let completed_tasks: Vec<(String,)> = sqlx::query_as(
            "SELECT task_id FROM user_tasks WHERE wallet_address = ? ORDER BY completed_at",
        )
        .bind(wallet)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err("list completed tasks"))?;

        Ok(Some(UserProfile {
            wallet_address,
            email,
            points,
            created_at: parse_ts(&created_at)?,
            completed_tasks: completed_tasks.into_iter().map(|(t,)| t).collect(),
        }))
    }

    /// Remove the user, their registration, and their completed tasks.
    pub async fn delete_user(&self, wallet: &str) -> Result<bool, SentinelError> {
        let mut tx = self.pool.begin().await.map_err(db_err("begin"))?;
        let mut removed = 0;
        for sql in [
            "DELETE FROM user_tasks WHERE wallet_address = ?",
            "DELETE FROM airdrop_registrations WHERE wallet_address = ?",
            "DELETE FROM users WHERE wallet_address = ?",
        ] {
            removed += sqlx::query(sql)
                .bind(wallet)
                .execute(&mut *tx)
                .await
                .map_err(db_err("delete user"))?
                .rows_affected();
        }
        tx.commit().await.map_err(db_err("commit"))?;
        Ok(removed > 0)
    }

    /// Award `points` for `task_id` at most once per wallet.
    pub async fn complete_task(
        &self,
        wallet: &str,
        task_id: &str,
        points: i64,
    ) -> Result<TaskCompletion, SentinelError> {
        let mut tx = self.pool.begin().await.map_err(db_err("begin"))?;

        let exists: Option<(i64,)> =
            sqlx::query_as("SELECT points FROM users WHERE wallet_address = ?")
                .bind(wallet)
                .fetch_optional(&mut *tx)
                .await
                .map_err(db_err("lookup user"))?;
        if exists.is_none() {
            return Ok(TaskCompletion::UserNotFound);
        }

        let inserted = sqlx::query(
            "INSERT OR IGNORE INTO user_tasks (wallet_address, task_id, points, completed_at) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(wallet)
        .bind(task_id)
        .bind(points)
        .bind(ts(Utc::now()))
        .execute(&mut *tx)
        .await
        .map_err(db_err("record task"))?;
        if inserted.rows_affected() == 0 {
            return Ok(TaskCompletion::AlreadyCompleted);
        }

        let (total_points,): (i64,) = sqlx::query_as(
            "UPDATE users SET points = points + ? WHERE wallet_address = ? RETURNING points",
        )
        .bind(points)
        .bind(wallet)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_err("award points"))?;

        tx.commit().await.map_err(db_err("commit"))?;
        Ok(TaskCompletion::Completed {
            points_awarded: points,
            total_points,
        })
    }
}
