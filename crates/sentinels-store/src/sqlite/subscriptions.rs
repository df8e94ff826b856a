//! Subscription rows and expiry lookups.

use super::{db_err, parse_ts, ts, SqliteStore};
use chrono::{DateTime, Utc};
use sentinels_core::{
    error::SentinelError,
    model::{NewSubscription, PaymentStatus, Subscription},
};

const SUBSCRIPTION_COLUMNS: &str = "id, agent_id, tier, cost, payment_status, transaction_hash, \
     expiry_date, auto_renew, created_at";

#[derive(sqlx::FromRow)]
struct SubscriptionRow {
    id: String,
    agent_id: String,
    tier: String,
    cost: f64,
    payment_status: String,
    transaction_hash: Option<String>,
    expiry_date: String,
    auto_renew: bool,
    created_at: String,
}

impl SubscriptionRow {
    fn into_subscription(self) -> Result<Subscription, SentinelError> {
        Ok(Subscription {
            payment_status: PaymentStatus::parse(&self.payment_status),
            expiry_date: parse_ts(&self.expiry_date)?,
            created_at: parse_ts(&self.created_at)?,
            id: self.id,
            agent_id: self.agent_id,
            tier: self.tier,
            cost: self.cost,
            transaction_hash: self.transaction_hash,
            auto_renew: self.auto_renew,
        })
    }
}

impl SqliteStore {
    /// The most recently created row, whatever its status or expiry.
    pub async fn latest_subscription(
        &self,
        agent_id: &str,
    ) -> Result<Option<Subscription>, SentinelError> {
        let row: Option<SubscriptionRow> = sqlx::query_as(&format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE agent_id = ? \
             ORDER BY created_at DESC, rowid DESC LIMIT 1"
        ))
        .bind(agent_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err("latest subscription"))?;
        row.map(SubscriptionRow::into_subscription).transpose()
    }

    pub async fn create_subscription(
        &self,
        sub: NewSubscription,
    ) -> Result<Subscription, SentinelError> {
        sqlx::query(
            "INSERT INTO subscriptions (id, agent_id, tier, cost, payment_status, \
             transaction_hash, expiry_date, auto_renew, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&sub.id)
        .bind(&sub.agent_id)
        .bind(&sub.tier)
        .bind(sub.cost)
        .bind(sub.payment_status.as_str())
        .bind(&sub.transaction_hash)
        .bind(ts(sub.expiry_date))
        .bind(sub.auto_renew)
        .bind(ts(sub.created_at))
        .execute(&self.pool)
        .await
        .map_err(db_err("create subscription"))?;
        Ok(sub.into_subscription())
    }

    /// Confirmed rows expiring at or before `cutoff`, newest first.
    pub async fn subscriptions_expiring_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Subscription>, SentinelError> {
        let rows: Vec<SubscriptionRow> = sqlx::query_as(&format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions \
             WHERE payment_status = 'confirmed' AND expiry_date <= ? \
             ORDER BY created_at DESC, rowid DESC"
        ))
        .bind(ts(cutoff))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err("expiring subscriptions"))?;
        rows.into_iter()
            .map(SubscriptionRow::into_subscription)
            .collect()
    }
}
