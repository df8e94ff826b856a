//! Subscription expiry scanner.
//!
//! Warns owners before a paid period runs out and flags agents whose
//! subscription has lapsed. Warnings repeat at most once per 24 h; the
//! expired notice is sent once per lapse.

use chrono::{DateTime, Duration, Utc};
use sentinels_core::{
    config::ExpiryConfig,
    error::SentinelError,
    model::{DeploymentStatus, NewNotification, NotificationKind},
    traits::Datastore,
};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

pub const EXPIRING_TITLE: &str = "Subscription expiring soon";
pub const EXPIRED_TITLE: &str = "Subscription expired";

/// Counts from one scan.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScanReport {
    pub warnings: usize,
    pub expired: usize,
    pub skipped: usize,
}

/// Run one pass over subscriptions expiring within `warn_days`.
pub async fn scan_once(
    store: &dyn Datastore,
    warn_days: i64,
    now: DateTime<Utc>,
) -> Result<ScanReport, SentinelError> {
    let mut report = ScanReport::default();
    let candidates = store
        .subscriptions_expiring_before(now + Duration::days(warn_days))
        .await?;

    let mut seen_agents = HashSet::new();
    for sub in candidates {
        if !seen_agents.insert(sub.agent_id.clone()) {
            continue;
        }
        // A newer row (renewal or pending purchase) supersedes this one.
        match store.latest_subscription(&sub.agent_id).await? {
            Some(latest) if latest.id == sub.id => {}
            _ => {
                report.skipped += 1;
                continue;
            }
        }
        let Some(agent) = store.get_agent(&sub.agent_id).await? else {
            report.skipped += 1;
            continue;
        };
        if agent.status == DeploymentStatus::Inactive {
            report.skipped += 1;
            continue;
        }

        let expired = sub.expiry_date <= now;
        let (kind, title, message) = if expired {
            (
                NotificationKind::Error,
                EXPIRED_TITLE,
                format!(
                    "The subscription for {} expired on {}. Renew it to bring the agent back online.",
                    agent.project_name,
                    sub.expiry_date.format("%Y-%m-%d")
                ),
            )
        } else {
            let days_left = (sub.expiry_date - now).num_days();
            let when = match days_left {
                0 => "today".to_string(),
                1 => "in 1 day".to_string(),
                n => format!("in {n} days"),
            };
            (
                NotificationKind::Warning,
                EXPIRING_TITLE,
                format!(
                    "The subscription for {} expires {when} ({}). Renew to keep the agent answering.",
                    agent.project_name,
                    sub.expiry_date.format("%Y-%m-%d")
                ),
            )
        };

        let since = if expired {
            sub.expiry_date
        } else {
            now - Duration::hours(24)
        };
        if store
            .notification_exists_since(&agent.user_id, &agent.id, title, since)
            .await?
        {
            report.skipped += 1;
            continue;
        }

        store
            .create_notification(NewNotification {
                id: Uuid::new_v4().to_string(),
                user_id: agent.user_id.clone(),
                agent_id: Some(agent.id.clone()),
                kind,
                title: title.to_string(),
                message,
                read: false,
                created_at: now,
            })
            .await?;

        if expired {
            report.expired += 1;
        } else {
            report.warnings += 1;
        }
    }
    Ok(report)
}

/// Background task: scan every `poll_interval_secs`.
pub async fn expiry_loop(store: Arc<dyn Datastore>, config: ExpiryConfig) {
    let every = std::time::Duration::from_secs(config.poll_interval_secs.max(60));
    loop {
        match scan_once(store.as_ref(), config.warn_days, Utc::now()).await {
            Ok(r) if r.warnings + r.expired > 0 => info!(
                "expiry: {} warnings, {} expired notices ({} skipped)",
                r.warnings, r.expired, r.skipped
            ),
            Ok(_) => {}
            Err(e) => error!("expiry scan failed: {e}"),
        }
        tokio::time::sleep(every).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentinels_core::model::{NewAgent, NewSubscription, PaymentStatus, Personality};
    use sentinels_store::SqliteStore;

    async fn seed(store: &SqliteStore, agent_id: &str, status: PaymentStatus, expiry: Duration) {
        let now = Utc::now();
        if store.get_agent(agent_id).await.unwrap().is_none() {
            store
                .create_agent(NewAgent {
                    id: agent_id.into(),
                    user_id: "owner".into(),
                    project_name: format!("Project {agent_id}"),
                    bot_token: "t".into(),
                    bot_username: None,
                    personality: Personality::Professional,
                    custom_personality: None,
                    temperature: None,
                    knowledge_base: None,
                    custom_faqs: None,
                    trigger_keywords: vec![],
                    status: DeploymentStatus::Deployed,
                    created_at: now,
                })
                .await
                .unwrap();
        }
        store
            .create_subscription(NewSubscription {
                id: Uuid::new_v4().to_string(),
                agent_id: agent_id.into(),
                tier: "monthly".into(),
                cost: 25.0,
                payment_status: status,
                transaction_hash: None,
                expiry_date: now + expiry,
                auto_renew: false,
                created_at: now,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_scan_warns_and_flags_expired() {
        let store = SqliteStore::in_memory().await.unwrap();
        seed(&store, "soon", PaymentStatus::Confirmed, Duration::days(2)).await;
        seed(&store, "gone", PaymentStatus::Confirmed, -Duration::days(1)).await;
        seed(&store, "fine", PaymentStatus::Confirmed, Duration::days(20)).await;

        let report = scan_once(&store, 3, Utc::now()).await.unwrap();
        assert_eq!(report.warnings, 1);
        assert_eq!(report.expired, 1);

        let notes = store.list_notifications("owner").await.unwrap();
        assert_eq!(notes.len(), 2);
        assert!(notes
            .iter()
            .any(|n| n.kind == NotificationKind::Error && n.title == EXPIRED_TITLE));
        assert!(notes
            .iter()
            .any(|n| n.kind == NotificationKind::Warning && n.message.contains("Project soon")));
    }

    #[tokio::test]
    async fn test_scan_is_deduplicated_within_a_day() {
        let store = SqliteStore::in_memory().await.unwrap();
        seed(&store, "soon", PaymentStatus::Confirmed, Duration::days(1)).await;

        let now = Utc::now();
        scan_once(&store, 3, now).await.unwrap();
        let second = scan_once(&store, 3, now + Duration::hours(1)).await.unwrap();
        assert_eq!(second.warnings, 0);
        assert_eq!(store.list_notifications("owner").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_expired_notice_is_sent_once_per_lapse() {
        let store = SqliteStore::in_memory().await.unwrap();
        seed(&store, "gone", PaymentStatus::Confirmed, -Duration::days(1)).await;

        let now = Utc::now();
        let first = scan_once(&store, 3, now).await.unwrap();
        assert_eq!(first.expired, 1);
        for later in [Duration::days(1), Duration::days(2), Duration::days(30)] {
            let report = scan_once(&store, 3, now + later).await.unwrap();
            assert_eq!(report.expired, 0);
            assert_eq!(report.skipped, 1);
        }
        assert_eq!(store.list_notifications("owner").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_renewed_agent_is_not_warned() {
        let store = SqliteStore::in_memory().await.unwrap();
        seed(&store, "renewed", PaymentStatus::Confirmed, Duration::days(1)).await;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        seed(&store, "renewed", PaymentStatus::Confirmed, Duration::days(31)).await;

        let report = scan_once(&store, 3, Utc::now()).await.unwrap();
        assert_eq!(report.warnings, 0);
        assert_eq!(report.skipped, 1);
    }
}
