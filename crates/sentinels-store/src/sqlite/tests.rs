use super::SqliteStore;
use chrono::{Duration, Utc};
use sentinels_core::model::{
    AirdropRegistration, DeploymentStatus, MessageLogEntry, NewAgent, NewNotification,
    NewSubscription, NotificationKind, PaymentStatus, Personality, TaskCompletion,
};
use sentinels_core::traits::Datastore;

async fn test_store() -> SqliteStore {
    SqliteStore::in_memory().await.unwrap()
}

fn new_agent(id: &str, user_id: &str) -> NewAgent {
    NewAgent {
        id: id.into(),
        user_id: user_id.into(),
        project_name: "Sentinel".into(),
        bot_token: "123:abc".into(),
        bot_username: None,
        personality: Personality::Friendly,
        custom_personality: None,
        temperature: Some(0.5),
        knowledge_base: Some(r#"{"description":"AI agents"}"#.into()),
        custom_faqs: None,
        trigger_keywords: vec!["sentinel".into()],
        status: DeploymentStatus::Pending,
        created_at: Utc::now(),
    }
}

fn new_sub(agent_id: &str, status: PaymentStatus, expiry_days: i64) -> NewSubscription {
    let now = Utc::now();
    NewSubscription {
        id: uuid::Uuid::new_v4().to_string(),
        agent_id: agent_id.into(),
        tier: "monthly".into(),
        cost: 10.0,
        payment_status: status,
        transaction_hash: None,
        expiry_date: now + Duration::days(expiry_days),
        auto_renew: false,
        created_at: now,
    }
}

fn registration(wallet: &str) -> AirdropRegistration {
    AirdropRegistration {
        id: uuid::Uuid::new_v4().to_string(),
        wallet_address: wallet.into(),
        email: "a@b.io".into(),
        twitter_handle: Some("@a".into()),
        telegram_handle: None,
        created_at: Utc::now(),
    }
}

#[tokio::test]
async fn test_migrations_are_idempotent() {
    let store = test_store().await;
    SqliteStore::run_migrations(&store.pool).await.unwrap();
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM _migrations")
        .fetch_one(&store.pool)
        .await
        .unwrap();
    assert_eq!(count, 4);
}

#[tokio::test]
async fn test_agent_roundtrip_and_status() {
    let store = test_store().await;
    store.create_agent(new_agent("a1", "u1")).await.unwrap();

    let agent = store.get_agent("a1").await.unwrap().unwrap();
    assert_eq!(agent.bot_token, "123:abc");
    assert_eq!(agent.personality, Personality::Friendly);
    assert_eq!(agent.trigger_keywords, vec!["sentinel".to_string()]);
    assert_eq!(agent.status, DeploymentStatus::Pending);
    assert!((agent.temperature.unwrap() - 0.5).abs() < 1e-6);

    assert!(store
        .set_agent_status("a1", DeploymentStatus::Deployed, Some("sentinel_bot"))
        .await
        .unwrap());
    let agent = store.get_agent("a1").await.unwrap().unwrap();
    assert_eq!(agent.status, DeploymentStatus::Deployed);
    assert_eq!(agent.bot_username.as_deref(), Some("sentinel_bot"));

    assert!(!store
        .set_agent_status("missing", DeploymentStatus::Inactive, None)
        .await
        .unwrap());
    assert!(store.get_agent("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn test_list_agents_per_user() {
    let store = test_store().await;
    store.create_agent(new_agent("a1", "u1")).await.unwrap();
    store.create_agent(new_agent("a2", "u1")).await.unwrap();
    store.create_agent(new_agent("a3", "u2")).await.unwrap();

    let agents = store.list_agents("u1").await.unwrap();
    assert_eq!(agents.len(), 2);
    assert!(agents.iter().all(|a| a.user_id == "u1"));
}

#[tokio::test]
async fn test_record_interaction_increments() {
    let store = test_store().await;
    store.create_agent(new_agent("a1", "u1")).await.unwrap();
    let now = Utc::now();
    store.record_agent_interaction("a1", now).await.unwrap();
    store.record_agent_interaction("a1", now).await.unwrap();

    let agent = store.get_agent("a1").await.unwrap().unwrap();
    assert_eq!(agent.message_count, 2);
    assert!(agent.last_interaction.is_some());
}

#[tokio::test]
async fn test_latest_subscription_is_latest_created() {
    let store = test_store().await;
    store
        .create_subscription(new_sub("a1", PaymentStatus::Confirmed, 30))
        .await
        .unwrap();
    // A later pending row shadows the older paid one.
    store
        .create_subscription(new_sub("a1", PaymentStatus::Pending, 60))
        .await
        .unwrap();

    let latest = store.latest_subscription("a1").await.unwrap().unwrap();
    assert_eq!(latest.payment_status, PaymentStatus::Pending);
    assert!(store.latest_subscription("a2").await.unwrap().is_none());
}

#[tokio::test]
async fn test_subscriptions_expiring_before_only_confirmed() {
    let store = test_store().await;
    store
        .create_subscription(new_sub("a1", PaymentStatus::Confirmed, 2))
        .await
        .unwrap();
    store
        .create_subscription(new_sub("a2", PaymentStatus::Pending, 2))
        .await
        .unwrap();
    store
        .create_subscription(new_sub("a3", PaymentStatus::Confirmed, 40))
        .await
        .unwrap();

    let expiring = store
        .subscriptions_expiring_before(Utc::now() + Duration::days(3))
        .await
        .unwrap();
    assert_eq!(expiring.len(), 1);
    assert_eq!(expiring[0].agent_id, "a1");
}

#[tokio::test]
async fn test_message_log_newest_first() {
    let store = test_store().await;
    for i in 0..3 {
        let mut entry =
            MessageLogEntry::new(Some("a1".into()), 7, &format!("q{i}"), "answer", 100);
        entry.created_at = Utc::now() + Duration::seconds(i);
        store.log_message(&entry).await.unwrap();
    }
    store
        .log_message(&MessageLogEntry::new(None, 8, "community", "hi", 5))
        .await
        .unwrap();

    let recent = store.recent_messages("a1", 2).await.unwrap();
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].user_message, "q2");
    assert_eq!(recent[1].user_message, "q1");
}

#[tokio::test]
async fn test_notifications_scoped_to_user() {
    let store = test_store().await;
    let n = store
        .create_notification(NewNotification {
            id: "n1".into(),
            user_id: "u1".into(),
            agent_id: Some("a1".into()),
            kind: NotificationKind::Warning,
            title: "Subscription expiring soon".into(),
            message: "3 days left".into(),
            read: false,
            created_at: Utc::now(),
        })
        .await
        .unwrap();
    assert_eq!(n.kind, NotificationKind::Warning);

    assert!(!store.mark_notification_read("n1", "u2").await.unwrap());
    assert!(store.mark_notification_read("n1", "u1").await.unwrap());
    let list = store.list_notifications("u1").await.unwrap();
    assert_eq!(list.len(), 1);
    assert!(list[0].read);

    let since = Utc::now() - Duration::hours(24);
    assert!(store
        .notification_exists_since("u1", "a1", "Subscription expiring soon", since)
        .await
        .unwrap());
    assert!(!store
        .notification_exists_since("u1", "a1", "Subscription expired", since)
        .await
        .unwrap());

    assert!(!store.delete_notification("n1", "u2").await.unwrap());
    assert!(store.delete_notification("n1", "u1").await.unwrap());
    assert!(store.list_notifications("u1").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_register_airdrop_rejects_duplicate() {
    let store = test_store().await;
    let wallet = "0x52908400098527886e0f7030069857d2e4169ee7";
    assert!(store.register_airdrop(registration(wallet)).await.unwrap().is_some());
    assert!(store.register_airdrop(registration(wallet)).await.unwrap().is_none());

    let user = store.get_user(wallet).await.unwrap().unwrap();
    assert_eq!(user.points, 0);
    assert_eq!(user.email.as_deref(), Some("a@b.io"));
    assert_eq!(store.list_airdrop_registrations().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_complete_task_awards_once() {
    let store = test_store().await;
    let wallet = "0x52908400098527886e0f7030069857d2e4169ee7";
    store.register_airdrop(registration(wallet)).await.unwrap();

    let first = store.complete_task(wallet, "join_telegram", 100).await.unwrap();
    assert_eq!(
        first,
        TaskCompletion::Completed {
            points_awarded: 100,
            total_points: 100
        }
    );
    let second = store.complete_task(wallet, "join_telegram", 100).await.unwrap();
    assert_eq!(second, TaskCompletion::AlreadyCompleted);

    let user = store.get_user(wallet).await.unwrap().unwrap();
    assert_eq!(user.points, 100);
    assert_eq!(user.completed_tasks, vec!["join_telegram".to_string()]);

    let missing = store.complete_task("0xdead", "join_telegram", 100).await.unwrap();
    assert_eq!(missing, TaskCompletion::UserNotFound);
}

#[tokio::test]
async fn test_delete_user_removes_everything() {
    let store = test_store().await;
    let wallet = "0x52908400098527886e0f7030069857d2e4169ee7";
    store.register_airdrop(registration(wallet)).await.unwrap();
    store.complete_task(wallet, "visit_website", 25).await.unwrap();

    assert!(store.delete_user(wallet).await.unwrap());
    assert!(store.get_user(wallet).await.unwrap().is_none());
    assert!(store.list_airdrop_registrations().await.unwrap().is_empty());
    assert!(!store.delete_user(wallet).await.unwrap());
    // Registering again starts from zero.
    assert!(store.register_airdrop(registration(wallet)).await.unwrap().is_some());
    assert_eq!(store.get_user(wallet).await.unwrap().unwrap().points, 0);
}

#[tokio::test]
async fn test_trait_object_dispatch() {
    let store: std::sync::Arc<dyn Datastore> = std::sync::Arc::new(test_store().await);
    assert_eq!(store.name(), "sqlite");
    assert!(store.get_agent("nope").await.unwrap().is_none());
}
