use crate::{
    context::{Completion, Context},
    error::SentinelError,
    model::{
        Agent, AirdropRegistration, BotInfo, DeploymentStatus, MessageLogEntry, NewAgent,
        NewNotification, NewSubscription, Notification, Subscription, TaskCompletion, UserProfile,
    },
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// AI Provider trait: turns a prompt context into text.
///
/// Every LLM backend (Gemini, OpenAI-compatible) implements this trait.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Human-readable provider name.
    fn name(&self) -> &str;

    /// Send a conversation context to the provider and get a response.
    async fn complete(&self, context: &Context) -> Result<Completion, SentinelError>;

    /// Check if the provider is configured and reachable.
    async fn is_available(&self) -> bool;
}

/// Outbound side of the Telegram Bot API.
///
/// Every call names the bot token explicitly: each agent is its own bot.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// `sendMessage`, optionally threaded as a reply.
    async fn send_message(
        &self,
        bot_token: &str,
        chat_id: i64,
        text: &str,
        reply_to: Option<i64>,
    ) -> Result<(), SentinelError>;

    /// `getMe`: validates a token and returns the bot identity.
    async fn get_me(&self, bot_token: &str) -> Result<BotInfo, SentinelError>;

    /// `setWebhook`: route the bot's updates to `url`.
    async fn set_webhook(&self, bot_token: &str, url: &str) -> Result<(), SentinelError>;
}

/// Hosted relational store holding agents, subscriptions, analytics,
/// notifications, and airdrop data.
///
/// Every read is a fresh query; implementations keep no cache.
#[async_trait]
pub trait Datastore: Send + Sync {
    /// Backend name for logs and `/api/health`.
    fn name(&self) -> &str;

    // --- agents ---

    async fn get_agent(&self, id: &str) -> Result<Option<Agent>, SentinelError>;

    async fn list_agents(&self, user_id: &str) -> Result<Vec<Agent>, SentinelError>;

    async fn create_agent(&self, agent: NewAgent) -> Result<Agent, SentinelError>;

    /// Returns `false` when the agent does not exist.
    async fn set_agent_status(
        &self,
        id: &str,
        status: DeploymentStatus,
        bot_username: Option<&str>,
    ) -> Result<bool, SentinelError>;

    /// Increment the message count and stamp the last interaction.
    async fn record_agent_interaction(
        &self,
        id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), SentinelError>;

    // --- subscriptions ---

    /// The most recently *created* subscription row for an agent.
    async fn latest_subscription(
        &self,
        agent_id: &str,
    ) -> Result<Option<Subscription>, SentinelError>;

    async fn create_subscription(
        &self,
        sub: NewSubscription,
    ) -> Result<Subscription, SentinelError>;

    /// Confirmed rows with `expiry_date <= cutoff`, newest first.
    async fn subscriptions_expiring_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Subscription>, SentinelError>;

    // --- analytics ---

    async fn log_message(&self, entry: &MessageLogEntry) -> Result<(), SentinelError>;

    /// Newest first.
    async fn recent_messages(
        &self,
        agent_id: &str,
        limit: u32,
    ) -> Result<Vec<MessageLogEntry>, SentinelError>;

    // --- notifications ---

    async fn create_notification(
        &self,
        notification: NewNotification,
    ) -> Result<Notification, SentinelError>;

    /// Newest first.
    async fn list_notifications(&self, user_id: &str)
        -> Result<Vec<Notification>, SentinelError>;

    /// Returns `false` when no notification with that id belongs to the user.
    async fn mark_notification_read(&self, id: &str, user_id: &str)
        -> Result<bool, SentinelError>;

    /// Returns `false` when no notification with that id belongs to the user.
    async fn delete_notification(&self, id: &str, user_id: &str) -> Result<bool, SentinelError>;

    async fn notification_exists_since(
        &self,
        user_id: &str,
        agent_id: &str,
        title: &str,
        since: DateTime<Utc>,
    ) -> Result<bool, SentinelError>;

    // --- airdrop ---

    /// Insert a registration and its user row. `None` = wallet already registered.
    async fn register_airdrop(
        &self,
        registration: AirdropRegistration,
    ) -> Result<Option<AirdropRegistration>, SentinelError>;

    /// Newest first.
    async fn list_airdrop_registrations(&self)
        -> Result<Vec<AirdropRegistration>, SentinelError>;

    async fn get_user(&self, wallet: &str) -> Result<Option<UserProfile>, SentinelError>;

    /// Remove the user, their registration, and completed tasks.
    async fn delete_user(&self, wallet: &str) -> Result<bool, SentinelError>;

    /// Award `points` for `task_id` exactly once per wallet.
    async fn complete_task(
        &self,
        wallet: &str,
        task_id: &str,
        points: i64,
    ) -> Result<TaskCompletion, SentinelError>;
}
