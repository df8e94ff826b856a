//! Domain rows shared by the datastore, the gateway, and the HTTP API.
//!
//! Rows serialize with snake_case field names, matching the table columns.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::text::truncate_chars;

/// Max characters of the user's text kept in a message log row.
pub const USER_MESSAGE_MAX_CHARS: usize = 1000;
/// Max characters of the bot's text kept in a message log row.
pub const BOT_RESPONSE_MAX_CHARS: usize = 2000;

// ---------------------------------------------------------------------------
// Agents
// ---------------------------------------------------------------------------

/// Personality preset selected at agent creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Personality {
    Professional,
    Friendly,
    Technical,
    Enthusiastic,
    /// Free text in [`Agent::custom_personality`].
    Custom,
}

impl Personality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Professional => "professional",
            Self::Friendly => "friendly",
            Self::Technical => "technical",
            Self::Enthusiastic => "enthusiastic",
            Self::Custom => "custom",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "professional" => Some(Self::Professional),
            "friendly" => Some(Self::Friendly),
            "technical" => Some(Self::Technical),
            "enthusiastic" => Some(Self::Enthusiastic),
            "custom" => Some(Self::Custom),
            _ => None,
        }
    }
}

/// Deployment lifecycle of an agent's Telegram bot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentStatus {
    Pending,
    Active,
    Deployed,
    Inactive,
}

impl DeploymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Deployed => "deployed",
            Self::Inactive => "inactive",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "active" => Some(Self::Active),
            "deployed" => Some(Self::Deployed),
            "inactive" => Some(Self::Inactive),
            _ => None,
        }
    }
}

/// A user-created Telegram agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    pub user_id: String,
    pub project_name: String,
    #[serde(default, skip_serializing)]
    pub bot_token: String,
    #[serde(default)]
    pub bot_username: Option<String>,
    pub personality: Personality,
    #[serde(default)]
    pub custom_personality: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    /// Serialized [`KnowledgeBase`] JSON.
    #[serde(default, deserialize_with = "json_as_text")]
    pub knowledge_base: Option<String>,
    #[serde(default)]
    pub custom_faqs: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub trigger_keywords: Vec<String>,
    pub status: DeploymentStatus,
    #[serde(default)]
    pub message_count: i64,
    #[serde(default)]
    pub last_interaction: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for a new agent.
#[derive(Debug, Clone, Serialize)]
pub struct NewAgent {
    pub id: String,
    pub user_id: String,
    pub project_name: String,
    pub bot_token: String,
    pub bot_username: Option<String>,
    pub personality: Personality,
    pub custom_personality: Option<String>,
    pub temperature: Option<f32>,
    pub knowledge_base: Option<String>,
    pub custom_faqs: Option<String>,
    pub trigger_keywords: Vec<String>,
    pub status: DeploymentStatus,
    pub created_at: DateTime<Utc>,
}

impl NewAgent {
    /// Materialize the row the store will hold right after insert.
    pub fn into_agent(self) -> Agent {
        Agent {
            id: self.id,
            user_id: self.user_id,
            project_name: self.project_name,
            bot_token: self.bot_token,
            bot_username: self.bot_username,
            personality: self.personality,
            custom_personality: self.custom_personality,
            temperature: self.temperature,
            knowledge_base: self.knowledge_base,
            custom_faqs: self.custom_faqs,
            trigger_keywords: self.trigger_keywords,
            status: self.status,
            message_count: 0,
            last_interaction: None,
            created_at: self.created_at,
        }
    }
}

/// Bot identity returned by Telegram `getMe`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotInfo {
    pub id: i64,
    pub first_name: String,
    #[serde(default)]
    pub username: Option<String>,
}

// ---------------------------------------------------------------------------
// Subscriptions
// ---------------------------------------------------------------------------

/// Purchasable subscription length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionTier {
    Monthly,
    Quarterly,
    Yearly,
}

impl SubscriptionTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Monthly => "monthly",
            Self::Quarterly => "quarterly",
            Self::Yearly => "yearly",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "monthly" => Some(Self::Monthly),
            "quarterly" => Some(Self::Quarterly),
            "yearly" => Some(Self::Yearly),
            _ => None,
        }
    }

    pub fn duration(&self) -> Duration {
        match self {
            Self::Monthly => Duration::days(30),
            Self::Quarterly => Duration::days(90),
            Self::Yearly => Duration::days(365),
        }
    }
}

/// Payment state of a subscription row. Only `Confirmed` counts as paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Confirmed,
    Failed,
    #[serde(other)]
    Unknown,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Failed => "failed",
            Self::Unknown => "unknown",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "pending" => Self::Pending,
            "confirmed" => Self::Confirmed,
            "failed" => Self::Failed,
            _ => Self::Unknown,
        }
    }
}

/// One purchase of agent time. Several rows may exist per agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub id: String,
    pub agent_id: String,
    pub tier: String,
    #[serde(default)]
    pub cost: f64,
    pub payment_status: PaymentStatus,
    #[serde(default)]
    pub transaction_hash: Option<String>,
    pub expiry_date: DateTime<Utc>,
    #[serde(default)]
    pub auto_renew: bool,
    pub created_at: DateTime<Utc>,
}

impl Subscription {
    /// Paid and not yet expired.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.payment_status == PaymentStatus::Confirmed && self.expiry_date > now
    }
}

/// Insert payload for a subscription row.
#[derive(Debug, Clone, Serialize)]
pub struct NewSubscription {
    pub id: String,
    pub agent_id: String,
    pub tier: String,
    pub cost: f64,
    pub payment_status: PaymentStatus,
    pub transaction_hash: Option<String>,
    pub expiry_date: DateTime<Utc>,
    pub auto_renew: bool,
    pub created_at: DateTime<Utc>,
}

impl NewSubscription {
    pub fn into_subscription(self) -> Subscription {
        Subscription {
            id: self.id,
            agent_id: self.agent_id,
            tier: self.tier,
            cost: self.cost,
            payment_status: self.payment_status,
            transaction_hash: self.transaction_hash,
            expiry_date: self.expiry_date,
            auto_renew: self.auto_renew,
            created_at: self.created_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Analytics
// ---------------------------------------------------------------------------

/// Append-only record of one answered message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageLogEntry {
    /// `None` for the community bot.
    #[serde(default)]
    pub agent_id: Option<String>,
    pub telegram_user_id: i64,
    pub user_message: String,
    pub bot_response: String,
    pub response_time_ms: i64,
    pub created_at: DateTime<Utc>,
}

impl MessageLogEntry {
    /// Build an entry, truncating both texts to their column limits.
    pub fn new(
        agent_id: Option<String>,
        telegram_user_id: i64,
        user_message: &str,
        bot_response: &str,
        response_time_ms: i64,
    ) -> Self {
        Self {
            agent_id,
            telegram_user_id,
            user_message: truncate_chars(user_message, USER_MESSAGE_MAX_CHARS).to_string(),
            bot_response: truncate_chars(bot_response, BOT_RESPONSE_MAX_CHARS).to_string(),
            response_time_ms,
            created_at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Info,
    Warning,
    Error,
    Success,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Success => "success",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "info" => Some(Self::Info),
            "warning" => Some(Self::Warning),
            "error" => Some(Self::Error),
            "success" => Some(Self::Success),
            _ => None,
        }
    }
}

/// A message surfaced in the owner's notification panel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for a notification.
#[derive(Debug, Clone, Serialize)]
pub struct NewNotification {
    pub id: String,
    pub user_id: String,
    pub agent_id: Option<String>,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl NewNotification {
    pub fn into_notification(self) -> Notification {
        Notification {
            id: self.id,
            user_id: self.user_id,
            agent_id: self.agent_id,
            kind: self.kind,
            title: self.title,
            message: self.message,
            read: self.read,
            created_at: self.created_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Knowledge base
// ---------------------------------------------------------------------------

/// Project facts fed into an agent's system prompt.
///
/// Enforced when an agent is created so malformed scrape output never
/// reaches a prompt unchecked. `null` reads as an empty field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeBase {
    #[serde(deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(deserialize_with = "null_as_default")]
    pub features: Vec<String>,
    pub tokenomics: Option<Value>,
    #[serde(deserialize_with = "null_as_default")]
    pub roadmap: Vec<Value>,
    /// Links given as `null` are dropped.
    #[serde(alias = "socialLinks", deserialize_with = "links_without_nulls")]
    pub social_links: BTreeMap<String, String>,
    #[serde(deserialize_with = "null_as_default")]
    pub faqs: Vec<Faq>,
    /// Unstructured text kept when extraction failed.
    #[serde(alias = "rawContent", skip_serializing_if = "Option::is_none")]
    pub raw_content: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Faq {
    #[serde(deserialize_with = "null_as_default")]
    pub question: String,
    #[serde(deserialize_with = "null_as_default")]
    pub answer: String,
}

impl KnowledgeBase {
    /// Validate arbitrary JSON against the schema.
    pub fn from_value(value: Value) -> Result<Self, String> {
        if !value.is_object() {
            return Err("knowledge base must be a JSON object".to_string());
        }
        serde_json::from_value(value).map_err(|e| format!("invalid knowledge base: {e}"))
    }

    pub fn is_empty(&self) -> bool {
        self.description.is_empty()
            && self.features.is_empty()
            && self.tokenomics.is_none()
            && self.roadmap.is_empty()
            && self.social_links.is_empty()
            && self.faqs.is_empty()
            && self.raw_content.is_none()
    }

    /// Render as plain text for a system prompt.
    pub fn render(&self) -> String {
        let mut out = String::new();
        if !self.description.is_empty() {
            out.push_str(&format!("Description: {}\n", self.description));
        }
        if !self.features.is_empty() {
            out.push_str("Features:\n");
            for f in &self.features {
                out.push_str(&format!("- {f}\n"));
            }
        }
        if let Some(ref t) = self.tokenomics {
            out.push_str(&format!("Tokenomics: {}\n", render_value(t)));
        }
        if !self.roadmap.is_empty() {
            out.push_str("Roadmap:\n");
            for item in &self.roadmap {
                out.push_str(&format!("- {}\n", render_value(item)));
            }
        }
        if !self.social_links.is_empty() {
            out.push_str("Links:\n");
            for (name, url) in &self.social_links {
                out.push_str(&format!("- {name}: {url}\n"));
            }
        }
        if !self.faqs.is_empty() {
            out.push_str("FAQ:\n");
            for faq in &self.faqs {
                out.push_str(&format!("Q: {}\nA: {}\n", faq.question, faq.answer));
            }
        }
        if let Some(ref raw) = self.raw_content {
            out.push_str(raw);
            out.push('\n');
        }
        out.trim_end().to_string()
    }
}

fn render_value(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Airdrop
// ---------------------------------------------------------------------------

/// A wallet signed up for the airdrop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AirdropRegistration {
    pub id: String,
    /// Always lowercase.
    pub wallet_address: String,
    pub email: String,
    #[serde(default)]
    pub twitter_handle: Option<String>,
    #[serde(default)]
    pub telegram_handle: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Airdrop participant with accumulated points.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub wallet_address: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub points: i64,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_tasks: Vec<String>,
}

/// Outcome of a task-completion attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskCompletion {
    Completed { points_awarded: i64, total_points: i64 },
    AlreadyCompleted,
    UserNotFound,
}

/// A social task that awards airdrop points once per wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AirdropTask {
    pub id: &'static str,
    pub points: i64,
}

pub const AIRDROP_TASKS: &[AirdropTask] = &[
    AirdropTask {
        id: "follow_twitter",
        points: 100,
    },
    AirdropTask {
        id: "join_telegram",
        points: 100,
    },
    AirdropTask {
        id: "join_discord",
        points: 100,
    },
    AirdropTask {
        id: "retweet_announcement",
        points: 50,
    },
    AirdropTask {
        id: "visit_website",
        points: 25,
    },
];

pub fn find_task(id: &str) -> Option<&'static AirdropTask> {
    AIRDROP_TASKS.iter().find(|t| t.id == id)
}

// ---------------------------------------------------------------------------
// serde helpers
// ---------------------------------------------------------------------------

/// Accept a JSON column stored either as text or as a native JSON value.
fn json_as_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn links_without_nulls<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let links = Option::<BTreeMap<String, Option<String>>>::deserialize(deserializer)?;
    Ok(links
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(name, url)| url.map(|url| (name, url)))
        .collect())
}
