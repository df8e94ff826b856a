//! Per-update processing for agent bots and the community bot.

use super::gate::{self, GateDecision};
use super::prompt::{self, APOLOGY, MAX_OUTPUT_TOKENS};
use super::Gateway;
use chrono::Utc;
use sentinels_channels::telegram::types::{TgMessage, TgUpdate};
use sentinels_core::{
    context::{Context, ContextEntry},
    model::{Agent, DeploymentStatus, MessageLogEntry},
    text::preview,
};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// The parts of an update the pipeline acts on.
#[derive(Debug, Clone)]
pub(crate) struct Inbound {
    pub chat_id: i64,
    pub is_group: bool,
    pub user_id: i64,
    pub user_name: String,
    pub message_id: i64,
    pub text: String,
    pub replies_to_bot: bool,
}

impl Inbound {
    /// `None` for updates without a text message.
    pub(crate) fn from_update(update: &TgUpdate) -> Option<Self> {
        let msg: &TgMessage = update.message.as_ref()?;
        let text = msg.text.as_deref()?.trim();
        if text.is_empty() {
            return None;
        }
        let (user_id, user_name) = match msg.from {
            Some(ref u) => (
                u.id,
                u.username.clone().unwrap_or_else(|| u.first_name.clone()),
            ),
            None => (msg.chat.id, String::new()),
        };
        Some(Self {
            chat_id: msg.chat.id,
            is_group: msg.chat.is_group(),
            user_id,
            user_name,
            message_id: msg.message_id,
            text: text.to_string(),
            replies_to_bot: msg.replies_to_bot(),
        })
    }

    /// The bot command (`/start`, `/reset@SomeBot` → `/reset`), if any.
    pub(crate) fn command(&self) -> Option<&str> {
        let first = self.text.split_whitespace().next()?;
        if !first.starts_with('/') {
            return None;
        }
        Some(first.split('@').next().unwrap_or(first))
    }
}

/// In groups, keyword-gated agents answer only when addressed.
pub(crate) fn should_answer(agent: &Agent, inbound: &Inbound) -> bool {
    if !inbound.is_group || agent.trigger_keywords.is_empty() || inbound.replies_to_bot {
        return true;
    }
    let text = inbound.text.to_lowercase();
    agent
        .trigger_keywords
        .iter()
        .map(|k| k.trim().to_lowercase())
        .any(|k| !k.is_empty() && text.contains(&k))
}

impl Gateway {
    /// Process one update. Never fails: every error is logged here.
    pub async fn handle_update(&self, agent_id: Option<&str>, update: TgUpdate) {
        let Some(inbound) = Inbound::from_update(&update) else {
            debug!("update {} has no text message, ignoring", update.update_id);
            return;
        };

        info!(
            "[{}] {} says: {}",
            agent_id.unwrap_or("community"),
            if inbound.user_name.is_empty() {
                "unknown"
            } else {
                &inbound.user_name
            },
            preview(&inbound.text, 60)
        );

        match agent_id {
            Some(id) => self.handle_agent_message(id, &inbound).await,
            None => self.handle_community_message(&inbound).await,
        }
    }

    async fn handle_agent_message(&self, agent_id: &str, inbound: &Inbound) {
        let started = Instant::now();

        // --- 1. LOAD AGENT ---
        let agent = match self.store.get_agent(agent_id).await {
            Ok(Some(agent)) => agent,
            Ok(None) => {
                warn!("webhook for unknown agent {agent_id}");
                return;
            }
            Err(e) => {
                error!("failed to load agent {agent_id}: {e}");
                return;
            }
        };
        if agent.status == DeploymentStatus::Inactive {
            debug!("agent {agent_id} is inactive, ignoring message");
            return;
        }
        if !should_answer(&agent, inbound) {
            return;
        }

        // --- 2. SUBSCRIPTION GATE ---
        let latest = match self.store.latest_subscription(agent_id).await {
            Ok(latest) => latest,
            Err(e) => {
                error!("failed to read subscription for agent {agent_id}: {e}");
                return;
            }
        };
        if let GateDecision::Deny(reason) = gate::evaluate(latest.as_ref(), Utc::now()) {
            info!("agent {agent_id} denied: {reason:?}");
            self.send(&agent.bot_token, inbound, &reason.message()).await;
            return;
        }

        // --- 3. GENERATE ---
        let reply = if inbound.command() == Some("/start") {
            prompt::welcome_message(&agent.project_name)
        } else {
            let context = Context::new(prompt::build_system_prompt(&agent), &inbound.text)
                .with_temperature(prompt::temperature_for(&agent))
                .with_max_output_tokens(MAX_OUTPUT_TOKENS);
            match self.provider.complete(&context).await {
                Ok(completion) => completion.text,
                Err(e) => {
                    error!("provider failed for agent {agent_id}: {e}");
                    APOLOGY.to_string()
                }
            }
        };

        // --- 4. SEND ---
        self.send(&agent.bot_token, inbound, &reply).await;

        // --- 5. ANALYTICS ---
        let elapsed_ms = started.elapsed().as_millis() as i64;
        let entry = MessageLogEntry::new(
            Some(agent.id.clone()),
            inbound.user_id,
            &inbound.text,
            &reply,
            elapsed_ms,
        );
        if let Err(e) = self.store.log_message(&entry).await {
            warn!("analytics: failed to log message for agent {agent_id}: {e}");
        }
        if let Err(e) = self.store.record_agent_interaction(&agent.id, Utc::now()).await {
            warn!("analytics: failed to bump message count for agent {agent_id}: {e}");
        }
    }

    async fn handle_community_message(&self, inbound: &Inbound) {
        let token = self.telegram.community_bot_token.clone();
        if token.is_empty() {
            warn!("community update received but no community bot token is configured");
            return;
        }
        let project = &self.telegram.community_project;
        let started = Instant::now();

        let reply = match inbound.command() {
            Some("/start") => prompt::welcome_message(project),
            Some("/reset") => {
                self.history.lock(inbound.user_id).await.clear();
                "🔄 Conversation reset. Ask me anything!".to_string()
            }
            _ => {
                let mut session = self.history.lock(inbound.user_id).await;
                let context = Context::new(
                    prompt::community_system_prompt(project, &self.telegram.community_knowledge),
                    &inbound.text,
                )
                .with_history(session.entries())
                .with_max_output_tokens(MAX_OUTPUT_TOKENS);

                match self.provider.complete(&context).await {
                    Ok(completion) => {
                        session.push(ContextEntry::user(&inbound.text));
                        session.push(ContextEntry::assistant(&completion.text));
                        completion.text
                    }
                    Err(e) => {
                        error!("provider failed for community bot: {e}");
                        APOLOGY.to_string()
                    }
                }
            }
        };

        self.send(&token, inbound, &reply).await;

        let entry = MessageLogEntry::new(
            None,
            inbound.user_id,
            &inbound.text,
            &reply,
            started.elapsed().as_millis() as i64,
        );
        if let Err(e) = self.store.log_message(&entry).await {
            warn!("analytics: failed to log community message: {e}");
        }
    }

    /// Reply to the originating message; failures are logged, never retried.
    async fn send(&self, bot_token: &str, inbound: &Inbound, text: &str) {
        if let Err(e) = self
            .messenger
            .send_message(bot_token, inbound.chat_id, text, Some(inbound.message_id))
            .await
        {
            warn!("telegram send to chat {} failed: {e}", inbound.chat_id);
        }
    }
}
