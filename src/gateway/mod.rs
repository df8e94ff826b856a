//! Gateway: turns one Telegram update into at most one reply.
//!
//! Agent flow: load agent → subscription gate → completion → send →
//! analytics. Community flow: history-backed completion → send → analytics.

pub mod gate;
pub mod history;
mod pipeline;
pub mod prompt;


use history::ConversationHistory;
use sentinels_core::{
    config::TelegramConfig,
    traits::{Datastore, Messenger, Provider},
};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Shared message-processing core, used by the webhook handler.
pub struct Gateway {
    pub(crate) provider: Arc<dyn Provider>,
    pub(crate) messenger: Arc<dyn Messenger>,
    pub(crate) store: Arc<dyn Datastore>,
    pub(crate) history: ConversationHistory,
    pub(crate) telegram: TelegramConfig,
}

impl Gateway {
    pub fn new(
        provider: Arc<dyn Provider>,
        messenger: Arc<dyn Messenger>,
        store: Arc<dyn Datastore>,
        telegram: TelegramConfig,
    ) -> Self {
        let history = ConversationHistory::new(
            telegram.history_max_entries,
            Duration::from_secs(telegram.history_ttl_minutes * 60),
        );
        Self {
            provider,
            messenger,
            store,
            history,
            telegram,
        }
    }

    /// Background task: evict idle community sessions.
    pub async fn history_sweeper(self: Arc<Self>, every: Duration) {
        loop {
            tokio::time::sleep(every).await;
            let removed = self.history.sweep();
            if removed > 0 {
                debug!("history: swept {removed} idle sessions");
            }
        }
    }
}
