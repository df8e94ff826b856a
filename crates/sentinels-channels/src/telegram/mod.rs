//! Telegram Bot API client.
//!
//! Every agent is its own bot, so the client is token-agnostic: each call
//! names the token it acts for. Inbound updates arrive by webhook and are
//! decoded with the types in [`types`].
//! Docs: <https://core.telegram.org/bots/api>

pub(crate) mod send;
pub mod types;


use sentinels_core::error::SentinelError;
use std::time::Duration;

const TELEGRAM_API_ROOT: &str = "https://api.telegram.org";

/// Telegram's hard limit for one `sendMessage` text.
pub const MAX_MESSAGE_LEN: usize = 4096;

/// Shared HTTP client for all agent bots.
#[derive(Clone)]
pub struct TelegramApi {
    client: reqwest::Client,
    api_root: String,
}

impl TelegramApi {
    pub fn new() -> Result<Self, SentinelError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| SentinelError::Channel(format!("telegram http client: {e}")))?;
        Ok(Self {
            client,
            api_root: TELEGRAM_API_ROOT.to_string(),
        })
    }

    /// Point at a different API root (local Bot API server, tests).
    pub fn with_api_root(mut self, api_root: impl Into<String>) -> Self {
        self.api_root = api_root.into();
        self
    }

    /// Carries the bot token; never log or return it.
    fn method_url(&self, bot_token: &str, method: &str) -> String {
        format!(
            "{}/bot{bot_token}/{method}",
            self.api_root.trim_end_matches('/')
        )
    }
}
