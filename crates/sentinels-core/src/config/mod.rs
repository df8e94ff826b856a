mod defaults;
mod providers;

#[cfg(test)]
mod tests;

pub use providers::*;

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::error::SentinelError;
use defaults::*;

/// Top-level SmartSentinels configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub admin: AdminConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub chain: ChainConfig,
    #[serde(default)]
    pub scraper: ScraperConfig,
    #[serde(default)]
    pub expiry: ExpiryConfig,
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Externally reachable base URL, used when registering Telegram webhooks.
    #[serde(default)]
    pub public_url: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Directory for a daily rolling log file. Empty = stdout only.
    #[serde(default)]
    pub log_dir: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            public_url: String::new(),
            log_level: default_log_level(),
            log_dir: String::new(),
        }
    }
}

/// Shared-secret protection for admin endpoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdminConfig {
    /// Empty = admin endpoints answer 500 (misconfigured).
    #[serde(default)]
    pub admin_key: String,
}

/// Telegram settings for the community bot.
///
/// User-created agents carry their own bot tokens in the datastore.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub community_bot_token: String,
    #[serde(default = "default_community_project")]
    pub community_project: String,
    /// Free-form facts appended to the community bot's system prompt.
    #[serde(default)]
    pub community_knowledge: String,
    #[serde(default = "default_history_max_entries")]
    pub history_max_entries: usize,
    #[serde(default = "default_history_ttl_minutes")]
    pub history_ttl_minutes: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            community_bot_token: String::new(),
            community_project: default_community_project(),
            community_knowledge: String::new(),
            history_max_entries: default_history_max_entries(),
            history_ttl_minutes: default_history_ttl_minutes(),
        }
    }
}

/// Datastore selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// `"sqlite"` or `"supabase"`.
    #[serde(default = "default_store_backend")]
    pub backend: String,
    #[serde(default = "default_db_path")]
    pub db_path: String,
    #[serde(default)]
    pub supabase_url: String,
    /// Service-role key; sent as both `apikey` and bearer token.
    #[serde(default)]
    pub supabase_key: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            db_path: default_db_path(),
            supabase_url: String::new(),
            supabase_key: String::new(),
        }
    }
}

/// EVM endpoint and the genesis NFT contract used for ownership checks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,
    #[serde(default)]
    pub genesis_contract: String,
    #[serde(default = "default_rpc_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            rpc_url: default_rpc_url(),
            genesis_contract: String::new(),
            timeout_secs: default_rpc_timeout_secs(),
        }
    }
}

/// Website scraper limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperConfig {
    #[serde(default = "default_scraper_max_chars")]
    pub max_chars: usize,
    #[serde(default = "default_scraper_timeout_secs")]
    pub timeout_secs: u64,
    /// Bytes of HTML read from a page; the rest is ignored.
    #[serde(default = "default_scraper_max_page_bytes")]
    pub max_page_bytes: usize,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            max_chars: default_scraper_max_chars(),
            timeout_secs: default_scraper_timeout_secs(),
            max_page_bytes: default_scraper_max_page_bytes(),
        }
    }
}

/// Subscription expiry scanner -- creates owner notifications.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpiryConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_expiry_poll_secs")]
    pub poll_interval_secs: u64,
    /// Warn owners this many days before expiry.
    #[serde(default = "default_expiry_warn_days")]
    pub warn_days: i64,
}

impl Default for ExpiryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_secs: default_expiry_poll_secs(),
            warn_days: default_expiry_warn_days(),
        }
    }
}

impl Config {
    /// Overlay environment variables on top of file values.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Overlay values produced by `lookup`. Empty values are ignored.
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("SENTINELS_PORT") {
            match v.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => tracing::warn!("ignoring invalid SENTINELS_PORT={v}"),
            }
        }
        if let Some(v) = get("PUBLIC_URL") {
            self.server.public_url = v;
        }
        if let Some(v) = get("ADMIN_KEY") {
            self.admin.admin_key = v;
        }
        if let Some(v) = get("TELEGRAM_BOT_TOKEN") {
            self.telegram.community_bot_token = v;
        }
        if let Some(v) = get("GEMINI_API_KEY") {
            self.provider
                .gemini
                .get_or_insert_with(GeminiConfig::default)
                .api_key = v;
        }
        if let Some(v) = get("OPENAI_API_KEY") {
            self.provider
                .openai
                .get_or_insert_with(OpenAiConfig::default)
                .api_key = v;
        }
        if let Some(v) = get("SENTINELS_STORE") {
            self.store.backend = v;
        }
        if let Some(v) = get("SUPABASE_URL") {
            self.store.supabase_url = v;
        }
        if let Some(v) = get("SUPABASE_SERVICE_KEY") {
            self.store.supabase_key = v;
        }
        if let Some(v) = get("BSC_RPC_URL") {
            self.chain.rpc_url = v;
        }
        if let Some(v) = get("GENESIS_CONTRACT_ADDRESS") {
            self.chain.genesis_contract = v;
        }
    }
}

/// Expand `~` to home directory.
pub fn shellexpand(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return format!("{}/{rest}", home.to_string_lossy());
        }
    }
    path.to_string()
}

/// Load configuration from a TOML file, then overlay the environment.
///
/// Falls back to defaults if the file does not exist.
pub fn load(path: &str) -> Result<Config, SentinelError> {
    let path = Path::new(path);
    let mut config = if path.exists() {
        let content = std::fs::read_to_string(path).map_err(|e| {
            SentinelError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        toml::from_str(&content)
            .map_err(|e| SentinelError::Config(format!("failed to parse config: {}", e)))?
    } else {
        info!(
            "Config file not found at {}, using defaults",
            path.display()
        );
        Config::default()
    };

    config.apply_env();
    Ok(config)
}
