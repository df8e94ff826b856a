//! Default value functions used by serde for config deserialization.

pub fn default_host() -> String {
    "0.0.0.0".to_string()
}

pub fn default_port() -> u16 {
    3000
}

pub fn default_log_level() -> String {
    "info".to_string()
}

pub fn default_true() -> bool {
    true
}

pub fn default_provider() -> String {
    "gemini".to_string()
}

pub fn default_gemini_model() -> String {
    "gemini-2.0-flash".to_string()
}

pub fn default_provider_timeout_secs() -> u64 {
    45
}

pub fn default_openai_model() -> String {
    "gpt-4o-mini".to_string()
}

pub fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

pub fn default_community_project() -> String {
    "SmartSentinels".to_string()
}

pub fn default_history_max_entries() -> usize {
    20
}

pub fn default_history_ttl_minutes() -> u64 {
    24 * 60
}

pub fn default_store_backend() -> String {
    "sqlite".to_string()
}

pub fn default_db_path() -> String {
    "~/.sentinels/data/sentinels.db".to_string()
}

pub fn default_rpc_url() -> String {
    "https://bsc-dataseed.binance.org".to_string()
}

pub fn default_rpc_timeout_secs() -> u64 {
    15
}

pub fn default_scraper_max_chars() -> usize {
    50_000
}

pub fn default_scraper_timeout_secs() -> u64 {
    20
}

pub fn default_scraper_max_page_bytes() -> usize {
    2 * 1024 * 1024
}

pub fn default_expiry_poll_secs() -> u64 {
    3600
}

pub fn default_expiry_warn_days() -> i64 {
    3
}
