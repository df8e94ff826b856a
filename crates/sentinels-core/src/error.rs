use thiserror::Error;

/// Top-level error type for SmartSentinels.
#[derive(Debug, Error)]
pub enum SentinelError {
    /// Error from an AI provider.
    #[error("provider error: {0}")]
    Provider(String),

    /// Error talking to the Telegram Bot API.
    #[error("channel error: {0}")]
    Channel(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Datastore error.
    #[error("store error: {0}")]
    Store(String),

    /// JSON-RPC / contract read error.
    #[error("chain error: {0}")]
    Chain(String),

    /// Website fetch or extraction error.
    #[error("scrape error: {0}")]
    Scrape(String),

    /// Caller supplied malformed input.
    #[error("validation error: {0}")]
    Validation(String),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
