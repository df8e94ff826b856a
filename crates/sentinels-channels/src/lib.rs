//! # sentinels-channels
//!
//! Telegram Bot API integration for SmartSentinels agents.

pub mod telegram;
pub mod utils;

pub use telegram::TelegramApi;
