//! # sentinels-providers
//!
//! LLM completion providers for SmartSentinels.

pub mod gemini;
pub mod openai;

pub use gemini::GeminiProvider;
pub use openai::OpenAiProvider;
