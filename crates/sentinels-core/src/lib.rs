//! # sentinels-core
//!
//! Core types, traits, configuration, and error handling for the
//! SmartSentinels agent backend.

pub mod config;
pub mod context;
pub mod error;
pub mod model;
pub mod text;
pub mod traits;

pub use config::shellexpand;
