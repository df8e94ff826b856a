//! In-process fakes for the network collaborators.

use async_trait::async_trait;
use ethers::types::{Address, U256};
use sentinels_core::{
    context::{Completion, CompletionMetadata, Context},
    error::SentinelError,
    model::BotInfo,
    traits::{Messenger, Provider},
};
use std::sync::{Arc, Mutex};

use crate::chain::ChainReader;

/// Provider that answers with a fixed text (or fails) and records contexts.
pub struct MockProvider {
    pub reply: Option<String>,
    pub seen: Arc<Mutex<Vec<Context>>>,
    pub panics: bool,
}

impl MockProvider {
    pub fn replying(text: &str) -> Self {
        Self {
            reply: Some(text.to_string()),
            seen: Arc::new(Mutex::new(Vec::new())),
            panics: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            seen: Arc::new(Mutex::new(Vec::new())),
            panics: false,
        }
    }

    /// Panics inside `complete`, like a bug deep in a provider.
    pub fn panicking() -> Self {
        Self {
            panics: true,
            ..Self::failing()
        }
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, context: &Context) -> Result<Completion, SentinelError> {
        self.seen.lock().unwrap().push(context.clone());
        if self.panics {
            panic!("mock provider blew up");
        }
        match self.reply {
            Some(ref text) => Ok(Completion {
                text: text.clone(),
                metadata: CompletionMetadata {
                    provider_used: "mock".into(),
                    tokens_used: None,
                    processing_time_ms: 1,
                    model: None,
                },
            }),
            None => Err(SentinelError::Provider("mock outage".into())),
        }
    }

    async fn is_available(&self) -> bool {
        self.reply.is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sent {
    pub bot_token: String,
    pub chat_id: i64,
    pub text: String,
    pub reply_to: Option<i64>,
}

/// Messenger that records outbound calls. Tokens starting with `bad` are rejected.
#[derive(Default)]
pub struct MockMessenger {
    pub sent: Arc<Mutex<Vec<Sent>>>,
    pub webhooks: Arc<Mutex<Vec<(String, String)>>>,
    pub fail_send: bool,
}

#[async_trait]
impl Messenger for MockMessenger {
    async fn send_message(
        &self,
        bot_token: &str,
        chat_id: i64,
        text: &str,
        reply_to: Option<i64>,
    ) -> Result<(), SentinelError> {
        if self.fail_send {
            return Err(SentinelError::Channel("mock send failure".into()));
        }
        self.sent.lock().unwrap().push(Sent {
            bot_token: bot_token.to_string(),
            chat_id,
            text: text.to_string(),
            reply_to,
        });
        Ok(())
    }

    async fn get_me(&self, bot_token: &str) -> Result<BotInfo, SentinelError> {
        if bot_token.starts_with("bad") {
            return Err(SentinelError::Channel("Unauthorized".into()));
        }
        Ok(BotInfo {
            id: 4242,
            first_name: "Sentinel".into(),
            username: Some("sentinel_test_bot".into()),
        })
    }

    async fn set_webhook(&self, bot_token: &str, url: &str) -> Result<(), SentinelError> {
        self.webhooks
            .lock()
            .unwrap()
            .push((bot_token.to_string(), url.to_string()));
        Ok(())
    }
}

/// Chain reader with a fixed balance, or an RPC failure when `None`.
pub struct MockChainReader {
    pub balance: Option<u64>,
}

#[async_trait]
impl ChainReader for MockChainReader {
    async fn balance_of(
        &self,
        _contract: &Address,
        _owner: &Address,
    ) -> Result<U256, SentinelError> {
        self.balance
            .map(U256::from)
            .ok_or_else(|| SentinelError::Chain("rpc unreachable".into()))
    }
}
