//! Outbound Bot API calls: `sendMessage`, `getMe`, `setWebhook`, `deleteWebhook`.

use super::types::TgResponse;
use super::{TelegramApi, MAX_MESSAGE_LEN};
use crate::utils::split_message;
use async_trait::async_trait;
use sentinels_core::{error::SentinelError, model::BotInfo, traits::Messenger};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

impl TelegramApi {
    /// POST a Bot API method and unwrap the `{ok, result}` envelope.
    async fn call<T: DeserializeOwned>(
        &self,
        bot_token: &str,
        method: &str,
        body: &Value,
    ) -> Result<T, SentinelError> {
        let resp = self
            .client
            .post(self.method_url(bot_token, method))
            .json(body)
            .send()
            .await
            .map_err(|e| {
                SentinelError::Channel(format!("telegram {method} failed: {}", e.without_url()))
            })?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| {
            SentinelError::Channel(format!(
                "telegram {method}: failed to read response: {}",
                e.without_url()
            ))
        })?;
        let parsed: TgResponse<T> = serde_json::from_str(&text).map_err(|_| {
            SentinelError::Channel(format!("telegram {method} failed ({status}): {text}"))
        })?;

        if !parsed.ok {
            let reason = parsed.description.unwrap_or_else(|| status.to_string());
            return Err(SentinelError::Channel(format!(
                "telegram {method} rejected: {reason}"
            )));
        }
        parsed
            .result
            .ok_or_else(|| SentinelError::Channel(format!("telegram {method}: empty result")))
    }

    /// Remove the bot's webhook (used when an agent is taken offline).
    pub async fn delete_webhook(&self, bot_token: &str) -> Result<(), SentinelError> {
        let _: bool = self
            .call(bot_token, "deleteWebhook", &serde_json::json!({}))
            .await?;
        Ok(())
    }
}

/// JSON body for one `sendMessage` chunk. Only the first chunk is threaded.
pub(crate) fn send_message_body(chat_id: i64, text: &str, reply_to: Option<i64>) -> Value {
    let mut body = serde_json::json!({
        "chat_id": chat_id,
        "text": text,
    });
    if let Some(id) = reply_to {
        body["reply_to_message_id"] = Value::from(id);
        body["allow_sending_without_reply"] = Value::Bool(true);
    }
    body
}

#[async_trait]
impl Messenger for TelegramApi {
    async fn send_message(
        &self,
        bot_token: &str,
        chat_id: i64,
        text: &str,
        reply_to: Option<i64>,
    ) -> Result<(), SentinelError> {
        let chunks = split_message(text, MAX_MESSAGE_LEN);
        debug!("telegram: sendMessage chat={chat_id} chunks={}", chunks.len());

        for (i, chunk) in chunks.into_iter().enumerate() {
            let body = send_message_body(chat_id, chunk, if i == 0 { reply_to } else { None });
            let _: Value = self.call(bot_token, "sendMessage", &body).await?;
        }
        Ok(())
    }

    async fn get_me(&self, bot_token: &str) -> Result<BotInfo, SentinelError> {
        self.call(bot_token, "getMe", &serde_json::json!({})).await
    }

    async fn set_webhook(&self, bot_token: &str, url: &str) -> Result<(), SentinelError> {
        let body = serde_json::json!({
            "url": url,
            "allowed_updates": ["message"],
        });
        let _: bool = self.call(bot_token, "setWebhook", &body).await?;
        Ok(())
    }
}
