//! `POST /api/telegram-webhook`: Telegram update intake.
//!
//! Always answers `200 {"ok": true}` so Telegram never retries; failures
//! are only visible in the logs.

use super::AppState;
use axum::{
    body::Bytes,
    extract::{Query, State},
    response::Json,
};
use sentinels_channels::telegram::types::TgUpdate;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, warn};

#[derive(Debug, Deserialize)]
pub(super) struct WebhookQuery {
    #[serde(rename = "agentId")]
    agent_id: Option<String>,
}

pub(super) async fn telegram_webhook(
    State(state): State<AppState>,
    Query(query): Query<WebhookQuery>,
    body: Bytes,
) -> Json<Value> {
    let update: TgUpdate = match serde_json::from_slice(&body) {
        Ok(u) => u,
        Err(e) => {
            warn!("webhook: unparsable update body: {e}");
            return Json(json!({ "ok": true }));
        }
    };

    let agent_id = query.agent_id.filter(|id| !id.trim().is_empty());
    let gateway = Arc::clone(&state.gateway);
    let task = tokio::spawn(async move {
        gateway.handle_update(agent_id.as_deref(), update).await;
    });
    if let Err(e) = task.await {
        error!("webhook: update processing panicked: {e}");
    }

    Json(json!({ "ok": true }))
}
