//! HTTP API: Telegram webhook, dashboard endpoints, airdrop, and admin.
//!
//! Handlers return `Result<Json<Value>, ApiError>`; every error body is
//! `{"success": false, "error": ...}`.

mod admin;
mod agents;
mod airdrop;
mod notifications;
mod scrape;
mod verify;
mod webhook;


use crate::chain::ChainReader;
use crate::gateway::Gateway;
use crate::scraper::Scraper;
use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{delete, get, post},
    Router,
};
use sentinels_core::{
    error::SentinelError,
    traits::{Datastore, Messenger, Provider},
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

pub(crate) type ApiError = (StatusCode, Json<Value>);
pub(crate) type ApiResult = Result<Json<Value>, ApiError>;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<Gateway>,
    pub store: Arc<dyn Datastore>,
    pub provider: Arc<dyn Provider>,
    pub messenger: Arc<dyn Messenger>,
    pub chain: Arc<dyn ChainReader>,
    pub scraper: Arc<Scraper>,
    /// Empty = admin endpoints are misconfigured (500).
    pub admin_key: String,
    /// Base URL Telegram can reach; used for `setWebhook`.
    pub public_url: String,
    pub genesis_contract: String,
    pub uptime: Instant,
}

pub(crate) fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(json!({ "success": false, "error": message.into() })),
    )
}

/// Log a datastore failure and hide its details from the caller.
pub(crate) fn store_error(context: &str, e: SentinelError) -> ApiError {
    error!("{context}: {e}");
    api_error(StatusCode::INTERNAL_SERVER_ERROR, "datastore error")
}

/// `GET /api/health`
async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "uptime_secs": state.uptime.elapsed().as_secs(),
        "store": state.store.name(),
        "provider": state.provider.name(),
    }))
}

/// Build the axum router with shared state.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/telegram-webhook", post(webhook::telegram_webhook))
        .route("/api/scrape-website", post(scrape::scrape_website))
        .route(
            "/api/verify-genesis-mint",
            get(verify::verify_get).post(verify::verify_post),
        )
        .route("/api/create-agent", post(agents::create_agent))
        .route("/api/deploy-agent", post(agents::deploy_agent))
        .route("/api/subscriptions", post(agents::create_subscription))
        .route("/api/agents", get(agents::list_agents))
        .route("/api/agent-stats/{id}", get(agents::agent_stats))
        .route("/api/airdrop-register", post(airdrop::register))
        .route("/api/complete-task", post(airdrop::complete_task))
        .route(
            "/api/airdrop-registrations",
            get(admin::list_registrations),
        )
        .route("/api/user/{wallet}", get(admin::get_user))
        .route("/api/user-delete/{wallet}", delete(admin::delete_user))
        .route("/api/notifications", get(notifications::list))
        .route("/api/notifications/{id}/read", post(notifications::mark_read))
        .route("/api/notifications/{id}", delete(notifications::remove))
        .layer(axum::extract::DefaultBodyLimit::max(1024 * 1024))
        .with_state(state)
}

/// Bind and serve until the process exits.
pub async fn serve(state: AppState, host: &str, port: u16) -> anyhow::Result<()> {
    let app = build_router(state);
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow::anyhow!("API server failed to bind to {addr}: {e}"))?;
    info!("API server listening on {addr}");
    axum::serve(listener, app).await?;
    Ok(())
}
