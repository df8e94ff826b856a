//! Agent management: create, deploy, subscribe, list, stats.

use super::{api_error, store_error, ApiResult, AppState};
use crate::gateway::gate;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use chrono::Utc;
use sentinels_core::model::{
    DeploymentStatus, KnowledgeBase, NewAgent, NewSubscription, PaymentStatus, Personality,
    SubscriptionTier,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

/// Recent message log rows returned by `agent-stats`.
const STATS_RECENT_MESSAGES: u32 = 20;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct CreateAgentRequest {
    #[serde(default)]
    user_id: String,
    #[serde(default)]
    project_name: String,
    #[serde(default)]
    bot_token: String,
    #[serde(default)]
    personality: Option<String>,
    #[serde(default)]
    custom_personality: Option<String>,
    #[serde(default)]
    temperature: Option<f32>,
    #[serde(default)]
    knowledge_base: Option<Value>,
    #[serde(default)]
    custom_faqs: Option<String>,
    #[serde(default)]
    trigger_keywords: Vec<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// `POST /api/create-agent`
pub(super) async fn create_agent(
    State(state): State<AppState>,
    Json(req): Json<CreateAgentRequest>,
) -> ApiResult {
    let user_id = req.user_id.trim().to_string();
    let project_name = req.project_name.trim().to_string();
    let bot_token = req.bot_token.trim().to_string();
    if user_id.is_empty() || project_name.is_empty() || bot_token.is_empty() {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "userId, projectName and botToken are required",
        ));
    }

    let personality = match req.personality.as_deref() {
        None => Personality::Professional,
        Some(p) => Personality::parse(p).ok_or_else(|| {
            api_error(StatusCode::BAD_REQUEST, format!("unknown personality: {p}"))
        })?,
    };
    let custom_personality = non_empty(req.custom_personality);
    if personality == Personality::Custom && custom_personality.is_none() {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "customPersonality is required for the custom personality",
        ));
    }
    if let Some(t) = req.temperature {
        if !(0.0..=2.0).contains(&t) {
            return Err(api_error(
                StatusCode::BAD_REQUEST,
                "temperature must be between 0 and 2",
            ));
        }
    }

    let knowledge_base = match req.knowledge_base {
        None | Some(Value::Null) => None,
        Some(value) => {
            let kb = KnowledgeBase::from_value(value)
                .map_err(|e| api_error(StatusCode::BAD_REQUEST, e))?;
            let text = serde_json::to_string(&kb)
                .map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?;
            Some(text)
        }
    };

    let trigger_keywords: Vec<String> = req
        .trigger_keywords
        .into_iter()
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .collect();

    let bot_info = state.messenger.get_me(&bot_token).await.map_err(|e| {
        warn!("create-agent: getMe rejected token: {e}");
        api_error(StatusCode::BAD_REQUEST, "Invalid bot token")
    })?;

    let new_agent = NewAgent {
        id: uuid::Uuid::new_v4().to_string(),
        user_id,
        project_name,
        bot_token,
        bot_username: bot_info.username.clone(),
        personality,
        custom_personality,
        temperature: req.temperature,
        knowledge_base,
        custom_faqs: non_empty(req.custom_faqs),
        trigger_keywords,
        status: DeploymentStatus::Pending,
        created_at: Utc::now(),
    };
    let agent = state
        .store
        .create_agent(new_agent)
        .await
        .map_err(|e| store_error("create-agent", e))?;
    info!(
        "create-agent: {} ({}) for user {}",
        agent.id, agent.project_name, agent.user_id
    );

    Ok(Json(json!({
        "success": true,
        "data": agent,
        "botInfo": bot_info,
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct DeployAgentRequest {
    #[serde(default)]
    agent_id: String,
}

/// `<public_url>/api/telegram-webhook?agentId=<id>`
pub(crate) fn webhook_url(public_url: &str, agent_id: &str) -> String {
    format!(
        "{}/api/telegram-webhook?agentId={}",
        public_url.trim_end_matches('/'),
        urlencoding::encode(agent_id)
    )
}

/// `POST /api/deploy-agent`
pub(super) async fn deploy_agent(
    State(state): State<AppState>,
    Json(req): Json<DeployAgentRequest>,
) -> ApiResult {
    let agent_id = req.agent_id.trim();
    if agent_id.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "agentId is required"));
    }
    if state.public_url.trim().is_empty() {
        return Err(api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "public URL is not configured",
        ));
    }

    let agent = state
        .store
        .get_agent(agent_id)
        .await
        .map_err(|e| store_error("deploy-agent", e))?
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "Agent not found"))?;

    let bot_info = state.messenger.get_me(&agent.bot_token).await.map_err(|e| {
        warn!("deploy-agent: getMe failed for {agent_id}: {e}");
        api_error(StatusCode::BAD_GATEWAY, "Telegram getMe failed")
    })?;

    let url = webhook_url(&state.public_url, &agent.id);
    state
        .messenger
        .set_webhook(&agent.bot_token, &url)
        .await
        .map_err(|e| {
            warn!("deploy-agent: setWebhook failed for {agent_id}: {e}");
            api_error(StatusCode::BAD_GATEWAY, "Telegram setWebhook failed")
        })?;

    state
        .store
        .set_agent_status(
            &agent.id,
            DeploymentStatus::Deployed,
            bot_info.username.as_deref(),
        )
        .await
        .map_err(|e| store_error("deploy-agent", e))?;
    info!("deploy-agent: {} deployed, webhook {url}", agent.id);

    Ok(Json(json!({
        "success": true,
        "botInfo": bot_info,
        "webhookUrl": url,
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct SubscriptionRequest {
    #[serde(default)]
    agent_id: String,
    #[serde(default)]
    tier: String,
    #[serde(default)]
    cost: f64,
    #[serde(default)]
    transaction_hash: Option<String>,
    #[serde(default)]
    auto_renew: bool,
}

/// `POST /api/subscriptions`
pub(super) async fn create_subscription(
    State(state): State<AppState>,
    Json(req): Json<SubscriptionRequest>,
) -> ApiResult {
    let agent_id = req.agent_id.trim();
    if agent_id.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "agentId is required"));
    }
    let tier = SubscriptionTier::parse(&req.tier).ok_or_else(|| {
        api_error(
            StatusCode::BAD_REQUEST,
            "tier must be monthly, quarterly or yearly",
        )
    })?;
    if req.cost < 0.0 {
        return Err(api_error(StatusCode::BAD_REQUEST, "cost must not be negative"));
    }

    if state
        .store
        .get_agent(agent_id)
        .await
        .map_err(|e| store_error("subscriptions", e))?
        .is_none()
    {
        return Err(api_error(StatusCode::NOT_FOUND, "Agent not found"));
    }

    let now = Utc::now();
    let latest = state
        .store
        .latest_subscription(agent_id)
        .await
        .map_err(|e| store_error("subscriptions", e))?;
    let base = latest
        .filter(|s| s.is_active(now))
        .map(|s| s.expiry_date)
        .unwrap_or(now);

    let transaction_hash = non_empty(req.transaction_hash);
    let payment_status = if transaction_hash.is_some() {
        PaymentStatus::Confirmed
    } else {
        PaymentStatus::Pending
    };

    let subscription = state
        .store
        .create_subscription(NewSubscription {
            id: uuid::Uuid::new_v4().to_string(),
            agent_id: agent_id.to_string(),
            tier: tier.as_str().to_string(),
            cost: req.cost,
            payment_status,
            transaction_hash,
            expiry_date: base + tier.duration(),
            auto_renew: req.auto_renew,
            created_at: now,
        })
        .await
        .map_err(|e| store_error("subscriptions", e))?;
    info!(
        "subscriptions: {} {} for agent {agent_id}, expires {}",
        subscription.tier,
        subscription.payment_status.as_str(),
        subscription.expiry_date
    );

    Ok(Json(json!({ "success": true, "data": subscription })))
}

#[derive(Debug, Deserialize)]
pub(super) struct UserQuery {
    #[serde(rename = "userId")]
    user_id: Option<String>,
}

/// `GET /api/agents?userId=`
pub(super) async fn list_agents(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> ApiResult {
    let user_id = non_empty(query.user_id)
        .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "userId is required"))?;
    let agents = state
        .store
        .list_agents(&user_id)
        .await
        .map_err(|e| store_error("agents", e))?;
    Ok(Json(json!({ "success": true, "data": agents })))
}

/// `GET /api/agent-stats/{id}`
pub(super) async fn agent_stats(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult {
    let agent = state
        .store
        .get_agent(&id)
        .await
        .map_err(|e| store_error("agent-stats", e))?
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "Agent not found"))?;

    let latest = state
        .store
        .latest_subscription(&agent.id)
        .await
        .map_err(|e| store_error("agent-stats", e))?;
    let decision = gate::evaluate(latest.as_ref(), Utc::now());

    let recent = state
        .store
        .recent_messages(&agent.id, STATS_RECENT_MESSAGES)
        .await
        .map_err(|e| store_error("agent-stats", e))?;

    Ok(Json(json!({
        "success": true,
        "data": {
            "agentId": agent.id,
            "projectName": agent.project_name,
            "status": agent.status,
            "messageCount": agent.message_count,
            "lastInteraction": agent.last_interaction,
            "subscription": {
                "status": decision.label(),
                "expiryDate": latest.as_ref().map(|s| s.expiry_date),
            },
            "recentMessages": recent,
        }
    })))
}
