//! Public airdrop endpoints: registration and task completion.

use super::{api_error, store_error, ApiResult, AppState};
use axum::{extract::State, http::StatusCode, response::Json};
use chrono::Utc;
use sentinels_core::model::{find_task, AirdropRegistration, TaskCompletion};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

/// `0x` + 40 hex digits, any case. Returns the lowercase form.
pub(crate) fn normalize_wallet(input: &str) -> Option<String> {
    let trimmed = input.trim();
    let hex = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))?;
    if hex.len() == 40 && hex.chars().all(|c| c.is_ascii_hexdigit()) {
        Some(format!("0x{}", hex.to_ascii_lowercase()))
    } else {
        None
    }
}

/// `local@domain.tld` with no whitespace.
pub(crate) fn is_valid_email(input: &str) -> bool {
    if input.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = input.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && !tld.is_empty(),
        None => false,
    }
}

fn optional_handle(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct RegisterRequest {
    #[serde(default)]
    wallet_address: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    twitter_handle: Option<String>,
    #[serde(default)]
    telegram_handle: Option<String>,
}

/// `POST /api/airdrop-register`
pub(super) async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult {
    let wallet = normalize_wallet(&req.wallet_address)
        .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "Invalid wallet address"))?;
    let email = req.email.trim().to_string();
    if !is_valid_email(&email) {
        return Err(api_error(StatusCode::BAD_REQUEST, "Invalid email address"));
    }

    let registration = AirdropRegistration {
        id: uuid::Uuid::new_v4().to_string(),
        wallet_address: wallet.clone(),
        email,
        twitter_handle: optional_handle(req.twitter_handle),
        telegram_handle: optional_handle(req.telegram_handle),
        created_at: Utc::now(),
    };

    match state
        .store
        .register_airdrop(registration)
        .await
        .map_err(|e| store_error("airdrop-register", e))?
    {
        Some(saved) => {
            info!("airdrop-register: {wallet}");
            Ok(Json(json!({ "success": true, "data": saved })))
        }
        None => Err(api_error(StatusCode::CONFLICT, "Wallet already registered")),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct CompleteTaskRequest {
    #[serde(default)]
    wallet_address: String,
    #[serde(default)]
    task_id: String,
}

/// `POST /api/complete-task`
pub(super) async fn complete_task(
    State(state): State<AppState>,
    Json(req): Json<CompleteTaskRequest>,
) -> ApiResult {
    let wallet = normalize_wallet(&req.wallet_address)
        .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "Invalid wallet address"))?;
    let task = find_task(req.task_id.trim())
        .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "Invalid task"))?;

    let outcome = state
        .store
        .complete_task(&wallet, task.id, task.points)
        .await
        .map_err(|e| store_error("complete-task", e))?;

    match outcome {
        TaskCompletion::Completed {
            points_awarded,
            total_points,
        } => {
            info!("complete-task: {wallet} {} +{points_awarded}", task.id);
            Ok(Json(json!({
                "success": true,
                "taskId": task.id,
                "pointsAwarded": points_awarded,
                "totalPoints": total_points,
            })))
        }
        TaskCompletion::AlreadyCompleted => {
            Err(api_error(StatusCode::BAD_REQUEST, "Task already completed"))
        }
        TaskCompletion::UserNotFound => Err(api_error(StatusCode::NOT_FOUND, "User not found")),
    }
}
