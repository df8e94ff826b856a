//! Owner notification panel.

use super::{api_error, store_error, ApiResult, AppState};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Default, Deserialize)]
pub(super) struct Owner {
    #[serde(rename = "userId", default)]
    user_id: Option<String>,
}

impl Owner {
    fn require(self) -> Result<String, super::ApiError> {
        self.user_id
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty())
            .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "userId is required"))
    }
}

/// `GET /api/notifications?userId=`
pub(super) async fn list(State(state): State<AppState>, Query(owner): Query<Owner>) -> ApiResult {
    let user_id = owner.require()?;
    let notifications = state
        .store
        .list_notifications(&user_id)
        .await
        .map_err(|e| store_error("notifications", e))?;
    let unread = notifications.iter().filter(|n| !n.read).count();
    Ok(Json(json!({
        "success": true,
        "unread": unread,
        "data": notifications,
    })))
}

/// `POST /api/notifications/{id}/read` with `{userId}`.
pub(super) async fn mark_read(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(owner): Json<Owner>,
) -> ApiResult {
    let user_id = owner.require()?;
    let updated = state
        .store
        .mark_notification_read(&id, &user_id)
        .await
        .map_err(|e| store_error("notifications", e))?;
    if !updated {
        return Err(api_error(StatusCode::NOT_FOUND, "Notification not found"));
    }
    Ok(Json(json!({ "success": true })))
}

/// `DELETE /api/notifications/{id}?userId=`
pub(super) async fn remove(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(owner): Query<Owner>,
) -> ApiResult {
    let user_id = owner.require()?;
    let removed = state
        .store
        .delete_notification(&id, &user_id)
        .await
        .map_err(|e| store_error("notifications", e))?;
    if !removed {
        return Err(api_error(StatusCode::NOT_FOUND, "Notification not found"));
    }
    Ok(Json(json!({ "success": true })))
}
