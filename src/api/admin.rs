//! Admin-only airdrop endpoints, guarded by a shared key.

use super::{api_error, store_error, ApiError, ApiResult, AppState};
use crate::api::airdrop::normalize_wallet;
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::Json,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

#[derive(Debug, Default, Deserialize)]
pub(super) struct AdminQuery {
    #[serde(rename = "adminKey")]
    admin_key: Option<String>,
}

/// Compare without early exit on the first differing byte.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// `x-admin-key` header, else `adminKey` query parameter.
pub(crate) fn check_admin(
    configured: &str,
    headers: &HeaderMap,
    query_key: Option<&str>,
) -> Result<(), ApiError> {
    if configured.is_empty() {
        warn!("admin: request rejected, admin key not configured");
        return Err(api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "admin key is not configured",
        ));
    }
    let supplied = headers
        .get("x-admin-key")
        .and_then(|v| v.to_str().ok())
        .or(query_key)
        .unwrap_or_default();
    if constant_time_eq(supplied.as_bytes(), configured.as_bytes()) {
        Ok(())
    } else {
        Err(api_error(StatusCode::UNAUTHORIZED, "Unauthorized"))
    }
}

/// Path wallets are matched in lowercase; anything else is looked up as is.
fn wallet_key(raw: &str) -> String {
    normalize_wallet(raw).unwrap_or_else(|| raw.trim().to_ascii_lowercase())
}

/// `GET /api/airdrop-registrations`
pub(super) async fn list_registrations(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<AdminQuery>,
) -> ApiResult {
    check_admin(&state.admin_key, &headers, query.admin_key.as_deref())?;
    let registrations = state
        .store
        .list_airdrop_registrations()
        .await
        .map_err(|e| store_error("airdrop-registrations", e))?;
    Ok(Json(json!({
        "success": true,
        "count": registrations.len(),
        "data": registrations,
    })))
}

/// `GET /api/user/{wallet}`
pub(super) async fn get_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(wallet): Path<String>,
    Query(query): Query<AdminQuery>,
) -> ApiResult {
    check_admin(&state.admin_key, &headers, query.admin_key.as_deref())?;
    let user = state
        .store
        .get_user(&wallet_key(&wallet))
        .await
        .map_err(|e| store_error("user", e))?
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "User not found"))?;
    Ok(Json(json!({ "success": true, "data": user })))
}

/// `DELETE /api/user-delete/{wallet}`
pub(super) async fn delete_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(wallet): Path<String>,
    Query(query): Query<AdminQuery>,
) -> ApiResult {
    check_admin(&state.admin_key, &headers, query.admin_key.as_deref())?;
    let wallet = wallet_key(&wallet);
    let removed = state
        .store
        .delete_user(&wallet)
        .await
        .map_err(|e| store_error("user-delete", e))?;
    if !removed {
        return Err(api_error(StatusCode::NOT_FOUND, "User not found"));
    }
    info!("user-delete: removed {wallet}");
    Ok(Json(json!({ "success": true, "walletAddress": wallet })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"secret", b"secret"));
        assert!(!constant_time_eq(b"secret", b"secreT"));
        assert!(!constant_time_eq(b"secret", b"secret2"));
    }

    #[test]
    fn test_check_admin_header_and_query() {
        let mut headers = HeaderMap::new();
        headers.insert("x-admin-key", HeaderValue::from_static("k1"));
        assert!(check_admin("k1", &headers, None).is_ok());
        assert!(check_admin("k1", &HeaderMap::new(), Some("k1")).is_ok());

        let (status, _) = check_admin("k1", &HeaderMap::new(), Some("nope")).unwrap_err();
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _) = check_admin("k1", &HeaderMap::new(), None).unwrap_err();
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_check_admin_unconfigured_is_server_error() {
        let (status, _) = check_admin("", &HeaderMap::new(), Some("")).unwrap_err();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_wallet_key_lowercases() {
        assert_eq!(
            wallet_key("0xABCDEF0123456789ABCDEF0123456789ABCDEF01"),
            "0xabcdef0123456789abcdef0123456789abcdef01"
        );
    }
}
