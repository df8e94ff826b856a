//! `GET|POST /api/verify-genesis-mint`: genesis NFT ownership.
//!
//! Only a missing address and a missing contract are HTTP errors; a
//! malformed address or an RPC failure is a 200 with `verified: false`.

use super::AppState;
use crate::chain::{checksum, validate_address};
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

#[derive(Debug, Default, Deserialize)]
pub(super) struct VerifyInput {
    #[serde(rename = "walletAddress", default)]
    wallet_address: Option<String>,
}

pub(super) async fn verify_get(
    State(state): State<AppState>,
    Query(input): Query<VerifyInput>,
) -> (StatusCode, Json<Value>) {
    verify(&state, input.wallet_address).await
}

/// Any body is accepted; one without a string `walletAddress` counts as missing.
pub(super) async fn verify_post(
    State(state): State<AppState>,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    verify(&state, wallet_from_body(&body)).await
}

fn wallet_from_body(body: &[u8]) -> Option<String> {
    let value: Value = serde_json::from_slice(body).ok()?;
    value
        .get("walletAddress")
        .and_then(Value::as_str)
        .map(str::to_string)
}

async fn verify(state: &AppState, wallet: Option<String>) -> (StatusCode, Json<Value>) {
    let Some(wallet) = wallet
        .map(|w| w.trim().to_string())
        .filter(|w| !w.is_empty())
    else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "verified": false, "error": "walletAddress is required" })),
        );
    };

    let contract = match validate_address(&state.genesis_contract) {
        Ok(c) => c,
        Err(e) => {
            warn!("verify-genesis-mint: genesis contract not usable: {e}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "verified": false,
                    "error": "genesis contract is not configured",
                })),
            );
        }
    };

    let owner = match validate_address(&wallet) {
        Ok(a) => a,
        Err(e) => {
            return (
                StatusCode::OK,
                Json(json!({
                    "verified": false,
                    "walletAddress": wallet,
                    "error": format!("Invalid wallet address: {e}"),
                })),
            );
        }
    };
    let checksummed = checksum(&owner);

    match state.chain.balance_of(&contract, &owner).await {
        Ok(balance) => {
            let verified = !balance.is_zero();
            info!("verify-genesis-mint: {checksummed} balance {balance}");
            (
                StatusCode::OK,
                Json(json!({
                    "verified": verified,
                    "walletAddress": checksummed,
                    "balance": balance.to_string(),
                })),
            )
        }
        Err(e) => {
            warn!("verify-genesis-mint: {checksummed}: {e}");
            (
                StatusCode::OK,
                Json(json!({
                    "verified": false,
                    "walletAddress": checksummed,
                    "error": format!("Failed to query contract: {e}"),
                })),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wallet_from_body_is_lenient() {
        assert_eq!(
            wallet_from_body(br#"{"walletAddress":"0xabc"}"#).as_deref(),
            Some("0xabc")
        );
        assert!(wallet_from_body(b"").is_none());
        assert!(wallet_from_body(b"walletAddress=0xabc").is_none());
        assert!(wallet_from_body(br#"{"walletAddress":12}"#).is_none());
        assert!(wallet_from_body(br#"["0xabc"]"#).is_none());
    }
}
