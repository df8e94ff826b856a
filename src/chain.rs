//! Genesis NFT ownership check over BSC JSON-RPC.
//!
//! A single `eth_call` of ERC-721 `balanceOf(address)`; any positive
//! balance counts as ownership.

use async_trait::async_trait;
use ethers::types::{Address, U256};
use ethers::utils::to_checksum;
use sentinels_core::{config::ChainConfig, error::SentinelError};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

/// `keccak256("balanceOf(address)")[..4]`
const BALANCE_OF_SELECTOR: [u8; 4] = [0x70, 0xa0, 0x82, 0x31];

/// Parse a `0x`-prefixed 20-byte hex address.
///
/// Mixed-case input must carry a valid EIP-55 checksum; all-lower and
/// all-upper input is accepted as is.
pub fn validate_address(input: &str) -> Result<Address, String> {
    let trimmed = input.trim();
    let hex_part = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .ok_or_else(|| "address must start with 0x".to_string())?;

    if hex_part.len() != 40 || !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err("address must be 0x followed by 40 hex characters".to_string());
    }

    let bytes = hex::decode(hex_part).map_err(|e| format!("invalid address hex: {e}"))?;
    let address = Address::from_slice(&bytes);

    let has_lower = hex_part.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = hex_part.chars().any(|c| c.is_ascii_uppercase());
    if has_lower && has_upper && to_checksum(&address, None)[2..] != *hex_part {
        return Err("address checksum mismatch".to_string());
    }
    Ok(address)
}

/// EIP-55 display form.
pub fn checksum(address: &Address) -> String {
    to_checksum(address, None)
}

/// ABI-encode `balanceOf(owner)`.
pub fn balance_of_calldata(owner: &Address) -> Vec<u8> {
    let mut data = Vec::with_capacity(36);
    data.extend_from_slice(&BALANCE_OF_SELECTOR);
    data.extend_from_slice(&[0u8; 12]);
    data.extend_from_slice(owner.as_bytes());
    data
}

/// Read-only access to an ERC-721 contract.
#[async_trait]
pub trait ChainReader: Send + Sync {
    async fn balance_of(&self, contract: &Address, owner: &Address)
        -> Result<U256, SentinelError>;
}

#[derive(Debug, Serialize)]
struct JsonRpcRequest {
    jsonrpc: &'static str,
    method: &'static str,
    params: Value,
    id: u64,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    result: Option<Value>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

/// `eth_call` against a JSON-RPC endpoint.
pub struct RpcChainReader {
    client: reqwest::Client,
    rpc_url: String,
}

impl RpcChainReader {
    pub fn from_config(config: &ChainConfig) -> Result<Self, SentinelError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SentinelError::Chain(format!("http client: {e}")))?;
        Ok(Self {
            client,
            rpc_url: config.rpc_url.clone(),
        })
    }

    async fn eth_call(&self, to: &Address, data: &[u8]) -> Result<Vec<u8>, SentinelError> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            method: "eth_call",
            params: json!([
                {
                    "to": format!("{to:?}"),
                    "data": format!("0x{}", hex::encode(data)),
                },
                "latest"
            ]),
            id: 1,
        };
        debug!("chain: eth_call to {to:?}");

        let resp = self
            .client
            .post(&self.rpc_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                SentinelError::Chain(format!("rpc request failed: {}", e.without_url()))
            })?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| {
                SentinelError::Chain(format!(
                    "failed to read rpc response: {}",
                    e.without_url()
                ))
            })?;
        if !status.is_success() {
            return Err(SentinelError::Chain(format!("rpc returned {status}: {body}")));
        }

        parse_call_result(&body)
    }
}

/// Decode a JSON-RPC `eth_call` response body into raw return bytes.
pub(crate) fn parse_call_result(body: &str) -> Result<Vec<u8>, SentinelError> {
    let parsed: JsonRpcResponse = serde_json::from_str(body)
        .map_err(|e| SentinelError::Chain(format!("failed to parse rpc response: {e}")))?;
    if let Some(err) = parsed.error {
        return Err(SentinelError::Chain(format!(
            "rpc error {}: {}",
            err.code, err.message
        )));
    }
    let hex_str = parsed
        .result
        .as_ref()
        .and_then(Value::as_str)
        .ok_or_else(|| SentinelError::Chain("rpc returned no result".into()))?;
    hex::decode(hex_str.trim_start_matches("0x"))
        .map_err(|e| SentinelError::Chain(format!("failed to decode eth_call result: {e}")))
}

#[async_trait]
impl ChainReader for RpcChainReader {
    async fn balance_of(
        &self,
        contract: &Address,
        owner: &Address,
    ) -> Result<U256, SentinelError> {
        let bytes = self.eth_call(contract, &balance_of_calldata(owner)).await?;
        if bytes.len() < 32 {
            return Err(SentinelError::Chain(
                "empty balanceOf result (is the contract deployed on this chain?)".into(),
            ));
        }
        Ok(U256::from_big_endian(&bytes[..32]))
    }
}
