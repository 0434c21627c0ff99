/// JSON-RPC client for the position gateway
///
/// The gateway fronts the strategy contract:
/// - `position_getOwnerInfo` reads `{liquidity, tokenId}` for (owner, pool)
/// - `position_decrease` submits a percentage withdrawal and answers once the
///   transaction is final
///
/// Integers travel as decimal strings (liquidity is 128-bit). The strategy
/// contract address is always passed in explicitly.
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use super::types::{
    LedgerReceipt, Liquidity, OwnerId, PoolId, PositionSnapshot, SigningHandle, TokenId,
    WithdrawalInstruction,
};
use super::{LedgerReader, LedgerWriter};
use crate::errors::{ExecutionError, StateReadError};
use crate::logger::{self, LogTag};

const METHOD_OWNER_INFO: &str = "position_getOwnerInfo";
const METHOD_DECREASE: &str = "position_decrease";

// ============================================================================
// WIRE TYPES
// ============================================================================

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<Value>,
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct OwnerInfoResponse {
    liquidity: String,
    #[serde(rename = "tokenId")]
    token_id: String,
}

#[derive(Debug, Deserialize)]
struct DecreaseResponse {
    #[serde(rename = "txHash")]
    tx_hash: String,
    #[serde(rename = "blockNumber")]
    block_number: u64,
    status: String,
    #[serde(rename = "revertReason", default)]
    revert_reason: Option<String>,
}

// ============================================================================
// CLIENT
// ============================================================================

pub struct RpcLedger {
    client: Client,
    url: String,
    contract_address: String,
    request_timeout: Duration,
    confirmation_timeout: Duration,
    next_id: AtomicU64,
}

impl RpcLedger {
    pub fn new(
        url: impl Into<String>,
        contract_address: impl Into<String>,
        request_timeout: Duration,
        confirmation_timeout: Duration,
    ) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
            contract_address: contract_address.into(),
            request_timeout,
            confirmation_timeout,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn contract_address(&self) -> &str {
        &self.contract_address
    }

    fn request(&self, method: &'static str, params: Value) -> RpcRequest<'static> {
        RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        }
    }

    async fn call(
        &self,
        request: &RpcRequest<'_>,
        timeout: Duration,
    ) -> Result<Result<Value, RpcErrorObject>, reqwest::Error> {
        logger::debug(
            LogTag::Ledger,
            &format!("➡️ {} #{} {}", request.method, request.id, request.params),
        );
        let response: RpcResponse = self
            .client
            .post(&self.url)
            .timeout(timeout)
            .json(request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(match (response.result, response.error) {
            (_, Some(error)) => Err(error),
            (Some(result), None) => Ok(result),
            (None, None) => Ok(Value::Null),
        })
    }
}

#[async_trait]
impl LedgerReader for RpcLedger {
    async fn read_position(
        &self,
        owner: &OwnerId,
        pool: PoolId,
    ) -> Result<PositionSnapshot, StateReadError> {
        let request = self.request(
            METHOD_OWNER_INFO,
            json!({
                "contract": self.contract_address,
                "owner": owner.as_str(),
                "poolId": pool.0.to_string(),
            }),
        );

        let outcome = self.call(&request, self.request_timeout).await.map_err(|e| {
            if e.is_timeout() {
                StateReadError::Timeout {
                    seconds: self.request_timeout.as_secs(),
                }
            } else if e.is_decode() {
                StateReadError::Malformed(e.to_string())
            } else {
                StateReadError::Unavailable(e.to_string())
            }
        })?;

        match outcome {
            Ok(value) => parse_owner_info(value),
            Err(error) => Err(StateReadError::Unavailable(format!(
                "{} (code {})",
                error.message, error.code
            ))),
        }
    }
}

#[async_trait]
impl LedgerWriter for RpcLedger {
    async fn submit_withdrawal(
        &self,
        signer: &SigningHandle,
        instruction: &WithdrawalInstruction,
    ) -> Result<LedgerReceipt, ExecutionError> {
        let request = self.request(
            METHOD_DECREASE,
            json!({
                "contract": self.contract_address,
                "owner": signer.owner.as_str(),
                "signer": signer.key_ref,
                "poolId": instruction.pool().0.to_string(),
                "percentage": instruction.percentage(),
                "maxSlippageBps": instruction.max_slippage_bps(),
            }),
        );

        let outcome = self
            .call(&request, self.confirmation_timeout)
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ExecutionError::ConfirmationTimeout {
                        seconds: self.confirmation_timeout.as_secs(),
                    }
                } else {
                    ExecutionError::Transport(e.to_string())
                }
            })?;

        match outcome {
            Ok(value) => parse_decrease(value, signer, instruction),
            Err(error) => Err(classify_rpc_error(&error.message, signer, instruction)),
        }
    }
}

// ============================================================================
// RESPONSE HANDLING
// ============================================================================

fn parse_owner_info(value: Value) -> Result<PositionSnapshot, StateReadError> {
    if value.is_null() {
        return Ok(PositionSnapshot::empty());
    }
    let info: OwnerInfoResponse =
        serde_json::from_value(value).map_err(|e| StateReadError::Malformed(e.to_string()))?;

    let liquidity: Liquidity = info
        .liquidity
        .trim()
        .parse()
        .map_err(|_| StateReadError::Malformed(format!("liquidity '{}'", info.liquidity)))?;
    let token_id: u64 = info
        .token_id
        .trim()
        .parse()
        .map_err(|_| StateReadError::Malformed(format!("tokenId '{}'", info.token_id)))?;

    // tokenId 0 is the contract's "no position" marker
    Ok(PositionSnapshot {
        liquidity,
        token_id: (token_id != 0).then_some(TokenId(token_id)),
    })
}

fn parse_decrease(
    value: Value,
    signer: &SigningHandle,
    instruction: &WithdrawalInstruction,
) -> Result<LedgerReceipt, ExecutionError> {
    let response: DecreaseResponse = serde_json::from_value(value)
        .map_err(|e| ExecutionError::Transport(format!("malformed receipt: {}", e)))?;

    match response.status.as_str() {
        "confirmed" | "success" => Ok(LedgerReceipt {
            tx_id: response.tx_hash,
            block_number: response.block_number,
        }),
        _ => {
            let reason = response
                .revert_reason
                .unwrap_or_else(|| format!("status {}", response.status));
            Err(classify_rpc_error(&reason, signer, instruction))
        }
    }
}

/// Map a gateway/revert message onto the execution error taxonomy
fn classify_rpc_error(
    message: &str,
    signer: &SigningHandle,
    instruction: &WithdrawalInstruction,
) -> ExecutionError {
    let m = message.to_lowercase();
    if m.contains("slippage") || m.contains("too little received") {
        ExecutionError::SlippageExceeded {
            max_slippage_bps: instruction.max_slippage_bps(),
            detail: message.to_string(),
        }
    } else if m.contains("no position") || m.contains("position not found") || m.contains("not owner")
    {
        ExecutionError::PositionNotFound {
            owner: signer.owner.clone(),
            pool: instruction.pool(),
        }
    } else {
        ExecutionError::Reverted {
            reason: message.to_string(),
        }
    }
}
