use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::ExecutionError;

/// Protocol-native liquidity units
pub type Liquidity = u128;

/// Pool identifier on the strategy contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PoolId(pub u64);

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ledger account that owns a position
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OwnerId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Opaque handle to the custodial record of a position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenId(pub u64);

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Observed state of one (owner, pool) position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionSnapshot {
    pub liquidity: Liquidity,
    pub token_id: Option<TokenId>,
}

impl PositionSnapshot {
    /// What a read returns when the owner has no position in the pool
    pub fn empty() -> Self {
        Self {
            liquidity: 0,
            token_id: None,
        }
    }

    pub fn exists(&self) -> bool {
        self.token_id.is_some()
    }
}

/// Handle produced by identity resolution, consumed by the write call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningHandle {
    pub owner: OwnerId,
    pub key_ref: String,
}

/// One "remove X% of current liquidity" instruction
///
/// Built fresh for every iteration and never persisted. Construction enforces
/// the percentage range so an out-of-range value never reaches a ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WithdrawalInstruction {
    pool: PoolId,
    percentage: u8,
    max_slippage_bps: u16,
}

impl WithdrawalInstruction {
    pub fn new(pool: PoolId, percentage: u8, max_slippage_bps: u16) -> Result<Self, ExecutionError> {
        if !(1..=100).contains(&percentage) {
            return Err(ExecutionError::InvalidPercentage(percentage));
        }
        Ok(Self {
            pool,
            percentage,
            max_slippage_bps,
        })
    }

    pub fn pool(&self) -> PoolId {
        self.pool
    }

    pub fn percentage(&self) -> u8 {
        self.percentage
    }

    pub fn max_slippage_bps(&self) -> u16 {
        self.max_slippage_bps
    }
}

/// Ledger acknowledgement of a finalized withdrawal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerReceipt {
    pub tx_id: String,
    pub block_number: u64,
}
