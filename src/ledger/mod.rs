//! Ledger collaborators consumed by the withdrawal controller
//!
//! The controller never talks to a chain directly. It goes through three seams:
//! - `LedgerReader` - position lookup, read-after-write consistent
//! - `LedgerWriter` - percentage withdrawal, resolves only after finality
//! - `SignerResolver` - owner to signing handle
//!
//! Implementations shipped here:
//! - `RpcLedger` - JSON-RPC position gateway
//! - `KeystoreSigners` - configured owner/key map
//! - `SimulatedLedger` - in-memory ledger for tests and dry runs

pub mod rpc;
pub mod signer;
pub mod simulated;
pub mod types;

use async_trait::async_trait;

use crate::errors::{ExecutionError, StateReadError};
use types::{LedgerReceipt, OwnerId, PoolId, PositionSnapshot, SigningHandle, WithdrawalInstruction};

pub use rpc::RpcLedger;
pub use signer::KeystoreSigners;
pub use simulated::SimulatedLedger;

#[async_trait]
pub trait LedgerReader: Send + Sync {
    /// Current confirmed state of the position.
    ///
    /// A missing position is `PositionSnapshot::empty()`, not an error.
    async fn read_position(
        &self,
        owner: &OwnerId,
        pool: PoolId,
    ) -> Result<PositionSnapshot, StateReadError>;
}

#[async_trait]
pub trait LedgerWriter: Send + Sync {
    /// Submit one withdrawal and wait for finality
    async fn submit_withdrawal(
        &self,
        signer: &SigningHandle,
        instruction: &WithdrawalInstruction,
    ) -> Result<LedgerReceipt, ExecutionError>;
}

#[async_trait]
pub trait SignerResolver: Send + Sync {
    async fn resolve_signer(&self, owner: &OwnerId) -> Result<SigningHandle, ExecutionError>;
}
