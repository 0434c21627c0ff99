/// In-memory ledger used by tests and the `simulate` command
///
/// Models the protocol behaviours the controller has to cope with:
/// - execution efficiency: only a fraction of the requested percentage is removed
/// - price impact checked against the instruction's slippage limit
/// - scripted execution and read failures
/// - liquidity inflow after each withdrawal (fees, third-party deposits)
/// - confirmation latency, with the effect applied at broadcast time so a caller
///   that stops waiting still finds the withdrawal on the ledger
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use super::types::{
    LedgerReceipt, Liquidity, OwnerId, PoolId, PositionSnapshot, SigningHandle, TokenId,
    WithdrawalInstruction,
};
use super::{LedgerReader, LedgerWriter, SignerResolver};
use crate::errors::{ExecutionError, StateReadError};
use crate::withdrawal::percentage::mul_div_floor;

/// 100% execution efficiency in basis points
pub const EXACT_EFFICIENCY_BPS: u32 = 10_000;

#[derive(Debug, Clone)]
struct SimPosition {
    liquidity: Liquidity,
    token_id: TokenId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedWithdrawal {
    pub owner: OwnerId,
    pub pool: PoolId,
    pub percentage: u8,
    pub max_slippage_bps: u16,
    pub liquidity_before: Liquidity,
    pub liquidity_removed: Liquidity,
}

struct SimState {
    positions: HashMap<(OwnerId, PoolId), SimPosition>,
    next_token_id: u64,
    block_number: u64,
    efficiency_bps: u32,
    price_impact_bps: u16,
    inflow_per_withdrawal: Liquidity,
    execution_failures: VecDeque<ExecutionError>,
    read_failures: VecDeque<StateReadError>,
    submissions: Vec<SubmittedWithdrawal>,
    reads: usize,
}

pub struct SimulatedLedger {
    state: Mutex<SimState>,
    confirmation_latency: Duration,
}

impl Default for SimulatedLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedLedger {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SimState {
                positions: HashMap::new(),
                next_token_id: 1,
                block_number: 1,
                efficiency_bps: EXACT_EFFICIENCY_BPS,
                price_impact_bps: 0,
                inflow_per_withdrawal: 0,
                execution_failures: VecDeque::new(),
                read_failures: VecDeque::new(),
                submissions: Vec::new(),
                reads: 0,
            }),
            confirmation_latency: Duration::ZERO,
        }
    }

    /// Fraction of the requested percentage actually removed, in bps (10000 = exact)
    pub fn with_efficiency_bps(self, efficiency_bps: u32) -> Self {
        self.state.lock().efficiency_bps = efficiency_bps.min(EXACT_EFFICIENCY_BPS);
        self
    }

    /// Price impact every withdrawal realizes; compared to the slippage limit
    pub fn with_price_impact_bps(self, price_impact_bps: u16) -> Self {
        self.state.lock().price_impact_bps = price_impact_bps;
        self
    }

    /// Liquidity added back to a position after each confirmed withdrawal
    pub fn with_inflow_per_withdrawal(self, inflow: Liquidity) -> Self {
        self.state.lock().inflow_per_withdrawal = inflow;
        self
    }

    pub fn with_confirmation_latency(mut self, latency: Duration) -> Self {
        self.confirmation_latency = latency;
        self
    }

    /// Open (or top up) a position and return its token id
    pub fn open_position(&self, owner: &OwnerId, pool: PoolId, liquidity: Liquidity) -> TokenId {
        let mut state = self.state.lock();
        let key = (owner.clone(), pool);
        if let Some(position) = state.positions.get_mut(&key) {
            position.liquidity += liquidity;
            return position.token_id;
        }
        let token_id = TokenId(state.next_token_id);
        state.next_token_id += 1;
        state.positions.insert(key, SimPosition { liquidity, token_id });
        token_id
    }

    /// Queue an error for the next submission(s), consumed in FIFO order
    pub fn fail_next_execution(&self, error: ExecutionError) {
        self.state.lock().execution_failures.push_back(error);
    }

    /// Queue an error for the next read(s), consumed in FIFO order
    pub fn fail_next_read(&self, error: StateReadError) {
        self.state.lock().read_failures.push_back(error);
    }

    pub fn liquidity_of(&self, owner: &OwnerId, pool: PoolId) -> Liquidity {
        self.state
            .lock()
            .positions
            .get(&(owner.clone(), pool))
            .map(|p| p.liquidity)
            .unwrap_or(0)
    }

    pub fn submissions(&self) -> Vec<SubmittedWithdrawal> {
        self.state.lock().submissions.clone()
    }

    pub fn read_count(&self) -> usize {
        self.state.lock().reads
    }

    /// Apply a withdrawal to the in-memory state, returning the receipt
    fn apply_withdrawal(
        &self,
        signer: &SigningHandle,
        instruction: &WithdrawalInstruction,
    ) -> Result<LedgerReceipt, ExecutionError> {
        let mut state = self.state.lock();

        if let Some(error) = state.execution_failures.pop_front() {
            return Err(error);
        }

        if state.price_impact_bps > instruction.max_slippage_bps() {
            return Err(ExecutionError::SlippageExceeded {
                max_slippage_bps: instruction.max_slippage_bps(),
                detail: format!("Price slippage check ({} bps realized)", state.price_impact_bps),
            });
        }

        let efficiency_bps = state.efficiency_bps as Liquidity;
        let inflow = state.inflow_per_withdrawal;
        let key = (signer.owner.clone(), instruction.pool());
        let position = match state.positions.get_mut(&key) {
            Some(position) if position.liquidity > 0 => position,
            _ => {
                return Err(ExecutionError::PositionNotFound {
                    owner: signer.owner.clone(),
                    pool: instruction.pool(),
                })
            }
        };

        let liquidity_before = position.liquidity;
        let requested = mul_div_floor(
            liquidity_before,
            instruction.percentage() as Liquidity,
            100,
        );
        let removed = mul_div_floor(requested, efficiency_bps, EXACT_EFFICIENCY_BPS as Liquidity);
        position.liquidity = liquidity_before - removed + inflow;

        state.block_number += 1;
        let block_number = state.block_number;
        state.submissions.push(SubmittedWithdrawal {
            owner: signer.owner.clone(),
            pool: instruction.pool(),
            percentage: instruction.percentage(),
            max_slippage_bps: instruction.max_slippage_bps(),
            liquidity_before,
            liquidity_removed: removed,
        });

        Ok(LedgerReceipt {
            tx_id: format!("sim-{:08x}", block_number),
            block_number,
        })
    }
}

#[async_trait]
impl LedgerReader for SimulatedLedger {
    async fn read_position(
        &self,
        owner: &OwnerId,
        pool: PoolId,
    ) -> Result<PositionSnapshot, StateReadError> {
        let mut state = self.state.lock();
        state.reads += 1;
        if let Some(error) = state.read_failures.pop_front() {
            return Err(error);
        }
        Ok(state
            .positions
            .get(&(owner.clone(), pool))
            .map(|p| PositionSnapshot {
                liquidity: p.liquidity,
                token_id: Some(p.token_id),
            })
            .unwrap_or_else(PositionSnapshot::empty))
    }
}

#[async_trait]
impl LedgerWriter for SimulatedLedger {
    async fn submit_withdrawal(
        &self,
        signer: &SigningHandle,
        instruction: &WithdrawalInstruction,
    ) -> Result<LedgerReceipt, ExecutionError> {
        let receipt = self.apply_withdrawal(signer, instruction)?;
        if !self.confirmation_latency.is_zero() {
            tokio::time::sleep(self.confirmation_latency).await;
        }
        Ok(receipt)
    }
}

#[async_trait]
impl SignerResolver for SimulatedLedger {
    async fn resolve_signer(&self, owner: &OwnerId) -> Result<SigningHandle, ExecutionError> {
        Ok(SigningHandle {
            owner: owner.clone(),
            key_ref: format!("sim:{}", owner),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(owner: &OwnerId) -> SigningHandle {
        SigningHandle {
            owner: owner.clone(),
            key_ref: "sim".to_string(),
        }
    }

    #[tokio::test]
    async fn test_exact_withdrawal() {
        let ledger = SimulatedLedger::new();
        let owner = OwnerId::from("alice");
        let token = ledger.open_position(&owner, PoolId(1), 1000);

        let instruction = WithdrawalInstruction::new(PoolId(1), 50, 100).unwrap();
        let receipt = ledger.submit_withdrawal(&handle(&owner), &instruction).await.unwrap();
        assert_eq!(receipt.block_number, 2);

        let snapshot = ledger.read_position(&owner, PoolId(1)).await.unwrap();
        assert_eq!(snapshot.liquidity, 500);
        assert_eq!(snapshot.token_id, Some(token));
    }

    #[tokio::test]
    async fn test_under_execution() {
        let ledger = SimulatedLedger::new().with_efficiency_bps(9_000);
        let owner = OwnerId::from("alice");
        ledger.open_position(&owner, PoolId(1), 1000);

        let instruction = WithdrawalInstruction::new(PoolId(1), 100, 100).unwrap();
        ledger.submit_withdrawal(&handle(&owner), &instruction).await.unwrap();
        assert_eq!(ledger.liquidity_of(&owner, PoolId(1)), 100);
    }

    #[tokio::test]
    async fn test_missing_position_reads_empty_and_rejects_writes() {
        let ledger = SimulatedLedger::new();
        let owner = OwnerId::from("bob");

        let snapshot = ledger.read_position(&owner, PoolId(9)).await.unwrap();
        assert_eq!(snapshot, PositionSnapshot::empty());

        let instruction = WithdrawalInstruction::new(PoolId(9), 10, 100).unwrap();
        let result = ledger.submit_withdrawal(&handle(&owner), &instruction).await;
        assert!(matches!(result, Err(ExecutionError::PositionNotFound { .. })));
    }

    #[tokio::test]
    async fn test_slippage_limit_enforced() {
        let ledger = SimulatedLedger::new().with_price_impact_bps(80);
        let owner = OwnerId::from("carol");
        ledger.open_position(&owner, PoolId(2), 1000);

        let tight = WithdrawalInstruction::new(PoolId(2), 10, 50).unwrap();
        let result = ledger.submit_withdrawal(&handle(&owner), &tight).await;
        assert!(matches!(
            result,
            Err(ExecutionError::SlippageExceeded { max_slippage_bps: 50, .. })
        ));
        assert_eq!(ledger.liquidity_of(&owner, PoolId(2)), 1000);

        let loose = WithdrawalInstruction::new(PoolId(2), 10, 100).unwrap();
        assert!(ledger.submit_withdrawal(&handle(&owner), &loose).await.is_ok());
        assert_eq!(ledger.liquidity_of(&owner, PoolId(2)), 900);
    }

    #[tokio::test]
    async fn test_scripted_failures_are_consumed_in_order() {
        let ledger = SimulatedLedger::new();
        let owner = OwnerId::from("dave");
        ledger.open_position(&owner, PoolId(1), 10);
        ledger.fail_next_read(StateReadError::Unavailable("503".into()));

        assert!(ledger.read_position(&owner, PoolId(1)).await.is_err());
        assert!(ledger.read_position(&owner, PoolId(1)).await.is_ok());
        assert_eq!(ledger.read_count(), 2);
    }
}
