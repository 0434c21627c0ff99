/// Single percentage withdrawal, submitted and awaited to finality
///
/// The executor never retries. Whatever the ledger answers is returned to the
/// controller, which owns the retry/stop policy.
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

use super::types::ConfirmedOutcome;
use crate::errors::ExecutionError;
use crate::ledger::types::{OwnerId, PoolId, WithdrawalInstruction};
use crate::ledger::{LedgerWriter, SignerResolver};
use crate::logger::{self, LogTag};

pub struct WithdrawalExecutor {
    ledger: Arc<dyn LedgerWriter>,
    signers: Arc<dyn SignerResolver>,
    confirmation_timeout: Duration,
}

impl WithdrawalExecutor {
    pub fn new(
        ledger: Arc<dyn LedgerWriter>,
        signers: Arc<dyn SignerResolver>,
        confirmation_timeout: Duration,
    ) -> Self {
        Self {
            ledger,
            signers,
            confirmation_timeout,
        }
    }

    /// Remove `percentage`% of the position's liquidity as of execution time
    pub async fn execute(
        &self,
        owner: &OwnerId,
        pool: PoolId,
        percentage: u8,
        max_slippage_bps: u16,
    ) -> Result<ConfirmedOutcome, ExecutionError> {
        let instruction = WithdrawalInstruction::new(pool, percentage, max_slippage_bps)?;
        let signer = self.signers.resolve_signer(owner).await?;

        logger::info(
            LogTag::Executor,
            &format!(
                "🔻 Decreasing {} pool {} by {}% (max slippage {} bps)",
                owner, pool, percentage, max_slippage_bps
            ),
        );

        let receipt = match tokio::time::timeout(
            self.confirmation_timeout,
            self.ledger.submit_withdrawal(&signer, &instruction),
        )
        .await
        {
            Ok(Ok(receipt)) => receipt,
            Ok(Err(error)) => {
                logger::error(
                    LogTag::Executor,
                    &format!("❌ Withdrawal on pool {} failed: {}", pool, error),
                );
                return Err(error);
            }
            Err(_) => {
                let error = ExecutionError::ConfirmationTimeout {
                    seconds: self.confirmation_timeout.as_secs(),
                };
                logger::error(
                    LogTag::Executor,
                    &format!("⏰ Withdrawal on pool {} unconfirmed: {}", pool, error),
                );
                return Err(error);
            }
        };

        logger::info(
            LogTag::Executor,
            &format!(
                "✅ Position decreased: tx {} in block {}",
                receipt.tx_id, receipt.block_number
            ),
        );

        Ok(ConfirmedOutcome {
            tx_id: receipt.tx_id,
            block_number: receipt.block_number,
            percentage,
            confirmed_at: Utc::now(),
        })
    }
}
