/// Position state reads with an optional bounded retry
///
/// Every call goes to the ledger; nothing is cached, so a read issued after a
/// confirmed withdrawal always reflects it. The retry budget here is separate
/// from the controller's instruction budget.
use std::sync::Arc;
use std::time::Duration;

use crate::config::ReaderConfig;
use crate::errors::StateReadError;
use crate::ledger::types::{OwnerId, PoolId, PositionSnapshot};
use crate::ledger::LedgerReader;
use crate::logger::{self, LogTag};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadRetryPolicy {
    /// Total attempts including the first (>= 1)
    pub attempts: u32,
    pub delay: Duration,
    pub timeout: Duration,
}

impl ReadRetryPolicy {
    /// Single attempt, surface the first failure as-is
    pub fn single(timeout: Duration) -> Self {
        Self {
            attempts: 1,
            delay: Duration::ZERO,
            timeout,
        }
    }

    pub fn from_config(config: &ReaderConfig) -> Self {
        Self {
            attempts: config.retry_attempts.max(1),
            delay: Duration::from_millis(config.retry_delay_ms),
            timeout: Duration::from_secs(config.read_timeout_secs),
        }
    }
}

impl Default for ReadRetryPolicy {
    fn default() -> Self {
        Self::from_config(&ReaderConfig::default())
    }
}

pub struct PositionStateReader {
    ledger: Arc<dyn LedgerReader>,
    policy: ReadRetryPolicy,
}

impl PositionStateReader {
    pub fn new(ledger: Arc<dyn LedgerReader>, policy: ReadRetryPolicy) -> Self {
        Self { ledger, policy }
    }

    pub fn policy(&self) -> ReadRetryPolicy {
        self.policy
    }

    /// Current liquidity and token id of (owner, pool).
    ///
    /// A missing position reads as `PositionSnapshot::empty()`.
    pub async fn read(
        &self,
        owner: &OwnerId,
        pool: PoolId,
    ) -> Result<PositionSnapshot, StateReadError> {
        let attempts = self.policy.attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let error = match tokio::time::timeout(
                self.policy.timeout,
                self.ledger.read_position(owner, pool),
            )
            .await
            {
                Ok(Ok(snapshot)) => {
                    logger::debug(
                        LogTag::Reader,
                        &format!(
                            "📖 {} pool {}: liquidity {} token {:?}",
                            owner, pool, snapshot.liquidity, snapshot.token_id
                        ),
                    );
                    return Ok(snapshot);
                }
                Ok(Err(error)) => error,
                Err(_) => StateReadError::Timeout {
                    seconds: self.policy.timeout.as_secs(),
                },
            };

            if !error.is_transient() {
                return Err(error);
            }
            if attempt >= attempts {
                if attempts == 1 {
                    return Err(error);
                }
                logger::error(
                    LogTag::Reader,
                    &format!("❌ Read of {} pool {} failed {} times: {}", owner, pool, attempt, error),
                );
                return Err(StateReadError::RetriesExhausted {
                    attempts,
                    last_error: error.to_string(),
                });
            }

            logger::warning(
                LogTag::Reader,
                &format!(
                    "⚠️ Read attempt {}/{} for {} pool {} failed: {} - retrying in {}ms",
                    attempt,
                    attempts,
                    owner,
                    pool,
                    error,
                    self.policy.delay.as_millis()
                ),
            );
            tokio::time::sleep(self.policy.delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::SimulatedLedger;

    fn policy(attempts: u32) -> ReadRetryPolicy {
        ReadRetryPolicy {
            attempts,
            delay: Duration::from_millis(1),
            timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn test_missing_position_is_not_an_error() {
        let ledger = Arc::new(SimulatedLedger::new());
        let reader = PositionStateReader::new(ledger, policy(1));
        let snapshot = reader.read(&OwnerId::from("nobody"), PoolId(0)).await.unwrap();
        assert_eq!(snapshot, PositionSnapshot::empty());
    }

    #[tokio::test]
    async fn test_retries_transient_failures() {
        let ledger = Arc::new(SimulatedLedger::new());
        let owner = OwnerId::from("alice");
        ledger.open_position(&owner, PoolId(1), 777);
        ledger.fail_next_read(StateReadError::Unavailable("502".into()));
        ledger.fail_next_read(StateReadError::Timeout { seconds: 1 });

        let reader = PositionStateReader::new(ledger.clone(), policy(3));
        let snapshot = reader.read(&owner, PoolId(1)).await.unwrap();
        assert_eq!(snapshot.liquidity, 777);
        assert_eq!(ledger.read_count(), 3);
    }

    #[tokio::test]
    async fn test_retry_budget_exhausted() {
        let ledger = Arc::new(SimulatedLedger::new());
        let owner = OwnerId::from("alice");
        ledger.open_position(&owner, PoolId(1), 777);
        for _ in 0..3 {
            ledger.fail_next_read(StateReadError::Unavailable("down".into()));
        }

        let reader = PositionStateReader::new(ledger.clone(), policy(2));
        let result = reader.read(&owner, PoolId(1)).await;
        assert!(matches!(
            result,
            Err(StateReadError::RetriesExhausted { attempts: 2, .. })
        ));
        assert_eq!(ledger.read_count(), 2);
    }

    #[tokio::test]
    async fn test_malformed_data_is_not_retried() {
        let ledger = Arc::new(SimulatedLedger::new());
        ledger.fail_next_read(StateReadError::Malformed("liquidity 'abc'".into()));

        let reader = PositionStateReader::new(ledger.clone(), policy(3));
        let result = reader.read(&OwnerId::from("alice"), PoolId(1)).await;
        assert!(matches!(result, Err(StateReadError::Malformed(_))));
        assert_eq!(ledger.read_count(), 1);
    }

    #[tokio::test]
    async fn test_single_attempt_surfaces_raw_error() {
        let ledger = Arc::new(SimulatedLedger::new());
        ledger.fail_next_read(StateReadError::Unavailable("down".into()));

        let reader = PositionStateReader::new(ledger, ReadRetryPolicy::single(Duration::from_secs(1)));
        let result = reader.read(&OwnerId::from("alice"), PoolId(1)).await;
        assert_eq!(result, Err(StateReadError::Unavailable("down".into())));
    }
}
