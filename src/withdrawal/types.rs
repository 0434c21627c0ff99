use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::time::Duration;

use crate::config::WithdrawalConfig;
use crate::errors::ControllerError;
use crate::ledger::types::{Liquidity, OwnerId, PoolId, TokenId};

use super::percentage::target_for_percentage;

/// What a run is trying to reach
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WithdrawalGoal {
    /// Drive liquidity to at or below this value
    Target(Liquidity),
    /// Remove this percentage of the liquidity observed at the first read
    Percentage(u8),
    /// Remove everything (target zero)
    FullExit,
}

impl WithdrawalGoal {
    /// Convergence target given the first observed liquidity
    pub fn resolve(&self, initial_liquidity: Liquidity) -> Liquidity {
        match *self {
            WithdrawalGoal::Target(target) => target,
            WithdrawalGoal::Percentage(percentage) => {
                target_for_percentage(initial_liquidity, percentage)
            }
            WithdrawalGoal::FullExit => 0,
        }
    }
}

impl fmt::Display for WithdrawalGoal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WithdrawalGoal::Target(target) => write!(f, "target {}", target),
            WithdrawalGoal::Percentage(pct) => write!(f, "remove {}%", pct),
            WithdrawalGoal::FullExit => write!(f, "full exit"),
        }
    }
}

/// Stopping policy and per-instruction limits for one run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopLimits {
    pub max_slippage_bps: u16,
    pub gas_floor: Liquidity,
    pub max_iterations: u32,
    pub deadline: Option<Duration>,
}

impl LoopLimits {
    pub fn from_config(config: &WithdrawalConfig) -> Self {
        Self {
            max_slippage_bps: config.max_slippage_bps,
            gas_floor: Liquidity::from(config.gas_floor),
            max_iterations: config.max_iterations,
            deadline: (config.deadline_secs > 0).then(|| Duration::from_secs(config.deadline_secs)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecreaseRequest {
    pub pool: PoolId,
    pub owner: OwnerId,
    pub goal: WithdrawalGoal,
    pub limits: LoopLimits,
}

impl DecreaseRequest {
    pub fn new(pool: PoolId, owner: OwnerId, goal: WithdrawalGoal, limits: LoopLimits) -> Self {
        Self {
            pool,
            owner,
            goal,
            limits,
        }
    }

    /// Reject requests that could never produce a valid instruction
    pub fn validate(&self) -> Result<(), ControllerError> {
        if self.limits.max_slippage_bps > 10_000 {
            return Err(ControllerError::InvalidRequest(format!(
                "max slippage {} bps exceeds 10000",
                self.limits.max_slippage_bps
            )));
        }
        if let WithdrawalGoal::Percentage(pct) = self.goal {
            if !(1..=100).contains(&pct) {
                return Err(ControllerError::InvalidRequest(format!(
                    "percentage {} outside 1..=100",
                    pct
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Termination {
    /// Remaining liquidity is at or below the target
    Converged,
    /// Above the target but at or below the gas floor
    FloorReached,
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::Converged => write!(f, "Converged"),
            Termination::FloorReached => write!(f, "FloorReached"),
        }
    }
}

/// Finalized result of one withdrawal instruction
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfirmedOutcome {
    pub tx_id: String,
    pub block_number: u64,
    pub percentage: u8,
    pub confirmed_at: DateTime<Utc>,
}

/// Result of a successful run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecreaseOutcome {
    pub final_liquidity: Liquidity,
    pub target_liquidity: Liquidity,
    pub iterations_used: u32,
    pub outcome: Termination,
    pub token_id: Option<TokenId>,
    /// Liquidity seen at every read, in order (first entry is the initial read)
    pub observations: Vec<Liquidity>,
    /// Every confirmed instruction, in order
    pub receipts: Vec<ConfirmedOutcome>,
}

impl DecreaseOutcome {
    pub fn initial_liquidity(&self) -> Liquidity {
        self.observations.first().copied().unwrap_or(self.final_liquidity)
    }

    pub fn liquidity_removed(&self) -> Liquidity {
        self.initial_liquidity().saturating_sub(self.final_liquidity)
    }

    pub fn last_receipt(&self) -> Option<&ConfirmedOutcome> {
        self.receipts.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> LoopLimits {
        LoopLimits {
            max_slippage_bps: 50,
            gas_floor: 5,
            max_iterations: 10,
            deadline: None,
        }
    }

    #[test]
    fn test_goal_resolution() {
        assert_eq!(WithdrawalGoal::Target(500).resolve(1000), 500);
        assert_eq!(WithdrawalGoal::Percentage(30).resolve(1000), 700);
        assert_eq!(WithdrawalGoal::FullExit.resolve(1000), 0);
    }

    #[test]
    fn test_request_validation() {
        let ok = DecreaseRequest::new(PoolId(1), "a".into(), WithdrawalGoal::FullExit, limits());
        assert!(ok.validate().is_ok());

        let bad_pct = DecreaseRequest::new(PoolId(1), "a".into(), WithdrawalGoal::Percentage(0), limits());
        assert!(matches!(bad_pct.validate(), Err(ControllerError::InvalidRequest(_))));

        let mut bad_slip = ok.clone();
        bad_slip.limits.max_slippage_bps = 10_001;
        assert!(bad_slip.validate().is_err());
    }

    #[test]
    fn test_limits_from_config() {
        let mut config = WithdrawalConfig::default();
        assert_eq!(LoopLimits::from_config(&config).deadline, None);
        config.deadline_secs = 90;
        let limits = LoopLimits::from_config(&config);
        assert_eq!(limits.deadline, Some(Duration::from_secs(90)));
        assert_eq!(limits.gas_floor, 2_074_000);
    }
}
