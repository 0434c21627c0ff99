/// Error taxonomy for liquidity withdrawal runs
///
/// Three layers:
/// - `StateReadError` - the position read collaborator failed
/// - `ExecutionError` - a single withdrawal instruction failed at the ledger
/// - `ControllerError` - a whole convergence run aborted, carrying how far it got
///
/// Partial progress is never rolled back. Every `ControllerError` carries the
/// iteration count and the last observed liquidity so callers can decide how to
/// re-query before retrying.
use thiserror::Error;

use crate::ledger::types::{Liquidity, OwnerId, PoolId};

// =============================================================================
// STATE READ ERRORS
// =============================================================================

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateReadError {
    #[error("Ledger unavailable: {0}")]
    Unavailable(String),

    #[error("Position read timed out after {seconds} seconds")]
    Timeout { seconds: u64 },

    #[error("Malformed position data: {0}")]
    Malformed(String),

    #[error("Position read failed after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },
}

impl StateReadError {
    /// Whether a bounded retry may succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StateReadError::Unavailable(_) | StateReadError::Timeout { .. }
        )
    }
}

// =============================================================================
// EXECUTION ERRORS
// =============================================================================

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("No position for owner {owner} in pool {pool}")]
    PositionNotFound { owner: OwnerId, pool: PoolId },

    #[error("Slippage exceeded (limit {max_slippage_bps} bps): {detail}")]
    SlippageExceeded { max_slippage_bps: u16, detail: String },

    #[error("Withdrawal reverted: {reason}")]
    Reverted { reason: String },

    #[error("No confirmation after {seconds} seconds")]
    ConfirmationTimeout { seconds: u64 },

    #[error("Invalid withdrawal percentage {0} (expected 1..=100)")]
    InvalidPercentage(u8),

    #[error("Signer error: {0}")]
    Signer(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

impl ExecutionError {
    /// Whether the instruction may have reached the ledger despite the error
    pub fn may_have_landed(&self) -> bool {
        matches!(
            self,
            ExecutionError::ConfirmationTimeout { .. } | ExecutionError::Transport(_)
        )
    }
}

// =============================================================================
// CONTROLLER ERRORS
// =============================================================================

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConvergenceFailure {
    #[error("iteration budget of {max_iterations} exhausted")]
    IterationsExhausted { max_iterations: u32 },

    #[error("liquidity increased from {previous} to {observed} between reads")]
    LiquidityIncreased {
        previous: Liquidity,
        observed: Liquidity,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    Token,
    Deadline,
}

impl std::fmt::Display for CancelReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CancelReason::Token => write!(f, "cancellation requested"),
            CancelReason::Deadline => write!(f, "deadline reached"),
        }
    }
}

fn describe_remaining(remaining: &Option<Liquidity>) -> String {
    match remaining {
        Some(value) => value.to_string(),
        None => "unknown".to_string(),
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ControllerError {
    #[error("Execution failed after {iterations_used} iterations (remaining {remaining}): {source}")]
    Execution {
        source: ExecutionError,
        iterations_used: u32,
        remaining: Liquidity,
    },

    #[error("Convergence failed after {iterations_used} iterations (remaining {remaining}): {reason}")]
    Convergence {
        reason: ConvergenceFailure,
        iterations_used: u32,
        remaining: Liquidity,
    },

    #[error("State read failed after {iterations_used} iterations: {source}")]
    StateRead {
        source: StateReadError,
        iterations_used: u32,
        last_remaining: Option<Liquidity>,
    },

    #[error(
        "Cancelled ({reason}) after {iterations_used} iterations, last remaining {}",
        describe_remaining(last_remaining)
    )]
    Cancelled {
        reason: CancelReason,
        iterations_used: u32,
        last_remaining: Option<Liquidity>,
        instruction_in_flight: bool,
    },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ControllerError {
    pub fn iterations_used(&self) -> u32 {
        match self {
            ControllerError::Execution { iterations_used, .. }
            | ControllerError::Convergence { iterations_used, .. }
            | ControllerError::StateRead { iterations_used, .. }
            | ControllerError::Cancelled { iterations_used, .. } => *iterations_used,
            ControllerError::InvalidRequest(_) => 0,
        }
    }

    /// Last liquidity the run observed before failing
    pub fn last_remaining(&self) -> Option<Liquidity> {
        match self {
            ControllerError::Execution { remaining, .. }
            | ControllerError::Convergence { remaining, .. } => Some(*remaining),
            ControllerError::StateRead { last_remaining, .. }
            | ControllerError::Cancelled { last_remaining, .. } => *last_remaining,
            ControllerError::InvalidRequest(_) => None,
        }
    }

    /// Whether the ledger may differ from anything this run observed.
    ///
    /// True once an instruction was confirmed or may be in flight; the caller
    /// must re-read the position before deciding on a follow-up.
    pub fn may_have_progressed(&self) -> bool {
        match self {
            ControllerError::Execution { source, iterations_used, .. } => {
                *iterations_used > 0 || source.may_have_landed()
            }
            ControllerError::Cancelled {
                iterations_used,
                instruction_in_flight,
                ..
            } => *iterations_used > 0 || *instruction_in_flight,
            ControllerError::Convergence { iterations_used, .. }
            | ControllerError::StateRead { iterations_used, .. } => *iterations_used > 0,
            ControllerError::InvalidRequest(_) => false,
        }
    }
}

// =============================================================================
// CONFIGURATION ERRORS
// =============================================================================

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_read_errors() {
        assert!(StateReadError::Unavailable("503".into()).is_transient());
        assert!(StateReadError::Timeout { seconds: 5 }.is_transient());
        assert!(!StateReadError::Malformed("bad".into()).is_transient());
    }

    #[test]
    fn test_progress_flags() {
        let untouched = ControllerError::Execution {
            source: ExecutionError::SlippageExceeded {
                max_slippage_bps: 50,
                detail: "Price slippage check".into(),
            },
            iterations_used: 0,
            remaining: 1000,
        };
        assert!(!untouched.may_have_progressed());
        assert_eq!(untouched.last_remaining(), Some(1000));

        let timed_out = ControllerError::Execution {
            source: ExecutionError::ConfirmationTimeout { seconds: 60 },
            iterations_used: 0,
            remaining: 1000,
        };
        assert!(timed_out.may_have_progressed());

        let cancelled = ControllerError::Cancelled {
            reason: CancelReason::Token,
            iterations_used: 0,
            last_remaining: None,
            instruction_in_flight: true,
        };
        assert!(cancelled.may_have_progressed());
        assert!(cancelled.to_string().contains("unknown"));
    }
}
