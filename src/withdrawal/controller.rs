/// Convergence loop: measure, decide, execute, repeat
///
/// The protocol only accepts percentages of current liquidity and may remove
/// less than asked, so one instruction rarely lands exactly on the target.
/// The controller re-reads after every confirmed withdrawal and issues the
/// next percentage from the fresh observation until the position is at or
/// below the target, at or below the gas floor, or the iteration budget runs
/// out.
///
/// One run owns one (owner, pool) position and never has more than one
/// instruction in flight. Partial progress is never rolled back.
use std::future::Future;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::executor::WithdrawalExecutor;
use super::percentage::withdrawal_percentage;
use super::reader::PositionStateReader;
use super::types::{
    DecreaseOutcome, DecreaseRequest, LoopLimits, Termination, WithdrawalGoal,
};
use crate::errors::{CancelReason, ControllerError, ConvergenceFailure};
use crate::ledger::types::{Liquidity, OwnerId, PoolId};
use crate::logger::{self, LogTag};

/// What the controller does after a measurement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Converged,
    FloorReached,
    /// Above target and floor with the iteration budget spent
    Exhausted,
    Withdraw { percentage: u8 },
}

/// Pure decision step. Checks run in order: target, gas floor, budget.
pub fn decide(
    remaining: Liquidity,
    target: Liquidity,
    gas_floor: Liquidity,
    iterations_used: u32,
    max_iterations: u32,
) -> Decision {
    if remaining <= target {
        return Decision::Converged;
    }
    if remaining <= gas_floor {
        return Decision::FloorReached;
    }
    if iterations_used >= max_iterations {
        return Decision::Exhausted;
    }
    match withdrawal_percentage(remaining, target) {
        Some(percentage) => Decision::Withdraw { percentage },
        None => Decision::Converged,
    }
}

/// Await `future` unless the token fires or the deadline passes first
async fn guarded<F: Future>(
    future: F,
    cancel: &CancellationToken,
    deadline: Option<Instant>,
) -> Result<F::Output, CancelReason> {
    let deadline_reached = async {
        match deadline {
            Some(at) => tokio::time::sleep_until(at).await,
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(CancelReason::Token),
        _ = deadline_reached => Err(CancelReason::Deadline),
        output = future => Ok(output),
    }
}

pub struct ConvergenceController {
    reader: PositionStateReader,
    executor: WithdrawalExecutor,
}

impl ConvergenceController {
    pub fn new(reader: PositionStateReader, executor: WithdrawalExecutor) -> Self {
        Self { reader, executor }
    }

    /// Drive the position to at or below `target`
    #[allow(clippy::too_many_arguments)]
    pub async fn decrease_to_target(
        &self,
        pool: PoolId,
        owner: &OwnerId,
        target: Liquidity,
        max_slippage_bps: u16,
        gas_floor: Liquidity,
        max_iterations: u32,
        cancel: &CancellationToken,
    ) -> Result<DecreaseOutcome, ControllerError> {
        let limits = LoopLimits {
            max_slippage_bps,
            gas_floor,
            max_iterations,
            deadline: None,
        };
        let request = DecreaseRequest::new(pool, owner.clone(), WithdrawalGoal::Target(target), limits);
        self.run(&request, cancel).await
    }

    /// Remove `percentage`% of the liquidity observed at the first read
    pub async fn decrease_by_percentage(
        &self,
        pool: PoolId,
        owner: &OwnerId,
        percentage: u8,
        limits: LoopLimits,
        cancel: &CancellationToken,
    ) -> Result<DecreaseOutcome, ControllerError> {
        let request = DecreaseRequest::new(
            pool,
            owner.clone(),
            WithdrawalGoal::Percentage(percentage),
            limits,
        );
        self.run(&request, cancel).await
    }

    /// Withdraw everything (target zero)
    pub async fn exit_position(
        &self,
        pool: PoolId,
        owner: &OwnerId,
        limits: LoopLimits,
        cancel: &CancellationToken,
    ) -> Result<DecreaseOutcome, ControllerError> {
        let request = DecreaseRequest::new(pool, owner.clone(), WithdrawalGoal::FullExit, limits);
        self.run(&request, cancel).await
    }

    pub async fn run(
        &self,
        request: &DecreaseRequest,
        cancel: &CancellationToken,
    ) -> Result<DecreaseOutcome, ControllerError> {
        request.validate()?;

        let pool = request.pool;
        let owner = &request.owner;
        let goal = request.goal;
        let limits = request.limits;
        let deadline = limits.deadline.map(|budget| Instant::now() + budget);

        logger::info(
            LogTag::Controller,
            &format!(
                "🎯 Starting withdrawal for {} pool {}: {} (floor {}, max {} iterations)",
                owner, pool, goal, limits.gas_floor, limits.max_iterations
            ),
        );

        let mut observations: Vec<Liquidity> = Vec::new();
        let mut receipts = Vec::new();
        let mut iterations_used: u32 = 0;
        let mut target: Option<Liquidity> = None;
        let mut token_id = None;

        loop {
            // Measuring
            let snapshot = match guarded(self.reader.read(owner, pool), cancel, deadline).await {
                Ok(Ok(snapshot)) => snapshot,
                Ok(Err(source)) => {
                    logger::error(
                        LogTag::Controller,
                        &format!("❌ Position read failed for {} pool {}: {}", owner, pool, source),
                    );
                    return Err(ControllerError::StateRead {
                        source,
                        iterations_used,
                        last_remaining: observations.last().copied(),
                    });
                }
                Err(reason) => {
                    return Err(cancelled(reason, iterations_used, &observations, false));
                }
            };
            let remaining = snapshot.liquidity;

            if let Some(&previous) = observations.last() {
                if remaining > previous {
                    logger::error(
                        LogTag::Controller,
                        &format!(
                            "📈 Liquidity of {} pool {} grew from {} to {} during withdrawal",
                            owner, pool, previous, remaining
                        ),
                    );
                    return Err(ControllerError::Convergence {
                        reason: ConvergenceFailure::LiquidityIncreased {
                            previous,
                            observed: remaining,
                        },
                        iterations_used,
                        remaining,
                    });
                }
                if remaining == previous {
                    logger::warning(
                        LogTag::Controller,
                        &format!(
                            "⚠️ Confirmed withdrawal left {} pool {} unchanged at {}",
                            owner, pool, remaining
                        ),
                    );
                }
            }
            observations.push(remaining);
            if snapshot.token_id.is_some() {
                token_id = snapshot.token_id;
            }
            let target = *target.get_or_insert_with(|| goal.resolve(remaining));

            // Deciding
            let decision = decide(
                remaining,
                target,
                limits.gas_floor,
                iterations_used,
                limits.max_iterations,
            );
            logger::debug(
                LogTag::Controller,
                &format!(
                    "remaining {} target {} iteration {} -> {:?}",
                    remaining, target, iterations_used, decision
                ),
            );

            let percentage = match decision {
                Decision::Converged | Decision::FloorReached => {
                    let outcome = if decision == Decision::Converged {
                        Termination::Converged
                    } else {
                        Termination::FloorReached
                    };
                    logger::info(
                        LogTag::Controller,
                        &format!(
                            "✅ {} pool {}: {} at {} after {} iterations",
                            owner, pool, outcome, remaining, iterations_used
                        ),
                    );
                    return Ok(DecreaseOutcome {
                        final_liquidity: remaining,
                        target_liquidity: target,
                        iterations_used,
                        outcome,
                        token_id,
                        observations,
                        receipts,
                    });
                }
                Decision::Exhausted => {
                    logger::error(
                        LogTag::Controller,
                        &format!(
                            "🛑 {} pool {} still at {} (target {}) after {} iterations",
                            owner, pool, remaining, target, iterations_used
                        ),
                    );
                    return Err(ControllerError::Convergence {
                        reason: ConvergenceFailure::IterationsExhausted {
                            max_iterations: limits.max_iterations,
                        },
                        iterations_used,
                        remaining,
                    });
                }
                Decision::Withdraw { percentage } => percentage,
            };

            // Executing
            let execution = self
                .executor
                .execute(owner, pool, percentage, limits.max_slippage_bps);
            match guarded(execution, cancel, deadline).await {
                Ok(Ok(receipt)) => {
                    iterations_used += 1;
                    receipts.push(receipt);
                }
                Ok(Err(source)) => {
                    return Err(ControllerError::Execution {
                        source,
                        iterations_used,
                        remaining,
                    });
                }
                Err(reason) => {
                    return Err(cancelled(reason, iterations_used, &observations, true));
                }
            }
        }
    }
}

fn cancelled(
    reason: CancelReason,
    iterations_used: u32,
    observations: &[Liquidity],
    instruction_in_flight: bool,
) -> ControllerError {
    logger::warning(
        LogTag::Controller,
        &format!(
            "🚫 Withdrawal run stopped: {} (instruction in flight: {})",
            reason, instruction_in_flight
        ),
    );
    ControllerError::Cancelled {
        reason,
        iterations_used,
        last_remaining: observations.last().copied(),
        instruction_in_flight,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ExecutionError;
    use crate::errors::StateReadError;
    use crate::ledger::SimulatedLedger;
    use crate::withdrawal::reader::ReadRetryPolicy;
    use proptest::prelude::*;
    use std::sync::Arc;
    use std::time::Duration;

    fn controller(ledger: &Arc<SimulatedLedger>) -> ConvergenceController {
        let reader = PositionStateReader::new(
            ledger.clone(),
            ReadRetryPolicy::single(Duration::from_secs(5)),
        );
        let executor =
            WithdrawalExecutor::new(ledger.clone(), ledger.clone(), Duration::from_secs(600));
        ConvergenceController::new(reader, executor)
    }

    fn limits(gas_floor: Liquidity, max_iterations: u32) -> LoopLimits {
        LoopLimits {
            max_slippage_bps: 50,
            gas_floor,
            max_iterations,
            deadline: None,
        }
    }

    fn setup(ledger: SimulatedLedger, liquidity: Liquidity) -> (Arc<SimulatedLedger>, OwnerId) {
        let ledger = Arc::new(ledger);
        let owner = OwnerId::from("0xowner");
        ledger.open_position(&owner, PoolId(7), liquidity);
        (ledger, owner)
    }

    #[test]
    fn test_decide_order() {
        assert_eq!(decide(500, 500, 1000, 0, 10), Decision::Converged);
        assert_eq!(decide(600, 500, 1000, 0, 10), Decision::FloorReached);
        assert_eq!(decide(600, 500, 5, 10, 10), Decision::Exhausted);
        assert_eq!(decide(1000, 0, 5, 0, 10), Decision::Withdraw { percentage: 100 });
        assert_eq!(decide(1000, 750, 5, 3, 10), Decision::Withdraw { percentage: 25 });
    }

    #[tokio::test]
    async fn test_full_exit_exact_protocol() {
        let (ledger, owner) = setup(SimulatedLedger::new(), 1000);
        let outcome = controller(&ledger)
            .decrease_to_target(PoolId(7), &owner, 0, 50, 5, 10, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.outcome, Termination::Converged);
        assert_eq!(outcome.final_liquidity, 0);
        assert_eq!(outcome.iterations_used, 1);
        assert_eq!(ledger.submissions()[0].percentage, 100);
        assert_eq!(outcome.observations, vec![1000, 0]);
        assert_eq!(outcome.receipts.len(), 1);
    }

    #[tokio::test]
    async fn test_half_target_exact_protocol() {
        let (ledger, owner) = setup(SimulatedLedger::new(), 1000);
        let outcome = controller(&ledger)
            .decrease_to_target(PoolId(7), &owner, 500, 50, 5, 10, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.outcome, Termination::Converged);
        assert_eq!(outcome.final_liquidity, 500);
        assert_eq!(outcome.iterations_used, 1);
        assert_eq!(ledger.submissions()[0].percentage, 50);
    }

    #[tokio::test]
    async fn test_under_execution_reaches_gas_floor() {
        let (ledger, owner) = setup(SimulatedLedger::new().with_efficiency_bps(9_000), 1000);
        let outcome = controller(&ledger)
            .decrease_to_target(PoolId(7), &owner, 0, 50, 5, 10, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.outcome, Termination::FloorReached);
        assert_eq!(outcome.observations, vec![1000, 100, 10, 1]);
        assert_eq!(outcome.iterations_used, 3);
        assert_eq!(outcome.liquidity_removed(), 999);
        assert!(ledger.submissions().iter().all(|s| s.percentage == 100));
    }

    #[tokio::test]
    async fn test_below_floor_issues_nothing() {
        let (ledger, owner) = setup(SimulatedLedger::new(), 3);
        let outcome = controller(&ledger)
            .decrease_to_target(PoolId(7), &owner, 0, 50, 5, 10, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.outcome, Termination::FloorReached);
        assert_eq!(outcome.final_liquidity, 3);
        assert_eq!(outcome.iterations_used, 0);
        assert!(ledger.submissions().is_empty());
    }

    #[tokio::test]
    async fn test_first_execution_failure_leaves_position_untouched() {
        let (ledger, owner) = setup(SimulatedLedger::new(), 1000);
        ledger.fail_next_execution(ExecutionError::SlippageExceeded {
            max_slippage_bps: 50,
            detail: "Price slippage check".to_string(),
        });

        let result = controller(&ledger)
            .decrease_to_target(PoolId(7), &owner, 0, 50, 5, 10, &CancellationToken::new())
            .await;

        match result {
            Err(ControllerError::Execution {
                source: ExecutionError::SlippageExceeded { .. },
                iterations_used,
                remaining,
            }) => {
                assert_eq!(iterations_used, 0);
                assert_eq!(remaining, 1000);
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(ledger.liquidity_of(&owner, PoolId(7)), 1000);
    }

    #[tokio::test]
    async fn test_already_at_target_is_converged() {
        let (ledger, owner) = setup(SimulatedLedger::new(), 400);
        let outcome = controller(&ledger)
            .decrease_to_target(PoolId(7), &owner, 500, 50, 0, 10, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome.outcome, Termination::Converged);
        assert_eq!(outcome.iterations_used, 0);
        assert!(outcome.last_receipt().is_none());
        assert!(ledger.submissions().is_empty());
    }

    #[tokio::test]
    async fn test_missing_position_is_converged_without_instructions() {
        let ledger = Arc::new(SimulatedLedger::new());
        let outcome = controller(&ledger)
            .exit_position(PoolId(1), &OwnerId::from("nobody"), limits(0, 10), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome.outcome, Termination::Converged);
        assert_eq!(outcome.token_id, None);
        assert!(ledger.submissions().is_empty());
    }

    #[tokio::test]
    async fn test_iteration_budget_exhausted() {
        let (ledger, owner) = setup(SimulatedLedger::new().with_efficiency_bps(9_000), 1000);
        let result = controller(&ledger)
            .exit_position(PoolId(7), &owner, limits(0, 3), &CancellationToken::new())
            .await;

        assert_eq!(
            result,
            Err(ControllerError::Convergence {
                reason: ConvergenceFailure::IterationsExhausted { max_iterations: 3 },
                iterations_used: 3,
                remaining: 1,
            })
        );
    }

    #[tokio::test]
    async fn test_zero_progress_counts_against_budget() {
        let (ledger, owner) = setup(SimulatedLedger::new().with_efficiency_bps(0), 1000);
        let result = controller(&ledger)
            .exit_position(PoolId(7), &owner, limits(5, 4), &CancellationToken::new())
            .await;

        assert!(matches!(
            result,
            Err(ControllerError::Convergence {
                reason: ConvergenceFailure::IterationsExhausted { .. },
                iterations_used: 4,
                remaining: 1000,
            })
        ));
        assert_eq!(ledger.submissions().len(), 4);
    }

    #[tokio::test]
    async fn test_liquidity_increase_aborts() {
        let (ledger, owner) = setup(SimulatedLedger::new().with_inflow_per_withdrawal(600), 1000);
        let result = controller(&ledger)
            .decrease_to_target(PoolId(7), &owner, 500, 50, 5, 10, &CancellationToken::new())
            .await;

        assert_eq!(
            result,
            Err(ControllerError::Convergence {
                reason: ConvergenceFailure::LiquidityIncreased {
                    previous: 1000,
                    observed: 1100,
                },
                iterations_used: 1,
                remaining: 1100,
            })
        );
    }

    #[tokio::test]
    async fn test_percentage_mode_resolves_target_once() {
        let (ledger, owner) = setup(SimulatedLedger::new().with_efficiency_bps(8_000), 1000);
        let outcome = controller(&ledger)
            .decrease_by_percentage(PoolId(7), &owner, 30, limits(5, 10), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.target_liquidity, 700);
        assert_eq!(outcome.outcome, Termination::Converged);
        assert!(outcome.final_liquidity <= 700);
        assert!(outcome.iterations_used >= 2);
    }

    #[tokio::test]
    async fn test_invalid_request_touches_nothing() {
        let (ledger, owner) = setup(SimulatedLedger::new(), 1000);
        let result = controller(&ledger)
            .decrease_by_percentage(PoolId(7), &owner, 150, limits(5, 10), &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(ControllerError::InvalidRequest(_))));
        assert_eq!(ledger.read_count(), 0);
    }

    #[tokio::test]
    async fn test_state_read_failure() {
        let (ledger, owner) = setup(SimulatedLedger::new(), 1000);
        ledger.fail_next_read(StateReadError::Malformed("liquidity".into()));

        let result = controller(&ledger)
            .exit_position(PoolId(7), &owner, limits(5, 10), &CancellationToken::new())
            .await;
        assert!(matches!(
            result,
            Err(ControllerError::StateRead {
                iterations_used: 0,
                last_remaining: None,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let (ledger, owner) = setup(SimulatedLedger::new(), 1000);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = controller(&ledger)
            .exit_position(PoolId(7), &owner, limits(5, 10), &cancel)
            .await;
        assert_eq!(
            result,
            Err(ControllerError::Cancelled {
                reason: CancelReason::Token,
                iterations_used: 0,
                last_remaining: None,
                instruction_in_flight: false,
            })
        );
        assert_eq!(ledger.read_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_confirmation_keeps_ledger_effect() {
        let (ledger, owner) = setup(
            SimulatedLedger::new().with_confirmation_latency(Duration::from_secs(60)),
            1000,
        );
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let result = controller(&ledger)
            .exit_position(PoolId(7), &owner, limits(5, 10), &cancel)
            .await;

        assert_eq!(
            result,
            Err(ControllerError::Cancelled {
                reason: CancelReason::Token,
                iterations_used: 0,
                last_remaining: Some(1000),
                instruction_in_flight: true,
            })
        );
        assert!(result.unwrap_err().may_have_progressed());
        // the submitted instruction was not rolled back
        assert_eq!(ledger.liquidity_of(&owner, PoolId(7)), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_stops_run() {
        let (ledger, owner) = setup(
            SimulatedLedger::new()
                .with_efficiency_bps(5_000)
                .with_confirmation_latency(Duration::from_secs(20)),
            1000,
        );
        let mut limits = limits(5, 10);
        limits.deadline = Some(Duration::from_secs(30));

        let result = controller(&ledger)
            .exit_position(PoolId(7), &owner, limits, &CancellationToken::new())
            .await;

        match result {
            Err(ControllerError::Cancelled {
                reason: CancelReason::Deadline,
                iterations_used,
                last_remaining,
                instruction_in_flight,
            }) => {
                assert_eq!(iterations_used, 1);
                assert_eq!(last_remaining, Some(500));
                assert!(instruction_in_flight);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    fn run_blocking(
        ledger: &Arc<SimulatedLedger>,
        owner: &OwnerId,
        target: Liquidity,
        gas_floor: Liquidity,
    ) -> Result<DecreaseOutcome, ControllerError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        runtime.block_on(controller(ledger).decrease_to_target(
            PoolId(7),
            owner,
            target,
            50,
            gas_floor,
            64,
            &CancellationToken::new(),
        ))
    }

    proptest! {
        #[test]
        fn prop_observations_monotonic_and_percentages_valid(
            initial in 1u128..1_000_000_000_000,
            target_permille in 0u128..1000,
            efficiency in 1u32..=10_000,
            gas_floor in 0u128..10_000,
        ) {
            let target = initial * target_permille / 1000;
            let (ledger, owner) = setup(SimulatedLedger::new().with_efficiency_bps(efficiency), initial);
            let result = run_blocking(&ledger, &owner, target, gas_floor);

            for submission in ledger.submissions() {
                prop_assert!((1..=100).contains(&submission.percentage));
            }
            for pair in ledger.submissions().windows(2) {
                prop_assert!(pair[1].liquidity_before <= pair[0].liquidity_before);
            }

            match result {
                Ok(outcome) => {
                    prop_assert!(outcome.observations.windows(2).all(|w| w[1] <= w[0]));
                    match outcome.outcome {
                        Termination::Converged => prop_assert!(outcome.final_liquidity <= target),
                        Termination::FloorReached => {
                            prop_assert!(outcome.final_liquidity <= gas_floor);
                            prop_assert!(outcome.final_liquidity > target);
                        }
                    }
                    if initial <= target {
                        prop_assert_eq!(outcome.iterations_used, 0);
                    }
                }
                Err(ControllerError::Convergence { reason, .. }) => {
                    prop_assert_eq!(reason, ConvergenceFailure::IterationsExhausted { max_iterations: 64 });
                }
                Err(other) => prop_assert!(false, "unexpected error {:?}", other),
            }
        }

        #[test]
        fn prop_exact_protocol_converges_in_one_instruction(
            initial in 1u128..u128::MAX,
            target_permille in 0u128..1000,
        ) {
            let target = initial / 1000 * target_permille;
            let (ledger, owner) = setup(SimulatedLedger::new(), initial);
            let outcome = run_blocking(&ledger, &owner, target, 0).unwrap();

            prop_assert_eq!(outcome.outcome, Termination::Converged);
            prop_assert!(outcome.iterations_used <= 1);
            prop_assert!(outcome.final_liquidity <= target);
        }
    }
}
