//! Liquidity withdrawal convergence
//!
//! ## Flow
//! 1. `PositionStateReader` reads the position (bounded retry on transient failures)
//! 2. `decide` compares remaining liquidity against target, gas floor and budget
//! 3. `WithdrawalExecutor` submits one percentage withdrawal and waits for finality
//! 4. Back to 1 until converged, at the floor, or failed
//!
//! ## Usage
//! ```ignore
//! let controller = ConvergenceController::new(reader, executor);
//! let outcome = controller
//!     .decrease_to_target(pool, &owner, 0, 50, 2_074_000, 10, &cancel)
//!     .await?;
//! ```

pub mod batch;
pub mod controller;
pub mod executor;
pub mod percentage;
pub mod reader;
pub mod types;

pub use controller::{decide, ConvergenceController, Decision};
pub use executor::WithdrawalExecutor;
pub use percentage::{target_for_percentage, withdrawal_percentage};
pub use reader::{PositionStateReader, ReadRetryPolicy};
pub use types::{
    ConfirmedOutcome, DecreaseOutcome, DecreaseRequest, LoopLimits, Termination, WithdrawalGoal,
};
