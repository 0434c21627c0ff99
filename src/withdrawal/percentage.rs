//! Percentage arithmetic for withdrawal instructions
//!
//! The protocol only accepts whole percentages of *current* liquidity. The
//! controller asks for `ceil(needed * 100 / remaining)` so a request can only
//! overshoot the target, never stop short of it. All math is exact integer
//! arithmetic on `u128` and never overflows.

use crate::ledger::types::Liquidity;

/// Shift applied to both operands when `needed * 100` does not fit in u128
const RESCALE_BITS: u32 = 7;

/// Percentage to request so that `remaining` reaches `target`.
///
/// Returns `None` when `remaining <= target` (nothing to withdraw). Otherwise
/// the result is `ceil((remaining - target) * 100 / remaining)` clamped to
/// `1..=100`.
pub fn withdrawal_percentage(remaining: Liquidity, target: Liquidity) -> Option<u8> {
    if remaining <= target {
        return None;
    }
    let needed = remaining - target;

    let raw = match needed.checked_mul(100) {
        Some(scaled) => ceil_div(scaled, remaining),
        None => {
            // Round the numerator up and the denominator down so the rescaled
            // quotient stays >= the exact ceiling.
            let needed_scaled = ceil_div(needed, 1 << RESCALE_BITS);
            let remaining_scaled = remaining >> RESCALE_BITS;
            ceil_div(needed_scaled * 100, remaining_scaled)
        }
    };

    Some(raw.clamp(1, 100) as u8)
}

/// Liquidity left after removing exactly `percentage`% (floored removal)
pub fn target_for_percentage(liquidity: Liquidity, percentage: u8) -> Liquidity {
    let percentage = percentage.min(100) as Liquidity;
    liquidity - mul_div_floor(liquidity, percentage, 100)
}

/// `floor(value * numerator / denominator)` for `numerator <= denominator`.
///
/// Splitting `value` into quotient and remainder keeps every intermediate
/// product below `value`.
pub fn mul_div_floor(value: Liquidity, numerator: Liquidity, denominator: Liquidity) -> Liquidity {
    debug_assert!(denominator > 0 && numerator <= denominator);
    let whole = value / denominator;
    let rest = value % denominator;
    whole * numerator + rest * numerator / denominator
}

fn ceil_div(numerator: Liquidity, denominator: Liquidity) -> Liquidity {
    numerator / denominator + Liquidity::from(numerator % denominator != 0)
}
