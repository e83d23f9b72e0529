use rand::Rng;

use super::transport::Decision;
use crate::core::SimTime;

/// Chance, in percent, that a worker terminates on any given dispatch.
pub const TERMINATE_PERCENT: u32 = 15;

/// Bounds for the percentage of the allotment used on a partial run.
pub const PARTIAL_MIN_PERCENT: u64 = 1;
pub const PARTIAL_MAX_PERCENT: u64 = 99;

/// Exclusive upper bounds of a simulated I/O wait.
pub const BLOCK_MAX_COARSE: u64 = 3;
pub const BLOCK_MAX_FINE: u64 = 1_000;

/// Decide what a worker does with `allotment`.
///
/// Returns `None` for the stop directive, in which case the worker exits
/// without replying.
pub fn respond<R: Rng>(allotment: SimTime, rng: &mut R) -> Option<(Decision, SimTime)> {
    if allotment.is_zero() {
        return None;
    }

    if rng.random_range(0..100) < TERMINATE_PERCENT {
        return Some((Decision::Terminated, SimTime::ZERO));
    }

    let outcome = match rng.random_range(0..3) {
        0 => (Decision::Ready, allotment),
        1 => {
            let percent = rng.random_range(PARTIAL_MIN_PERCENT..=PARTIAL_MAX_PERCENT);
            let used = allotment.as_fine().saturating_mul(percent) / 100;
            (Decision::Ready, SimTime::from_fine(used))
        }
        _ => (
            Decision::Blocked,
            SimTime::new(
                rng.random_range(0..BLOCK_MAX_COARSE),
                rng.random_range(0..BLOCK_MAX_FINE),
            ),
        ),
    };
    Some(outcome)
}
