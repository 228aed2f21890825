//! A monotonic microsecond clock.
//!
//! Every timeout in this crate is expressed in microseconds remaining,
//! never as a wall-clock deadline, so callers never have to reason about
//! clock adjustments. `now_micros` is the single source of truth for "now".

use std::time::Instant;

/// Returns a monotonic timestamp, in microseconds, with an arbitrary epoch.
///
/// Only differences between two calls are meaningful; never compare this
/// value across processes or against wall-clock time.
pub fn now_micros() -> u64 {
    // `Instant` has no stable epoch, so we anchor on first use and report
    // elapsed microseconds from there. A `u64` of microseconds overflows
    // after ~584,000 years, which is not a budget we need to plan for.
    use std::sync::OnceLock;

    static EPOCH: OnceLock<Instant> = OnceLock::new();
    let epoch = EPOCH.get_or_init(Instant::now);
    epoch.elapsed().as_micros() as u64
}

/// Computes the microseconds remaining until `deadline` (itself a
/// `now_micros()`-relative timestamp), saturating at zero.
///
/// A `deadline` of `0` is treated as "no deadline" (unbounded) by callers
/// that opt into that convention (see `conn::Transport::connect`); this
/// helper itself just does the subtraction.
pub fn remaining_micros(now: u64, deadline: u64) -> u64 {
    deadline.saturating_sub(now)
}
