//! Monotonic clock used for recency scores.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::Instant;

static ORIGIN: OnceLock<Instant> = OnceLock::new();
static LAST_TICK: AtomicU64 = AtomicU64::new(0);

// == Monotonic Now ==
/// Returns nanoseconds since the first call in this process.
///
/// Successive calls always return strictly increasing values, so two touches
/// never share a recency score even when the platform clock is coarse.
pub fn monotonic_now() -> u64 {
    let elapsed = ORIGIN.get_or_init(Instant::now).elapsed().as_nanos() as u64;
    let mut last = LAST_TICK.load(Ordering::Relaxed);
    loop {
        let next = elapsed.max(last + 1);
        match LAST_TICK.compare_exchange_weak(last, next, Ordering::AcqRel, Ordering::Relaxed) {
            Ok(_) => return next,
            Err(actual) => last = actual,
        }
    }
}
