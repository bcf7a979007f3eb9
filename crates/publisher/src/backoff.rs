//! Publish retry backoff
//!
//! Exponential in the row's retry count, capped, with full jitter over the
//! upper half of the window so publisher replicas retrying the same burst do
//! not stampede the broker together.

use std::time::Duration;

use rand::Rng;

/// Delay before the next publish attempt for a row that has failed
/// `retries` times already.
pub fn next_attempt_delay(
    retries: i32,
    base: Duration,
    cap: Duration,
    rng: &mut impl Rng,
) -> Duration {
    let exp = exponential(retries, base, cap);
    let exp_ms = exp.as_millis() as u64;
    if exp_ms == 0 {
        return Duration::ZERO;
    }

    let half = exp_ms / 2;
    Duration::from_millis(rng.random_range(half..=exp_ms))
}

/// The undithered exponential window: `base * 2^(retries + 1)`, capped.
fn exponential(retries: i32, base: Duration, cap: Duration) -> Duration {
    let shift = (retries.max(0) as u32 + 1).min(20);
    let ms = (base.as_millis() as u64).saturating_mul(1u64 << shift);
    Duration::from_millis(ms).min(cap)
}
