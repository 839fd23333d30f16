//! Delay between population retries

use std::time::Duration;

use rand::Rng;
use redpool_core::RetryPolicy;

/// Delay before retry number `attempt` (0 = first retry).
///
/// The policy's initial backoff doubles with each attempt up to its maximum.
/// With jitter enabled the result is drawn from within 25% of that value so
/// that pools restarting together spread their reconnects.
pub(crate) fn retry_delay(policy: &RetryPolicy, attempt: u32) -> Duration {
    let initial = policy.initial_backoff_ms.max(1);
    let cap = policy.max_backoff_ms.max(initial);
    let base = initial
        .saturating_mul(2u64.saturating_pow(attempt))
        .min(cap);

    let spread = base / 4;
    let millis = if policy.jitter && spread > 0 {
        rand::thread_rng().gen_range(base - spread..=base.saturating_add(spread))
    } else {
        base
    };

    Duration::from_millis(millis)
}
