//! Retry with exponential backoff for pool population
//!
//! Only connection failures are retried; every other error is returned
//! immediately.
//!
//! # Example
//!
//! ```ignore
//! use redpool_connection::retry::with_retry;
//!
//! let policy = RetryPolicy::new(3, 100, 5_000);
//! let factory = with_retry(&policy, |_attempt| connect()).await?;
//! ```

mod backoff;


use std::future::Future;

use redpool_core::{PoolError, Result, RetryPolicy};

use backoff::retry_delay;

/// Run `operation` until it succeeds, fails with something other than
/// `ConnectFailed`, or `policy.max_attempts` attempts have been made.
///
/// `operation` receives the zero-based attempt number.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, mut operation: F) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0u32;

    loop {
        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(e @ PoolError::ConnectFailed { .. }) if attempt + 1 < max_attempts => {
                let delay = retry_delay(policy, attempt);
                tracing::debug!(
                    attempt = attempt + 1,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "connect failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
