//! Retry-with-exponential-backoff wrapper shared by every transport's
//! fallible unary operations.

use anyhow::Result;
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub backoff_multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay_ms: 1000,
            backoff_multiplier: 2,
        }
    }
}

/// Runs `op` up to `policy.max_retries + 1` times, sleeping
/// `retry_delay · backoff_multiplier^attempt` between attempts. Returns the
/// last error if every attempt fails.
pub async fn with_retry<T, F, Fut>(policy: RetryPolicy, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                if attempt >= policy.max_retries {
                    tracing::warn!(attempts = attempt + 1, error = %e, "retry budget exhausted");
                    return Err(e);
                }
                let delay = policy.retry_delay_ms
                    * (policy.backoff_multiplier as u64).pow(attempt);
                tracing::debug!(attempt, delay_ms = delay, error = %e, "retrying after transient failure");
                tokio::time::sleep(Duration::from_millis(delay)).await;
                attempt += 1;
            }
        }
    }
}
