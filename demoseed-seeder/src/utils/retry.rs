//! Bounded retry for remote calls
//!
//! Submissions retry on a fixed cadence; generation calls back off
//! exponentially because the completion API rate-limits. Retries are
//! always local to one call and never span records.

use demoseed_common::Result;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Retry an operation up to `attempts` times with a fixed delay between
/// attempts. The final error is returned unchanged.
pub async fn retry_fixed<F, Fut, T>(
    operation_name: &str,
    attempts: u32,
    delay: Duration,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(operation = operation_name, attempt, "Operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) if attempt < attempts => {
                warn!(
                    operation = operation_name,
                    attempt,
                    error = %err,
                    "Operation failed, retrying after fixed delay"
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Retry with exponential backoff: the delay doubles per attempt, bounded
/// to `[min_delay, max_delay]`.
pub async fn retry_exponential<F, Fut, T>(
    operation_name: &str,
    attempts: u32,
    min_delay: Duration,
    max_delay: Duration,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    let mut delay = min_delay;
    loop {
        attempt += 1;
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(operation = operation_name, attempt, "Operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) if attempt < attempts => {
                warn!(
                    operation = operation_name,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Operation failed, backing off"
                );
                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(max_delay);
            }
            Err(err) => return Err(err),
        }
    }
}
