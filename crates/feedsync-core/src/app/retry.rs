//! Retry policy: exponential backoff with jitter.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};

use crate::domain::ReplayRequest;
use crate::error::TransportError;
use crate::ports::ReplayTransport;

/// Retry policy shared by the network replay step and the worker.
///
/// The delay before retry attempt `n` (0-indexed) is
/// `base_delay * 2^n + random(0, max_jitter)`.
///
/// Example with base_delay=1s, max_jitter=1s:
/// - after attempt 0 fails: 1s..2s
/// - after attempt 1 fails: 2s..3s
/// - after attempt 2 fails: 4s..5s
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt. Total calls are at most `max_retries + 1`.
    pub max_retries: u32,

    /// Base delay for the first retry.
    pub base_delay: Duration,

    /// Upper bound (exclusive) of the random jitter added to every delay.
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
            max_jitter: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration, max_jitter: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_jitter,
        }
    }

    /// Deterministic part of the delay: `base_delay * 2^attempt` (saturating).
    pub fn backoff(&self, attempt: u32) -> Duration {
        match 2u32.checked_pow(attempt) {
            Some(factor) => self.base_delay.saturating_mul(factor),
            None => Duration::MAX,
        }
    }

    /// Full delay before retry `attempt`, jitter included.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff(attempt).saturating_add(self.jitter())
    }

    fn jitter(&self) -> Duration {
        let max_ms = self.max_jitter.as_millis() as u64;
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..max_ms))
    }
}

/// Run `op` until it succeeds or `max_retries` retries are spent.
///
/// The first attempt runs immediately. The last error is returned on
/// exhaustion; the caller decides what happens to the work item.
/// There is no cancellation: once started, the sequence runs to the end.
pub async fn retry_with_backoff<T, E, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut attempt: u32 = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt >= policy.max_retries => {
                warn!(attempt, error = %err, "retries exhausted");
                return Err(err);
            }
            Err(err) => {
                let delay = policy.delay_for(attempt);
                debug!(attempt, delay_ms = delay.as_millis() as u64, error = %err, "attempt failed, backing off");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// HTTP-specific variant: replays `request`, treating non-2xx as retryable.
pub async fn fetch_with_retry(
    policy: &RetryPolicy,
    transport: &dyn ReplayTransport,
    request: &ReplayRequest,
) -> Result<u16, TransportError> {
    retry_with_backoff(policy, move || transport.send(request)).await
}
