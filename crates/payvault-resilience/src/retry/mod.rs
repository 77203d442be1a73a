//! Bounded exponential-backoff retry.

use payvault_core::{PaymentError, PaymentResult};
use std::time::Duration;
use tracing::debug;

/// Retry policy configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, the first one included.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    pub multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(30),
            multiplier: 2,
        }
    }
}

impl RetryPolicy {
    /// Creates a new retry policy with the specified max attempts.
    #[must_use]
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Default::default()
        }
    }

    /// Delay awaited before attempt number `attempt` (1-based).
    ///
    /// Attempt 1 starts immediately; attempt `n > 1` waits
    /// `base_delay * multiplier^(n-2)`, capped at `max_delay`.
    #[must_use]
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }

        let factor = self.multiplier.saturating_pow(attempt - 2);
        self.base_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    /// Runs `f` until it succeeds, fails with a non-retryable error, or the
    /// attempt budget is spent.
    ///
    /// `f` receives the 1-based attempt number. On success the value is
    /// returned with the number of attempts used. Non-retryable errors are
    /// returned unchanged; exhaustion wraps the last error as
    /// `Gateway { code: RETRY_EXHAUSTED }`.
    pub async fn execute<F, Fut, T>(&self, mut f: F) -> PaymentResult<(T, u32)>
    where
        F: FnMut(u32) -> Fut,
        Fut: std::future::Future<Output = PaymentResult<T>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match f(attempt).await {
                Ok(value) => return Ok((value, attempt)),
                Err(e) if !e.is_retryable() => {
                    debug!("Attempt {} failed permanently: {}", attempt, e);
                    return Err(e);
                }
                Err(e) if attempt >= max_attempts => {
                    debug!("Attempt {} failed, retry budget spent: {}", attempt, e);
                    return Err(PaymentError::retry_exhausted(attempt, e));
                }
                Err(e) => {
                    attempt += 1;
                    let delay = self.delay_before(attempt);
                    debug!("Attempt {} failed: {}; retrying in {:?}", attempt - 1, e, delay);
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
