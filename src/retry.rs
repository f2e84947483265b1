//! Retry with exponential backoff for remote AI calls

use std::future::Future;
use std::time::Duration;

use crate::Result;

/// Retry policy for recognition and synthesis calls
///
/// Controls how many attempts a remote call gets and how long to wait
/// between them. The wait after attempt `n` (zero-based) is
/// `base_delay * multiplier^n`, capped at `max_delay`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first
    pub max_attempts: u32,
    /// Delay after the first failed attempt
    pub base_delay: Duration,
    /// Growth factor applied to the delay after each failure
    pub multiplier: u32,
    /// Maximum delay cap
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            multiplier: 2,
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Policy with the default attempt cap and the given base delay
    #[must_use]
    pub fn with_base_delay(base_delay: Duration) -> Self {
        Self {
            base_delay,
            ..Self::default()
        }
    }

    /// Compute the delay before the attempt following `attempt` (zero-based)
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(self.multiplier.saturating_pow(attempt))
            .min(self.max_delay)
    }
}

/// Run `op` until it succeeds or the policy's attempts are exhausted
///
/// Every failure is retried; after the last attempt the error from that
/// attempt is returned unchanged. No delay follows the final attempt.
///
/// # Errors
///
/// Returns the last attempt's error when every attempt fails
pub async fn retry<T, F, Fut>(policy: &RetryPolicy, operation: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                attempt += 1;
                tracing::warn!(
                    operation,
                    attempt,
                    max_attempts = attempts,
                    error = %e,
                    "remote call failed"
                );

                if attempt >= attempts {
                    return Err(e);
                }

                tokio::time::sleep(policy.delay_for_attempt(attempt - 1)).await;
            }
        }
    }
}
