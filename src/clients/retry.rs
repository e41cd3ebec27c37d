//! Exponential backoff with jitter for catalog API calls.
//!
//! The delay before retry `k` (0-indexed) is `base * (2^k + U(0, 1))`; with the
//! default one second base this is `2^k` seconds plus up to one second of jitter.

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, error, warn};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt; total attempts are `max_retries + 1`.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub const fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            jitter: true,
        }
    }

    #[must_use]
    pub const fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Delay before retry `retry` (0-indexed).
    #[must_use]
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
        let mut factor = 2f64.powi(exponent);
        if self.jitter {
            factor += rand::rng().random_range(0.0..1.0);
        }
        self.base_delay.mul_f64(factor)
    }
}

/// Outcome bookkeeping for a retried operation.
#[derive(Debug, Clone, Default)]
pub struct RetryStats {
    pub attempts: u32,
    pub total_delay: Duration,
}

/// Runs `operation` until it succeeds, fails with a non-retryable error, or
/// the policy's attempts are used up. The last error is always returned.
pub async fn retry_async<F, Fut, T, E>(
    policy: &RetryPolicy,
    mut operation: F,
    is_retryable: impl Fn(&E) -> bool,
) -> (Result<T, E>, RetryStats)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut stats = RetryStats::default();
    let max_attempts = policy.max_attempts();

    loop {
        let attempt = stats.attempts;
        stats.attempts += 1;

        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    debug!(attempts = stats.attempts, "Catalog call succeeded after retry");
                }
                return (Ok(value), stats);
            }
            Err(e) if !is_retryable(&e) => {
                debug!(error = %e, "Catalog call failed with a non-retryable error");
                return (Err(e), stats);
            }
            Err(e) if stats.attempts >= max_attempts => {
                error!(
                    attempts = stats.attempts,
                    error = %e,
                    "Catalog call failed, retries exhausted"
                );
                return (Err(e), stats);
            }
            Err(e) => {
                let delay = policy.delay_for(attempt);
                stats.total_delay += delay;
                warn!(
                    attempt = stats.attempts,
                    max_attempts,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %e,
                    "Catalog call failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy() -> RetryPolicy {
        RetryPolicy::new(3, Duration::ZERO)
    }

    #[test]
    fn delays_double_without_jitter() {
        let policy = RetryPolicy::new(3, Duration::from_secs(1)).with_jitter(false);
        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
    }

    #[test]
    fn jitter_adds_at_most_one_base_unit() {
        let policy = RetryPolicy::new(3, Duration::from_secs(1));
        for _ in 0..50 {
            let delay = policy.delay_for(1);
            assert!(delay >= Duration::from_secs(2));
            assert!(delay < Duration::from_secs(3));
        }
    }

    #[tokio::test]
    async fn persistent_failure_makes_exactly_four_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let (result, stats) = retry_async(
            &fast_policy(),
            || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>("upstream unavailable".to_string())
                }
            },
            |_: &String| true,
        )
        .await;

        assert_eq!(result.unwrap_err(), "upstream unavailable");
        assert_eq!(stats.attempts, 4);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn recovers_after_transient_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let (result, stats) = retry_async(
            &fast_policy(),
            || {
                let counter = Arc::clone(&counter);
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err("flaky".to_string())
                    } else {
                        Ok(7)
                    }
                }
            },
            |_: &String| true,
        )
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(stats.attempts, 3);
    }

    #[tokio::test]
    async fn non_retryable_errors_stop_immediately() {
        let (result, stats) = retry_async(
            &fast_policy(),
            || async { Err::<(), _>("invalid request".to_string()) },
            |e: &String| !e.starts_with("invalid"),
        )
        .await;

        assert!(result.is_err());
        assert_eq!(stats.attempts, 1);
    }
}
