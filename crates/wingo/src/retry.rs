// Retry-with-backoff shared by every upstream call.
//
// The first attempt runs immediately; each further attempt waits an
// exponentially growing, capped interval. Sleeps never hold a lock.

use crate::FetchError;
use rand::RngExt;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Configuration for retry behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    #[serde(with = "crate::config::duration_millis")]
    pub initial_interval: Duration,
    /// Growth factor applied to the delay after every retry.
    pub multiplier: f64,
    /// Hard cap on a single delay.
    #[serde(with = "crate::config::duration_millis")]
    pub max_interval: Duration,
    /// When true, adds random jitter of [0, interval/2) to spread retries of
    /// concurrent workers hitting the same failing host.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            initial_interval: Duration::from_secs(5),
            multiplier: 1.5,
            max_interval: Duration::from_secs(60),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// A policy without delays, for tests and local endpoints.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_interval: Duration::ZERO,
            multiplier: 1.0,
            max_interval: Duration::ZERO,
            jitter: false,
        }
    }

    /// Delay to wait before retry number `retry` (0-indexed: 0 is the wait
    /// between the first and the second attempt).
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
        let factor = self.multiplier.max(1.0).powi(exponent);
        let base_secs = self.initial_interval.as_secs_f64() * factor;
        let max_secs = self.max_interval.as_secs_f64();

        let capped = if base_secs.is_finite() {
            Duration::from_secs_f64(base_secs.min(max_secs))
        } else {
            self.max_interval
        };

        if !self.jitter {
            return capped;
        }

        let jitter_range_ms = u64::try_from(capped.as_millis()).unwrap_or(u64::MAX) / 2;
        let remaining_ms =
            u64::try_from(self.max_interval.saturating_sub(capped).as_millis()).unwrap_or(0);
        let jitter_limit_ms = jitter_range_ms.min(remaining_ms);
        if jitter_limit_ms == 0 {
            return capped;
        }

        let jitter_ms = rand::rng().random_range(0..jitter_limit_ms);
        (capped + Duration::from_millis(jitter_ms)).min(self.max_interval)
    }

    /// Worst-case time spent sleeping across one exhausted retry budget.
    pub fn total_backoff(&self) -> Duration {
        (0..self.max_attempts.saturating_sub(1))
            .map(|retry| {
                let mut policy = self.clone();
                policy.jitter = false;
                policy.delay_for_retry(retry)
            })
            .sum()
    }
}

/// Result of a single attempt, used by the caller to signal retryability.
pub enum RetryAction<T> {
    /// Operation succeeded.
    Success(T),
    /// Operation failed with a retryable error (transport, non-OK status).
    Retry(FetchError),
    /// Operation failed with a non-retryable error.
    Fail(FetchError),
}

/// Execute an async operation with retry-and-backoff.
///
/// The `operation` closure receives the current attempt number (0-indexed).
/// On the last attempt a retryable failure is surfaced instead of retried.
pub async fn retry_with_backoff<F, Fut, T>(
    policy: &RetryPolicy,
    token: &CancellationToken,
    operation: F,
) -> Result<T, FetchError>
where
    F: Fn(u32) -> Fut,
    Fut: Future<Output = RetryAction<T>>,
{
    let attempts = policy.max_attempts.max(1);

    for attempt in 0..attempts {
        if token.is_cancelled() {
            return Err(FetchError::Cancelled);
        }

        match operation(attempt).await {
            RetryAction::Success(value) => return Ok(value),
            RetryAction::Fail(err) => return Err(err),
            RetryAction::Retry(err) => {
                if attempt + 1 >= attempts {
                    return Err(err);
                }
                let delay = policy.delay_for_retry(attempt);
                warn!(
                    attempt = attempt + 1,
                    max = attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Backoff retry"
                );
                tokio::select! {
                    _ = token.cancelled() => {
                        return Err(FetchError::Cancelled);
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }
    }

    Err(FetchError::Cancelled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::{Method, StatusCode};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn server_error() -> FetchError {
        FetchError::upstream_status(
            StatusCode::INTERNAL_SERVER_ERROR,
            Method::GET,
            "http://localhost/",
        )
    }

    #[test]
    fn delay_grows_by_multiplier_and_respects_cap() {
        let policy = RetryPolicy {
            max_attempts: 10,
            initial_interval: Duration::from_millis(100),
            multiplier: 2.0,
            max_interval: Duration::from_millis(500),
            jitter: false,
        };
        assert_eq!(policy.delay_for_retry(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for_retry(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for_retry(2), Duration::from_millis(400));
        assert_eq!(policy.delay_for_retry(3), Duration::from_millis(500));
        assert_eq!(policy.delay_for_retry(40), Duration::from_millis(500));
    }

    #[test]
    fn delay_with_jitter_does_not_exceed_max_cap() {
        let policy = RetryPolicy {
            max_attempts: 3,
            initial_interval: Duration::from_millis(500),
            multiplier: 1.5,
            max_interval: Duration::from_secs(1),
            jitter: true,
        };

        for _ in 0..32 {
            let delay = policy.delay_for_retry(10);
            assert!(delay <= Duration::from_secs(1));
        }
    }

    #[test]
    fn total_backoff_sums_every_wait_between_attempts() {
        let policy = RetryPolicy {
            max_attempts: 3,
            initial_interval: Duration::from_millis(10),
            multiplier: 2.0,
            max_interval: Duration::from_secs(1),
            jitter: true,
        };
        assert_eq!(policy.total_backoff(), Duration::from_millis(30));
    }

    #[tokio::test]
    async fn retry_succeeds_on_first_attempt() {
        let token = CancellationToken::new();
        let result = retry_with_backoff(&RetryPolicy::immediate(3), &token, |_| async {
            RetryAction::Success(42u32)
        })
        .await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn retry_fails_immediately_on_non_retryable() {
        let token = CancellationToken::new();
        let attempts = AtomicU32::new(0);
        let result: Result<u32, _> =
            retry_with_backoff(&RetryPolicy::immediate(5), &token, |_| {
                attempts.fetch_add(1, Ordering::Relaxed);
                async {
                    RetryAction::Fail(FetchError::request_build("http://x", "bad header"))
                }
            })
            .await;
        assert!(matches!(result, Err(FetchError::RequestBuild { .. })));
        assert_eq!(attempts.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn retry_exhausts_after_max_attempts() {
        let token = CancellationToken::new();
        let attempts = AtomicU32::new(0);
        let result: Result<u32, _> =
            retry_with_backoff(&RetryPolicy::immediate(3), &token, |_| {
                attempts.fetch_add(1, Ordering::Relaxed);
                async { RetryAction::Retry(server_error()) }
            })
            .await;
        assert!(matches!(result, Err(FetchError::UpstreamStatus { .. })));
        assert_eq!(attempts.load(Ordering::Relaxed), 3);
    }

    #[tokio::test]
    async fn retry_succeeds_on_second_attempt() {
        let token = CancellationToken::new();
        let attempts = AtomicU32::new(0);
        let result = retry_with_backoff(&RetryPolicy::immediate(3), &token, |attempt| {
            attempts.fetch_add(1, Ordering::Relaxed);
            async move {
                if attempt == 0 {
                    RetryAction::Retry(server_error())
                } else {
                    RetryAction::Success(99u32)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 99);
        assert_eq!(attempts.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn cancellation_interrupts_backoff_sleep() {
        let policy = RetryPolicy {
            max_attempts: 10,
            initial_interval: Duration::from_secs(100),
            multiplier: 1.0,
            max_interval: Duration::from_secs(100),
            jitter: false,
        };
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let result: Result<u32, _> = retry_with_backoff(&policy, &token, |_| async {
            RetryAction::Retry(server_error())
        })
        .await;
        assert!(matches!(result, Err(FetchError::Cancelled)));
    }
}
