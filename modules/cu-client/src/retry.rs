use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::{error, warn};
use typed_builder::TypedBuilder;

use crate::error::Result;

/// Exponential backoff for request submission.
///
/// The delay before retry `n` (0-based) is `base_delay * 2^n` plus a random
/// jitter in `[0, max_jitter]`, so concurrent callers do not retry in lockstep.
#[derive(Debug, Clone, TypedBuilder)]
pub struct RetryPolicy {
    #[builder(default = 5)]
    pub max_attempts: u32,
    #[builder(default = Duration::from_secs(1))]
    pub base_delay: Duration,
    #[builder(default = Duration::from_secs(1))]
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl RetryPolicy {
    /// No waiting between attempts.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            max_jitter: Duration::ZERO,
        }
    }

    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
            .saturating_add(self.jitter())
    }

    fn jitter(&self) -> Duration {
        let max_ms = self.max_jitter.as_millis() as u64;
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::rng().random_range(0..=max_ms))
    }
}

/// Run `op` until it succeeds, returns a non-retryable error, or
/// `max_attempts` is exhausted. The last error is returned unchanged.
pub async fn retry_with_backoff<T, F, Fut>(policy: &RetryPolicy, label: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_retryable() => return Err(e),
            Err(e) if attempt + 1 < max_attempts => {
                let delay = policy.backoff(attempt);
                warn!(
                    label,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Request failed, retrying after backoff"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                error!(label, attempts = max_attempts, error = %e, "All attempts failed");
                return Err(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CuError;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn backoff_doubles_without_jitter() {
        let policy = RetryPolicy::builder()
            .base_delay(Duration::from_secs(1))
            .max_jitter(Duration::ZERO)
            .build();
        assert_eq!(policy.backoff(0), Duration::from_secs(1));
        assert_eq!(policy.backoff(1), Duration::from_secs(2));
        assert_eq!(policy.backoff(3), Duration::from_secs(8));
    }

    #[test]
    fn jitter_stays_within_bound() {
        let policy = RetryPolicy::default();
        for _ in 0..50 {
            let delay = policy.backoff(2);
            assert!(delay >= Duration::from_secs(4));
            assert!(delay <= Duration::from_secs(5));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result = retry_with_backoff(&RetryPolicy::default(), "test", || async {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err(CuError::Network("connection reset".into()))
            } else {
                Ok(n)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_attempts_with_last_error() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = retry_with_backoff(&RetryPolicy::default(), "test", || async {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            Err(CuError::Transport {
                status: 500,
                message: format!("attempt {n}"),
            })
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 5);
        match result {
            Err(CuError::Transport { message, .. }) => assert_eq!(message, "attempt 4"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn validation_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = retry_with_backoff(&RetryPolicy::default(), "test", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(CuError::Validation("bad".into()))
        })
        .await;

        assert!(matches!(result, Err(CuError::Validation(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
