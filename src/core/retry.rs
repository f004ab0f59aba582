/*!
 * Retry logic with exponential backoff
 *
 * Every network call in the protocol clients goes through [`RetryPolicy::run`].
 * Only errors whose [`Retryable::is_retryable`] classification returns true are
 * retried; permanent rejections surface immediately.
 */

use std::future::Future;
use std::time::Duration;

use tracing::warn;

/// Classification hook for retry decisions
///
/// Implemented by the protocol error types so one policy can wrap both the
/// Swift and the S3 clients.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

/// Shared exponential-backoff retry policy
///
/// The two storage-client revisions this engine descends from disagreed on the
/// constants (3 vs 5 attempts, backoff factor 1 vs 2); the stricter values are
/// the defaults and everything stays configurable.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first (default: 3)
    pub max_attempts: u32,

    /// Delay before the first retry; doubles on each further retry
    pub backoff_base: Duration,

    /// Upper bound on a single backoff delay
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Policy with a custom attempt count and default backoff
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }

    /// Delay before retry `k` (1-based): `base * 2^(k-1)`, capped
    pub fn backoff_delay(&self, retry: u32) -> Duration {
        let factor = 2_u32.saturating_pow(retry.saturating_sub(1));
        self.backoff_base
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    /// Execute `operation` with retry on transient failures
    ///
    /// `operation` is re-invoked from the start on each attempt; callers must
    /// make attempts idempotent (re-reading the source range, re-sending the
    /// request). The last error is returned once attempts are exhausted.
    pub async fn run<T, E, F, Fut>(&self, what: &str, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + std::fmt::Display,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) if !err.is_retryable() => return Err(err),
                Err(err) if attempt >= max_attempts => return Err(err),
                Err(err) => {
                    let delay = self.backoff_delay(attempt);
                    warn!(
                        "{what} failed (attempt {attempt}/{max_attempts}), retrying in {:?}: {err}",
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

/// Operation timeout scaled to the expected payload size
///
/// Ten seconds per MiB with a five-minute floor, clamped to one hour. Large
/// uploads on slow links get room to finish; small requests still fail fast
/// enough to be retried.
pub fn operation_timeout(size_bytes: u64) -> Duration {
    const FLOOR_SECS: u64 = 300;
    const CEIL_SECS: u64 = 3600;
    let scaled = (size_bytes / (1024 * 1024)).saturating_mul(10);
    Duration::from_secs(scaled.max(FLOOR_SECS).min(CEIL_SECS))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug)]
    struct TestError {
        retryable: bool,
    }

    impl std::fmt::Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "test error (retryable: {})", self.retryable)
        }
    }

    impl Retryable for TestError {
        fn is_retryable(&self) -> bool {
            self.retryable
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            backoff_base: Duration::from_millis(1),
            max_backoff: Duration::from_millis(4),
        }
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 5,
            backoff_base: Duration::from_secs(1),
            max_backoff: Duration::from_secs(5),
        };
        assert_eq!(policy.backoff_delay(1), Duration::from_secs(1));
        assert_eq!(policy.backoff_delay(2), Duration::from_secs(2));
        assert_eq!(policy.backoff_delay(3), Duration::from_secs(4));
        // Capped by max_backoff
        assert_eq!(policy.backoff_delay(4), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_success_needs_one_attempt() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, TestError> = fast_policy()
            .run("op", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(42) }
            })
            .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_transient_errors_retry_until_exhausted() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, TestError> = fast_policy()
            .run("op", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(TestError { retryable: true }) }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_fails_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, TestError> = fast_policy()
            .run("op", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(TestError { retryable: false }) }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, TestError> = fast_policy()
            .run("op", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(TestError { retryable: true })
                    } else {
                        Ok(7)
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_operation_timeout_scaling() {
        // Small payloads hit the floor
        assert_eq!(operation_timeout(0), Duration::from_secs(300));
        assert_eq!(operation_timeout(1024 * 1024), Duration::from_secs(300));
        // 100 MiB -> 1000 seconds
        assert_eq!(
            operation_timeout(100 * 1024 * 1024),
            Duration::from_secs(1000)
        );
        // Huge payloads are clamped to an hour
        assert_eq!(
            operation_timeout(10 * 1024 * 1024 * 1024),
            Duration::from_secs(3600)
        );
    }
}
