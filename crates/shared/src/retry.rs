//! Bounded retry with exponential backoff and full jitter.
//!
//! One policy object per collaborator replaces the per-call-site retry
//! decorators the services accumulated over time. Callers decide which
//! errors are worth retrying via a predicate; everything else is returned
//! immediately as a final outcome.

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Retry policy: attempt cap plus backoff curve.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one. Never zero.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles each attempt after that.
    pub base_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub const fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay,
        }
    }

    /// Policy for calls between sibling services.
    pub const fn inter_service() -> Self {
        Self::new(3, Duration::from_secs(1), Duration::from_secs(10))
    }

    /// Policy for waiting on hard dependencies (database) at process startup.
    pub const fn startup() -> Self {
        Self::new(10, Duration::from_secs(1), Duration::from_secs(30))
    }

    /// Backoff before the attempt following `attempt` (1-based), with full
    /// jitter: a uniform draw from zero up to the capped exponential value.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = self
            .base_delay
            .saturating_mul(1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX));
        let capped = exp.min(self.max_delay);
        let jittered_ms = rand::thread_rng().gen_range(0..=capped.as_millis() as u64);
        Duration::from_millis(jittered_ms)
    }

    /// Run `op` until it succeeds, the attempt cap is reached, or it fails
    /// with an error `is_retryable` rejects. The last error is returned on
    /// exhaustion.
    pub async fn run<T, E, F, Fut, P>(&self, op_name: &str, mut op: F, is_retryable: P) -> Result<T, E>
    where
        E: std::fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if attempt >= max_attempts || !is_retryable(&err) {
                        return Err(err);
                    }
                    let delay = self.delay_for(attempt);
                    warn!(
                        operation = op_name,
                        attempt = attempt,
                        max_attempts = max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Retrying after transient failure"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[derive(Debug)]
    struct TestError {
        retryable: bool,
    }

    impl std::fmt::Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "test error (retryable: {})", self.retryable)
        }
    }

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::from_millis(1), Duration::from_millis(5))
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_in = Arc::clone(&calls);
        let result: Result<u32, TestError> = fast_policy(3)
            .run(
                "test",
                move || {
                    let calls = Arc::clone(&calls_in);
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Ok(42)
                    }
                },
                |e: &TestError| e.retryable,
            )
            .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retries_transient_until_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_in = Arc::clone(&calls);
        let result: Result<u32, TestError> = fast_policy(3)
            .run(
                "test",
                move || {
                    let calls = Arc::clone(&calls_in);
                    async move {
                        if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                            Err(TestError { retryable: true })
                        } else {
                            Ok(7)
                        }
                    }
                },
                |e: &TestError| e.retryable,
            )
            .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_returns_last_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_in = Arc::clone(&calls);
        let result: Result<u32, TestError> = fast_policy(3)
            .run(
                "test",
                move || {
                    let calls = Arc::clone(&calls_in);
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Err(TestError { retryable: true })
                    }
                },
                |e: &TestError| e.retryable,
            )
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_error_is_final() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_in = Arc::clone(&calls);
        let result: Result<u32, TestError> = fast_policy(5)
            .run(
                "test",
                move || {
                    let calls = Arc::clone(&calls_in);
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Err(TestError { retryable: false })
                    }
                },
                |e: &TestError| e.retryable,
            )
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_delay_is_capped() {
        let policy = RetryPolicy::new(10, Duration::from_secs(1), Duration::from_secs(10));
        for attempt in 1..=20 {
            assert!(policy.delay_for(attempt) <= Duration::from_secs(10));
        }
    }

    #[test]
    fn test_inter_service_policy_attempts() {
        assert_eq!(RetryPolicy::inter_service().max_attempts, 3);
    }

    #[test]
    fn test_startup_policy_attempts() {
        assert_eq!(RetryPolicy::startup().max_attempts, 10);
    }
}
