// Retry engine with exponential backoff for transient failures
use std::future::Future;
use std::time::Duration;
use serde::{Serialize, Deserialize};
use tracing::{warn, error};

/// Classification of a failure as transient (worth retrying locally) or
/// permanent (propagate to the caller on first occurrence).
///
/// Classification happens once, at the boundary that produces the error;
/// the retry engine only consults the verdict.
pub trait Retryable {
    fn is_transient(&self) -> bool;
}

/// Upstream status codes that signal transient overload.
pub fn transient_status(code: u16) -> bool {
    matches!(code, 429 | 500 | 503)
}

/// Retry behavior configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub multiplier: f64,
    /// Ceiling on any single backoff delay. Without it, high
    /// multiplier/max_retries combinations grow the wait without bound.
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
            multiplier: 2.0,
            max_delay: Duration::from_secs(30),
        }
    }
}

/// Retry engine. Stateless across calls: every invocation gets its own
/// attempt counter and delay, seeded from the config.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Run `action`, retrying transient failures with exponential backoff.
    ///
    /// Performs at most `max_retries + 1` attempts. Permanent failures
    /// propagate immediately with no delay; once the retry budget is spent
    /// the last transient error is re-propagated.
    pub async fn execute_with_retry<T, E, F, Fut>(&self, mut action: F, label: &str) -> Result<T, E>
    where
        E: Retryable + std::fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt: u32 = 0;
        let mut delay = self.config.initial_delay;

        loop {
            match action().await {
                Ok(value) => return Ok(value),
                Err(err) if !err.is_transient() => return Err(err),
                Err(err) => {
                    if attempt >= self.config.max_retries {
                        error!(
                            "Max retries ({}) exceeded for operation: {}",
                            self.config.max_retries, label
                        );
                        return Err(err);
                    }
                    attempt += 1;
                    warn!(
                        "Retry {} of {} for operation: {} ({}). Waiting {:?}",
                        attempt, self.config.max_retries, label, err, delay
                    );
                    tokio::time::sleep(delay).await;
                    delay = delay.mul_f64(self.config.multiplier).min(self.config.max_delay);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    #[derive(Debug, thiserror::Error)]
    enum TestError {
        #[error("transient failure")]
        Transient,
        #[error("permanent failure")]
        Permanent,
    }

    impl Retryable for TestError {
        fn is_transient(&self) -> bool {
            matches!(self, TestError::Transient)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_bound_and_backoff_total() {
        let policy = RetryPolicy::new(RetryConfig::default());
        let attempts = AtomicU32::new(0);
        let start = Instant::now();

        let result: Result<(), TestError> = policy
            .execute_with_retry(
                || {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    async { Err(TestError::Transient) }
                },
                "always-failing",
            )
            .await;

        assert!(matches!(result, Err(TestError::Transient)));
        assert_eq!(attempts.load(Ordering::SeqCst), 4); // max_retries + 1
        // Delays of 1s, 2s and 4s were slept between attempts
        assert!(start.elapsed() >= Duration::from_secs(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_short_circuit() {
        let policy = RetryPolicy::new(RetryConfig::default());
        let attempts = AtomicU32::new(0);
        let start = Instant::now();

        let result: Result<(), TestError> = policy
            .execute_with_retry(
                || {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    async { Err(TestError::Permanent) }
                },
                "permanent",
            )
            .await;

        assert!(matches!(result, Err(TestError::Permanent)));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert!(start.elapsed() < Duration::from_millis(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_after_transient_failures() {
        let policy = RetryPolicy::new(RetryConfig::default());
        let attempts = AtomicU32::new(0);

        let result: Result<u32, TestError> = policy
            .execute_with_retry(
                || {
                    let n = attempts.fetch_add(1, Ordering::SeqCst);
                    async move {
                        if n < 2 {
                            Err(TestError::Transient)
                        } else {
                            Ok(42)
                        }
                    }
                },
                "flaky",
            )
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_max_delay_caps_backoff() {
        let policy = RetryPolicy::new(RetryConfig {
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
            multiplier: 10.0,
            max_delay: Duration::from_secs(2),
        });
        let start = Instant::now();

        let result: Result<(), TestError> = policy
            .execute_with_retry(|| async { Err(TestError::Transient) }, "capped")
            .await;

        assert!(result.is_err());
        // Delays are 1s, 2s, 2s once the cap kicks in
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(5));
        assert!(elapsed < Duration::from_secs(6));
    }

    #[test]
    fn test_transient_status_codes() {
        assert!(transient_status(429));
        assert!(transient_status(500));
        assert!(transient_status(503));
        assert!(!transient_status(404));
        assert!(!transient_status(200));
        assert!(!transient_status(401));
    }
}
