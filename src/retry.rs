//! Retry manager with exponential backoff
//!
//! Bounded retry for transient backend failures:
//! - Attempts: 3 by default (the first call counts)
//! - Delay: base × 2^(n-1), capped at 8s, ±25% jitter
//! - Only errors classified transient are retried; the last underlying
//!   error is returned once attempts run out

use crate::errors::{QaError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::sleep;

/// Default number of attempts, including the first call
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Base delay for exponential backoff (0.5 second)
const BASE_DELAY_MS: u64 = 500;

/// Maximum delay cap (8 seconds)
const MAX_DELAY_MS: u64 = 8000;

/// Retry settings as loaded from configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay_ms: BASE_DELAY_MS,
            max_delay_ms: MAX_DELAY_MS,
            jitter: true,
        }
    }
}

/// Retry manager with exponential backoff
#[derive(Debug, Clone)]
pub struct RetryManager {
    config: RetryConfig,
}

impl Default for RetryManager {
    fn default() -> Self {
        Self::new()
    }
}

impl RetryManager {
    /// Create new retry manager with default settings
    pub fn new() -> Self {
        Self::with_config(RetryConfig::default())
    }

    /// Create retry manager with custom settings
    pub fn with_config(config: RetryConfig) -> Self {
        Self {
            config: RetryConfig {
                max_attempts: config.max_attempts.max(1),
                ..config
            },
        }
    }

    /// Execute operation, retrying transient failures
    pub async fn execute_with_retry<F, Fut, T>(&self, label: &str, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let mut attempt = 0;

        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    if !Self::is_retryable(&e) {
                        return Err(e);
                    }

                    attempt += 1;

                    if attempt >= self.config.max_attempts {
                        tracing::warn!(
                            operation = label,
                            attempts = attempt,
                            error = %e,
                            "giving up after transient failures"
                        );
                        return Err(e);
                    }

                    let delay = self.calculate_delay(attempt);
                    tracing::warn!(
                        operation = label,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "transient failure, backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }

    /// Calculate delay before retry number `attempt` (1-based)
    fn calculate_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(20);
        let exponential_delay = self.config.base_delay_ms.saturating_mul(2u64.pow(exponent));

        let delay_ms = exponential_delay.min(self.config.max_delay_ms);

        // ±25% random variation
        let final_delay = if self.config.jitter {
            let jitter = (delay_ms / 4) as i64;
            let random_jitter = (rand::random::<f64>() * 2.0 - 1.0) * jitter as f64;
            ((delay_ms as i64) + random_jitter as i64).max(0) as u64
        } else {
            delay_ms
        };

        Duration::from_millis(final_delay)
    }

    /// Upper bound on total sleep across all retries (without jitter)
    pub fn max_total_wait_time(&self) -> Duration {
        let total_ms: u64 = (1..self.config.max_attempts)
            .map(|attempt| {
                let exponent = (attempt - 1).min(20);
                self.config
                    .base_delay_ms
                    .saturating_mul(2u64.pow(exponent))
                    .min(self.config.max_delay_ms)
            })
            .sum();

        Duration::from_millis(total_ms)
    }

    /// Check if error is retryable
    fn is_retryable(error: &QaError) -> bool {
        error.is_transient()
    }

    /// Get max attempts
    pub fn max_attempts(&self) -> u32 {
        self.config.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn fast() -> RetryManager {
        RetryManager::with_config(RetryConfig {
            max_attempts: 3,
            base_delay_ms: 1,
            max_delay_ms: 5,
            jitter: false,
        })
    }

    #[tokio::test]
    async fn test_retry_success_first_attempt() {
        let attempt_count = Arc::new(Mutex::new(0));
        let count_clone = attempt_count.clone();

        let result = fast()
            .execute_with_retry("test", move || {
                let count = count_clone.clone();
                async move {
                    *count.lock().unwrap() += 1;
                    Ok::<i32, QaError>(42)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(*attempt_count.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_retry_success_after_transient_failures() {
        let attempt_count = Arc::new(Mutex::new(0));
        let count_clone = attempt_count.clone();

        let result = fast()
            .execute_with_retry("test", move || {
                let count = count_clone.clone();
                async move {
                    let mut attempts = count.lock().unwrap();
                    *attempts += 1;
                    let current = *attempts;
                    drop(attempts);

                    if current < 3 {
                        Err(QaError::RateLimited("slow down".to_string()))
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(*attempt_count.lock().unwrap(), 3);
    }

    #[tokio::test]
    async fn test_retry_exhaustion_surfaces_underlying_error() {
        let attempt_count = Arc::new(Mutex::new(0));
        let count_clone = attempt_count.clone();

        let result = fast()
            .execute_with_retry("test", move || {
                let count = count_clone.clone();
                async move {
                    *count.lock().unwrap() += 1;
                    Err::<i32, _>(QaError::Unavailable("503".to_string()))
                }
            })
            .await;

        assert!(matches!(result, Err(QaError::Unavailable(_))));
        assert_eq!(*attempt_count.lock().unwrap(), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_error() {
        let attempt_count = Arc::new(Mutex::new(0));
        let count_clone = attempt_count.clone();

        let result = fast()
            .execute_with_retry("test", move || {
                let count = count_clone.clone();
                async move {
                    *count.lock().unwrap() += 1;
                    Err::<i32, _>(QaError::Generation("bad request".to_string()))
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(*attempt_count.lock().unwrap(), 1);
    }

    #[test]
    fn test_calculate_delay() {
        let retry_manager = RetryManager::with_config(RetryConfig {
            jitter: false,
            ..Default::default()
        });

        assert_eq!(retry_manager.calculate_delay(1), Duration::from_millis(500));
        assert_eq!(retry_manager.calculate_delay(2), Duration::from_millis(1000));
        assert_eq!(retry_manager.calculate_delay(3), Duration::from_millis(2000));
        assert_eq!(retry_manager.calculate_delay(10), Duration::from_millis(MAX_DELAY_MS));
    }

    #[test]
    fn test_max_total_wait_time() {
        let retry_manager = RetryManager::new();
        // two sleeps: 500ms + 1000ms
        assert_eq!(retry_manager.max_total_wait_time(), Duration::from_millis(1500));
    }

    #[test]
    fn test_zero_attempts_clamped_to_one() {
        let retry_manager = RetryManager::with_config(RetryConfig {
            max_attempts: 0,
            ..Default::default()
        });
        assert_eq!(retry_manager.max_attempts(), 1);
    }
}
