//! Retry logic with exponential backoff
//!
//! Registry calls are retried on timeouts, connection failures and 5xx
//! responses. The n-th retry waits `base_delay * 2^(n-1)`.

use crate::error::TransportError;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Retry policy configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,

    /// Delay before the first retry
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

/// Final result of a retried operation
#[derive(Debug)]
pub struct Attempted<T> {
    pub result: Result<T, TransportError>,
    /// Total attempts made, first try included
    pub attempts: u32,
}

impl RetryPolicy {
    /// Create a new retry policy
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// Create a policy with no retries
    pub fn no_retry() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Create a policy with fast retries (for testing)
    pub fn fast() -> Self {
        Self::new(3, Duration::from_millis(10))
    }

    /// Delay before retry number `retry` (1-based); zero for 0
    pub fn delay_for(&self, retry: u32) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }
        let factor = 2_u32.saturating_pow(retry - 1);
        self.base_delay.saturating_mul(factor)
    }

    /// Run `operation` until it succeeds, fails for good or retries run out
    pub async fn execute<F, Fut, T>(&self, operation_name: &str, mut operation: F) -> Attempted<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, TransportError>>,
    {
        let mut attempts = 0;

        loop {
            attempts += 1;
            debug!(
                "Attempt {}/{} for operation: {}",
                attempts,
                self.max_retries + 1,
                operation_name
            );

            match operation().await {
                Ok(value) => {
                    if attempts > 1 {
                        debug!(
                            "Operation '{}' succeeded after {} retries",
                            operation_name,
                            attempts - 1
                        );
                    }
                    return Attempted {
                        result: Ok(value),
                        attempts,
                    };
                }
                Err(e) => {
                    let retry = attempts;
                    if !e.is_retryable() || retry > self.max_retries {
                        if e.is_retryable() {
                            warn!(
                                "Operation '{}' failed after {} attempts: {}",
                                operation_name, attempts, e
                            );
                        } else {
                            debug!("Operation '{}' failed with non-retryable error: {}", operation_name, e);
                        }
                        return Attempted {
                            result: Err(e),
                            attempts,
                        };
                    }

                    let delay = self.delay_for(retry);
                    warn!(
                        "Operation '{}' failed (attempt {}/{}): {}. Retrying in {:?}",
                        operation_name,
                        attempts,
                        self.max_retries + 1,
                        e,
                        delay
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}
