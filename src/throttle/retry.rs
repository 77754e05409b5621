//! Bounded retry with exponential backoff
//!
//! `RetryPolicy` wraps a single platform call. Retryable failures are
//! retried up to the configured budget with `backoff_factor^attempt`
//! second waits; everything else propagates immediately. The policy
//! reports how many retries a call consumed so outcomes can carry it.

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::RetryConfig;
use crate::error::RetryableError;

/// Retry policy with exponential backoff
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    /// Create a policy from configuration
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Create a policy with default configuration
    pub fn with_defaults() -> Self {
        Self::new(RetryConfig::default())
    }

    /// Execute an operation under this policy
    ///
    /// Runs the operation once; failures classified retryable are
    /// retried until the budget is exhausted. Returns the final result
    /// together with the number of retries consumed (0 when the first
    /// attempt resolved the call).
    ///
    /// Only wrap operations that are safe to repeat: a retried create is
    /// issued again from scratch.
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> (Result<T, E>, u32)
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: RetryableError + std::fmt::Display,
    {
        let mut attempt = 0u32;

        loop {
            match operation().await {
                Ok(value) => return (Ok(value), attempt),
                Err(err) => {
                    if !err.is_retryable() || attempt >= self.config.max_retries {
                        if attempt >= self.config.max_retries && err.is_retryable() {
                            warn!(
                                attempts = attempt + 1,
                                max_retries = self.config.max_retries,
                                "Retry budget exhausted"
                            );
                        }
                        return (Err(err), attempt);
                    }

                    let backoff = self.calculate_backoff(attempt);
                    debug!(
                        attempt = attempt + 1,
                        max_retries = self.config.max_retries,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %err,
                        "Retrying after retryable failure"
                    );

                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Backoff before retry number `attempt` (0-based)
    ///
    /// `backoff_factor^attempt` seconds, capped at `max_backoff_secs`,
    /// with optional 50-100% jitter.
    pub fn calculate_backoff(&self, attempt: u32) -> Duration {
        let base = self.config.backoff_factor.powi(attempt as i32);
        let capped = base.min(self.config.max_backoff_secs as f64);

        let delay = if self.config.jitter {
            capped * rand::thread_rng().gen_range(0.5..1.0)
        } else {
            capped
        };

        Duration::from_secs_f64(delay.max(0.0))
    }

    /// Whether an HTTP status is in the configured retryable set
    pub fn is_retryable_status(&self, status: u16) -> bool {
        self.config.retry_on_status.contains(&status)
    }

    /// The retry configuration
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }
}
