//! Per-platform token-bucket admission control
//!
//! Each platform gets one bucket with capacity `burst_limit`, refilled
//! continuously at `requests_per_minute / 60` tokens per second. Token
//! accounting is serialized behind an async mutex so concurrent
//! acquisitions never double-spend; waiting suspends only the calling
//! task.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::config::RateLimitConfig;
use crate::error::PlatformError;

/// Mutable bucket accounting, guarded by the bucket's mutex
#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// One platform's token bucket
#[derive(Debug)]
pub struct TokenBucket {
    capacity: f64,
    refill_per_sec: f64,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    /// Create a bucket from rate-limit settings, starting full
    pub fn new(config: &RateLimitConfig) -> Self {
        let capacity = f64::from(config.burst_limit.max(1));
        Self {
            capacity,
            refill_per_sec: f64::from(config.requests_per_minute) / 60.0,
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Refill continuously since the last accounting, never past capacity
    fn refill(&self, state: &mut BucketState, now: Instant) {
        let elapsed = now.saturating_duration_since(state.last_refill);
        state.tokens =
            (state.tokens + elapsed.as_secs_f64() * self.refill_per_sec).min(self.capacity);
        state.last_refill = now;
    }

    /// Acquire one token, suspending the calling task until available
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut state = self.state.lock().await;
                self.refill(&mut state, Instant::now());

                if state.tokens >= 1.0 {
                    state.tokens -= 1.0;
                    return;
                }
                Duration::from_secs_f64((1.0 - state.tokens) / self.refill_per_sec)
            };

            debug!(wait_ms = wait.as_millis() as u64, "Waiting for rate limit token");
            tokio::time::sleep(wait).await;
        }
    }

    /// Acquire one token without waiting
    ///
    /// Fails with `RateLimited` carrying the wait that blocking mode
    /// would have incurred.
    pub async fn try_acquire(&self) -> Result<(), PlatformError> {
        let mut state = self.state.lock().await;
        self.refill(&mut state, Instant::now());

        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            return Ok(());
        }

        let wait = (1.0 - state.tokens) / self.refill_per_sec;
        Err(PlatformError::RateLimited {
            retry_after_secs: Some(wait.ceil() as u64),
        })
    }

    /// Currently available tokens, after refill accounting
    pub async fn available(&self) -> f64 {
        let mut state = self.state.lock().await;
        self.refill(&mut state, Instant::now());
        state.tokens
    }
}

/// Per-platform rate limiter holding one bucket per configured platform
///
/// Buckets are constructed explicitly up front and shared by reference;
/// platforms without a bucket are admitted unthrottled.
#[derive(Debug, Default)]
pub struct RateLimiter {
    buckets: HashMap<String, TokenBucket>,
}

impl RateLimiter {
    /// Start building a rate limiter
    pub fn builder() -> RateLimiterBuilder {
        RateLimiterBuilder {
            buckets: HashMap::new(),
        }
    }

    /// Block until the platform's bucket admits one call
    pub async fn acquire(&self, platform: &str) {
        if let Some(bucket) = self.buckets.get(platform) {
            bucket.acquire().await;
        }
    }

    /// Admit one call without waiting, or fail with `RateLimited`
    pub async fn try_acquire(&self, platform: &str) -> Result<(), PlatformError> {
        match self.buckets.get(platform) {
            Some(bucket) => bucket.try_acquire().await,
            None => Ok(()),
        }
    }

    /// The bucket for a platform, if one was configured
    pub fn bucket(&self, platform: &str) -> Option<&TokenBucket> {
        self.buckets.get(platform)
    }
}

/// Builder for [`RateLimiter`]
#[derive(Debug)]
pub struct RateLimiterBuilder {
    buckets: HashMap<String, TokenBucket>,
}

impl RateLimiterBuilder {
    /// Add a bucket for a platform
    pub fn bucket(mut self, platform: impl Into<String>, config: &RateLimitConfig) -> Self {
        self.buckets.insert(platform.into(), TokenBucket::new(config));
        self
    }

    /// Finish building
    pub fn build(self) -> RateLimiter {
        RateLimiter {
            buckets: self.buckets,
        }
    }
}
