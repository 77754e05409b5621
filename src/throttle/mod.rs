//! Outbound call throttling
//!
//! This module bounds the rate and retry behavior of every platform call.
//!
//! # Components
//!
//! - [`bucket`]: Per-platform token-bucket admission control
//! - [`retry`]: Bounded retry with exponential backoff around a single call
//!
//! # Example
//!
//! ```ignore
//! use crosslist::config::{RateLimitConfig, RetryConfig};
//! use crosslist::throttle::{RateLimiter, RetryPolicy};
//!
//! let limiter = RateLimiter::builder()
//!     .bucket("mercari", &RateLimitConfig::default())
//!     .build();
//! let policy = RetryPolicy::new(RetryConfig::default());
//!
//! limiter.acquire("mercari").await;
//! let (result, retries) = policy.execute(|| async {
//!     adapter.health_check().await
//! }).await;
//! ```

pub mod bucket;
pub mod retry;

// Re-export main types for convenience
pub use bucket::{RateLimiter, RateLimiterBuilder, TokenBucket};
pub use retry::RetryPolicy;
