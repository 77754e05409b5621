//! Common test utilities and helpers for integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use crosslist::config::{RateLimitConfig, RetryConfig};
use crosslist::models::{Category, Condition, ListingRecord, Price};
use crosslist::orchestrator::{CrossListingOrchestrator, ListingLocks, OrchestratorConfig};
use crosslist::platforms::PlatformAdapter;
use crosslist::reconcile::{ReconcilerConfig, SyncReconciler};
use crosslist::repository::SqliteRepository;
use crosslist::sales::SalesAggregator;
use crosslist::throttle::{RateLimiter, RetryPolicy};

/// Create an in-memory repository for testing
pub async fn create_test_repository() -> Arc<SqliteRepository> {
    Arc::new(
        SqliteRepository::in_memory()
            .await
            .expect("Failed to create test repository"),
    )
}

/// Retry configuration with exact exponential backoff (no jitter)
pub fn retry_config(max_retries: u32, backoff_factor: f64) -> RetryConfig {
    RetryConfig {
        max_retries,
        backoff_factor,
        max_backoff_secs: 60,
        jitter: false,
        ..Default::default()
    }
}

/// Generous rate limits that never throttle a test
pub fn open_rate_limit() -> RateLimitConfig {
    RateLimitConfig {
        requests_per_minute: 60_000,
        burst_limit: 1_000,
    }
}

/// Registry, limiter, and policy set for a group of adapters
pub fn platform_components(
    adapters: Vec<Arc<dyn PlatformAdapter>>,
    retry: RetryConfig,
) -> (
    HashMap<String, Arc<dyn PlatformAdapter>>,
    Arc<RateLimiter>,
    HashMap<String, RetryPolicy>,
) {
    let mut registry = HashMap::new();
    let mut limiter = RateLimiter::builder();
    let mut policies = HashMap::new();

    for adapter in adapters {
        let name = adapter.name().to_string();
        limiter = limiter.bucket(&name, &open_rate_limit());
        policies.insert(name.clone(), RetryPolicy::new(retry.clone()));
        registry.insert(name, adapter);
    }

    (registry, Arc::new(limiter.build()), policies)
}

/// Build an orchestrator over the given adapters
pub fn create_test_orchestrator(
    adapters: Vec<Arc<dyn PlatformAdapter>>,
    retry: RetryConfig,
    repository: Arc<SqliteRepository>,
) -> CrossListingOrchestrator<SqliteRepository> {
    let (registry, limiter, policies) = platform_components(adapters, retry);

    CrossListingOrchestrator::new(
        registry,
        limiter,
        policies,
        repository,
        Arc::new(ListingLocks::new()),
        OrchestratorConfig::default(),
    )
}

/// Build a reconciler over the given adapters
pub fn create_test_reconciler(
    adapters: Vec<Arc<dyn PlatformAdapter>>,
    config: ReconcilerConfig,
    repository: Arc<SqliteRepository>,
) -> SyncReconciler<SqliteRepository> {
    let (registry, limiter, policies) = platform_components(adapters, retry_config(0, 0.0));

    SyncReconciler::new(
        registry,
        limiter,
        policies,
        repository,
        Arc::new(ListingLocks::new()),
        config,
    )
}

/// Build a sales aggregator over the given adapters
pub fn create_test_aggregator(
    adapters: Vec<Arc<dyn PlatformAdapter>>,
    repository: Arc<SqliteRepository>,
) -> SalesAggregator<SqliteRepository> {
    let (registry, limiter, policies) = platform_components(adapters, retry_config(0, 0.0));

    SalesAggregator::new(registry, limiter, policies, repository)
}

/// A valid listing record for tests
pub fn sample_listing(id: &str) -> ListingRecord {
    ListingRecord::new(
        id,
        "Supreme box logo hoodie",
        "FW17, worn a handful of times",
        Price::new(250.0, "USD"),
        Condition::Good,
        Category::Clothing,
        1,
    )
    .with_brand("Supreme")
    .with_size("L")
}
