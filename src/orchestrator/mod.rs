//! Cross-listing orchestration
//!
//! The orchestrator fans one logical operation (create, update, delete)
//! out to a set of platform adapters, wrapping every call in that
//! platform's rate limiter and retry policy, and aggregates the
//! per-platform outcomes into one result. One platform's failure never
//! cancels another's in-flight call, and partial success is a normal
//! result, not an error.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, OwnedMutexGuard, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::GlobalConfig;
use crate::error::{AppError, PlatformError};
use crate::models::{
    AggregatedResult, ListingPatch, ListingRecord, OperationOutcome,
};
use crate::platforms::PlatformAdapter;
use crate::repository::Repository;
use crate::throttle::{RateLimiter, RetryPolicy};

/// Phase of one logical operation
///
/// `Completed` is terminal; no operation is left `Dispatched` once all
/// platform calls have returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationPhase {
    Pending,
    Dispatched,
    Aggregating,
    Completed,
}

/// Progress tracker for one logical operation
struct OperationTracker {
    kind: &'static str,
    listing_id: String,
    phase: OperationPhase,
}

impl OperationTracker {
    fn new(kind: &'static str, listing_id: impl Into<String>) -> Self {
        Self {
            kind,
            listing_id: listing_id.into(),
            phase: OperationPhase::Pending,
        }
    }

    fn advance(&mut self, next: OperationPhase) {
        debug!(
            operation = self.kind,
            listing_id = %self.listing_id,
            from = ?self.phase,
            to = ?next,
            "Operation phase transition"
        );
        self.phase = next;
    }
}

/// Per-listing lock registry
///
/// The remote-id map is mutated by both orchestrator results and
/// reconciliation resolutions; updates to one listing serialize here
/// while different listings proceed independently.
#[derive(Default)]
pub struct ListingLocks {
    inner: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ListingLocks {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the exclusive section for one listing
    pub async fn lock(&self, listing_id: &str) -> OwnedMutexGuard<()> {
        let entry = {
            let mut map = self.inner.lock().await;
            Arc::clone(
                map.entry(listing_id.to_string())
                    .or_insert_with(|| Arc::new(Mutex::new(()))),
            )
        };
        entry.lock_owned().await
    }
}

/// Per-platform health probe result
#[derive(Debug, Clone)]
pub struct PlatformHealth {
    pub healthy: bool,
    pub response_time: Duration,
    pub error: Option<String>,
}

/// Cross-platform health report
#[derive(Debug, Clone)]
pub struct HealthReport {
    pub overall_healthy: bool,
    pub platforms: HashMap<String, PlatformHealth>,
}

/// Orchestrator settings derived from global configuration
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Upper bound on photos per listing, checked before dispatch
    pub max_photos_per_listing: usize,

    /// Upper bound on concurrently dispatched platform calls
    pub max_workers: usize,

    /// Optional global timeout for one logical operation
    pub operation_timeout_secs: Option<u64>,
}

impl OrchestratorConfig {
    /// Project the orchestrator settings out of the global configuration
    pub fn from_global(global: &GlobalConfig) -> Self {
        Self {
            max_photos_per_listing: global.max_photos_per_listing,
            max_workers: global.max_workers.max(1),
            operation_timeout_secs: global.operation_timeout_secs,
        }
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self::from_global(&GlobalConfig::default())
    }
}

/// Fans one logical listing operation out across platform adapters
pub struct CrossListingOrchestrator<R: Repository> {
    adapters: HashMap<String, Arc<dyn PlatformAdapter>>,
    limiter: Arc<RateLimiter>,
    policies: HashMap<String, RetryPolicy>,
    default_policy: RetryPolicy,
    repository: Arc<R>,
    locks: Arc<ListingLocks>,
    workers: Arc<Semaphore>,
    config: OrchestratorConfig,
}

impl<R: Repository + 'static> CrossListingOrchestrator<R> {
    /// Create an orchestrator over an adapter registry
    pub fn new(
        adapters: HashMap<String, Arc<dyn PlatformAdapter>>,
        limiter: Arc<RateLimiter>,
        policies: HashMap<String, RetryPolicy>,
        repository: Arc<R>,
        locks: Arc<ListingLocks>,
        config: OrchestratorConfig,
    ) -> Self {
        let workers = Arc::new(Semaphore::new(config.max_workers));
        Self {
            adapters,
            limiter,
            policies,
            default_policy: RetryPolicy::with_defaults(),
            repository,
            locks,
            workers,
            config,
        }
    }

    fn policy_for(&self, platform: &str) -> RetryPolicy {
        self.policies
            .get(platform)
            .unwrap_or(&self.default_policy)
            .clone()
    }

    fn operation_timeout(&self) -> Option<Duration> {
        self.config.operation_timeout_secs.map(Duration::from_secs)
    }

    /// Create a listing on the named platforms
    ///
    /// Local validation runs first; a validation failure aborts before
    /// any network call with no platform entries. Otherwise every named
    /// platform gets exactly one outcome, and each success records that
    /// platform's remote id on the record.
    pub async fn create_listing(
        &self,
        record: &mut ListingRecord,
        platforms: &[String],
    ) -> Result<AggregatedResult, AppError> {
        let mut tracker = OperationTracker::new("create", &record.id);

        record.validate(self.config.max_photos_per_listing)?;

        tracker.advance(OperationPhase::Dispatched);
        let timeout = self.operation_timeout();
        let mut handles: Vec<(String, Option<JoinHandle<OperationOutcome>>)> = Vec::new();

        for platform in dedupe(platforms) {
            let Some(adapter) = self.adapters.get(&platform) else {
                handles.push((platform, None));
                continue;
            };

            let adapter = Arc::clone(adapter);
            let snapshot = record.clone();
            let call = move || {
                let adapter = Arc::clone(&adapter);
                let snapshot = snapshot.clone();
                async move { adapter.create(&snapshot).await.map(Some) }
            };

            let handle = tokio::spawn(run_platform_call(
                platform.clone(),
                Arc::clone(&self.limiter),
                self.policy_for(&platform),
                Arc::clone(&self.workers),
                timeout,
                call,
            ));
            handles.push((platform, Some(handle)));
        }

        tracker.advance(OperationPhase::Aggregating);
        let result = collect_outcomes(handles).await;

        let _guard = self.locks.lock(&record.id).await;
        let mut any_success = false;
        for outcome in result.outcomes() {
            if outcome.succeeded() {
                if let Some(remote_id) = outcome.remote_id() {
                    record.record_remote_id(outcome.platform(), remote_id);
                    any_success = true;
                }
            }
        }
        if any_success {
            self.repository.save_listing(record).await?;
        }

        tracker.advance(OperationPhase::Completed);
        info!(
            listing_id = %record.id,
            status = result.status().label(),
            "Create operation completed"
        );
        Ok(result)
    }

    /// Update a listing's set fields on the named platforms
    ///
    /// Platforms without a recorded remote id are reported as
    /// `NotListed` without a network call, never silently dropped.
    pub async fn update_listing(
        &self,
        listing_id: &str,
        patch: &ListingPatch,
        platforms: &[String],
    ) -> Result<AggregatedResult, AppError> {
        let mut tracker = OperationTracker::new("update", listing_id);

        let mut record = self
            .repository
            .load_listing(listing_id)
            .await?
            .ok_or_else(|| {
                AppError::Repository(crate::error::RepoError::NotFound(listing_id.to_string()))
            })?;

        tracker.advance(OperationPhase::Dispatched);
        let timeout = self.operation_timeout();
        let mut handles: Vec<(String, Option<JoinHandle<OperationOutcome>>)> = Vec::new();
        let mut skipped: Vec<OperationOutcome> = Vec::new();

        for platform in dedupe(platforms) {
            let Some(remote_id) = record.remote_id(&platform).map(str::to_string) else {
                skipped.push(OperationOutcome::failure(
                    platform,
                    PlatformError::NotListed,
                    Duration::ZERO,
                    0,
                ));
                continue;
            };
            let Some(adapter) = self.adapters.get(&platform) else {
                handles.push((platform, None));
                continue;
            };

            let adapter = Arc::clone(adapter);
            let patch = patch.clone();
            let call = move || {
                let adapter = Arc::clone(&adapter);
                let patch = patch.clone();
                let remote_id = remote_id.clone();
                async move { adapter.update(&remote_id, &patch).await.map(|()| None) }
            };

            let handle = tokio::spawn(run_platform_call(
                platform.clone(),
                Arc::clone(&self.limiter),
                self.policy_for(&platform),
                Arc::clone(&self.workers),
                timeout,
                call,
            ));
            handles.push((platform, Some(handle)));
        }

        tracker.advance(OperationPhase::Aggregating);
        let mut outcomes = skipped;
        outcomes.extend(collect_outcomes(handles).await.outcomes().to_vec());
        let result = AggregatedResult::from_outcomes(outcomes);

        if result.outcomes().iter().any(OperationOutcome::succeeded) {
            let _guard = self.locks.lock(listing_id).await;
            patch.apply_to(&mut record);
            self.repository.save_listing(&record).await?;
        }

        tracker.advance(OperationPhase::Completed);
        info!(
            listing_id = listing_id,
            status = result.status().label(),
            "Update operation completed"
        );
        Ok(result)
    }

    /// Delete a listing from the named platforms
    ///
    /// Each success removes that platform's remote-id entry; platforms
    /// without a recorded remote id are reported as `NotListed`.
    pub async fn delete_listing(
        &self,
        listing_id: &str,
        platforms: &[String],
    ) -> Result<AggregatedResult, AppError> {
        let mut tracker = OperationTracker::new("delete", listing_id);

        let mut record = self
            .repository
            .load_listing(listing_id)
            .await?
            .ok_or_else(|| {
                AppError::Repository(crate::error::RepoError::NotFound(listing_id.to_string()))
            })?;

        tracker.advance(OperationPhase::Dispatched);
        let timeout = self.operation_timeout();
        let mut handles: Vec<(String, Option<JoinHandle<OperationOutcome>>)> = Vec::new();
        let mut skipped: Vec<OperationOutcome> = Vec::new();

        for platform in dedupe(platforms) {
            let Some(remote_id) = record.remote_id(&platform).map(str::to_string) else {
                skipped.push(OperationOutcome::failure(
                    platform,
                    PlatformError::NotListed,
                    Duration::ZERO,
                    0,
                ));
                continue;
            };
            let Some(adapter) = self.adapters.get(&platform) else {
                handles.push((platform, None));
                continue;
            };

            let adapter = Arc::clone(adapter);
            let call = move || {
                let adapter = Arc::clone(&adapter);
                let remote_id = remote_id.clone();
                async move { adapter.delete(&remote_id).await.map(|()| None) }
            };

            let handle = tokio::spawn(run_platform_call(
                platform.clone(),
                Arc::clone(&self.limiter),
                self.policy_for(&platform),
                Arc::clone(&self.workers),
                timeout,
                call,
            ));
            handles.push((platform, Some(handle)));
        }

        tracker.advance(OperationPhase::Aggregating);
        let mut outcomes = skipped;
        outcomes.extend(collect_outcomes(handles).await.outcomes().to_vec());
        let result = AggregatedResult::from_outcomes(outcomes);

        {
            let _guard = self.locks.lock(listing_id).await;
            let mut changed = false;
            for outcome in result.outcomes() {
                if outcome.succeeded() && record.clear_remote_id(outcome.platform()) {
                    changed = true;
                }
            }
            if changed {
                self.repository.save_listing(&record).await?;
            }
        }

        tracker.advance(OperationPhase::Completed);
        info!(
            listing_id = listing_id,
            status = result.status().label(),
            "Delete operation completed"
        );
        Ok(result)
    }

    /// Probe every adapter's health concurrently
    pub async fn platform_health(&self) -> HealthReport {
        let mut handles = Vec::new();

        for (name, adapter) in &self.adapters {
            let name = name.clone();
            let adapter = Arc::clone(adapter);
            handles.push(tokio::spawn(async move {
                let started = Instant::now();
                let result = adapter.health_check().await;
                let health = PlatformHealth {
                    healthy: result.is_ok(),
                    response_time: started.elapsed(),
                    error: result.err().map(|e| e.to_string()),
                };
                (name, health)
            }));
        }

        let mut platforms = HashMap::new();
        for handle in handles {
            if let Ok((name, health)) = handle.await {
                if !health.healthy {
                    warn!(platform = %name, error = ?health.error, "Platform unhealthy");
                }
                platforms.insert(name, health);
            }
        }

        HealthReport {
            overall_healthy: platforms.values().all(|h| h.healthy),
            platforms,
        }
    }
}

/// Drop duplicate platform names, preserving first-seen order
fn dedupe(platforms: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    platforms
        .iter()
        .filter(|p| seen.insert(p.as_str()))
        .cloned()
        .collect()
}

/// One platform's unit of work: limiter wait, then the retry-wrapped call
async fn run_platform_call<F, Fut>(
    platform: String,
    limiter: Arc<RateLimiter>,
    policy: RetryPolicy,
    workers: Arc<Semaphore>,
    timeout: Option<Duration>,
    call: F,
) -> OperationOutcome
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<Option<String>, PlatformError>> + Send,
{
    let started = Instant::now();

    let unit = async {
        let _permit = workers
            .acquire_owned()
            .await
            .expect("Worker semaphore closed unexpectedly");
        limiter.acquire(&platform).await;
        policy.execute(call).await
    };

    let (result, retries) = match timeout {
        Some(limit) => match tokio::time::timeout(limit, unit).await {
            Ok(resolved) => resolved,
            Err(_) => {
                warn!(platform = %platform, timeout_secs = limit.as_secs(), "Platform call cancelled by operation timeout");
                return OperationOutcome::failure(
                    platform,
                    PlatformError::Cancelled,
                    started.elapsed(),
                    0,
                );
            }
        },
        None => unit.await,
    };

    match result {
        Ok(remote_id) => OperationOutcome::success(platform, remote_id, started.elapsed(), retries),
        Err(error) => OperationOutcome::failure(platform, error, started.elapsed(), retries),
    }
}

/// Await every dispatched unit, never dropping a platform's entry
///
/// A missing handle marks a platform that was never configured; a
/// panicked task is mapped to a `Fatal` outcome rather than aborting the
/// aggregation.
async fn collect_outcomes(
    handles: Vec<(String, Option<JoinHandle<OperationOutcome>>)>,
) -> AggregatedResult {
    let mut outcomes = Vec::with_capacity(handles.len());

    for (platform, handle) in handles {
        let outcome = match handle {
            None => OperationOutcome::failure(
                platform,
                PlatformError::Fatal("Platform not configured".to_string()),
                Duration::ZERO,
                0,
            ),
            Some(handle) => match handle.await {
                Ok(outcome) => outcome,
                Err(join_err) => OperationOutcome::failure(
                    platform,
                    PlatformError::Fatal(format!("Dispatch task failed: {}", join_err)),
                    Duration::ZERO,
                    0,
                ),
            },
        };
        outcomes.push(outcome);
    }

    AggregatedResult::from_outcomes(outcomes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryConfig;
    use crate::error::ValidationError;
    use crate::models::{Category, Condition, DateRange, OperationStatus, Price, SaleRecord};
    use crate::platforms::{RemoteFilter, RemoteListing};
    use crate::repository::SqliteRepository;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Scriptable adapter for orchestrator tests
    ///
    /// Each create call pops the next scripted result; update and delete
    /// always succeed unless `fail_all` is set.
    struct ScriptedAdapter {
        name: String,
        create_script: Mutex<VecDeque<Result<String, PlatformError>>>,
        fail_all: Option<PlatformError>,
        create_calls: AtomicU32,
        delete_calls: AtomicU32,
        delay: Option<Duration>,
    }

    impl ScriptedAdapter {
        fn succeeding(name: &str, remote_id: &str) -> Self {
            Self::scripted(name, vec![Ok(remote_id.to_string())])
        }

        fn scripted(name: &str, script: Vec<Result<String, PlatformError>>) -> Self {
            Self {
                name: name.to_string(),
                create_script: Mutex::new(script.into_iter().collect()),
                fail_all: None,
                create_calls: AtomicU32::new(0),
                delete_calls: AtomicU32::new(0),
                delay: None,
            }
        }

        fn failing(name: &str, error: PlatformError) -> Self {
            Self {
                fail_all: Some(error),
                ..Self::scripted(name, vec![])
            }
        }

        fn slow(name: &str, delay: Duration) -> Self {
            Self {
                delay: Some(delay),
                ..Self::succeeding(name, "slow-1")
            }
        }
    }

    #[async_trait]
    impl PlatformAdapter for ScriptedAdapter {
        fn name(&self) -> &str {
            &self.name
        }

        async fn authenticate(&self) -> Result<(), PlatformError> {
            Ok(())
        }

        async fn create(&self, _listing: &ListingRecord) -> Result<String, PlatformError> {
            self.create_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if let Some(err) = &self.fail_all {
                return Err(err.clone());
            }
            self.create_script
                .lock()
                .await
                .pop_front()
                .unwrap_or_else(|| Ok(format!("{}-auto", self.name)))
        }

        async fn update(
            &self,
            _remote_id: &str,
            _patch: &ListingPatch,
        ) -> Result<(), PlatformError> {
            if let Some(err) = &self.fail_all {
                return Err(err.clone());
            }
            Ok(())
        }

        async fn delete(&self, _remote_id: &str) -> Result<(), PlatformError> {
            self.delete_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(err) = &self.fail_all {
                return Err(err.clone());
            }
            Ok(())
        }

        async fn list_remote(
            &self,
            _filter: &RemoteFilter,
        ) -> Result<Vec<RemoteListing>, PlatformError> {
            Ok(Vec::new())
        }

        async fn list_sales(&self, _range: &DateRange) -> Result<Vec<SaleRecord>, PlatformError> {
            Ok(Vec::new())
        }

        async fn health_check(&self) -> Result<(), PlatformError> {
            if let Some(err) = &self.fail_all {
                return Err(err.clone());
            }
            Ok(())
        }
    }

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy::new(RetryConfig {
            max_retries,
            backoff_factor: 0.0,
            max_backoff_secs: 0,
            jitter: false,
            ..Default::default()
        })
    }

    async fn orchestrator_with(
        adapters: Vec<Arc<dyn PlatformAdapter>>,
        config: OrchestratorConfig,
    ) -> (CrossListingOrchestrator<SqliteRepository>, Arc<SqliteRepository>) {
        let repository = Arc::new(SqliteRepository::in_memory().await.unwrap());
        let mut registry: HashMap<String, Arc<dyn PlatformAdapter>> = HashMap::new();
        let mut policies = HashMap::new();
        for adapter in adapters {
            policies.insert(adapter.name().to_string(), fast_policy(3));
            registry.insert(adapter.name().to_string(), adapter);
        }

        let orchestrator = CrossListingOrchestrator::new(
            registry,
            Arc::new(RateLimiter::builder().build()),
            policies,
            Arc::clone(&repository),
            Arc::new(ListingLocks::new()),
            config,
        );
        (orchestrator, repository)
    }

    fn sample_record() -> ListingRecord {
        ListingRecord::new(
            "item-1",
            "Vintage denim jacket",
            "Levi's trucker, lightly worn",
            Price::new(250.0, "USD"),
            Condition::Good,
            Category::Clothing,
            1,
        )
    }

    fn names(targets: &[&str]) -> Vec<String> {
        targets.iter().map(|s| s.to_string()).collect()
    }

    // Test 1: Validation failure aborts before any platform call
    #[tokio::test]
    async fn test_create_validation_aborts_before_dispatch() {
        let mercari = Arc::new(ScriptedAdapter::succeeding("mercari", "m-1"));
        let (orchestrator, _) = orchestrator_with(
            vec![mercari.clone()],
            OrchestratorConfig::default(),
        )
        .await;

        let mut record = sample_record();
        record.title = String::new();

        let err = orchestrator
            .create_listing(&mut record, &names(&["mercari"]))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            AppError::Validation(ValidationError::MissingField("title"))
        ));
        assert_eq!(mercari.create_calls.load(Ordering::SeqCst), 0);
        assert!(record.remote_ids.is_empty());
    }

    // Test 2: Successful fan-out records every remote id and persists
    #[tokio::test]
    async fn test_create_all_succeed() {
        let (orchestrator, repository) = orchestrator_with(
            vec![
                Arc::new(ScriptedAdapter::succeeding("mercari", "m-1")),
                Arc::new(ScriptedAdapter::succeeding("vinted", "v-1")),
            ],
            OrchestratorConfig::default(),
        )
        .await;

        let mut record = sample_record();
        let result = orchestrator
            .create_listing(&mut record, &names(&["mercari", "vinted"]))
            .await
            .unwrap();

        assert_eq!(result.status(), OperationStatus::AllSucceeded);
        assert_eq!(result.outcomes().len(), 2);
        assert_eq!(record.remote_id("mercari"), Some("m-1"));
        assert_eq!(record.remote_id("vinted"), Some("v-1"));

        let stored = repository.load_listing("item-1").await.unwrap().unwrap();
        assert_eq!(stored.remote_id("mercari"), Some("m-1"));
    }

    // Test 3: One platform's failure never loses the other's success
    #[tokio::test]
    async fn test_create_partial_success() {
        let (orchestrator, _) = orchestrator_with(
            vec![
                Arc::new(ScriptedAdapter::succeeding("mercari", "m-1")),
                Arc::new(ScriptedAdapter::failing(
                    "vinted",
                    PlatformError::Fatal("HTTP 400".to_string()),
                )),
            ],
            OrchestratorConfig::default(),
        )
        .await;

        let mut record = sample_record();
        let result = orchestrator
            .create_listing(&mut record, &names(&["mercari", "vinted"]))
            .await
            .unwrap();

        assert_eq!(result.status(), OperationStatus::Partial);
        assert_eq!(record.remote_id("mercari"), Some("m-1"));
        assert!(record.remote_id("vinted").is_none());
    }

    // Test 4: Exactly one outcome per targeted platform, unknown included
    #[tokio::test]
    async fn test_create_one_outcome_per_platform() {
        let (orchestrator, _) = orchestrator_with(
            vec![Arc::new(ScriptedAdapter::succeeding("mercari", "m-1"))],
            OrchestratorConfig::default(),
        )
        .await;

        let mut record = sample_record();
        let result = orchestrator
            .create_listing(
                &mut record,
                &names(&["mercari", "depop", "mercari"]),
            )
            .await
            .unwrap();

        // Duplicates collapse, unknown platforms get failed outcomes
        assert_eq!(result.outcomes().len(), 2);
        assert!(result.outcome_for("mercari").unwrap().succeeded());
        let depop = result.outcome_for("depop").unwrap();
        assert!(!depop.succeeded());
        assert!(matches!(depop.error(), Some(PlatformError::Fatal(_))));
    }

    // Test 5: Retryable failures are retried and the count is reported
    #[tokio::test]
    async fn test_create_retries_transient() {
        let transient = PlatformError::Transient("HTTP 503".to_string());
        let vinted = Arc::new(ScriptedAdapter::scripted(
            "vinted",
            vec![Err(transient.clone()), Err(transient), Ok("v-1".to_string())],
        ));
        let (orchestrator, _) = orchestrator_with(
            vec![vinted.clone()],
            OrchestratorConfig::default(),
        )
        .await;

        let mut record = sample_record();
        let result = orchestrator
            .create_listing(&mut record, &names(&["vinted"]))
            .await
            .unwrap();

        assert_eq!(result.status(), OperationStatus::AllSucceeded);
        let outcome = result.outcome_for("vinted").unwrap();
        assert_eq!(outcome.retries(), 2);
        assert_eq!(vinted.create_calls.load(Ordering::SeqCst), 3);
    }

    // Test 6: Update skips platforms without a remote id as NotListed
    #[tokio::test]
    async fn test_update_not_listed() {
        let (orchestrator, repository) = orchestrator_with(
            vec![
                Arc::new(ScriptedAdapter::succeeding("mercari", "m-1")),
                Arc::new(ScriptedAdapter::succeeding("vinted", "v-1")),
            ],
            OrchestratorConfig::default(),
        )
        .await;

        let mut record = sample_record();
        record.record_remote_id("mercari", "m-1");
        repository.save_listing(&record).await.unwrap();

        let patch = ListingPatch {
            price: Some(199.0),
            ..Default::default()
        };
        let result = orchestrator
            .update_listing("item-1", &patch, &names(&["mercari", "vinted"]))
            .await
            .unwrap();

        assert_eq!(result.status(), OperationStatus::Partial);
        assert!(result.outcome_for("mercari").unwrap().succeeded());
        assert_eq!(
            result.outcome_for("vinted").unwrap().error(),
            Some(&PlatformError::NotListed)
        );

        // The stored record absorbed the patch
        let stored = repository.load_listing("item-1").await.unwrap().unwrap();
        assert!((stored.price.amount - 199.0).abs() < f64::EPSILON);
    }

    // Test 7: Updating a missing listing is a repository error
    #[tokio::test]
    async fn test_update_missing_listing() {
        let (orchestrator, _) =
            orchestrator_with(vec![], OrchestratorConfig::default()).await;

        let err = orchestrator
            .update_listing("ghost", &ListingPatch::default(), &names(&["mercari"]))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Repository(_)));
    }

    // Test 8: Delete clears only the succeeding platform's entry
    #[tokio::test]
    async fn test_delete_clears_only_succeeded() {
        let mercari = Arc::new(ScriptedAdapter::succeeding("mercari", "m-1"));
        let vinted = Arc::new(ScriptedAdapter::succeeding("vinted", "v-1"));
        let (orchestrator, repository) = orchestrator_with(
            vec![mercari.clone(), vinted.clone()],
            OrchestratorConfig::default(),
        )
        .await;

        // Only mercari has a recorded remote id
        let mut record = sample_record();
        record.record_remote_id("mercari", "m-1");
        repository.save_listing(&record).await.unwrap();

        let result = orchestrator
            .delete_listing("item-1", &names(&["mercari", "vinted"]))
            .await
            .unwrap();

        assert!(result.outcome_for("mercari").unwrap().succeeded());
        assert_eq!(
            result.outcome_for("vinted").unwrap().error(),
            Some(&PlatformError::NotListed)
        );
        assert_eq!(mercari.delete_calls.load(Ordering::SeqCst), 1);
        assert_eq!(vinted.delete_calls.load(Ordering::SeqCst), 0);

        let stored = repository.load_listing("item-1").await.unwrap().unwrap();
        assert!(stored.remote_id("mercari").is_none());
        assert!(stored.remote_ids.is_empty());
    }

    // Test 9: Operation timeout cancels still-pending platform units
    #[tokio::test(start_paused = true)]
    async fn test_operation_timeout_cancels() {
        let (orchestrator, _) = orchestrator_with(
            vec![
                Arc::new(ScriptedAdapter::succeeding("mercari", "m-1")),
                Arc::new(ScriptedAdapter::slow("vinted", Duration::from_secs(30))),
            ],
            OrchestratorConfig {
                operation_timeout_secs: Some(2),
                ..Default::default()
            },
        )
        .await;

        let mut record = sample_record();
        let result = orchestrator
            .create_listing(&mut record, &names(&["mercari", "vinted"]))
            .await
            .unwrap();

        assert_eq!(result.status(), OperationStatus::Partial);
        assert!(result.outcome_for("mercari").unwrap().succeeded());
        assert_eq!(
            result.outcome_for("vinted").unwrap().error(),
            Some(&PlatformError::Cancelled)
        );
    }

    // Test 10: Health report aggregates per-platform probes
    #[tokio::test]
    async fn test_platform_health() {
        let (orchestrator, _) = orchestrator_with(
            vec![
                Arc::new(ScriptedAdapter::succeeding("mercari", "m-1")),
                Arc::new(ScriptedAdapter::failing(
                    "vinted",
                    PlatformError::AuthRequired("expired".to_string()),
                )),
            ],
            OrchestratorConfig::default(),
        )
        .await;

        let report = orchestrator.platform_health().await;

        assert!(!report.overall_healthy);
        assert!(report.platforms["mercari"].healthy);
        assert!(!report.platforms["vinted"].healthy);
        assert!(report.platforms["vinted"]
            .error
            .as_deref()
            .unwrap()
            .contains("expired"));
    }

    // Test 11: Listing locks serialize same-listing sections only
    #[tokio::test]
    async fn test_listing_locks() {
        let locks = Arc::new(ListingLocks::new());

        let guard_a = locks.lock("item-1").await;
        // A different listing's lock is immediately available
        let _guard_b = locks.lock("item-2").await;

        // The same listing's lock waits until released
        let locks_clone = Arc::clone(&locks);
        let waiter = tokio::spawn(async move {
            let _guard = locks_clone.lock("item-1").await;
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        drop(guard_a);
        waiter.await.unwrap();
    }
}
