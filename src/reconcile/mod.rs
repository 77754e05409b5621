//! State reconciliation between the store and the platforms
//!
//! A reconciliation pass pulls current snapshots from every adapter,
//! diffs them against the stored records on price, quantity, and
//! existence, and resolves divergences under the configured conflict
//! mode. Passes are globally serialized; they may overlap orchestrator
//! operations on other listings.
//!
//! # Components
//!
//! - [`SyncReconciler`]: one-shot reconciliation passes
//! - [`scheduler`]: interval scheduling with jitter and manual triggers

pub mod scheduler;

pub use scheduler::{
    ManualPassHandle, PassStatus, PassSummary, ReconcileScheduler, Reconciles, SchedulerConfig,
};

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::{ConflictResolution, GlobalConfig};
use crate::error::{AppError, PlatformError};
use crate::models::{
    DivergenceField, DivergenceValue, ListingRecord, Resolution, SyncDivergence,
};
use crate::orchestrator::ListingLocks;
use crate::platforms::{PlatformAdapter, RemoteFilter, RemoteListing};
use crate::repository::Repository;
use crate::throttle::{RateLimiter, RetryPolicy};

/// Reconciler settings derived from global configuration
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// How divergences are resolved
    pub resolution: ConflictResolution,

    /// Platform precedence for `automatic` mode, highest first
    pub precedence: Vec<String>,

    /// Page size hint for remote fetches
    pub batch_size: usize,
}

impl ReconcilerConfig {
    /// Project the reconciler settings out of the global configuration
    pub fn from_global(global: &GlobalConfig) -> Self {
        Self {
            resolution: global.conflict_resolution,
            precedence: global.platform_precedence.clone(),
            batch_size: global.batch_size,
        }
    }
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self::from_global(&GlobalConfig::default())
    }
}

/// Result of one reconciliation pass
#[derive(Debug, Clone, Default)]
pub struct ReconcileReport {
    /// Every detected divergence, with resolutions filled in
    pub divergences: Vec<SyncDivergence>,

    /// Stored listings examined
    pub listings_checked: usize,

    /// Divergences whose resolution mutated the store
    pub applied: usize,

    /// Platforms whose snapshot fetch failed this pass
    pub failures: Vec<(String, PlatformError)>,
}

impl ReconcileReport {
    /// True when nothing diverged and every platform answered
    pub fn is_clean(&self) -> bool {
        self.divergences.is_empty() && self.failures.is_empty()
    }
}

/// One platform's indexed snapshots plus the fetch timestamp
struct PlatformView {
    by_remote_id: HashMap<String, RemoteListing>,
    fetched_at: DateTime<Utc>,
}

/// Reconciles divergent platform state back into the inventory store
pub struct SyncReconciler<R: Repository> {
    adapters: HashMap<String, Arc<dyn PlatformAdapter>>,
    limiter: Arc<RateLimiter>,
    policies: HashMap<String, RetryPolicy>,
    default_policy: RetryPolicy,
    repository: Arc<R>,
    locks: Arc<ListingLocks>,
    config: ReconcilerConfig,
    pass_lock: Mutex<()>,
}

impl<R: Repository> SyncReconciler<R> {
    /// Create a reconciler over an adapter registry
    pub fn new(
        adapters: HashMap<String, Arc<dyn PlatformAdapter>>,
        limiter: Arc<RateLimiter>,
        policies: HashMap<String, RetryPolicy>,
        repository: Arc<R>,
        locks: Arc<ListingLocks>,
        config: ReconcilerConfig,
    ) -> Self {
        Self {
            adapters,
            limiter,
            policies,
            default_policy: RetryPolicy::with_defaults(),
            repository,
            locks,
            config,
            pass_lock: Mutex::new(()),
        }
    }

    fn policy_for(&self, platform: &str) -> &RetryPolicy {
        self.policies.get(platform).unwrap_or(&self.default_policy)
    }

    /// Run one reconciliation pass
    ///
    /// Passes are serialized against each other: a second caller waits
    /// for the running pass to finish before starting its own.
    pub async fn run_pass(&self) -> Result<ReconcileReport, AppError> {
        let _pass_guard = self.pass_lock.lock().await;
        info!(
            mode = ?self.config.resolution,
            platforms = self.adapters.len(),
            "Starting reconciliation pass"
        );

        let mut report = ReconcileReport::default();
        let views = self.fetch_platform_views(&mut report).await;

        let listings = self.repository.all_listings().await?;
        report.listings_checked = listings.len();

        for record in listings {
            if record.remote_ids.is_empty() {
                continue;
            }
            self.reconcile_listing(record, &views, &mut report).await?;
        }

        info!(
            listings = report.listings_checked,
            divergences = report.divergences.len(),
            applied = report.applied,
            failed_platforms = report.failures.len(),
            "Reconciliation pass completed"
        );
        Ok(report)
    }

    /// Pull snapshots from every adapter, recording per-platform failures
    ///
    /// A platform whose fetch fails contributes no snapshots and never
    /// aborts sibling platforms.
    async fn fetch_platform_views(
        &self,
        report: &mut ReconcileReport,
    ) -> HashMap<String, PlatformView> {
        let filter = RemoteFilter {
            status: None,
            page_size: Some(self.config.batch_size),
        };
        let mut views = HashMap::new();

        for (name, adapter) in &self.adapters {
            self.limiter.acquire(name).await;

            let adapter = Arc::clone(adapter);
            let filter = filter.clone();
            let (result, _retries) = self
                .policy_for(name)
                .execute(move || {
                    let adapter = Arc::clone(&adapter);
                    let filter = filter.clone();
                    async move { adapter.list_remote(&filter).await }
                })
                .await;

            match result {
                Ok(snapshots) => {
                    debug!(platform = %name, count = snapshots.len(), "Fetched remote snapshots");
                    views.insert(
                        name.clone(),
                        PlatformView {
                            by_remote_id: snapshots
                                .into_iter()
                                .map(|s| (s.remote_id.clone(), s))
                                .collect(),
                            fetched_at: Utc::now(),
                        },
                    );
                }
                Err(error) => {
                    warn!(platform = %name, error = %error, "Snapshot fetch failed, skipping platform");
                    report.failures.push((name.clone(), error));
                }
            }
        }

        views
    }

    /// Diff one stored listing against every platform view and resolve
    async fn reconcile_listing(
        &self,
        mut record: ListingRecord,
        views: &HashMap<String, PlatformView>,
        report: &mut ReconcileReport,
    ) -> Result<(), AppError> {
        let mut divergences = Vec::new();

        for (platform, remote_id) in &record.remote_ids {
            // A platform that failed to answer produces no divergences;
            // absence of data is not absence of the listing.
            let Some(view) = views.get(platform) else {
                continue;
            };

            match view.by_remote_id.get(remote_id) {
                None => {
                    divergences.push(SyncDivergence::missing_remotely(
                        &record.id,
                        platform,
                        view.fetched_at,
                    ));
                }
                Some(snapshot) if !snapshot.active => {
                    divergences.push(SyncDivergence::missing_remotely(
                        &record.id,
                        platform,
                        snapshot.observed_at,
                    ));
                }
                Some(snapshot) => {
                    if (snapshot.price - record.price.amount).abs() > 0.005 {
                        divergences.push(SyncDivergence::price(
                            &record.id,
                            platform,
                            record.price.amount,
                            snapshot.price,
                            snapshot.observed_at,
                        ));
                    }
                    if snapshot.quantity != record.quantity {
                        divergences.push(SyncDivergence::quantity(
                            &record.id,
                            platform,
                            record.quantity,
                            snapshot.quantity,
                            snapshot.observed_at,
                        ));
                    }
                }
            }
        }

        if divergences.is_empty() {
            return Ok(());
        }

        let _guard = self.locks.lock(&record.id).await;
        let applied = match self.config.resolution {
            ConflictResolution::Manual => 0,
            ConflictResolution::LatestWins => {
                Self::resolve_latest_wins(&mut record, &mut divergences)
            }
            ConflictResolution::Automatic => {
                self.resolve_automatic(&mut record, &mut divergences)
            }
        };

        if applied > 0 {
            self.repository.save_listing(&record).await?;
        }

        report.applied += applied;
        report.divergences.append(&mut divergences);
        Ok(())
    }

    /// `latest_wins`: an observation newer than the record's last
    /// mutation overwrites the stored field; older observations lose.
    fn resolve_latest_wins(
        record: &mut ListingRecord,
        divergences: &mut [SyncDivergence],
    ) -> usize {
        // Compare every divergence against the timestamp the record had
        // going into this pass, not one shifted by earlier applications.
        let stored_updated_at = record.updated_at;
        let mut applied = 0;

        for div in divergences.iter_mut() {
            if div.observed_at > stored_updated_at {
                apply_divergence(record, div);
                applied += 1;
            } else {
                div.resolve(Resolution::KeptStored);
            }
        }

        applied
    }

    /// `automatic`: the configured precedence order picks the winner per
    /// field; platforms missing from the order never auto-win.
    fn resolve_automatic(
        &self,
        record: &mut ListingRecord,
        divergences: &mut [SyncDivergence],
    ) -> usize {
        let rank = |platform: &str| {
            self.config
                .precedence
                .iter()
                .position(|p| p == platform)
        };
        let mut applied = 0;

        // Existence is a per-platform decision; value fields pick one
        // winner among the diverging platforms.
        for field in [DivergenceField::Price, DivergenceField::Quantity] {
            let winner = divergences
                .iter()
                .enumerate()
                .filter(|(_, d)| d.field == field)
                .filter_map(|(i, d)| rank(&d.platform).map(|r| (r, i)))
                .min()
                .map(|(_, i)| i);

            if let Some(winner_idx) = winner {
                for (i, div) in divergences.iter_mut().enumerate() {
                    if div.field != field {
                        continue;
                    }
                    if i == winner_idx {
                        apply_divergence(record, div);
                        applied += 1;
                    } else {
                        div.resolve(Resolution::KeptStored);
                    }
                }
            }
        }

        for div in divergences.iter_mut() {
            if div.field == DivergenceField::Existence && rank(&div.platform).is_some() {
                apply_divergence(record, div);
                applied += 1;
            }
        }

        applied
    }
}

/// Mutate the record per one divergence and mark it applied
fn apply_divergence(record: &mut ListingRecord, div: &mut SyncDivergence) {
    match (&div.field, &div.observed) {
        (DivergenceField::Price, DivergenceValue::Price(observed)) => {
            record.price.amount = *observed;
            record.touch();
            div.resolve(Resolution::AppliedObserved);
        }
        (DivergenceField::Quantity, DivergenceValue::Quantity(observed)) => {
            record.quantity = *observed;
            record.touch();
            div.resolve(Resolution::AppliedObserved);
        }
        (DivergenceField::Existence, _) => {
            record.clear_remote_id(&div.platform.clone());
            div.resolve(Resolution::RemovedRemoteEntry);
        }
        // Field and value kinds are constructed pairwise; a mismatch is
        // unreachable through the public constructors.
        _ => {}
    }
}
