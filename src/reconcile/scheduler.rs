//! Interval scheduler for reconciliation passes
//!
//! Drives [`super::SyncReconciler`] on a fixed interval with startup
//! delay and jitter, supports manual on-demand passes, and tracks pass
//! status. Shutdown is signaled over a broadcast channel.

use async_trait::async_trait;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::time::{interval_at, Instant};
use tracing::{debug, error, info, warn};

use super::{ReconcileReport, SyncReconciler};
use crate::config::SyncConfig;
use crate::error::AppError;
use crate::repository::Repository;

/// Configuration for the reconcile scheduler
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Interval between passes (seconds)
    pub interval_secs: u64,
    /// Initial delay before the first pass (seconds)
    pub initial_delay_secs: u64,
    /// Jitter range (seconds) added to each tick
    pub jitter_secs: u64,
    /// Pass timeout (seconds)
    pub pass_timeout_secs: u64,
}

impl SchedulerConfig {
    /// Project scheduler settings out of the sync configuration
    pub fn from_sync(sync: &SyncConfig) -> Self {
        Self {
            interval_secs: sync.interval_secs,
            initial_delay_secs: sync.initial_delay_secs,
            jitter_secs: sync.jitter_secs,
            pass_timeout_secs: sync.pass_timeout_secs,
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::from_sync(&SyncConfig::default())
    }
}

/// Condensed result of one pass, kept in the status view
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PassSummary {
    pub divergences: usize,
    pub applied: usize,
    pub failed_platforms: usize,
}

impl From<&ReconcileReport> for PassSummary {
    fn from(report: &ReconcileReport) -> Self {
        Self {
            divergences: report.divergences.len(),
            applied: report.applied,
            failed_platforms: report.failures.len(),
        }
    }
}

/// Status of the reconciliation schedule
#[derive(Debug, Clone, Default)]
pub struct PassStatus {
    /// Last pass completion time
    pub last_pass: Option<std::time::SystemTime>,
    /// Last pass result
    pub last_result: Option<Result<PassSummary, String>>,
    /// Next scheduled pass time
    pub next_pass: Option<std::time::SystemTime>,
    /// Whether a pass is currently running
    pub in_progress: bool,
}

/// Anything the scheduler can drive through a reconciliation pass
#[async_trait]
pub trait Reconciles: Send + Sync {
    /// Run one reconciliation pass
    async fn run_pass(&self) -> Result<ReconcileReport, AppError>;
}

#[async_trait]
impl<R: Repository> Reconciles for SyncReconciler<R> {
    async fn run_pass(&self) -> Result<ReconcileReport, AppError> {
        SyncReconciler::run_pass(self).await
    }
}

/// Manual pass request
struct ManualPassRequest {
    response: mpsc::Sender<Result<ReconcileReport, String>>,
}

/// Interval scheduler for reconciliation passes
pub struct ReconcileScheduler {
    config: SchedulerConfig,
    reconciler: Arc<dyn Reconciles>,
    status: Arc<RwLock<PassStatus>>,
    shutdown_rx: broadcast::Receiver<()>,
    manual_rx: mpsc::Receiver<ManualPassRequest>,
    manual_tx: mpsc::Sender<ManualPassRequest>,
}

impl ReconcileScheduler {
    /// Create a scheduler
    ///
    /// # Arguments
    ///
    /// * `config` - Scheduler configuration
    /// * `reconciler` - The reconciler to drive
    /// * `shutdown_rx` - Broadcast receiver for the shutdown signal
    pub fn new(
        config: SchedulerConfig,
        reconciler: Arc<dyn Reconciles>,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> Self {
        let (manual_tx, manual_rx) = mpsc::channel(32);

        Self {
            config,
            reconciler,
            status: Arc::new(RwLock::new(PassStatus::default())),
            shutdown_rx,
            manual_rx,
            manual_tx,
        }
    }

    /// Get a handle for triggering manual passes
    pub fn manual_handle(&self) -> ManualPassHandle {
        ManualPassHandle {
            tx: self.manual_tx.clone(),
        }
    }

    /// Current schedule status
    pub async fn status(&self) -> PassStatus {
        self.status.read().await.clone()
    }

    /// Run the scheduler until shutdown is signaled
    pub async fn run(mut self) {
        info!(
            interval_secs = self.config.interval_secs,
            "Starting reconcile scheduler"
        );

        if self.config.initial_delay_secs > 0 {
            debug!(
                delay_secs = self.config.initial_delay_secs,
                "Waiting for initial delay"
            );
            tokio::time::sleep(Duration::from_secs(self.config.initial_delay_secs)).await;
        }

        info!("Performing initial reconciliation pass");
        Self::perform_pass(&self.reconciler, &self.status, &self.config).await;

        let interval = Duration::from_secs(self.config.interval_secs);
        let first_jitter = self.next_jitter();
        let mut ticker = interval_at(
            Instant::now() + interval + Duration::from_secs(first_jitter),
            interval,
        );

        loop {
            tokio::select! {
                _ = self.shutdown_rx.recv() => {
                    info!("Shutdown signal received, stopping reconcile scheduler");
                    break;
                }
                Some(request) = self.manual_rx.recv() => {
                    info!("Manual reconciliation pass triggered");
                    let result =
                        Self::perform_pass(&self.reconciler, &self.status, &self.config).await;
                    let _ = request.response.send(result).await;
                }
                _ = ticker.tick() => {
                    let jitter = self.next_jitter();
                    if jitter > 0 {
                        tokio::time::sleep(Duration::from_secs(jitter)).await;
                    }
                    info!("Performing scheduled reconciliation pass");
                    Self::perform_pass(&self.reconciler, &self.status, &self.config).await;
                }
            }
        }

        info!("Reconcile scheduler stopped");
    }

    fn next_jitter(&self) -> u64 {
        if self.config.jitter_secs > 0 {
            rand::thread_rng().gen_range(0..self.config.jitter_secs)
        } else {
            0
        }
    }

    async fn perform_pass(
        reconciler: &Arc<dyn Reconciles>,
        status: &Arc<RwLock<PassStatus>>,
        config: &SchedulerConfig,
    ) -> Result<ReconcileReport, String> {
        {
            let mut status = status.write().await;
            status.in_progress = true;
        }

        let result = tokio::time::timeout(
            Duration::from_secs(config.pass_timeout_secs),
            reconciler.run_pass(),
        )
        .await;

        let mut status_guard = status.write().await;
        status_guard.in_progress = false;
        status_guard.last_pass = Some(std::time::SystemTime::now());
        status_guard.next_pass = Some(
            std::time::SystemTime::now() + Duration::from_secs(config.interval_secs),
        );

        match result {
            Ok(Ok(report)) => {
                if report.is_clean() {
                    debug!("Reconciliation pass clean");
                } else {
                    info!(
                        divergences = report.divergences.len(),
                        applied = report.applied,
                        "Reconciliation pass found divergences"
                    );
                }
                status_guard.last_result = Some(Ok(PassSummary::from(&report)));
                Ok(report)
            }
            Ok(Err(err)) => {
                warn!(error = %err, "Reconciliation pass failed");
                let message = err.to_string();
                status_guard.last_result = Some(Err(message.clone()));
                Err(message)
            }
            Err(_) => {
                error!(
                    timeout_secs = config.pass_timeout_secs,
                    "Reconciliation pass timed out"
                );
                let message = "Reconciliation pass timed out".to_string();
                status_guard.last_result = Some(Err(message.clone()));
                Err(message)
            }
        }
    }
}

/// Handle for triggering manual reconciliation passes
#[derive(Clone)]
pub struct ManualPassHandle {
    tx: mpsc::Sender<ManualPassRequest>,
}

impl ManualPassHandle {
    /// Trigger a pass and wait for its report
    pub async fn trigger_pass(&self) -> Result<ReconcileReport, String> {
        let (response_tx, mut response_rx) = mpsc::channel(1);

        self.tx
            .send(ManualPassRequest {
                response: response_tx,
            })
            .await
            .map_err(|_| "Scheduler not running".to_string())?;

        response_rx
            .recv()
            .await
            .ok_or_else(|| "No response from scheduler".to_string())?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SyncDivergence;
    use chrono::Utc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::timeout;

    /// Test reconciler counting passes and returning a scripted report
    struct TestReconciler {
        pass_count: Arc<AtomicU32>,
        divergences: usize,
        delay: Option<Duration>,
    }

    impl TestReconciler {
        fn new() -> Self {
            Self {
                pass_count: Arc::new(AtomicU32::new(0)),
                divergences: 0,
                delay: None,
            }
        }

        fn with_divergences(mut self, count: usize) -> Self {
            self.divergences = count;
            self
        }

        fn slow(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        fn pass_count(&self) -> Arc<AtomicU32> {
            Arc::clone(&self.pass_count)
        }
    }

    #[async_trait]
    impl Reconciles for TestReconciler {
        async fn run_pass(&self) -> Result<ReconcileReport, AppError> {
            self.pass_count.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            Ok(ReconcileReport {
                divergences: (0..self.divergences)
                    .map(|i| {
                        SyncDivergence::price(format!("item-{}", i), "mercari", 1.0, 2.0, Utc::now())
                    })
                    .collect(),
                listings_checked: self.divergences,
                applied: 0,
                failures: Vec::new(),
            })
        }
    }

    fn fast_config() -> SchedulerConfig {
        SchedulerConfig {
            interval_secs: 3600,
            initial_delay_secs: 0,
            jitter_secs: 0,
            pass_timeout_secs: 10,
        }
    }

    // Test 1: Scheduler runs an initial pass on startup
    #[tokio::test]
    async fn test_initial_pass_on_startup() {
        let reconciler = TestReconciler::new();
        let pass_count = reconciler.pass_count();

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let scheduler =
            ReconcileScheduler::new(fast_config(), Arc::new(reconciler), shutdown_rx);

        let handle = tokio::spawn(scheduler.run());
        tokio::time::sleep(Duration::from_millis(100)).await;

        shutdown_tx.send(()).unwrap();
        let _ = timeout(Duration::from_secs(1), handle).await;

        assert_eq!(pass_count.load(Ordering::SeqCst), 1);
    }

    // Test 2: Scheduler respects the pass interval
    #[tokio::test]
    async fn test_pass_interval() {
        tokio::time::pause();

        let reconciler = TestReconciler::new();
        let pass_count = reconciler.pass_count();

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let scheduler = ReconcileScheduler::new(
            SchedulerConfig {
                interval_secs: 100,
                initial_delay_secs: 0,
                jitter_secs: 0,
                pass_timeout_secs: 60,
            },
            Arc::new(reconciler),
            shutdown_rx,
        );

        let handle = tokio::spawn(scheduler.run());

        tokio::time::advance(Duration::from_millis(50)).await;
        tokio::task::yield_now().await;
        assert_eq!(pass_count.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(101)).await;
        tokio::task::yield_now().await;
        assert_eq!(pass_count.load(Ordering::SeqCst), 2);

        shutdown_tx.send(()).unwrap();
        let _ = handle.await;
    }

    // Test 3: Graceful shutdown stops the scheduler
    #[tokio::test]
    async fn test_graceful_shutdown() {
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let scheduler =
            ReconcileScheduler::new(fast_config(), Arc::new(TestReconciler::new()), shutdown_rx);

        let handle = tokio::spawn(scheduler.run());
        tokio::time::sleep(Duration::from_millis(50)).await;

        shutdown_tx.send(()).unwrap();
        let result = timeout(Duration::from_secs(2), handle).await;
        assert!(result.is_ok());
    }

    // Test 4: Manual trigger returns the pass report
    #[tokio::test]
    async fn test_manual_trigger() {
        let reconciler = TestReconciler::new().with_divergences(3);
        let pass_count = reconciler.pass_count();

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let scheduler =
            ReconcileScheduler::new(fast_config(), Arc::new(reconciler), shutdown_rx);
        let manual = scheduler.manual_handle();

        let handle = tokio::spawn(scheduler.run());
        tokio::time::sleep(Duration::from_millis(100)).await;
        let initial = pass_count.load(Ordering::SeqCst);

        let report = manual.trigger_pass().await.unwrap();
        assert_eq!(report.divergences.len(), 3);
        assert_eq!(pass_count.load(Ordering::SeqCst), initial + 1);

        shutdown_tx.send(()).unwrap();
        let _ = handle.await;
    }

    // Test 5: Status tracking after a pass
    #[tokio::test]
    async fn test_status_tracking() {
        let reconciler = TestReconciler::new().with_divergences(2);

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let scheduler =
            ReconcileScheduler::new(fast_config(), Arc::new(reconciler), shutdown_rx);
        let status_ref = Arc::clone(&scheduler.status);

        let handle = tokio::spawn(scheduler.run());
        tokio::time::sleep(Duration::from_millis(100)).await;

        let status = status_ref.read().await;
        assert!(status.last_pass.is_some());
        assert!(!status.in_progress);
        assert_eq!(
            status.last_result,
            Some(Ok(PassSummary {
                divergences: 2,
                applied: 0,
                failed_platforms: 0,
            }))
        );

        drop(status);
        shutdown_tx.send(()).unwrap();
        let _ = handle.await;
    }

    // Test 6: A pass exceeding the timeout is recorded as timed out
    #[tokio::test]
    async fn test_pass_timeout() {
        let reconciler = TestReconciler::new().slow(Duration::from_secs(10));

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let scheduler = ReconcileScheduler::new(
            SchedulerConfig {
                interval_secs: 3600,
                initial_delay_secs: 0,
                jitter_secs: 0,
                pass_timeout_secs: 1,
            },
            Arc::new(reconciler),
            shutdown_rx,
        );
        let status_ref = Arc::clone(&scheduler.status);

        let handle = tokio::spawn(scheduler.run());
        tokio::time::sleep(Duration::from_millis(1500)).await;

        let status = status_ref.read().await;
        assert!(matches!(
            &status.last_result,
            Some(Err(msg)) if msg.contains("timed out")
        ));

        drop(status);
        shutdown_tx.send(()).unwrap();
        let _ = handle.await;
    }

    // Test 7: Default scheduler configuration mirrors the sync config
    #[test]
    fn test_default_config() {
        let config = SchedulerConfig::default();

        assert_eq!(config.interval_secs, 3600);
        assert_eq!(config.initial_delay_secs, 5);
        assert_eq!(config.jitter_secs, 60);
        assert_eq!(config.pass_timeout_secs, 300);
    }
}
