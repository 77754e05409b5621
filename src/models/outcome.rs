//! Per-platform operation outcomes and their aggregation
//!
//! One logical operation fans out to several platforms; each platform's
//! call resolves to exactly one `OperationOutcome`, and the complete set
//! aggregates into an `AggregatedResult`. Outcomes are immutable once
//! produced and the aggregate never drops a platform's entry.

use std::time::Duration;

use crate::error::PlatformError;

/// The result of one platform call within a logical operation
#[derive(Debug, Clone, PartialEq)]
pub struct OperationOutcome {
    platform: String,
    remote_id: Option<String>,
    error: Option<PlatformError>,
    latency: Duration,
    retries: u32,
}

impl OperationOutcome {
    /// A successful outcome, optionally carrying the remote identifier
    pub fn success(
        platform: impl Into<String>,
        remote_id: Option<String>,
        latency: Duration,
        retries: u32,
    ) -> Self {
        Self {
            platform: platform.into(),
            remote_id,
            error: None,
            latency,
            retries,
        }
    }

    /// A failed outcome carrying the terminal error
    pub fn failure(
        platform: impl Into<String>,
        error: PlatformError,
        latency: Duration,
        retries: u32,
    ) -> Self {
        Self {
            platform: platform.into(),
            remote_id: None,
            error: Some(error),
            latency,
            retries,
        }
    }

    /// Platform this outcome belongs to
    pub fn platform(&self) -> &str {
        &self.platform
    }

    /// Whether the platform call succeeded
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }

    /// Remote identifier returned on success
    pub fn remote_id(&self) -> Option<&str> {
        self.remote_id.as_deref()
    }

    /// Terminal error on failure
    pub fn error(&self) -> Option<&PlatformError> {
        self.error.as_ref()
    }

    /// Wall-clock time the call consumed, including waits and retries
    pub fn latency(&self) -> Duration {
        self.latency
    }

    /// Retries consumed beyond the initial attempt
    pub fn retries(&self) -> u32 {
        self.retries
    }
}

/// Overall status derived from a set of outcomes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationStatus {
    /// Every targeted platform succeeded
    AllSucceeded,
    /// Some platforms succeeded, some failed
    Partial,
    /// No targeted platform succeeded
    AllFailed,
}

impl OperationStatus {
    /// Short label for logs and CLI output
    pub fn label(&self) -> &'static str {
        match self {
            OperationStatus::AllSucceeded => "all_succeeded",
            OperationStatus::Partial => "partial",
            OperationStatus::AllFailed => "all_failed",
        }
    }
}

/// All outcomes of one logical operation plus the derived status
///
/// Partial success is not an error; callers inspect per-platform
/// outcomes to decide what to do next.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedResult {
    outcomes: Vec<OperationOutcome>,
    status: OperationStatus,
}

impl AggregatedResult {
    /// Aggregate a complete set of outcomes
    ///
    /// An empty set aggregates to `AllSucceeded` (vacuously: no targeted
    /// platform failed).
    pub fn from_outcomes(outcomes: Vec<OperationOutcome>) -> Self {
        let succeeded = outcomes.iter().filter(|o| o.succeeded()).count();
        let status = if succeeded == outcomes.len() {
            OperationStatus::AllSucceeded
        } else if succeeded == 0 {
            OperationStatus::AllFailed
        } else {
            OperationStatus::Partial
        };
        Self { outcomes, status }
    }

    /// Derived overall status
    pub fn status(&self) -> OperationStatus {
        self.status
    }

    /// Every platform outcome, one per targeted platform
    pub fn outcomes(&self) -> &[OperationOutcome] {
        &self.outcomes
    }

    /// The outcome for a specific platform
    pub fn outcome_for(&self, platform: &str) -> Option<&OperationOutcome> {
        self.outcomes.iter().find(|o| o.platform() == platform)
    }

    /// Names of platforms that succeeded
    pub fn succeeded_platforms(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| o.succeeded())
            .map(OperationOutcome::platform)
            .collect()
    }

    /// Names of platforms that failed
    pub fn failed_platforms(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| !o.succeeded())
            .map(OperationOutcome::platform)
            .collect()
    }
}
