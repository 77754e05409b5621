//! Reconciliation divergences
//!
//! One `SyncDivergence` records a single mismatch between the stored
//! record and a platform's observed snapshot, for one field on one
//! listing, together with both values and the resolution once decided.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The field on which stored and observed state disagree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DivergenceField {
    Price,
    Quantity,
    /// The listing exists in exactly one of the two views
    Existence,
}

/// A typed field value on either side of a divergence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DivergenceValue {
    Price(f64),
    Quantity(u32),
    /// The listing is present in this view
    Present,
    /// The listing is absent in this view
    Missing,
}

/// The decision applied to a divergence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// The stored value was kept
    KeptStored,
    /// The observed platform value overwrote the stored field
    AppliedObserved,
    /// The platform's remote-id entry was removed (delete divergence)
    RemovedRemoteEntry,
}

/// One detected mismatch between stored and platform-observed state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncDivergence {
    /// Stored listing identifier
    pub listing_id: String,

    /// Platform whose snapshot diverges
    pub platform: String,

    /// Field that diverges
    pub field: DivergenceField,

    /// Value held in the store
    pub stored: DivergenceValue,

    /// Value observed on the platform
    pub observed: DivergenceValue,

    /// When the platform state was observed
    pub observed_at: DateTime<Utc>,

    /// Decision, set at most once
    pub resolution: Option<Resolution>,
}

impl SyncDivergence {
    /// A price mismatch
    pub fn price(
        listing_id: impl Into<String>,
        platform: impl Into<String>,
        stored: f64,
        observed: f64,
        observed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            listing_id: listing_id.into(),
            platform: platform.into(),
            field: DivergenceField::Price,
            stored: DivergenceValue::Price(stored),
            observed: DivergenceValue::Price(observed),
            observed_at,
            resolution: None,
        }
    }

    /// A quantity mismatch
    pub fn quantity(
        listing_id: impl Into<String>,
        platform: impl Into<String>,
        stored: u32,
        observed: u32,
        observed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            listing_id: listing_id.into(),
            platform: platform.into(),
            field: DivergenceField::Quantity,
            stored: DivergenceValue::Quantity(stored),
            observed: DivergenceValue::Quantity(observed),
            observed_at,
            resolution: None,
        }
    }

    /// A listing recorded for a platform but absent there (delete divergence)
    pub fn missing_remotely(
        listing_id: impl Into<String>,
        platform: impl Into<String>,
        observed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            listing_id: listing_id.into(),
            platform: platform.into(),
            field: DivergenceField::Existence,
            stored: DivergenceValue::Present,
            observed: DivergenceValue::Missing,
            observed_at,
            resolution: None,
        }
    }

    /// Record the decision; only the first resolution sticks
    pub fn resolve(&mut self, resolution: Resolution) {
        if self.resolution.is_none() {
            self.resolution = Some(resolution);
        }
    }

    /// Whether a decision has been recorded
    pub fn is_resolved(&self) -> bool {
        self.resolution.is_some()
    }
}
