//! Platform adapter trait definition
//!
//! This module defines the `PlatformAdapter` trait that every
//! marketplace integration implements. The orchestration layers depend
//! only on this contract, never on concrete platform types.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::PlatformError;
use crate::models::{DateRange, ListingPatch, ListingRecord, SaleRecord};

/// A point-in-time snapshot of one listing as observed on a platform
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteListing {
    /// Platform-assigned listing identifier
    pub remote_id: String,

    /// Listing title as shown on the platform
    pub title: String,

    /// Price in major units, platform currency
    pub price: f64,

    /// Available quantity
    pub quantity: u32,

    /// Whether the listing is live
    pub active: bool,

    /// When this snapshot was taken
    pub observed_at: DateTime<Utc>,
}

impl RemoteListing {
    /// Create a snapshot observed now
    pub fn new(remote_id: impl Into<String>, title: impl Into<String>, price: f64, quantity: u32) -> Self {
        Self {
            remote_id: remote_id.into(),
            title: title.into(),
            price,
            quantity,
            active: true,
            observed_at: Utc::now(),
        }
    }

    /// Mark the snapshot inactive
    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    /// Override the observation timestamp
    pub fn observed_at(mut self, at: DateTime<Utc>) -> Self {
        self.observed_at = at;
        self
    }
}

/// Filter for remote listing fetches
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoteFilter {
    /// Restrict to listings in this status, platform-interpreted
    pub status: Option<String>,

    /// Page size hint for platform pagination
    pub page_size: Option<usize>,
}

/// The capability contract one marketplace integration implements
///
/// Every operation is independently subject to the caller's rate limiter
/// and retry policy; adapters only translate between the uniform model
/// and their platform's wire format. Multi-phase operations (photo
/// uploads, catalog-then-listing creates) are adapter-internal and must
/// be atomic from the caller's view.
#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    /// The platform name this adapter serves, used as the registry key
    fn name(&self) -> &str;

    /// Establish or refresh credentials; idempotent after first success
    async fn authenticate(&self) -> Result<(), PlatformError>;

    /// Create a listing, returning the platform's remote identifier
    async fn create(&self, listing: &ListingRecord) -> Result<String, PlatformError>;

    /// Update the set fields of an existing listing
    async fn update(&self, remote_id: &str, patch: &ListingPatch) -> Result<(), PlatformError>;

    /// Delete an existing listing
    async fn delete(&self, remote_id: &str) -> Result<(), PlatformError>;

    /// Fetch current listing snapshots, finite and platform-paginated
    async fn list_remote(&self, filter: &RemoteFilter) -> Result<Vec<RemoteListing>, PlatformError>;

    /// Fetch sales in a date window; empty when the platform has no sales API
    async fn list_sales(&self, range: &DateRange) -> Result<Vec<SaleRecord>, PlatformError>;

    /// Probe platform reachability; Ok means healthy
    async fn health_check(&self) -> Result<(), PlatformError>;
}
