//! Persistence layer for crosslist
//!
//! This module defines the repository trait the orchestration layers
//! depend on, and its SQLite implementation. Access is transactional per
//! record; no cross-record transactions are offered.

pub mod migrations;
pub mod sqlite;

pub use sqlite::SqliteRepository;

use async_trait::async_trait;

use crate::error::RepoError;
use crate::models::{DateRange, ListingRecord, SaleRecord};

/// Repository trait for listing and sale persistence
///
/// It uses `async_trait` for async methods and `mockall::automock` for
/// testing.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Repository: Send + Sync {
    /// Load a listing by its inventory identifier
    async fn load_listing(&self, id: &str) -> Result<Option<ListingRecord>, RepoError>;

    /// Insert or replace a listing record
    async fn save_listing(&self, record: &ListingRecord) -> Result<(), RepoError>;

    /// Delete a listing record
    ///
    /// Returns true if a record was removed
    async fn delete_listing(&self, id: &str) -> Result<bool, RepoError>;

    /// All stored listing records
    async fn all_listings(&self) -> Result<Vec<ListingRecord>, RepoError>;

    /// Stored sales inside a date window, ordered by sale date
    async fn load_sales(&self, range: &DateRange) -> Result<Vec<SaleRecord>, RepoError>;

    /// Append a sale event; re-ingesting the same sale is a no-op
    async fn append_sale(&self, sale: &SaleRecord) -> Result<(), RepoError>;
}
