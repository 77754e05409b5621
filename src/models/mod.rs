//! Domain models for crosslist
//!
//! This module contains the core domain models used throughout the
//! application: the platform-neutral listing record, normalized sale
//! events, per-platform operation outcomes, and reconciliation
//! divergences.

pub mod divergence;
pub mod listing;
pub mod outcome;
pub mod sale;

// Re-export commonly used types
pub use divergence::{DivergenceField, DivergenceValue, Resolution, SyncDivergence};
pub use listing::{Category, Condition, ListingPatch, ListingRecord, ListingStatus, Price};
pub use outcome::{AggregatedResult, OperationOutcome, OperationStatus};
pub use sale::{DateRange, SaleRecord};
