//! crosslist - cross-platform marketplace listing orchestration
//!
//! This crate publishes, updates, retires, and reconciles one logical
//! inventory item across several independent marketplace platforms with
//! heterogeneous REST APIs. Platform adapters translate a uniform
//! listing model to each platform's wire format; the orchestrator fans
//! operations out under per-platform rate limits and retry budgets and
//! aggregates partial-success results; the reconciler folds divergent
//! platform state back into the inventory store.

pub mod config;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod platforms;
pub mod reconcile;
pub mod repository;
pub mod sales;
pub mod throttle;
