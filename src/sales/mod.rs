//! Cross-platform sales aggregation
//!
//! The aggregator pulls sale events from every adapter for a date
//! window, normalizes them into one sequence ordered by sale date, and
//! summarizes totals per platform and overall. A platform without a
//! sales API contributes an empty window; a failing platform is
//! reported and never sinks the rest of the report.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::{AppError, PlatformError};
use crate::models::{DateRange, SaleRecord};
use crate::platforms::{round_currency, PlatformAdapter};
use crate::repository::Repository;
use crate::throttle::{RateLimiter, RetryPolicy};

/// Totals across every platform in the window
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SalesSummary {
    pub total_sales: usize,
    pub total_gross: f64,
    pub total_fees: f64,
    pub total_net: f64,
    pub average_sale: f64,
    pub profit_margin: f64,
}

/// One platform's contribution to the window
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlatformSales {
    pub sales_count: usize,
    pub gross_amount: f64,
    pub fees: f64,
    pub net_amount: f64,
}

/// The cross-platform sales report for one date window
#[derive(Debug, Clone)]
pub struct SalesReport {
    /// The queried window
    pub range: DateRange,

    /// Every sale in the window, ordered by sale date
    pub sales: Vec<SaleRecord>,

    /// Overall totals
    pub summary: SalesSummary,

    /// Per-platform breakdown
    pub breakdown: HashMap<String, PlatformSales>,

    /// Platforms whose fetch failed this run
    pub failures: Vec<(String, PlatformError)>,
}

/// Pulls and normalizes sale events across every adapter
pub struct SalesAggregator<R: Repository> {
    adapters: HashMap<String, Arc<dyn PlatformAdapter>>,
    limiter: Arc<RateLimiter>,
    policies: HashMap<String, RetryPolicy>,
    default_policy: RetryPolicy,
    repository: Arc<R>,
}

impl<R: Repository> SalesAggregator<R> {
    /// Create an aggregator over an adapter registry
    pub fn new(
        adapters: HashMap<String, Arc<dyn PlatformAdapter>>,
        limiter: Arc<RateLimiter>,
        policies: HashMap<String, RetryPolicy>,
        repository: Arc<R>,
    ) -> Self {
        Self {
            adapters,
            limiter,
            policies,
            default_policy: RetryPolicy::with_defaults(),
            repository,
        }
    }

    fn policy_for(&self, platform: &str) -> &RetryPolicy {
        self.policies.get(platform).unwrap_or(&self.default_policy)
    }

    /// Build the sales report for a date window
    ///
    /// Fetched sales are appended to the repository; re-running a window
    /// does not duplicate events.
    pub async fn report(&self, range: DateRange) -> Result<SalesReport, AppError> {
        let mut sales: Vec<SaleRecord> = Vec::new();
        let mut breakdown: HashMap<String, PlatformSales> = HashMap::new();
        let mut failures: Vec<(String, PlatformError)> = Vec::new();

        for (name, adapter) in &self.adapters {
            self.limiter.acquire(name).await;

            let adapter = Arc::clone(adapter);
            let (result, _retries) = self
                .policy_for(name)
                .execute(move || {
                    let adapter = Arc::clone(&adapter);
                    async move { adapter.list_sales(&range).await }
                })
                .await;

            match result {
                Ok(platform_sales) => {
                    debug!(platform = %name, count = platform_sales.len(), "Fetched sales");
                    let entry = breakdown.entry(name.clone()).or_default();
                    for sale in &platform_sales {
                        entry.sales_count += 1;
                        entry.gross_amount += sale.gross_amount;
                        entry.fees += sale.fees;
                        entry.net_amount += sale.net_amount();
                        self.repository.append_sale(sale).await?;
                    }
                    entry.gross_amount = round_currency(entry.gross_amount);
                    entry.fees = round_currency(entry.fees);
                    entry.net_amount = round_currency(entry.net_amount);
                    sales.extend(platform_sales);
                }
                Err(error) => {
                    warn!(platform = %name, error = %error, "Sales fetch failed, contributing empty window");
                    breakdown.entry(name.clone()).or_default();
                    failures.push((name.clone(), error));
                }
            }
        }

        sales.sort_by(|a, b| a.sale_date.cmp(&b.sale_date));
        let summary = summarize(&sales);

        info!(
            sales = summary.total_sales,
            gross = summary.total_gross,
            net = summary.total_net,
            failed_platforms = failures.len(),
            "Sales report assembled"
        );

        Ok(SalesReport {
            range,
            sales,
            summary,
            breakdown,
            failures,
        })
    }
}

fn summarize(sales: &[SaleRecord]) -> SalesSummary {
    let total_sales = sales.len();
    let total_gross: f64 = sales.iter().map(|s| s.gross_amount).sum();
    let total_fees: f64 = sales.iter().map(|s| s.fees).sum();
    let total_net: f64 = sales.iter().map(|s| s.net_amount()).sum();

    SalesSummary {
        total_sales,
        total_gross: round_currency(total_gross),
        total_fees: round_currency(total_fees),
        total_net: round_currency(total_net),
        average_sale: if total_sales > 0 {
            round_currency(total_gross / total_sales as f64)
        } else {
            0.0
        },
        profit_margin: if total_gross > 0.0 {
            round_currency(total_net / total_gross * 100.0)
        } else {
            0.0
        },
    }
}
