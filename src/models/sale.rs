//! Normalized sale events
//!
//! Every platform's sale payload is normalized into a `SaleRecord` at
//! ingestion. The net amount is derived state: it is always recomputed
//! from gross and fees, including on deserialization, and can never be
//! set independently.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ValidationError;

/// A closed date window for sales queries
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    /// Create a range from explicit bounds
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// The window covering the last `days` days, ending now
    pub fn last_days(days: i64) -> Self {
        let end = Utc::now();
        Self {
            start: end - Duration::days(days),
            end,
        }
    }

    /// Whether a timestamp falls inside the window
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && at <= self.end
    }
}

/// A normalized sale event from one platform
///
/// Construction validates identifiers and amounts and computes the net
/// amount; records are append-only afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SaleRecord {
    /// Platform-assigned sale identifier
    pub sale_id: String,

    /// Remote listing identifier the sale originated from
    pub listing_id: String,

    /// Originating platform name
    pub platform: String,

    /// Opaque buyer metadata as reported by the platform
    #[serde(default)]
    pub buyer: Map<String, Value>,

    /// Timestamp of the sale
    pub sale_date: DateTime<Utc>,

    /// Gross amount received
    pub gross_amount: f64,

    /// Fees withheld by the platform
    pub fees: f64,

    /// Net amount, always `gross_amount - fees`
    net_amount: f64,

    /// Platform-specific fields not otherwise modeled
    #[serde(default)]
    pub extra: Map<String, Value>,
}

impl SaleRecord {
    /// Construct a validated sale record
    ///
    /// Fails when any identifier is empty or an amount is negative.
    /// The net amount is derived here and nowhere else.
    pub fn new(
        sale_id: impl Into<String>,
        listing_id: impl Into<String>,
        platform: impl Into<String>,
        sale_date: DateTime<Utc>,
        gross_amount: f64,
        fees: f64,
    ) -> Result<Self, ValidationError> {
        let sale_id = sale_id.into();
        let listing_id = listing_id.into();
        let platform = platform.into();

        if sale_id.trim().is_empty() {
            return Err(ValidationError::MissingField("sale_id"));
        }
        if listing_id.trim().is_empty() {
            return Err(ValidationError::MissingField("listing_id"));
        }
        if platform.trim().is_empty() {
            return Err(ValidationError::MissingField("platform"));
        }
        if gross_amount < 0.0 {
            return Err(ValidationError::NegativeAmount("gross_amount", gross_amount));
        }
        if fees < 0.0 {
            return Err(ValidationError::NegativeAmount("fees", fees));
        }

        Ok(Self {
            sale_id,
            listing_id,
            platform,
            buyer: Map::new(),
            sale_date,
            gross_amount,
            fees,
            net_amount: gross_amount - fees,
            extra: Map::new(),
        })
    }

    /// Attach buyer metadata
    pub fn with_buyer(mut self, buyer: Map<String, Value>) -> Self {
        self.buyer = buyer;
        self
    }

    /// Attach platform-specific extension fields
    pub fn with_extra(mut self, extra: Map<String, Value>) -> Self {
        self.extra = extra;
        self
    }

    /// Net amount after fees
    pub fn net_amount(&self) -> f64 {
        self.net_amount
    }

    /// Profit margin percentage, zero for a zero gross
    pub fn profit_margin(&self) -> f64 {
        if self.gross_amount <= 0.0 {
            return 0.0;
        }
        (self.net_amount / self.gross_amount) * 100.0
    }
}

// Deserialization recomputes the net amount from gross and fees so a
// stored or hand-edited record can never smuggle in an inconsistent one.
impl<'de> Deserialize<'de> for SaleRecord {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Raw {
            sale_id: String,
            listing_id: String,
            platform: String,
            #[serde(default)]
            buyer: Map<String, Value>,
            sale_date: DateTime<Utc>,
            gross_amount: f64,
            fees: f64,
            #[serde(default)]
            extra: Map<String, Value>,
        }

        let raw = Raw::deserialize(deserializer)?;
        SaleRecord::new(
            raw.sale_id,
            raw.listing_id,
            raw.platform,
            raw.sale_date,
            raw.gross_amount,
            raw.fees,
        )
        .map(|record| record.with_buyer(raw.buyer).with_extra(raw.extra))
        .map_err(serde::de::Error::custom)
    }
}
