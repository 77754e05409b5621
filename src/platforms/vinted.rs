//! Vinted marketplace adapter
//!
//! Vinted requires photos to be uploaded before item creation and keys
//! conditions by numeric identifier. Sales arrive as transactions whose
//! fees combine a 5% platform cut with a 3% buyer protection cut.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Map, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

use super::http::ApiClient;
use super::traits::{PlatformAdapter, RemoteFilter, RemoteListing};
use super::{id_string, parse_timestamp, round_currency};
use crate::config::PlatformConfig;
use crate::error::PlatformError;
use crate::models::{Category, Condition, DateRange, ListingPatch, ListingRecord, SaleRecord};

const PRODUCTION_URL: &str = "https://api.vinted.com/v1";

const PLATFORM_FEE_RATE: f64 = 0.05;
const BUYER_PROTECTION_FEE_RATE: f64 = 0.03;

/// Configuration for the Vinted adapter
#[derive(Debug, Clone)]
pub struct VintedConfig {
    /// Override for the API base URL
    pub upstream: Option<String>,

    /// OAuth bearer token
    pub access_token: String,

    /// HTTP statuses treated as retryable
    pub retry_on_status: Vec<u16>,
}

impl Default for VintedConfig {
    fn default() -> Self {
        Self {
            upstream: None,
            access_token: String::new(),
            retry_on_status: vec![429, 500, 502, 503, 504],
        }
    }
}

impl VintedConfig {
    fn base_url(&self) -> String {
        self.upstream
            .clone()
            .unwrap_or_else(|| PRODUCTION_URL.to_string())
    }
}

/// Vinted marketplace adapter
pub struct VintedAdapter {
    client: ApiClient,
    authenticated: AtomicBool,
}

impl VintedAdapter {
    /// Create an adapter with default configuration
    pub fn new() -> Self {
        Self::with_config(VintedConfig::default())
    }

    /// Create an adapter with custom configuration
    pub fn with_config(config: VintedConfig) -> Self {
        let client = ApiClient::builder(config.base_url())
            .bearer(&config.access_token)
            .header("Accept", "application/json")
            .retry_on_status(config.retry_on_status.clone())
            .build();

        Self {
            client,
            authenticated: AtomicBool::new(false),
        }
    }

    /// Build an adapter from the application platform configuration
    pub fn from_platform(cfg: &PlatformConfig) -> Self {
        Self::with_config(VintedConfig {
            upstream: cfg.upstream.clone(),
            access_token: cfg
                .credential("access_token")
                .unwrap_or_default()
                .to_string(),
            retry_on_status: cfg.retry_on_status.clone(),
        })
    }

    /// Map the neutral condition to Vinted's numeric condition ids
    fn condition_id(condition: Condition) -> u8 {
        match condition {
            Condition::New => 1,
            Condition::LikeNew => 2,
            Condition::Excellent => 3,
            Condition::Good => 4,
            Condition::Fair => 5,
            Condition::Poor => 6,
        }
    }

    /// Map the neutral category to Vinted's category keys
    fn map_category(category: Category) -> &'static str {
        match category {
            Category::Clothing => "clothing",
            Category::Shoes => "shoes",
            Category::Accessories => "accessories",
            Category::Bags => "bags",
            Category::Other => "other",
        }
    }

    /// Total Vinted fees for a sale amount
    pub fn fees(amount: f64) -> f64 {
        round_currency(amount * PLATFORM_FEE_RATE + amount * BUYER_PROTECTION_FEE_RATE)
    }

    async fn ensure_authenticated(&self) -> Result<(), PlatformError> {
        if self.authenticated.load(Ordering::SeqCst) {
            return Ok(());
        }
        self.authenticate().await
    }

    /// Upload photos ahead of item creation, returning uploaded ids
    ///
    /// A failed upload is skipped so a single bad photo never sinks the
    /// listing; the create proceeds with the photos that made it.
    async fn upload_photos(&self, photo_urls: &[String]) -> Vec<u64> {
        let mut photo_ids = Vec::with_capacity(photo_urls.len());

        for url in photo_urls {
            let result = self
                .client
                .post("/photos", &json!({ "photo_url": url }))
                .await;

            match result {
                Ok(response) => match response["id"].as_u64() {
                    Some(id) => photo_ids.push(id),
                    None => warn!(platform = "vinted", url = %url, "Photo upload returned no id"),
                },
                Err(e) => {
                    warn!(platform = "vinted", url = %url, error = %e, "Photo upload failed, skipping");
                }
            }
        }

        photo_ids
    }
}

impl Default for VintedAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PlatformAdapter for VintedAdapter {
    fn name(&self) -> &str {
        "vinted"
    }

    async fn authenticate(&self) -> Result<(), PlatformError> {
        self.client.get("/user/profile", &[]).await?;
        self.authenticated.store(true, Ordering::SeqCst);
        info!(platform = "vinted", "Authenticated");
        Ok(())
    }

    async fn create(&self, listing: &ListingRecord) -> Result<String, PlatformError> {
        self.ensure_authenticated().await?;

        let photo_ids = self.upload_photos(&listing.photos).await;

        let mut payload = Map::new();
        payload.insert("title".to_string(), json!(listing.title));
        payload.insert("description".to_string(), json!(listing.description));
        payload.insert("price".to_string(), json!(listing.price.amount));
        payload.insert("currency".to_string(), json!(listing.price.currency));
        payload.insert(
            "item_condition_id".to_string(),
            json!(Self::condition_id(listing.condition)),
        );
        payload.insert(
            "category_id".to_string(),
            json!(Self::map_category(listing.category)),
        );
        payload.insert("photo_ids".to_string(), json!(photo_ids));
        payload.insert("quantity".to_string(), json!(listing.quantity));
        payload.insert("is_for_sell".to_string(), json!(true));
        if let Some(brand) = &listing.brand {
            payload.insert("brand_id".to_string(), json!(brand));
        }
        if let Some(size) = &listing.size {
            payload.insert("size_id".to_string(), json!(size));
        }

        let response = self.client.post("/items", &Value::Object(payload)).await?;

        id_string(&response["item"]["id"]).ok_or_else(|| {
            PlatformError::Fatal("Malformed create response: missing item.id".to_string())
        })
    }

    async fn update(&self, remote_id: &str, patch: &ListingPatch) -> Result<(), PlatformError> {
        self.ensure_authenticated().await?;

        let mut payload = Map::new();
        if let Some(title) = &patch.title {
            payload.insert("title".to_string(), json!(title));
        }
        if let Some(description) = &patch.description {
            payload.insert("description".to_string(), json!(description));
        }
        if let Some(price) = patch.price {
            payload.insert("price".to_string(), json!(price));
        }
        if let Some(quantity) = patch.quantity {
            payload.insert("quantity".to_string(), json!(quantity));
        }
        if let Some(condition) = patch.condition {
            payload.insert(
                "item_condition_id".to_string(),
                json!(Self::condition_id(condition)),
            );
        }

        if payload.is_empty() {
            return Ok(());
        }

        self.client
            .put(&format!("/items/{}", remote_id), &Value::Object(payload))
            .await?;
        Ok(())
    }

    async fn delete(&self, remote_id: &str) -> Result<(), PlatformError> {
        self.ensure_authenticated().await?;
        self.client.delete(&format!("/items/{}", remote_id)).await?;
        Ok(())
    }

    async fn list_remote(
        &self,
        filter: &RemoteFilter,
    ) -> Result<Vec<RemoteListing>, PlatformError> {
        self.ensure_authenticated().await?;

        let mut query: Vec<(&str, String)> = Vec::new();
        if let Some(status) = &filter.status {
            query.push(("status", status.clone()));
        }
        if let Some(page_size) = filter.page_size {
            query.push(("per_page", page_size.to_string()));
        }

        let response = self.client.get("/items", &query).await?;
        let items = response["items"].as_array().cloned().unwrap_or_default();

        let observed_at = Utc::now();
        let snapshots = items
            .iter()
            .filter_map(|item| {
                let remote_id = id_string(&item["id"])?;
                Some(RemoteListing {
                    remote_id,
                    title: item["title"].as_str().unwrap_or_default().to_string(),
                    price: item["price"].as_f64().unwrap_or(0.0),
                    quantity: item["quantity"].as_u64().unwrap_or(1) as u32,
                    active: !item["is_hidden"].as_bool().unwrap_or(false),
                    observed_at,
                })
            })
            .collect();

        Ok(snapshots)
    }

    async fn list_sales(&self, range: &DateRange) -> Result<Vec<SaleRecord>, PlatformError> {
        self.ensure_authenticated().await?;

        let query = [
            ("start_date", range.start.to_rfc3339()),
            ("end_date", range.end.to_rfc3339()),
        ];
        let response = self.client.get("/transactions", &query).await?;
        let entries = response["transactions"]
            .as_array()
            .cloned()
            .unwrap_or_default();

        let mut sales = Vec::with_capacity(entries.len());
        for entry in entries {
            let sale_id = id_string(&entry["id"]).unwrap_or_default();
            let listing_id = id_string(&entry["item_id"]).unwrap_or_default();
            let gross = entry["total_item_price"].as_f64().unwrap_or(0.0);

            let sale = SaleRecord::new(
                sale_id,
                listing_id,
                "vinted",
                parse_timestamp(entry["created_at"].as_str()),
                gross,
                Self::fees(gross),
            )
            .map_err(|e| PlatformError::Fatal(format!("Invalid sale payload: {}", e)))?
            .with_buyer(entry["buyer"].as_object().cloned().unwrap_or_default())
            .with_extra(entry.as_object().cloned().unwrap_or_default());

            sales.push(sale);
        }

        Ok(sales)
    }

    async fn health_check(&self) -> Result<(), PlatformError> {
        self.client.get("/user/profile", &[]).await?;
        Ok(())
    }
}
