//! Facebook Marketplace adapter
//!
//! Creation is two-phase: a product is registered in the page's catalog,
//! then a marketplace listing is attached referencing it. The two phases
//! are atomic from the caller's view: if the listing attach fails, the
//! catalog product is rolled back before the failure is reported.
//! Organic marketplace listings carry no fees and the Graph API exposes
//! no sales endpoint.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Map, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, info, warn};

use super::http::ApiClient;
use super::traits::{PlatformAdapter, RemoteFilter, RemoteListing};
use super::id_string;
use crate::config::PlatformConfig;
use crate::error::PlatformError;
use crate::models::{Category, Condition, DateRange, ListingPatch, ListingRecord, SaleRecord};

const GRAPH_URL: &str = "https://graph.facebook.com/v18.0";
const MAX_PHOTOS: usize = 10;

/// Configuration for the Facebook Marketplace adapter
#[derive(Debug, Clone)]
pub struct FacebookConfig {
    /// Override for the Graph API base URL
    pub upstream: Option<String>,

    /// Page access token
    pub access_token: String,

    /// Product catalog the page sells from
    pub catalog_id: String,

    /// Page that owns the marketplace listings
    pub page_id: String,

    /// HTTP statuses treated as retryable
    pub retry_on_status: Vec<u16>,
}

impl Default for FacebookConfig {
    fn default() -> Self {
        Self {
            upstream: None,
            access_token: String::new(),
            catalog_id: String::new(),
            page_id: String::new(),
            retry_on_status: vec![429, 500, 502, 503, 504],
        }
    }
}

impl FacebookConfig {
    fn base_url(&self) -> String {
        self.upstream
            .clone()
            .unwrap_or_else(|| GRAPH_URL.to_string())
    }
}

/// Facebook Marketplace adapter
pub struct FacebookAdapter {
    config: FacebookConfig,
    client: ApiClient,
    authenticated: AtomicBool,
}

impl FacebookAdapter {
    /// Create an adapter with default configuration
    pub fn new() -> Self {
        Self::with_config(FacebookConfig::default())
    }

    /// Create an adapter with custom configuration
    pub fn with_config(config: FacebookConfig) -> Self {
        let client = ApiClient::builder(config.base_url())
            .bearer(&config.access_token)
            .header("Accept", "application/json")
            .retry_on_status(config.retry_on_status.clone())
            .build();

        Self {
            config,
            client,
            authenticated: AtomicBool::new(false),
        }
    }

    /// Build an adapter from the application platform configuration
    pub fn from_platform(cfg: &PlatformConfig) -> Self {
        Self::with_config(FacebookConfig {
            upstream: cfg.upstream.clone(),
            access_token: cfg
                .credential("access_token")
                .unwrap_or_default()
                .to_string(),
            catalog_id: cfg.credential("catalog_id").unwrap_or_default().to_string(),
            page_id: cfg.credential("page_id").unwrap_or_default().to_string(),
            retry_on_status: cfg.retry_on_status.clone(),
        })
    }

    /// Map the neutral condition to Facebook's condition constants
    fn map_condition(condition: Condition) -> &'static str {
        match condition {
            Condition::New => "NEW",
            Condition::LikeNew => "LIKE_NEW",
            Condition::Excellent | Condition::Good => "GOOD",
            Condition::Fair => "FAIR",
            Condition::Poor => "POOR",
        }
    }

    /// Map the neutral category to Facebook's category constants
    fn map_category(category: Category) -> &'static str {
        match category {
            Category::Clothing => "APPAREL",
            Category::Shoes => "SHOES",
            Category::Accessories => "ACCESSORIES",
            Category::Bags => "BAGS_AND_LUGGAGE",
            Category::Other => "APPAREL",
        }
    }

    fn price_cents(amount: f64) -> i64 {
        (amount * 100.0).round() as i64
    }

    async fn ensure_authenticated(&self) -> Result<(), PlatformError> {
        if self.authenticated.load(Ordering::SeqCst) {
            return Ok(());
        }
        self.authenticate().await
    }

    /// Phase one: register the product in the catalog
    async fn create_catalog_product(
        &self,
        listing: &ListingRecord,
    ) -> Result<String, PlatformError> {
        let mut payload = Map::new();
        payload.insert("name".to_string(), json!(listing.title));
        payload.insert("description".to_string(), json!(listing.description));
        payload.insert(
            "price".to_string(),
            json!(Self::price_cents(listing.price.amount)),
        );
        payload.insert("currency".to_string(), json!(listing.price.currency));
        payload.insert(
            "condition".to_string(),
            json!(Self::map_condition(listing.condition)),
        );
        payload.insert(
            "category".to_string(),
            json!(Self::map_category(listing.category)),
        );
        payload.insert(
            "image_urls".to_string(),
            json!(listing.photos.iter().take(MAX_PHOTOS).collect::<Vec<_>>()),
        );
        payload.insert("inventory".to_string(), json!(listing.quantity));
        payload.insert("retailer_id".to_string(), json!(listing.id));
        payload.insert("availability".to_string(), json!("in stock"));
        if let Some(brand) = &listing.brand {
            payload.insert("brand".to_string(), json!(brand));
        }
        if let Some(size) = &listing.size {
            payload.insert("size".to_string(), json!(size));
        }

        let response = self
            .client
            .post(
                &format!("/{}/products", self.config.catalog_id),
                &Value::Object(payload),
            )
            .await?;

        id_string(&response["id"]).ok_or_else(|| {
            PlatformError::Fatal("Malformed catalog response: missing id".to_string())
        })
    }

    /// Phase two: attach a marketplace listing to the catalog product
    async fn create_marketplace_listing(&self, product_id: &str) -> Result<String, PlatformError> {
        let response = self
            .client
            .post(
                &format!("/{}/marketplace_listings", self.config.page_id),
                &json!({ "product_id": product_id }),
            )
            .await?;

        id_string(&response["id"]).ok_or_else(|| {
            PlatformError::Fatal("Malformed listing response: missing id".to_string())
        })
    }

    /// Compensating rollback for a phase-one product after phase two failed
    async fn rollback_catalog_product(&self, product_id: &str) -> Result<(), PlatformError> {
        self.client.delete(&format!("/{}", product_id)).await?;
        Ok(())
    }
}

impl Default for FacebookAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PlatformAdapter for FacebookAdapter {
    fn name(&self) -> &str {
        "facebook"
    }

    async fn authenticate(&self) -> Result<(), PlatformError> {
        self.client.get("/me", &[]).await?;
        self.authenticated.store(true, Ordering::SeqCst);
        info!(platform = "facebook", "Authenticated");
        Ok(())
    }

    async fn create(&self, listing: &ListingRecord) -> Result<String, PlatformError> {
        if self.config.catalog_id.is_empty() {
            return Err(PlatformError::Fatal(
                "catalog_id is not configured".to_string(),
            ));
        }
        if self.config.page_id.is_empty() {
            return Err(PlatformError::Fatal("page_id is not configured".to_string()));
        }

        self.ensure_authenticated().await?;

        let product_id = self.create_catalog_product(listing).await?;
        debug!(
            platform = "facebook",
            product_id = %product_id,
            "Catalog product created, attaching marketplace listing"
        );

        match self.create_marketplace_listing(&product_id).await {
            Ok(listing_id) => Ok(listing_id),
            Err(listing_err) => {
                warn!(
                    platform = "facebook",
                    product_id = %product_id,
                    error = %listing_err,
                    "Listing attach failed, rolling back catalog product"
                );
                match self.rollback_catalog_product(&product_id).await {
                    Ok(()) => Err(listing_err),
                    Err(rollback_err) => {
                        error!(
                            platform = "facebook",
                            product_id = %product_id,
                            error = %rollback_err,
                            "Rollback failed, catalog product orphaned"
                        );
                        Err(PlatformError::Fatal(format!(
                            "Listing attach failed ({}); rollback of catalog product {} also failed ({})",
                            listing_err, product_id, rollback_err
                        )))
                    }
                }
            }
        }
    }

    async fn update(&self, remote_id: &str, patch: &ListingPatch) -> Result<(), PlatformError> {
        self.ensure_authenticated().await?;

        let mut payload = Map::new();
        if let Some(title) = &patch.title {
            payload.insert("name".to_string(), json!(title));
        }
        if let Some(description) = &patch.description {
            payload.insert("description".to_string(), json!(description));
        }
        if let Some(price) = patch.price {
            payload.insert("price".to_string(), json!(Self::price_cents(price)));
        }
        if let Some(quantity) = patch.quantity {
            payload.insert("inventory".to_string(), json!(quantity));
        }
        if let Some(condition) = patch.condition {
            payload.insert(
                "condition".to_string(),
                json!(Self::map_condition(condition)),
            );
        }

        if payload.is_empty() {
            return Ok(());
        }

        self.client
            .post(&format!("/{}", remote_id), &Value::Object(payload))
            .await?;
        Ok(())
    }

    async fn delete(&self, remote_id: &str) -> Result<(), PlatformError> {
        self.ensure_authenticated().await?;
        self.client.delete(&format!("/{}", remote_id)).await?;
        Ok(())
    }

    async fn list_remote(
        &self,
        filter: &RemoteFilter,
    ) -> Result<Vec<RemoteListing>, PlatformError> {
        self.ensure_authenticated().await?;

        let mut query: Vec<(&str, String)> = vec![(
            "fields",
            "id,name,price,inventory,availability,retailer_id".to_string(),
        )];
        if let Some(page_size) = filter.page_size {
            query.push(("limit", page_size.to_string()));
        }

        let response = self
            .client
            .get(&format!("/{}/products", self.config.catalog_id), &query)
            .await?;
        let items = response["data"].as_array().cloned().unwrap_or_default();

        let observed_at = Utc::now();
        let snapshots = items
            .iter()
            .filter_map(|item| {
                let remote_id = id_string(&item["id"])?;
                Some(RemoteListing {
                    remote_id,
                    title: item["name"].as_str().unwrap_or_default().to_string(),
                    price: item["price"].as_f64().unwrap_or(0.0) / 100.0,
                    quantity: item["inventory"].as_u64().unwrap_or(1) as u32,
                    active: item["availability"]
                        .as_str()
                        .map(|s| s == "in stock")
                        .unwrap_or(true),
                    observed_at,
                })
            })
            .collect();

        Ok(snapshots)
    }

    async fn list_sales(&self, _range: &DateRange) -> Result<Vec<SaleRecord>, PlatformError> {
        // The Graph API exposes no marketplace sales endpoint; an empty
        // window is the contract, not an error.
        debug!(
            platform = "facebook",
            "No sales API available, returning empty window"
        );
        Ok(Vec::new())
    }

    async fn health_check(&self) -> Result<(), PlatformError> {
        self.client.get("/me", &[]).await?;
        Ok(())
    }
}
