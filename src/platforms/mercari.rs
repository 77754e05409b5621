//! Mercari marketplace adapter
//!
//! Mercari prices travel in cents on the wire, listings allow up to
//! eight photos, and every sale carries a 10% platform fee plus a 2.9%
//! payment processing fee.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Map, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;

use super::http::ApiClient;
use super::traits::{PlatformAdapter, RemoteFilter, RemoteListing};
use super::{id_string, parse_timestamp, round_currency};
use crate::config::PlatformConfig;
use crate::error::PlatformError;
use crate::models::{Category, Condition, DateRange, ListingPatch, ListingRecord, SaleRecord};

const PRODUCTION_URL: &str = "https://api.mercari.com/v1";
const SANDBOX_URL: &str = "https://api-sandbox.mercari.com/v1";

const PLATFORM_FEE_RATE: f64 = 0.10;
const PAYMENT_FEE_RATE: f64 = 0.029;
const MAX_PHOTOS: usize = 8;

/// Configuration for the Mercari adapter
#[derive(Debug, Clone)]
pub struct MercariConfig {
    /// Override for the API base URL
    pub upstream: Option<String>,

    /// Target the sandbox environment
    pub sandbox: bool,

    /// API key sent as X-API-Key
    pub api_key: String,

    /// OAuth bearer token
    pub access_token: String,

    /// HTTP statuses treated as retryable
    pub retry_on_status: Vec<u16>,
}

impl Default for MercariConfig {
    fn default() -> Self {
        Self {
            upstream: None,
            sandbox: true,
            api_key: String::new(),
            access_token: String::new(),
            retry_on_status: vec![429, 500, 502, 503, 504],
        }
    }
}

impl MercariConfig {
    fn base_url(&self) -> String {
        match &self.upstream {
            Some(url) => url.clone(),
            None if self.sandbox => SANDBOX_URL.to_string(),
            None => PRODUCTION_URL.to_string(),
        }
    }
}

/// Mercari marketplace adapter
pub struct MercariAdapter {
    client: ApiClient,
    authenticated: AtomicBool,
}

impl MercariAdapter {
    /// Create an adapter with default configuration
    pub fn new() -> Self {
        Self::with_config(MercariConfig::default())
    }

    /// Create an adapter with custom configuration
    pub fn with_config(config: MercariConfig) -> Self {
        let client = ApiClient::builder(config.base_url())
            .bearer(&config.access_token)
            .header("X-API-Key", &config.api_key)
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
        Self::with_config(MercariConfig {
            upstream: cfg.upstream.clone(),
            sandbox: cfg.sandbox,
            api_key: cfg.credential("api_key").unwrap_or_default().to_string(),
            access_token: cfg
                .credential("access_token")
                .unwrap_or_default()
                .to_string(),
            retry_on_status: cfg.retry_on_status.clone(),
        })
    }

    /// Map the neutral condition to Mercari's condition labels
    fn map_condition(condition: Condition) -> &'static str {
        match condition {
            Condition::New => "new",
            Condition::LikeNew => "like_new",
            Condition::Excellent | Condition::Good => "good",
            Condition::Fair => "fair",
            Condition::Poor => "poor",
        }
    }

    /// Map the neutral category to Mercari's category labels
    fn map_category(category: Category) -> &'static str {
        match category {
            Category::Clothing => "clothing",
            Category::Shoes => "shoes",
            Category::Accessories => "accessories",
            Category::Bags => "bags",
            Category::Other => "other",
        }
    }

    /// Total Mercari fees for a sale amount
    pub fn fees(amount: f64) -> f64 {
        round_currency(amount * PLATFORM_FEE_RATE + amount * PAYMENT_FEE_RATE)
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
}

impl Default for MercariAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PlatformAdapter for MercariAdapter {
    fn name(&self) -> &str {
        "mercari"
    }

    async fn authenticate(&self) -> Result<(), PlatformError> {
        self.client.get("/user/profile", &[]).await?;
        self.authenticated.store(true, Ordering::SeqCst);
        info!(platform = "mercari", "Authenticated");
        Ok(())
    }

    async fn create(&self, listing: &ListingRecord) -> Result<String, PlatformError> {
        self.ensure_authenticated().await?;

        let mut payload = Map::new();
        payload.insert("name".to_string(), json!(listing.title));
        payload.insert("description".to_string(), json!(listing.description));
        payload.insert(
            "price".to_string(),
            json!(Self::price_cents(listing.price.amount)),
        );
        payload.insert(
            "condition".to_string(),
            json!(Self::map_condition(listing.condition)),
        );
        payload.insert(
            "category".to_string(),
            json!(Self::map_category(listing.category)),
        );
        payload.insert(
            "photos".to_string(),
            json!(listing.photos.iter().take(MAX_PHOTOS).collect::<Vec<_>>()),
        );
        payload.insert("quantity".to_string(), json!(listing.quantity));
        if let Some(size) = &listing.size {
            payload.insert("size".to_string(), json!(size));
        }
        if let Some(brand) = &listing.brand {
            payload.insert("brand".to_string(), json!(brand));
        }

        let response = self.client.post("/items", &Value::Object(payload)).await?;

        id_string(&response["data"]["id"]).ok_or_else(|| {
            PlatformError::Fatal("Malformed create response: missing data.id".to_string())
        })
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
            payload.insert("quantity".to_string(), json!(quantity));
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
            query.push(("limit", page_size.to_string()));
        }

        let response = self.client.get("/items", &query).await?;
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
                    quantity: item["quantity"].as_u64().unwrap_or(1) as u32,
                    active: item["status"].as_str().map(|s| s == "active").unwrap_or(true),
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
        let response = self.client.get("/sales", &query).await?;
        let entries = response["data"].as_array().cloned().unwrap_or_default();

        let mut sales = Vec::with_capacity(entries.len());
        for entry in entries {
            let sale_id = id_string(&entry["id"]).unwrap_or_default();
            let listing_id = id_string(&entry["item_id"]).unwrap_or_default();
            let gross = entry["price"].as_f64().unwrap_or(0.0) / 100.0;

            let sale = SaleRecord::new(
                sale_id,
                listing_id,
                "mercari",
                parse_timestamp(entry["sold_at"].as_str()),
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Price;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn adapter_for(server: &MockServer) -> MercariAdapter {
        MercariAdapter::with_config(MercariConfig {
            upstream: Some(server.uri()),
            api_key: "key".to_string(),
            access_token: "token".to_string(),
            ..Default::default()
        })
    }

    fn sample_listing() -> ListingRecord {
        ListingRecord::new(
            "item-1",
            "Supreme box logo tee",
            "Gently worn, authentic",
            Price::new(250.0, "USD"),
            Condition::Good,
            Category::Clothing,
            1,
        )
        .with_brand("Supreme")
        .with_size("L")
    }

    async fn mock_auth(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/user/profile"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "u1"})))
            .mount(server)
            .await;
    }

    // Test 1: Create posts prices in cents and returns the remote id
    #[tokio::test]
    async fn test_create_posts_cents_and_returns_id() {
        let server = MockServer::start().await;
        mock_auth(&server).await;
        Mock::given(method("POST"))
            .and(path("/items"))
            .and(body_partial_json(serde_json::json!({
                "name": "Supreme box logo tee",
                "price": 25000,
                "condition": "good",
                "category": "clothing",
                "brand": "Supreme"
            })))
            .respond_with(
                ResponseTemplate::new(201)
                    .set_body_json(serde_json::json!({"data": {"id": "m-789"}})),
            )
            .mount(&server)
            .await;

        let adapter = adapter_for(&server);
        let remote_id = adapter.create(&sample_listing()).await.unwrap();
        assert_eq!(remote_id, "m-789");
    }

    // Test 2: Create failure propagates the mapped error kind
    #[tokio::test]
    async fn test_create_maps_server_error() {
        let server = MockServer::start().await;
        mock_auth(&server).await;
        Mock::given(method("POST"))
            .and(path("/items"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let adapter = adapter_for(&server);
        let err = adapter.create(&sample_listing()).await.unwrap_err();
        assert_eq!(err, PlatformError::Transient("HTTP 503".to_string()));
    }

    // Test 3: Missing remote id in a 2xx create response is Fatal
    #[tokio::test]
    async fn test_create_missing_id_fatal() {
        let server = MockServer::start().await;
        mock_auth(&server).await;
        Mock::given(method("POST"))
            .and(path("/items"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({"ok": true})))
            .mount(&server)
            .await;

        let adapter = adapter_for(&server);
        let err = adapter.create(&sample_listing()).await.unwrap_err();
        assert!(matches!(err, PlatformError::Fatal(msg) if msg.contains("data.id")));
    }

    // Test 4: Update sends only set fields, in cents
    #[tokio::test]
    async fn test_update_partial_fields() {
        let server = MockServer::start().await;
        mock_auth(&server).await;
        Mock::given(method("PUT"))
            .and(path("/items/m-1"))
            .and(body_partial_json(serde_json::json!({"price": 19900})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let adapter = adapter_for(&server);
        let patch = ListingPatch {
            price: Some(199.0),
            ..Default::default()
        };
        adapter.update("m-1", &patch).await.unwrap();
    }

    // Test 5: Delete issues a DELETE against the item path
    #[tokio::test]
    async fn test_delete() {
        let server = MockServer::start().await;
        mock_auth(&server).await;
        Mock::given(method("DELETE"))
            .and(path("/items/m-2"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let adapter = adapter_for(&server);
        adapter.delete("m-2").await.unwrap();
    }

    // Test 6: Remote listings convert cents back to major units
    #[tokio::test]
    async fn test_list_remote_normalizes() {
        let server = MockServer::start().await;
        mock_auth(&server).await;
        Mock::given(method("GET"))
            .and(path("/items"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [
                    {"id": "m-1", "name": "Tee", "price": 23000, "quantity": 2, "status": "active"},
                    {"id": "m-2", "name": "Cap", "price": 4500, "status": "sold_out"}
                ]
            })))
            .mount(&server)
            .await;

        let adapter = adapter_for(&server);
        let snapshots = adapter.list_remote(&RemoteFilter::default()).await.unwrap();

        assert_eq!(snapshots.len(), 2);
        assert!((snapshots[0].price - 230.0).abs() < 1e-9);
        assert_eq!(snapshots[0].quantity, 2);
        assert!(snapshots[0].active);
        assert!(!snapshots[1].active);
        assert_eq!(snapshots[1].quantity, 1);
    }

    // Test 7: Sales are normalized with computed fees and net
    #[tokio::test]
    async fn test_list_sales_normalizes() {
        let server = MockServer::start().await;
        mock_auth(&server).await;
        Mock::given(method("GET"))
            .and(path("/sales"))
            .and(query_param("start_date", "2024-06-01T00:00:00+00:00"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{
                    "id": 551,
                    "item_id": "m-1",
                    "price": 10000,
                    "sold_at": "2024-06-10T09:00:00Z",
                    "buyer": {"username": "hypebeast42"}
                }]
            })))
            .mount(&server)
            .await;

        let adapter = adapter_for(&server);
        let range = DateRange::new(
            chrono::DateTime::parse_from_rfc3339("2024-06-01T00:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
            chrono::DateTime::parse_from_rfc3339("2024-06-30T00:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
        );
        let sales = adapter.list_sales(&range).await.unwrap();

        assert_eq!(sales.len(), 1);
        let sale = &sales[0];
        assert_eq!(sale.sale_id, "551");
        assert_eq!(sale.listing_id, "m-1");
        assert!((sale.gross_amount - 100.0).abs() < 1e-9);
        // 10% platform + 2.9% payment
        assert!((sale.fees - 12.9).abs() < 1e-9);
        assert!((sale.net_amount() - 87.1).abs() < 1e-9);
        assert_eq!(sale.buyer["username"], serde_json::json!("hypebeast42"));
    }

    // Test 8: Fee model
    #[test]
    fn test_fee_model() {
        assert!((MercariAdapter::fees(100.0) - 12.9).abs() < 1e-9);
        assert_eq!(MercariAdapter::fees(0.0), 0.0);
    }

    // Test 9: Condition mapping collapses Excellent into good
    #[test]
    fn test_condition_mapping() {
        assert_eq!(MercariAdapter::map_condition(Condition::New), "new");
        assert_eq!(MercariAdapter::map_condition(Condition::LikeNew), "like_new");
        assert_eq!(MercariAdapter::map_condition(Condition::Excellent), "good");
        assert_eq!(MercariAdapter::map_condition(Condition::Good), "good");
        assert_eq!(MercariAdapter::map_condition(Condition::Poor), "poor");
    }

    // Test 10: Health check fails against an unreachable upstream
    #[tokio::test]
    async fn test_health_check_maps_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/user/profile"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad token"))
            .mount(&server)
            .await;

        let adapter = adapter_for(&server);
        let err = adapter.health_check().await.unwrap_err();
        assert!(matches!(err, PlatformError::AuthRequired(_)));
    }
}
