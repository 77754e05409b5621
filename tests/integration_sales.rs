//! Sales aggregation integration tests
//!
//! Pulls sales through real adapters backed by wiremock upstreams and
//! checks normalization, ordering, and persistence.

mod common;

use std::sync::Arc;

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crosslist::models::DateRange;
use crosslist::repository::Repository;
use crosslist::platforms::{
    FacebookAdapter, FacebookConfig, MercariAdapter, MercariConfig, PlatformAdapter,
    VintedAdapter, VintedConfig,
};

use common::{create_test_aggregator, create_test_repository};

async fn mock_profile(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/user/profile"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": 1})))
        .mount(server)
        .await;
}

// Test 1: Sales from two platforms merge ordered by date with fees applied
#[tokio::test]
async fn test_cross_platform_report() {
    let mercari_server = MockServer::start().await;
    let vinted_server = MockServer::start().await;

    mock_profile(&mercari_server).await;
    mock_profile(&vinted_server).await;

    Mock::given(method("GET"))
        .and(path("/sales"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": [{
                "id": "m-s1",
                "item_id": "m-1",
                "price": 10000,
                "sold_at": "2024-06-20T12:00:00Z",
                "buyer": {"username": "late_buyer"}
            }]
        })))
        .mount(&mercari_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/transactions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "transactions": [{
                "id": "v-s1",
                "item_id": "v-1",
                "total_item_price": 50.0,
                "created_at": "2024-06-05T12:00:00Z"
            }]
        })))
        .mount(&vinted_server)
        .await;

    let mercari: Arc<dyn PlatformAdapter> = Arc::new(MercariAdapter::with_config(MercariConfig {
        upstream: Some(mercari_server.uri()),
        api_key: "key".to_string(),
        access_token: "token".to_string(),
        ..Default::default()
    }));
    let vinted: Arc<dyn PlatformAdapter> = Arc::new(VintedAdapter::with_config(VintedConfig {
        upstream: Some(vinted_server.uri()),
        access_token: "token".to_string(),
        ..Default::default()
    }));

    let repository = create_test_repository().await;
    let aggregator = create_test_aggregator(vec![mercari, vinted], Arc::clone(&repository));

    let range = DateRange::new(
        chrono::DateTime::parse_from_rfc3339("2024-06-01T00:00:00Z")
            .unwrap()
            .into(),
        chrono::DateTime::parse_from_rfc3339("2024-06-30T23:59:59Z")
            .unwrap()
            .into(),
    );
    let report = aggregator.report(range).await.unwrap();

    // Ordered by sale date: vinted's sale precedes mercari's
    assert_eq!(report.sales.len(), 2);
    assert_eq!(report.sales[0].sale_id, "v-s1");
    assert_eq!(report.sales[1].sale_id, "m-s1");

    // mercari: 100.00 gross, 12.9% fees; vinted: 50.00 gross, 8% fees
    assert_eq!(report.summary.total_sales, 2);
    assert!((report.summary.total_gross - 150.0).abs() < 1e-9);
    assert!((report.summary.total_fees - 16.9).abs() < 1e-9);
    assert!((report.summary.total_net - 133.1).abs() < 1e-9);

    // Sales were persisted through the repository
    let stored = repository.load_sales(&range).await.unwrap();
    assert_eq!(stored.len(), 2);
}

// Test 2: A platform without a sales API contributes an empty window
#[tokio::test]
async fn test_platform_without_sales_api() {
    let facebook_server = MockServer::start().await;

    let facebook: Arc<dyn PlatformAdapter> =
        Arc::new(FacebookAdapter::with_config(FacebookConfig {
            upstream: Some(facebook_server.uri()),
            access_token: "token".to_string(),
            catalog_id: "cat-1".to_string(),
            page_id: "page-1".to_string(),
            ..Default::default()
        }));

    let repository = create_test_repository().await;
    let aggregator = create_test_aggregator(vec![facebook], Arc::clone(&repository));

    let report = aggregator.report(DateRange::last_days(30)).await.unwrap();

    assert!(report.failures.is_empty());
    assert!(report.sales.is_empty());
    assert_eq!(report.breakdown["facebook"].sales_count, 0);
}

// Test 3: An erroring platform is reported while the rest aggregate
#[tokio::test]
async fn test_erroring_platform_reported() {
    let mercari_server = MockServer::start().await;
    mock_profile(&mercari_server).await;
    Mock::given(method("GET"))
        .and(path("/sales"))
        .respond_with(ResponseTemplate::new(401).set_body_string("expired"))
        .mount(&mercari_server)
        .await;

    let mercari: Arc<dyn PlatformAdapter> = Arc::new(MercariAdapter::with_config(MercariConfig {
        upstream: Some(mercari_server.uri()),
        api_key: "key".to_string(),
        access_token: "token".to_string(),
        ..Default::default()
    }));

    let repository = create_test_repository().await;
    let aggregator = create_test_aggregator(vec![mercari], Arc::clone(&repository));

    let report = aggregator.report(DateRange::last_days(30)).await.unwrap();

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].0, "mercari");
    assert!(report.sales.is_empty());
}
