//! Shared HTTP client for platform adapters
//!
//! This module wraps `reqwest` with the status-to-error mapping every
//! adapter needs: timeouts and connection failures become `Transient`,
//! auth rejections become `AuthRequired`, 429 becomes `RateLimited`
//! honoring Retry-After, payload rejections become `ValidationRejected`,
//! and listed 5xx statuses become `Transient`. Everything else is
//! `Fatal` with the response body preserved for observability.

use reqwest::{Client, Method, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::PlatformError;

const BODY_SNIPPET_LEN: usize = 200;

/// JSON API client with adapter error mapping
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    bearer: Option<String>,
    headers: Vec<(String, String)>,
    retry_on_status: Vec<u16>,
}

impl ApiClient {
    /// Start building a client for an API base URL
    pub fn builder(base_url: impl Into<String>) -> ApiClientBuilder {
        ApiClientBuilder {
            base_url: base_url.into(),
            bearer: None,
            headers: Vec::new(),
            retry_on_status: vec![429, 500, 502, 503, 504],
            timeout: Duration::from_secs(30),
        }
    }

    /// GET a path with query parameters
    pub async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Value, PlatformError> {
        let request = self
            .client
            .request(Method::GET, self.url(path))
            .query(query);
        self.send(Method::GET, path, request).await
    }

    /// POST a JSON body
    pub async fn post(&self, path: &str, body: &Value) -> Result<Value, PlatformError> {
        let request = self.client.request(Method::POST, self.url(path)).json(body);
        self.send(Method::POST, path, request).await
    }

    /// PUT a JSON body
    pub async fn put(&self, path: &str, body: &Value) -> Result<Value, PlatformError> {
        let request = self.client.request(Method::PUT, self.url(path)).json(body);
        self.send(Method::PUT, path, request).await
    }

    /// DELETE a path
    pub async fn delete(&self, path: &str) -> Result<Value, PlatformError> {
        let request = self.client.request(Method::DELETE, self.url(path));
        self.send(Method::DELETE, path, request).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<Value, PlatformError> {
        let mut request = request;
        if let Some(token) = &self.bearer {
            request = request.bearer_auth(token);
        }
        for (name, value) in &self.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        debug!(method = %method, path = path, "Sending platform API request");

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                PlatformError::Transient(format!("Request timeout: {}", e))
            } else if e.is_connect() {
                PlatformError::Transient(format!("Connection failed: {}", e))
            } else {
                PlatformError::Transient(format!("Network error: {}", e))
            }
        })?;

        let status = response.status();
        let retry_after = response
            .headers()
            .get("Retry-After")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());

        let body = response
            .text()
            .await
            .map_err(|e| PlatformError::Transient(format!("Failed to read body: {}", e)))?;

        if status.is_success() {
            if body.trim().is_empty() {
                return Ok(Value::Null);
            }
            return serde_json::from_str(&body).map_err(|e| {
                PlatformError::Fatal(format!("Malformed response body: {}", e))
            });
        }

        warn!(
            method = %method,
            path = path,
            status = status.as_u16(),
            "Platform API request failed"
        );

        Err(self.map_failure(status, retry_after, &body))
    }

    fn map_failure(
        &self,
        status: StatusCode,
        retry_after: Option<u64>,
        body: &str,
    ) -> PlatformError {
        let code = status.as_u16();
        match code {
            401 | 403 => PlatformError::AuthRequired(snippet(body)),
            429 => PlatformError::RateLimited {
                retry_after_secs: retry_after,
            },
            400 | 422 => PlatformError::ValidationRejected(snippet(body)),
            _ if status.is_server_error() && self.retry_on_status.contains(&code) => {
                PlatformError::Transient(format!("HTTP {}", code))
            }
            _ => PlatformError::Fatal(format!("HTTP {}: {}", code, snippet(body))),
        }
    }
}

/// Builder for [`ApiClient`]
#[derive(Debug)]
pub struct ApiClientBuilder {
    base_url: String,
    bearer: Option<String>,
    headers: Vec<(String, String)>,
    retry_on_status: Vec<u16>,
    timeout: Duration,
}

impl ApiClientBuilder {
    /// Attach a bearer token sent on every request
    pub fn bearer(mut self, token: impl Into<String>) -> Self {
        self.bearer = Some(token.into());
        self
    }

    /// Attach a static header sent on every request
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Replace the retryable status allow-list
    pub fn retry_on_status(mut self, statuses: Vec<u16>) -> Self {
        self.retry_on_status = statuses;
        self
    }

    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Finish building
    pub fn build(self) -> ApiClient {
        ApiClient {
            client: Client::builder()
                .timeout(self.timeout)
                .build()
                .expect("Failed to create HTTP client"),
            base_url: self.base_url,
            bearer: self.bearer,
            headers: self.headers,
            retry_on_status: self.retry_on_status,
        }
    }
}

/// Bounded body excerpt for error messages
fn snippet(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.len() <= BODY_SNIPPET_LEN {
        trimmed.to_string()
    } else {
        let mut end = BODY_SNIPPET_LEN;
        while !trimmed.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &trimmed[..end])
    }
}
