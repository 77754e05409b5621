//! Marketplace platform adapters
//!
//! Each marketplace gets one adapter implementing [`PlatformAdapter`];
//! the orchestration layers depend only on that trait. Adapters share
//! the [`http::ApiClient`] wrapper for status-to-error mapping.

pub mod facebook;
pub mod http;
pub mod mercari;
pub mod traits;
pub mod vinted;

// Re-export commonly used types
pub use facebook::{FacebookAdapter, FacebookConfig};
pub use http::ApiClient;
pub use mercari::{MercariAdapter, MercariConfig};
pub use traits::{PlatformAdapter, RemoteFilter, RemoteListing};
pub use vinted::{VintedAdapter, VintedConfig};

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::config::Config;

/// Build the adapter registry for every enabled platform
///
/// Unknown platform names in the configuration are skipped with a
/// warning rather than failing startup.
pub fn build_adapters(config: &Config) -> HashMap<String, Arc<dyn PlatformAdapter>> {
    let mut adapters: HashMap<String, Arc<dyn PlatformAdapter>> = HashMap::new();

    for (name, platform_cfg) in &config.platforms {
        if !platform_cfg.enabled {
            continue;
        }

        let adapter: Arc<dyn PlatformAdapter> = match name.as_str() {
            "mercari" => Arc::new(MercariAdapter::from_platform(platform_cfg)),
            "vinted" => Arc::new(VintedAdapter::from_platform(platform_cfg)),
            "facebook" => Arc::new(FacebookAdapter::from_platform(platform_cfg)),
            other => {
                warn!(platform = other, "Unknown platform in configuration, skipping");
                continue;
            }
        };

        info!(platform = %name, "Platform adapter initialized");
        adapters.insert(name.clone(), adapter);
    }

    adapters
}

/// Extract an identifier that may arrive as a JSON string or number
pub(crate) fn id_string(value: &serde_json::Value) -> Option<String> {
    value
        .as_str()
        .map(str::to_string)
        .or_else(|| value.as_u64().map(|n| n.to_string()))
        .or_else(|| value.as_i64().map(|n| n.to_string()))
}

/// Parse a platform timestamp, falling back to now for missing or
/// malformed values
pub(crate) fn parse_timestamp(value: Option<&str>) -> DateTime<Utc> {
    value
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(Utc::now)
}

/// Round to currency precision (two decimal places)
pub(crate) fn round_currency(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}
