//! Order service HTTP configuration

use serde::Deserialize;
use std::time::Duration;

use super::client::Environment;
use super::error::ValidationError;
use crate::adapters::HttpOrderApiConfig;

/// Order service HTTP configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Scheme and host of the order service
    pub base_url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_pending_orders_path")]
    pub pending_orders_path: String,

    #[serde(default = "default_accept_order_path")]
    pub accept_order_path: String,

    #[serde(default = "default_reject_order_path")]
    pub reject_order_path: String,
}

impl ApiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Adapter settings described by this section
    pub fn http_order_api(&self) -> HttpOrderApiConfig {
        HttpOrderApiConfig::new(self.base_url.as_str())
            .with_timeout(self.request_timeout())
            .with_paths(
                self.pending_orders_path.as_str(),
                self.accept_order_path.as_str(),
                self.reject_order_path.as_str(),
            )
    }

    /// Validate order service configuration
    pub fn validate(&self, environment: &Environment) -> Result<(), ValidationError> {
        if self.base_url.is_empty() {
            return Err(ValidationError::MissingRequired("API__BASE_URL"));
        }
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ValidationError::InvalidApiUrl);
        }
        if *environment == Environment::Production && !self.base_url.starts_with("https://") {
            return Err(ValidationError::ApiUrlMustBeHttps);
        }
        if self.request_timeout_secs == 0 || self.request_timeout_secs > 300 {
            return Err(ValidationError::InvalidTimeout);
        }

        for (name, path) in [
            ("API__PENDING_ORDERS_PATH", &self.pending_orders_path),
            ("API__ACCEPT_ORDER_PATH", &self.accept_order_path),
            ("API__REJECT_ORDER_PATH", &self.reject_order_path),
        ] {
            if !path.starts_with('/') {
                return Err(ValidationError::InvalidPath(name));
            }
        }

        Ok(())
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            request_timeout_secs: default_request_timeout(),
            pending_orders_path: default_pending_orders_path(),
            accept_order_path: default_accept_order_path(),
            reject_order_path: default_reject_order_path(),
        }
    }
}

fn default_request_timeout() -> u64 {
    10
}

fn default_pending_orders_path() -> String {
    "/api/orders/pending".to_string()
}

fn default_accept_order_path() -> String {
    "/api/orders/accept-order".to_string()
}

fn default_reject_order_path() -> String {
    "/api/orders/reject-order".to_string()
}
