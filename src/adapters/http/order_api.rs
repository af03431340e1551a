//! HTTP order service client.
//!
//! # Endpoints
//!
//! | Method | Path                          | Body                        |
//! |--------|-------------------------------|-----------------------------|
//! | GET    | `{pending_orders_path}`       | `{ "orders": [...] }`       |
//! | PUT    | `{accept_order_path}/{id}`    | ignored                     |
//! | PUT    | `{reject_order_path}/{id}`    | ignored                     |
//!
//! All calls carry `Authorization: Bearer <credential>`. The order id is
//! appended as a single percent-encoded path segment.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;

use crate::domain::foundation::{Credential, OrderId};
use crate::domain::orders::PendingOrder;
use crate::ports::{OrderApi, OrderApiError, OrderDecision};

/// Configuration for [`HttpOrderApi`].
#[derive(Debug, Clone)]
pub struct HttpOrderApiConfig {
    /// Scheme, host and optional prefix, without a trailing slash.
    pub base_url: String,
    pub timeout: Duration,
    pub pending_orders_path: String,
    pub accept_order_path: String,
    pub reject_order_path: String,
}

impl HttpOrderApiConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(10),
            pending_orders_path: "/api/orders/pending".to_string(),
            accept_order_path: "/api/orders/accept-order".to_string(),
            reject_order_path: "/api/orders/reject-order".to_string(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_paths(
        mut self,
        pending: impl Into<String>,
        accept: impl Into<String>,
        reject: impl Into<String>,
    ) -> Self {
        self.pending_orders_path = pending.into();
        self.accept_order_path = accept.into();
        self.reject_order_path = reject.into();
        self
    }
}

#[derive(Debug, Deserialize)]
struct PendingOrdersResponse {
    #[serde(default)]
    orders: Vec<PendingOrder>,
}

/// reqwest-backed [`OrderApi`].
pub struct HttpOrderApi {
    config: HttpOrderApiConfig,
    client: Client,
}

impl HttpOrderApi {
    pub fn new(config: HttpOrderApiConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    fn decision_url(&self, order_id: &OrderId, decision: OrderDecision) -> Result<Url, OrderApiError> {
        let path = match decision {
            OrderDecision::Accept => &self.config.accept_order_path,
            OrderDecision::Reject => &self.config.reject_order_path,
        };
        let mut url = Url::parse(&self.url(path))
            .map_err(|e| OrderApiError::Network(format!("Invalid decision URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| OrderApiError::Network("Decision URL cannot carry a path".to_string()))?
            .pop_if_empty()
            .push(order_id.as_str());
        Ok(url)
    }

    async fn send(
        &self,
        request: RequestBuilder,
        credential: &Credential,
    ) -> Result<Response, OrderApiError> {
        let response = request
            .bearer_auth(credential.expose())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    OrderApiError::Network(format!(
                        "Timed out after {}s",
                        self.config.timeout.as_secs()
                    ))
                } else if e.is_connect() {
                    OrderApiError::Network(format!("Connection failed: {}", e))
                } else {
                    OrderApiError::Network(e.to_string())
                }
            })?;

        Self::check_status(response).await
    }

    async fn check_status(response: Response) -> Result<Response, OrderApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(OrderApiError::Unauthorized {
                status: status.as_u16(),
            }),
            _ => Err(OrderApiError::Status {
                status: status.as_u16(),
                body,
            }),
        }
    }
}

#[async_trait]
impl OrderApi for HttpOrderApi {
    async fn pending_orders(
        &self,
        credential: &Credential,
    ) -> Result<Vec<PendingOrder>, OrderApiError> {
        let url = self.url(&self.config.pending_orders_path);
        let response = self.send(self.client.get(&url), credential).await?;

        let body: PendingOrdersResponse = response
            .json()
            .await
            .map_err(|e| OrderApiError::Decode(e.to_string()))?;

        tracing::debug!(count = body.orders.len(), "Fetched pending orders");
        Ok(body.orders)
    }

    async fn decide(
        &self,
        credential: &Credential,
        order_id: &OrderId,
        decision: OrderDecision,
    ) -> Result<(), OrderApiError> {
        let url = self.decision_url(order_id, decision)?;
        self.send(self.client.put(url), credential).await?;

        tracing::debug!(order_id = %order_id, %decision, "Order decision accepted by server");
        Ok(())
    }
}
