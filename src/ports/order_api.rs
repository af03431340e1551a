//! OrderApi port - The HTTP order service, as consumed by this client.
//!
//! Three bearer-authenticated calls:
//! - fetch the pending-order snapshot for the session identity
//! - accept an order
//! - reject an order
//!
//! Any 2xx is success for the mutations; their response bodies are ignored.

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::foundation::{Credential, DomainError, ErrorCode, OrderId};
use crate::domain::orders::PendingOrder;

/// The provider's decision on a pending order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderDecision {
    Accept,
    Reject,
}

impl fmt::Display for OrderDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderDecision::Accept => write!(f, "accept"),
            OrderDecision::Reject => write!(f, "reject"),
        }
    }
}

/// Errors returned by the order service client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderApiError {
    /// The service answered 401/403.
    #[error("Order service rejected the credential ({status})")]
    Unauthorized { status: u16 },

    /// The service answered with another non-2xx status.
    #[error("Order service returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The request never got an answer.
    #[error("Order service unreachable: {0}")]
    Network(String),

    /// The snapshot body was not the expected shape.
    #[error("Unexpected order service response: {0}")]
    Decode(String),
}

impl From<OrderApiError> for DomainError {
    fn from(err: OrderApiError) -> Self {
        let code = match &err {
            OrderApiError::Unauthorized { .. } => ErrorCode::Unauthorized,
            OrderApiError::Status { status, .. } if *status == 404 => ErrorCode::OrderNotFound,
            OrderApiError::Status { .. } => ErrorCode::UpstreamRejected,
            OrderApiError::Network(_) => ErrorCode::UpstreamUnavailable,
            OrderApiError::Decode(_) => ErrorCode::MalformedResponse,
        };
        let domain = DomainError::new(code, err.to_string());
        match err {
            OrderApiError::Unauthorized { status } | OrderApiError::Status { status, .. } => {
                domain.with_detail("status", status.to_string())
            }
            _ => domain,
        }
    }
}

/// Port for the order service.
#[async_trait]
pub trait OrderApi: Send + Sync {
    /// Orders currently pending for the identity behind `credential`.
    async fn pending_orders(&self, credential: &Credential)
        -> Result<Vec<PendingOrder>, OrderApiError>;

    /// Accepts or rejects `order_id`.
    async fn decide(
        &self,
        credential: &Credential,
        order_id: &OrderId,
        decision: OrderDecision,
    ) -> Result<(), OrderApiError>;
}
