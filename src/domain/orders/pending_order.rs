//! Order types as they appear in snapshot responses and stream frames.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{OrderId, Timestamp, UserId};

/// An order awaiting the provider's accept/reject before its timer lapses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingOrder {
    #[serde(alias = "_id")]
    pub id: OrderId,
    pub customer: CustomerRef,
    #[serde(default)]
    pub dishes: Vec<OrderedDish>,
    #[serde(default)]
    pub number_of_people: u32,
    #[serde(default)]
    pub total: f64,
    pub timer_expiry: Timestamp,
}

impl PendingOrder {
    /// True once `now` has reached the order's expiry.
    pub fn is_expired_at(&self, now: &Timestamp) -> bool {
        !now.is_before(&self.timer_expiry)
    }
}

/// The customer who placed an order.
///
/// The order service sends either a bare id or the populated profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CustomerRef {
    Id(UserId),
    Profile(CustomerProfile),
}

impl CustomerRef {
    /// Best human-readable label for the customer.
    pub fn label(&self) -> &str {
        match self {
            CustomerRef::Id(id) => id.as_str(),
            CustomerRef::Profile(profile) => profile
                .name
                .as_deref()
                .or(profile.email.as_deref())
                .unwrap_or_else(|| profile.id.as_str()),
        }
    }
}

/// Populated customer profile embedded in an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerProfile {
    #[serde(alias = "_id")]
    pub id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// One line of an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderedDish {
    pub name: String,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    #[serde(default)]
    pub price: f64,
}

fn default_quantity() -> u32 {
    1
}

/// Server-side status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[serde(alias = "Pending", alias = "PENDING")]
    Pending,
    #[serde(alias = "Accepted", alias = "ACCEPTED")]
    Accepted,
    #[serde(alias = "Rejected", alias = "REJECTED")]
    Rejected,
    #[serde(alias = "Expired", alias = "EXPIRED")]
    Expired,
    #[serde(alias = "Completed", alias = "COMPLETED")]
    Completed,
    #[serde(alias = "Cancelled", alias = "CANCELLED")]
    Cancelled,
    /// Any status this client does not know; treated as "no longer pending".
    #[serde(other)]
    Unknown,
}

impl OrderStatus {
    pub fn is_pending(&self) -> bool {
        matches!(self, OrderStatus::Pending)
    }
}

/// Status change for one order, as carried by an `ORDER_UPDATE` frame.
///
/// `order` holds the full refreshed order when the frame carried one
/// (a timer reset sends the whole document; a status flip may send only
/// `id` and `status`).
#[derive(Debug, Clone, PartialEq)]
pub struct OrderUpdate {
    pub id: OrderId,
    pub status: OrderStatus,
    pub timer_expiry: Option<Timestamp>,
    pub order: Option<PendingOrder>,
}
