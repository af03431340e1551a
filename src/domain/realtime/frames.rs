//! Wire frames carried over the shared session socket.
//!
//! Every frame is a JSON text object with a `type` discriminator:
//! - Server → Client: `NEW_ORDER`, `ORDER_UPDATE`, `NEW_PRIVATE_MESSAGE`, `AUTH_ACK`
//!   (anything else is kept as [`InboundMessage::Other`] and forwarded as-is)
//! - Client → Server: `AUTH`, `PRIVATE_MESSAGE`, or any raw JSON object

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::domain::foundation::{OrderId, Timestamp, UserId};
use crate::domain::orders::{OrderStatus, OrderUpdate, PendingOrder};

pub const NEW_ORDER: &str = "NEW_ORDER";
pub const ORDER_UPDATE: &str = "ORDER_UPDATE";
pub const NEW_PRIVATE_MESSAGE: &str = "NEW_PRIVATE_MESSAGE";
pub const AUTH_ACK: &str = "AUTH_ACK";
pub const AUTH: &str = "AUTH";
pub const PRIVATE_MESSAGE: &str = "PRIVATE_MESSAGE";

// ============================================
// Server → Client
// ============================================

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    /// A customer placed an order with this provider.
    NewOrder(PendingOrder),

    /// An order's status or timer changed.
    OrderUpdate(OrderUpdate),

    /// Point-to-point chat message. Subject to identity filtering.
    NewPrivateMessage(PrivateMessage),

    /// Server acknowledged our `AUTH` frame.
    AuthAck(AuthAck),

    /// A frame type this client does not model. Forwarded unfiltered.
    Other { kind: String, payload: Value },
}

impl InboundMessage {
    /// The wire `type` of this message.
    pub fn kind(&self) -> &str {
        match self {
            InboundMessage::NewOrder(_) => NEW_ORDER,
            InboundMessage::OrderUpdate(_) => ORDER_UPDATE,
            InboundMessage::NewPrivateMessage(_) => NEW_PRIVATE_MESSAGE,
            InboundMessage::AuthAck(_) => AUTH_ACK,
            InboundMessage::Other { kind, .. } => kind,
        }
    }

    /// Decodes one text frame.
    pub fn decode(text: &str) -> Result<Self, DecodeError> {
        let value: Value = serde_json::from_str(text).map_err(DecodeError::Json)?;
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or(DecodeError::MissingType)?
            .to_string();

        let payload_error = |source: serde_json::Error| DecodeError::Payload {
            kind: kind.clone(),
            source,
        };

        match kind.as_str() {
            NEW_ORDER => {
                let frame: OrderFrame<PendingOrder> =
                    serde_json::from_value(value).map_err(payload_error)?;
                Ok(InboundMessage::NewOrder(frame.order))
            }
            ORDER_UPDATE => {
                let frame: OrderFrame<Value> =
                    serde_json::from_value(value).map_err(payload_error)?;
                let status: OrderStatusChange =
                    serde_json::from_value(frame.order.clone()).map_err(payload_error)?;
                let order = serde_json::from_value::<PendingOrder>(frame.order).ok();
                Ok(InboundMessage::OrderUpdate(OrderUpdate {
                    id: status.id,
                    status: status.status,
                    timer_expiry: status.timer_expiry,
                    order,
                }))
            }
            NEW_PRIVATE_MESSAGE => {
                let frame: MessageFrame =
                    serde_json::from_value(value).map_err(payload_error)?;
                Ok(InboundMessage::NewPrivateMessage(frame.message))
            }
            AUTH_ACK => {
                let ack: AuthAck = serde_json::from_value(value).map_err(payload_error)?;
                Ok(InboundMessage::AuthAck(ack))
            }
            _ => Ok(InboundMessage::Other {
                kind: kind.clone(),
                payload: value,
            }),
        }
    }
}

#[derive(Deserialize)]
struct OrderFrame<T> {
    order: T,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderStatusChange {
    #[serde(alias = "_id")]
    id: OrderId,
    status: OrderStatus,
    #[serde(default)]
    timer_expiry: Option<Timestamp>,
}

#[derive(Deserialize)]
struct MessageFrame {
    message: PrivateMessage,
}

/// Chat message between two parties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrivateMessage {
    pub sender: UserId,
    pub recipient: UserId,
    pub text: String,
    /// Any further fields the server attached (timestamps, message id, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PrivateMessage {
    /// True when `user` is one of the two parties.
    pub fn involves(&self, user: &UserId) -> bool {
        &self.sender == user || &self.recipient == user
    }
}

/// Acknowledgement of the `AUTH` frame.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthAck {
    #[serde(default)]
    pub user_id: Option<UserId>,
}

/// Errors decoding an inbound frame. Never fatal: the frame is dropped.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Frame is not valid JSON: {0}")]
    Json(#[source] serde_json::Error),

    #[error("Frame has no string 'type' field")]
    MissingType,

    #[error("Frame of type {kind} has an unexpected shape: {source}")]
    Payload {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}

// ============================================
// Client → Server
// ============================================

/// A frame this client sends.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundFrame {
    /// Binds the connection to the session identity.
    Auth { user_id: UserId },

    /// Chat message to another party.
    PrivateMessage { recipient: UserId, text: String },

    /// Any other JSON object, sent verbatim.
    Raw(Value),
}

impl OutboundFrame {
    pub fn auth(user_id: UserId) -> Self {
        OutboundFrame::Auth { user_id }
    }

    pub fn private_message(recipient: UserId, text: impl Into<String>) -> Self {
        OutboundFrame::PrivateMessage {
            recipient,
            text: text.into(),
        }
    }

    /// The wire `type`, if the frame has one.
    pub fn kind(&self) -> Option<&str> {
        match self {
            OutboundFrame::Auth { .. } => Some(AUTH),
            OutboundFrame::PrivateMessage { .. } => Some(PRIVATE_MESSAGE),
            OutboundFrame::Raw(value) => value.get("type").and_then(Value::as_str),
        }
    }

    /// JSON text for the wire.
    pub fn encode(&self) -> String {
        match self {
            OutboundFrame::Auth { user_id } => json!({
                "type": AUTH,
                "userId": user_id,
            })
            .to_string(),
            OutboundFrame::PrivateMessage { recipient, text } => json!({
                "type": PRIVATE_MESSAGE,
                "recipient": recipient,
                "text": text,
            })
            .to_string(),
            OutboundFrame::Raw(value) => value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order_payload() -> Value {
        json!({
            "_id": "o-1",
            "customer": "c-1",
            "dishes": [{"name": "Pho"}],
            "numberOfPeople": 2,
            "total": 18.5,
            "timerExpiry": "2024-05-01T12:00:00Z"
        })
    }

    #[test]
    fn decodes_new_order() {
        let text = json!({"type": "NEW_ORDER", "order": order_payload()}).to_string();
        match InboundMessage::decode(&text).unwrap() {
            InboundMessage::NewOrder(order) => assert_eq!(order.id.as_str(), "o-1"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn decodes_order_update_with_full_order() {
        let mut order = order_payload();
        order["status"] = json!("pending");
        let text = json!({"type": "ORDER_UPDATE", "order": order}).to_string();

        match InboundMessage::decode(&text).unwrap() {
            InboundMessage::OrderUpdate(update) => {
                assert_eq!(update.status, OrderStatus::Pending);
                assert!(update.order.is_some());
                assert!(update.timer_expiry.is_some());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn decodes_minimal_order_update() {
        let text = r#"{"type":"ORDER_UPDATE","order":{"id":"o-1","status":"accepted"}}"#;
        match InboundMessage::decode(text).unwrap() {
            InboundMessage::OrderUpdate(update) => {
                assert_eq!(update.id.as_str(), "o-1");
                assert_eq!(update.status, OrderStatus::Accepted);
                assert!(update.order.is_none());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn decodes_private_message_and_keeps_extra_fields() {
        let text = r#"{"type":"NEW_PRIVATE_MESSAGE","message":{"sender":"u1","recipient":"u2","text":"hi","createdAt":"2024-05-01T12:00:00Z"}}"#;
        match InboundMessage::decode(text).unwrap() {
            InboundMessage::NewPrivateMessage(message) => {
                assert_eq!(message.text, "hi");
                assert!(message.extra.contains_key("createdAt"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn decodes_auth_ack() {
        let msg = InboundMessage::decode(r#"{"type":"AUTH_ACK","userId":"u1"}"#).unwrap();
        assert_eq!(msg.kind(), AUTH_ACK);
    }

    #[test]
    fn unknown_type_is_kept_with_payload() {
        let msg = InboundMessage::decode(r#"{"type":"BOOKING_CREATED","booking":{"id":"b1"}}"#)
            .unwrap();
        match msg {
            InboundMessage::Other { kind, payload } => {
                assert_eq!(kind, "BOOKING_CREATED");
                assert_eq!(payload["booking"]["id"], "b1");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn malformed_json_is_a_decode_error() {
        assert!(matches!(
            InboundMessage::decode("{not json"),
            Err(DecodeError::Json(_))
        ));
    }

    #[test]
    fn missing_type_is_a_decode_error() {
        assert!(matches!(
            InboundMessage::decode(r#"{"order":{}}"#),
            Err(DecodeError::MissingType)
        ));
    }

    #[test]
    fn known_type_with_wrong_shape_is_a_decode_error() {
        let err = InboundMessage::decode(r#"{"type":"NEW_ORDER","order":{"id":"o-1"}}"#)
            .unwrap_err();
        assert!(err.to_string().contains("NEW_ORDER"));
    }

    #[test]
    fn auth_frame_encodes_user_id() {
        let frame = OutboundFrame::auth(UserId::new("u1").unwrap());
        let value: Value = serde_json::from_str(&frame.encode()).unwrap();
        assert_eq!(value, json!({"type": "AUTH", "userId": "u1"}));
    }

    #[test]
    fn private_message_frame_encodes_recipient_and_text() {
        let frame = OutboundFrame::private_message(UserId::new("u2").unwrap(), "on my way");
        let value: Value = serde_json::from_str(&frame.encode()).unwrap();
        assert_eq!(value["type"], "PRIVATE_MESSAGE");
        assert_eq!(value["recipient"], "u2");
        assert_eq!(frame.kind(), Some(PRIVATE_MESSAGE));
    }

    #[test]
    fn raw_frame_is_sent_verbatim() {
        let frame = OutboundFrame::Raw(json!({"type": "TYPING", "to": "u2"}));
        assert_eq!(frame.kind(), Some("TYPING"));
        let value: Value = serde_json::from_str(&frame.encode()).unwrap();
        assert_eq!(value, json!({"type": "TYPING", "to": "u2"}));
    }
}
