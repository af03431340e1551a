//! What subscribers of the message bus receive.

use crate::domain::foundation::UserId;

use super::connection_state::CloseCode;
use super::frames::InboundMessage;

/// Connection lifecycle notification.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    /// Transport opened and `AUTH` was sent for this identity.
    Connected { identity: UserId },

    /// Transport closed. `will_reconnect` tells whether a retry is scheduled.
    Disconnected { code: CloseCode, will_reconnect: bool },

    /// Transport fault. Informational; the close path follows.
    Error { message: String },
}

/// One item delivered on the bus.
#[derive(Debug, Clone, PartialEq)]
pub enum BusMessage {
    Connection(ConnectionEvent),
    Inbound(InboundMessage),
}

impl BusMessage {
    /// The inbound frame, if this is one.
    pub fn as_inbound(&self) -> Option<&InboundMessage> {
        match self {
            BusMessage::Inbound(message) => Some(message),
            BusMessage::Connection(_) => None,
        }
    }

    /// Short label for logs.
    pub fn label(&self) -> &str {
        match self {
            BusMessage::Connection(ConnectionEvent::Connected { .. }) => "CONNECT",
            BusMessage::Connection(ConnectionEvent::Disconnected { .. }) => "DISCONNECT",
            BusMessage::Connection(ConnectionEvent::Error { .. }) => "ERROR",
            BusMessage::Inbound(message) => message.kind(),
        }
    }
}

impl From<InboundMessage> for BusMessage {
    fn from(message: InboundMessage) -> Self {
        BusMessage::Inbound(message)
    }
}

impl From<ConnectionEvent> for BusMessage {
    fn from(event: ConnectionEvent) -> Self {
        BusMessage::Connection(event)
    }
}
