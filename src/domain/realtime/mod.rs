//! Real-time session messaging - wire frames, connection lifecycle, admission.

pub mod bus_message;
pub mod connection_state;
pub mod frames;
pub mod identity_filter;

pub use bus_message::{BusMessage, ConnectionEvent};
pub use connection_state::{CloseCode, ConnectionState};
pub use frames::{AuthAck, DecodeError, InboundMessage, OutboundFrame, PrivateMessage};
pub use identity_filter::{Admission, IdentityFilter};
