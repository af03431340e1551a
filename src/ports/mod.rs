//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! ## Realtime Ports
//!
//! - `Transport` - Opens one bidirectional text link to the session endpoint
//! - `FrameSink` - Write half of an open link
//! - `MessagePublisher` / `MessageSubscriber` - Fan-out of admitted messages
//! - `Subscriber` - Consumer registered on the message bus
//!
//! ## Order Service Ports
//!
//! - `OrderApi` - Pending-order snapshot and accept/reject calls
//!
//! ## Auth Ports
//!
//! - `CredentialDecoder` - Extracts the session identity from a credential

mod credential_decoder;
mod message_bus;
mod order_api;
mod transport;

pub use credential_decoder::CredentialDecoder;
pub use message_bus::{
    DeliveryReport, FnSubscriber, MessageBus, MessagePublisher, MessageSubscriber, Subscriber,
    Subscription,
};
pub use order_api::{OrderApi, OrderApiError, OrderDecision};
pub use transport::{FrameSink, Transport, TransportError, TransportEvent, TransportLink};
