//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `events` - Message bus implementations (in-memory)
//! - `websocket` - Session socket transports (tokio-tungstenite, scripted)
//! - `http` - Order service clients (reqwest, in-memory)
//! - `auth` - Credential decoders (JWT, static)

pub mod auth;
pub mod events;
pub mod http;
pub mod websocket;

pub use auth::{JwtIdentityDecoder, StaticIdentityDecoder};
pub use events::InMemoryMessageBus;
pub use http::{HttpOrderApi, HttpOrderApiConfig, InMemoryOrderApi};
pub use websocket::{ScriptedPeer, ScriptedTransport, WebSocketTransport};
