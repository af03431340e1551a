//! WebSocket transport adapters.
//!
//! Implementations of the `Transport` port for the shared session socket.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                      ConnectionManager                               │
//! │   state machine, outbound queue, reconnect timer                     │
//! └─────────────────────────────────────────────────────────────────────┘
//!                 │ open()                     ▲ TransportEvent
//!                 ▼                            │
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │   WebSocketTransport (production) │ ScriptedTransport (test)         │
//! │   FrameSink ── text frames ──▶     ◀── reader task ── frames/close   │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`client`] - tokio-tungstenite client transport
//! - [`scripted`] - Test transport driven from the server side

pub mod client;
pub mod scripted;

pub use client::WebSocketTransport;
pub use scripted::{ScriptedPeer, ScriptedTransport};
