//! Application layer - Services that orchestrate domain types and ports.
//!
//! - `connection` - The shared session socket and its reconnect policy
//! - `orders` - The pending-order projection

pub mod connection;
pub mod orders;

pub use connection::{
    ConnectionError, ConnectionHandle, ConnectionManager, ConnectionSnapshot, ReconnectPolicy,
};
pub use orders::{OrderProjection, OrderProjectionConfig};
