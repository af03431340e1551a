//! Order Relay - Real-time order notifications for marketplace providers
//!
//! One authenticated socket per client session, fanned out to independent
//! consumers, with a live projection of the provider's pending orders.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
