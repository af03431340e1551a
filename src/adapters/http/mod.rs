//! HTTP adapters - Order service client implementations.
//!
//! - `HttpOrderApi` - reqwest client for the order endpoints
//! - `InMemoryOrderApi` - In-process order service for testing

mod in_memory;
mod order_api;

pub use in_memory::InMemoryOrderApi;
pub use order_api::{HttpOrderApi, HttpOrderApiConfig};
