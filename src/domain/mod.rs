//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (value objects, IDs, auth, errors)
//! - `realtime` - Wire frames, connection lifecycle and identity-based admission
//! - `orders` - Pending orders, the order book and countdown derivation

pub mod foundation;
pub mod orders;
pub mod realtime;
