//! Order application services.
//!
//! - `OrderProjection` - Live pending-order list fed by snapshot, stream and tick

mod projection;

pub use projection::{OrderProjection, OrderProjectionConfig};
