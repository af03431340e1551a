//! Connection application services.
//!
//! - `ConnectionManager` - Task owning the shared session socket
//! - `ConnectionHandle` - Cloneable command interface to the manager
//! - `ReconnectPolicy` - Delay schedule between reconnect attempts

mod manager;
mod reconnect_policy;

pub use manager::{ConnectionError, ConnectionHandle, ConnectionManager, ConnectionSnapshot};
pub use reconnect_policy::ReconnectPolicy;
