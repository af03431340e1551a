//! Message bus adapters.
//!
//! - `InMemoryMessageBus` - Synchronous, in-process fan-out

mod in_memory;

pub use in_memory::InMemoryMessageBus;
