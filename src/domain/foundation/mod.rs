//! Foundation module - Shared domain primitives.
//!
//! Contains value objects, identifiers, auth types, and error types
//! that form the vocabulary of the order relay.

mod auth;
mod errors;
mod ids;
mod state_machine;
mod timestamp;

pub use auth::{AuthError, Credential, SessionIdentity};
pub use errors::{DomainError, ErrorCode, ValidationError};
pub use ids::{OrderId, SubscriptionId, UserId};
pub use state_machine::StateMachine;
pub use timestamp::Timestamp;
