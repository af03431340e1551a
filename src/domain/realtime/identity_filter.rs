//! Admission of inbound frames for the current session identity.
//!
//! The server may multiplex every session's private traffic over one
//! broadcast channel, so the client drops private frames that are not
//! addressed to it. Every other frame type is admitted unconditionally.

use crate::domain::foundation::SessionIdentity;

use super::frames::InboundMessage;

/// Outcome of running a frame through the filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admit,
    Drop,
}

/// Decides whether an inbound frame reaches the bus.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityFilter;

impl IdentityFilter {
    pub fn new() -> Self {
        Self
    }

    /// Admits a private frame iff `identity` is its sender or recipient.
    ///
    /// With no identity yet (not authenticated) private frames are dropped.
    pub fn admit(&self, identity: Option<&SessionIdentity>, message: &InboundMessage) -> Admission {
        match message {
            InboundMessage::NewPrivateMessage(private) => match identity {
                Some(identity) if private.involves(&identity.id) => Admission::Admit,
                _ => Admission::Drop,
            },
            _ => Admission::Admit,
        }
    }
}
