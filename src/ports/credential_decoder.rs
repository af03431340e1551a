//! CredentialDecoder port - Extracts the session identity from a credential.
//!
//! Decoding only: signature and expiry belong to the server. A JWT adapter
//! serves production; a static adapter serves tests.

use crate::domain::foundation::{AuthError, Credential, SessionIdentity};

/// Port for turning a bearer credential into a [`SessionIdentity`].
pub trait CredentialDecoder: Send + Sync {
    fn decode(&self, credential: &Credential) -> Result<SessionIdentity, AuthError>;
}
