//! Authentication types for the domain layer.
//!
//! A `Credential` is the opaque bearer token handed to us by the external auth
//! system. A `SessionIdentity` is what we extract from it. Decoding happens
//! behind the `CredentialDecoder` port so the domain stays provider-agnostic.
//!
//! # Example
//!
//! ```ignore
//! let credential = Credential::new("eyJ...");
//! let identity = decoder.decode(&credential)?;
//! assert_eq!(identity.id.as_str(), "provider-42");
//! ```

use std::fmt;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

use super::UserId;

/// Opaque bearer credential for the current session.
///
/// The token is kept in a `SecretString` so it never shows up in `Debug`
/// output or logs.
#[derive(Clone)]
pub struct Credential(SecretString);

impl Credential {
    /// Wraps a raw bearer token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(SecretString::new(token.into()))
    }

    /// Returns the raw token for transmission (HTTP `Authorization` header, decoding).
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl PartialEq for Credential {
    fn eq(&self, other: &Self) -> bool {
        self.expose() == other.expose()
    }
}

impl Eq for Credential {}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential([REDACTED])")
    }
}

impl From<SecretString> for Credential {
    fn from(secret: SecretString) -> Self {
        Self(secret)
    }
}

/// Identity of the party the current connection speaks for.
///
/// Immutable for the life of a connection; re-derived on every reconnect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionIdentity {
    pub id: UserId,
}

impl SessionIdentity {
    pub fn new(id: UserId) -> Self {
        Self { id }
    }

    /// True when `user` is this session's identity.
    pub fn is(&self, user: &UserId) -> bool {
        &self.id == user
    }
}

/// Errors raised while turning a credential into an identity.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// The token is not a decodable bearer token.
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    /// The token decodes but carries no usable identity claim.
    #[error("Token carries no identity claim")]
    MissingIdentity,
}

impl AuthError {
    /// Creates an invalid token error with a reason.
    pub fn invalid_token(reason: impl Into<String>) -> Self {
        Self::InvalidToken(reason.into())
    }

    /// Returns true if the user must obtain a new credential.
    ///
    /// Every decode failure does: retrying the same token cannot succeed.
    pub fn requires_reauthentication(&self) -> bool {
        true
    }
}
