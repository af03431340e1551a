//! Static identity decoder for testing.
//!
//! Maps raw token strings to identities without any JWT machinery.
//!
//! # Example
//!
//! ```ignore
//! use order_relay::adapters::auth::StaticIdentityDecoder;
//!
//! let decoder = StaticIdentityDecoder::new()
//!     .with_token("token-u1", "u1")
//!     .with_token("token-u2", "u2");
//!
//! let identity = decoder.decode(&Credential::new("token-u1"))?;
//! assert_eq!(identity.id.as_str(), "u1");
//! ```

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::domain::foundation::{AuthError, Credential, SessionIdentity, UserId};
use crate::ports::CredentialDecoder;

/// Token-to-identity table. Unknown tokens are invalid.
#[derive(Debug, Default)]
pub struct StaticIdentityDecoder {
    tokens: RwLock<HashMap<String, String>>,
}

impl StaticIdentityDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `token` as a credential for `user_id`.
    ///
    /// A blank `user_id` registers a token that decodes to `MissingIdentity`.
    pub fn with_token(self, token: impl Into<String>, user_id: impl Into<String>) -> Self {
        self.insert(token, user_id);
        self
    }

    /// Registers a token after construction, e.g. to simulate a refresh.
    pub fn insert(&self, token: impl Into<String>, user_id: impl Into<String>) {
        self.tokens
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(token.into(), user_id.into());
    }

    /// Forgets `token`, making further decodes of it fail.
    pub fn revoke(&self, token: &str) {
        self.tokens
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(token);
    }
}

impl CredentialDecoder for StaticIdentityDecoder {
    fn decode(&self, credential: &Credential) -> Result<SessionIdentity, AuthError> {
        let user_id = self
            .tokens
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(credential.expose())
            .cloned()
            .ok_or_else(|| AuthError::invalid_token("unknown token"))?;

        UserId::new(user_id)
            .map(SessionIdentity::new)
            .map_err(|_| AuthError::MissingIdentity)
    }
}
