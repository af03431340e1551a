//! Session credential configuration

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::domain::foundation::Credential;

/// Session credential configuration
///
/// The token is optional at load time so library consumers can supply the
/// credential themselves; the binary requires it.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AuthConfig {
    /// Bearer token identifying the session
    #[serde(default)]
    pub token: Option<SecretString>,
}

impl AuthConfig {
    /// The configured credential, if a non-blank token is present
    pub fn credential(&self) -> Option<Credential> {
        self.token
            .as_ref()
            .map(|t| t.expose_secret().trim())
            .filter(|t| !t.is_empty())
            .map(Credential::new)
    }
}
