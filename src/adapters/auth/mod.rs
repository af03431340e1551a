//! Authentication adapters.
//!
//! Implementations of the `CredentialDecoder` port:
//!
//! - `jwt` - Reads the identity claim from a bearer JWT
//! - `mock` - Token table for tests, no JWT required

mod jwt;
mod mock;

pub use jwt::JwtIdentityDecoder;
pub use mock::StaticIdentityDecoder;
