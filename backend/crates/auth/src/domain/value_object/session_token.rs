//! Session Token
//!
//! Opaque bearer credential: 32 bytes from the OS CSPRNG, base64url
//! encoded without padding (43 characters).

use platform::crypto::{random_bytes, to_base64url};
use std::fmt;

/// Raw token length in bytes
pub const SESSION_TOKEN_BYTES: usize = 32;

/// Opaque session token
///
/// `Debug` output is redacted so tokens never reach the logs.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SessionToken(String);

impl SessionToken {
    /// Generate a fresh token
    pub fn generate() -> Self {
        Self(to_base64url(&random_bytes(SESSION_TOKEN_BYTES)))
    }

    /// Wrap a token received from a client or the database
    ///
    /// No format check: an unknown token simply matches no session.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SessionToken").field(&"[REDACTED]").finish()
    }
}
