//! Credentials for the remote service.

use base64::{engine::general_purpose::STANDARD, Engine};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// An opaque credential string, typically `user:password`.
///
/// The secret is zeroized when dropped and never printed by `Debug`.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Credentials {
    secret: String,
}

impl Credentials {
    /// Wraps an opaque credential string.
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Builds credentials from a user name and password.
    pub fn basic(user: &str, password: &str) -> Self {
        Self::new(format!("{user}:{password}"))
    }

    /// Returns the value of the `Authorization` header.
    ///
    /// # Security
    ///
    /// The returned string carries the secret; don't log it.
    pub fn authorization_header(&self) -> String {
        format!("Basic {}", STANDARD.encode(self.secret.as_bytes()))
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credentials(..)")
    }
}
