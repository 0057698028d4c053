//! One-time registration tokens for clusternet agents
//!
//! Tokens are cryptographically secure random strings. The hub validates
//! them; this side only mints and forwards them.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::RngCore;

/// Number of random bytes in a generated token
const TOKEN_BYTES: usize = 32;

/// A registration token for one agent
#[derive(Clone, PartialEq, Eq)]
pub struct RegistrationToken {
    string: String,
}

impl RegistrationToken {
    /// Generate a new random token
    pub fn generate() -> Self {
        let mut raw = [0u8; TOKEN_BYTES];
        rand::rngs::OsRng.fill_bytes(&mut raw);
        Self {
            string: URL_SAFE_NO_PAD.encode(raw),
        }
    }

    /// Wrap a token issued elsewhere
    pub fn from_string(s: impl Into<String>) -> Self {
        Self { string: s.into() }
    }

    /// The token as a string
    pub fn as_str(&self) -> &str {
        &self.string
    }
}

impl std::fmt::Debug for RegistrationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistrationToken")
            .field("len", &self.string.len())
            .finish_non_exhaustive()
    }
}

impl std::fmt::Display for RegistrationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.string)
    }
}
