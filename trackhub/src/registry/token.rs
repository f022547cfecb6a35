//! Session tokens and their generators.

use std::borrow::Borrow;
use std::fmt::{self, Write as _};

use rand::RngCore;

/// Number of random bytes behind a token.
pub const TOKEN_BYTES: usize = 32;

/// Opaque credential identifying one session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Hex encodes raw bytes, lowercase.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut hex = String::with_capacity(bytes.len() * 2);
        for b in bytes {
            // Writing to a String cannot fail.
            let _ = write!(hex, "{b:02x}");
        }
        Self(hex)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for SessionToken {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Source of candidate tokens. The registry re-samples on collision.
pub trait TokenGenerator: Send + Sync {
    fn generate(&self) -> SessionToken;
}

/// Draws [`TOKEN_BYTES`] from the thread-local CSPRNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomTokenGenerator;

impl TokenGenerator for RandomTokenGenerator {
    fn generate(&self) -> SessionToken {
        let mut bytes = [0u8; TOKEN_BYTES];
        rand::rng().fill_bytes(&mut bytes);
        SessionToken::from_bytes(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_random_token_is_64_lowercase_hex() {
        let token = RandomTokenGenerator.generate();
        assert_eq!(token.as_str().len(), 64);
        assert!(token
            .as_str()
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn test_random_tokens_differ() {
        let tokens: HashSet<SessionToken> =
            (0..1000).map(|_| RandomTokenGenerator.generate()).collect();
        assert_eq!(tokens.len(), 1000);
    }

    #[test]
    fn test_from_bytes() {
        assert_eq!(SessionToken::from_bytes(&[0x00, 0xab, 0x0f]).as_str(), "00ab0f");
    }
}
