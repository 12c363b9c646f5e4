//! Session secret generation.

use std::fmt;

use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Serialize, Serializer};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Number of random bytes in a session secret.
pub const SESSION_SECRET_BYTES: usize = 32;

/// A 256-bit random secret rendered as 64 lowercase hex characters.
///
/// Doubles as the passphrase protecting the generated private key.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SessionSecret(String);

impl SessionSecret {
    /// Draw a fresh secret from the OS CSPRNG.
    pub fn generate() -> Self {
        let mut bytes = [0u8; SESSION_SECRET_BYTES];
        OsRng.fill_bytes(&mut bytes);
        let secret = Self(hex::encode(bytes));
        bytes.zeroize();
        secret
    }

    /// Accept a previously persisted secret. Rejects anything that is not
    /// exactly [`SESSION_SECRET_BYTES`] hex-encoded bytes.
    pub fn parse(persisted: &str) -> Option<Self> {
        let valid = persisted.len() == SESSION_SECRET_BYTES * 2
            && persisted.bytes().all(|b| b.is_ascii_hexdigit());
        valid.then(|| Self(persisted.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Debug for SessionSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionSecret(<redacted>)")
    }
}

impl Serialize for SessionSecret {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_is_64_hex_chars() {
        let secret = SessionSecret::generate();
        assert_eq!(secret.as_str().len(), SESSION_SECRET_BYTES * 2);
        assert!(secret
            .as_str()
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
        assert_eq!(hex::decode(secret.as_str()).unwrap().len(), SESSION_SECRET_BYTES);
    }

    #[test]
    fn independent_secrets_differ() {
        assert_ne!(SessionSecret::generate(), SessionSecret::generate());
    }

    #[test]
    fn parse_accepts_only_full_hex_secrets() {
        let secret = SessionSecret::generate();
        assert_eq!(SessionSecret::parse(secret.as_str()), Some(secret));
        assert!(SessionSecret::parse("abc").is_none());
        assert!(SessionSecret::parse(&"z".repeat(64)).is_none());
    }

    #[test]
    fn debug_output_is_redacted() {
        let secret = SessionSecret::generate();
        assert!(!format!("{:?}", secret).contains(secret.as_str()));
    }
}
