//! Symmetric encryption of encoded values.
//!
//! The façade encrypts the codec's output before it reaches the backend and
//! decrypts it on the way back. A cipher only ever sees the entry key and the
//! text; it knows nothing about types or envelopes.

mod aes;

pub use aes::{AesCipher, DEFAULT_SECRET, KeyMaterial};

use crate::error::Result;

/// Opaque encrypt/decrypt capability.
pub trait Cipher: Send + Sync {
    /// Prepares the primitive. Returns false when it is unusable, in which
    /// case the builder replaces it with [`NoCipher`].
    fn init(&mut self) -> bool;

    /// # Errors
    ///
    /// Returns an encode error if the primitive fails.
    fn encrypt(&self, key: &str, plaintext: &str) -> Result<String>;

    /// # Errors
    ///
    /// Returns a decode error on malformed or tampered input.
    fn decrypt(&self, key: &str, ciphertext: &str) -> Result<String>;

    /// Short name for log messages.
    fn name(&self) -> &'static str;
}

/// Identity cipher.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCipher;

impl Cipher for NoCipher {
    fn init(&mut self) -> bool {
        true
    }

    fn encrypt(&self, _key: &str, plaintext: &str) -> Result<String> {
        Ok(plaintext.to_string())
    }

    fn decrypt(&self, _key: &str, ciphertext: &str) -> Result<String> {
        Ok(ciphertext.to_string())
    }

    fn name(&self) -> &'static str {
        "none"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_cipher_is_identity() {
        let mut cipher = NoCipher;
        assert!(cipher.init());
        assert_eq!(cipher.encrypt("k", "{\"a\":1}").unwrap(), "{\"a\":1}");
        assert_eq!(cipher.decrypt("k", "plain").unwrap(), "plain");
    }
}
