//! Key material that wipes itself
//!
//! Secret keys and shared secrets live in `secrecy` wrappers, which zeroize
//! the backing buffer when dropped. Early returns and unwinding go through
//! `Drop` too, so no exit path leaves key material behind.

use std::fmt;

use secrecy::{ExposeSecret, Secret, SecretVec};

/// Heap bytes zeroized on drop, with no `Debug` impl
pub type SecretBytes = SecretVec<u8>;

/// Copy `bytes` into a fresh wiping buffer
pub fn secret_from_slice(bytes: &[u8]) -> SecretBytes {
    Secret::new(bytes.to_vec())
}

const REDACTED: &str = "[REDACTED]";

/// A freshly generated key pair, owned by whoever asked for it
pub struct KeyPair {
    pub public_key: Vec<u8>,
    pub secret_key: SecretBytes,
}

impl KeyPair {
    pub fn new(public_key: Vec<u8>, secret_key: SecretBytes) -> Self {
        Self {
            public_key,
            secret_key,
        }
    }

    pub fn secret_len(&self) -> usize {
        self.secret_key.expose_secret().len()
    }

    /// Drop (and wipe) the secret half, keeping the public key
    pub fn into_public(self) -> Vec<u8> {
        self.public_key
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key)
            .field("secret_key", &format_args!("{REDACTED}"))
            .finish()
    }
}

/// Sender side of a KEM exchange
pub struct Encapsulation {
    pub ciphertext: Vec<u8>,
    pub shared_secret: SecretBytes,
}

impl fmt::Debug for Encapsulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Encapsulation")
            .field("ciphertext", &self.ciphertext)
            .field("shared_secret", &format_args!("{REDACTED}"))
            .finish()
    }
}
