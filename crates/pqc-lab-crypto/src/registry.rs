//! Algorithm registry
//!
//! Parameter sets for the NIST-standardized lattice schemes (FIPS 203 / FIPS 204).
//! The table is a `static`, built at compile time and never mutated.

use std::fmt;

use serde::Serialize;

use crate::{CryptoError, Result};

/// Capability family of an algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Family {
    /// Key encapsulation mechanism (ML-KEM)
    #[serde(rename = "KEM")]
    Kem,
    /// Digital signature algorithm (ML-DSA)
    #[serde(rename = "DSA")]
    Dsa,
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Family::Kem => f.write_str("KEM"),
            Family::Dsa => f.write_str("DSA"),
        }
    }
}

/// Sizes and security category of one parameter set
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct AlgorithmSpec {
    pub id: &'static str,
    pub family: Family,
    /// Claimed NIST security category
    pub security_level: u8,
    pub public_key_len: usize,
    pub secret_key_len: usize,
    /// Ciphertext length for KEMs, signature length for DSAs
    pub ciphertext_or_signature_len: usize,
    /// Zero for signature schemes
    pub shared_secret_len: usize,
}

impl AlgorithmSpec {
    pub fn is_kem(&self) -> bool {
        self.family == Family::Kem
    }

    pub fn is_signature(&self) -> bool {
        self.family == Family::Dsa
    }
}

impl fmt::Display for AlgorithmSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id)
    }
}

static REGISTRY: [AlgorithmSpec; 6] = [
    AlgorithmSpec {
        id: "ML-KEM-512",
        family: Family::Kem,
        security_level: 1,
        public_key_len: 800,
        secret_key_len: 1632,
        ciphertext_or_signature_len: 768,
        shared_secret_len: 32,
    },
    AlgorithmSpec {
        id: "ML-KEM-768",
        family: Family::Kem,
        security_level: 3,
        public_key_len: 1184,
        secret_key_len: 2400,
        ciphertext_or_signature_len: 1088,
        shared_secret_len: 32,
    },
    AlgorithmSpec {
        id: "ML-KEM-1024",
        family: Family::Kem,
        security_level: 5,
        public_key_len: 1568,
        secret_key_len: 3168,
        ciphertext_or_signature_len: 1568,
        shared_secret_len: 32,
    },
    AlgorithmSpec {
        id: "ML-DSA-44",
        family: Family::Dsa,
        security_level: 2,
        public_key_len: 1312,
        secret_key_len: 2560,
        ciphertext_or_signature_len: 2420,
        shared_secret_len: 0,
    },
    AlgorithmSpec {
        id: "ML-DSA-65",
        family: Family::Dsa,
        security_level: 3,
        public_key_len: 1952,
        secret_key_len: 4032,
        ciphertext_or_signature_len: 3309,
        shared_secret_len: 0,
    },
    AlgorithmSpec {
        id: "ML-DSA-87",
        family: Family::Dsa,
        security_level: 5,
        public_key_len: 2592,
        secret_key_len: 4896,
        ciphertext_or_signature_len: 4627,
        shared_secret_len: 0,
    },
];

/// Look up an algorithm by id.
///
/// Matching ignores case and the `-`/`_` separators, so `ML-KEM-768`,
/// `ml_kem_768` and `mlkem768` all resolve to the same spec. Any other
/// punctuation, or a separator splitting the parameter number (`ML-KEM-76-8`),
/// makes the id unknown.
pub fn lookup(id: &str) -> Result<&'static AlgorithmSpec> {
    let wanted = normalize(id);
    REGISTRY
        .iter()
        .find(|spec| normalize(spec.id) == wanted)
        .ok_or_else(|| CryptoError::UnknownAlgorithm(id.to_string()))
}

/// Every supported parameter set, KEMs first
pub fn all() -> &'static [AlgorithmSpec] {
    &REGISTRY
}

pub fn kems() -> impl Iterator<Item = &'static AlgorithmSpec> {
    REGISTRY.iter().filter(|spec| spec.is_kem())
}

pub fn signatures() -> impl Iterator<Item = &'static AlgorithmSpec> {
    REGISTRY.iter().filter(|spec| spec.is_signature())
}

fn normalize(id: &str) -> String {
    let chars: Vec<char> = id.chars().collect();
    let mut out = String::with_capacity(chars.len());
    for (i, &c) in chars.iter().enumerate() {
        if matches!(c, '-' | '_') {
            let inside_number = i > 0
                && chars[i - 1].is_ascii_digit()
                && chars.get(i + 1).is_some_and(char::is_ascii_digit);
            if !inside_number {
                continue;
            }
        }
        out.push(c.to_ascii_lowercase());
    }
    out
}
