//! Post-quantum primitive providers
//!
//! `PqcProvider` is the trust boundary: everything behind it is audited
//! lattice code we do not second-guess. The production implementation wraps
//! the PQClean bindings (FIPS 203 ML-KEM, FIPS 204 ML-DSA).
//!
//! Wiping ends at this boundary as well. Secrets cross it as `SecretBytes`
//! and are zeroized on drop, but pqcrypto's own `SecretKey` and `SharedSecret`
//! values are plain byte arrays. The copies made here (the key pair from
//! `keypair()`, the `from_bytes` key rebuilt on every decap and sign, the
//! shared secret from encapsulate/decapsulate) are dropped without being
//! cleared.

use pqcrypto_traits::kem::{
    Ciphertext as _, PublicKey as _, SecretKey as _, SharedSecret as _,
};
use pqcrypto_traits::sign::{
    DetachedSignature as _, PublicKey as _, SecretKey as _,
};

use crate::error::ProviderFault;
use crate::secret::{secret_from_slice, SecretBytes};

/// Capability interface of an external PQC library, keyed by algorithm id
pub trait PqcProvider: Send + Sync {
    /// Human-readable provider name for reports
    fn name(&self) -> &str;

    fn keygen(&self, algorithm: &str) -> Result<(Vec<u8>, SecretBytes), ProviderFault>;

    /// Returns `(ciphertext, shared_secret)`
    fn encap(
        &self,
        algorithm: &str,
        public_key: &[u8],
    ) -> Result<(Vec<u8>, SecretBytes), ProviderFault>;

    fn decap(
        &self,
        algorithm: &str,
        secret_key: &[u8],
        ciphertext: &[u8],
    ) -> Result<SecretBytes, ProviderFault>;

    fn sign(
        &self,
        algorithm: &str,
        secret_key: &[u8],
        message: &[u8],
    ) -> Result<Vec<u8>, ProviderFault>;

    /// `Ok(false)` for a signature that does not verify
    fn verify(
        &self,
        algorithm: &str,
        public_key: &[u8],
        message: &[u8],
        signature: &[u8],
    ) -> Result<bool, ProviderFault>;
}

impl<P: PqcProvider + ?Sized> PqcProvider for std::sync::Arc<P> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn keygen(&self, algorithm: &str) -> Result<(Vec<u8>, SecretBytes), ProviderFault> {
        (**self).keygen(algorithm)
    }

    fn encap(
        &self,
        algorithm: &str,
        public_key: &[u8],
    ) -> Result<(Vec<u8>, SecretBytes), ProviderFault> {
        (**self).encap(algorithm, public_key)
    }

    fn decap(
        &self,
        algorithm: &str,
        secret_key: &[u8],
        ciphertext: &[u8],
    ) -> Result<SecretBytes, ProviderFault> {
        (**self).decap(algorithm, secret_key, ciphertext)
    }

    fn sign(
        &self,
        algorithm: &str,
        secret_key: &[u8],
        message: &[u8],
    ) -> Result<Vec<u8>, ProviderFault> {
        (**self).sign(algorithm, secret_key, message)
    }

    fn verify(
        &self,
        algorithm: &str,
        public_key: &[u8],
        message: &[u8],
        signature: &[u8],
    ) -> Result<bool, ProviderFault> {
        (**self).verify(algorithm, public_key, message, signature)
    }
}

// Binds `$m` to the PQClean module for `$alg` and evaluates `$body`.
macro_rules! with_kem {
    ($alg:expr, $m:ident => $body:expr) => {
        match $alg {
            "ML-KEM-512" => {
                use pqcrypto_mlkem::mlkem512 as $m;
                $body
            }
            "ML-KEM-768" => {
                use pqcrypto_mlkem::mlkem768 as $m;
                $body
            }
            "ML-KEM-1024" => {
                use pqcrypto_mlkem::mlkem1024 as $m;
                $body
            }
            other => Err(unsupported(other)),
        }
    };
}

macro_rules! with_dsa {
    ($alg:expr, $m:ident => $body:expr) => {
        match $alg {
            "ML-DSA-44" => {
                use pqcrypto_mldsa::mldsa44 as $m;
                $body
            }
            "ML-DSA-65" => {
                use pqcrypto_mldsa::mldsa65 as $m;
                $body
            }
            "ML-DSA-87" => {
                use pqcrypto_mldsa::mldsa87 as $m;
                $body
            }
            other => Err(unsupported(other)),
        }
    };
}

fn unsupported(algorithm: &str) -> ProviderFault {
    ProviderFault::new(format!("algorithm {algorithm} is not provided by pqcrypto"))
}

fn rejected<E: std::fmt::Debug>(what: &'static str) -> impl FnOnce(E) -> ProviderFault {
    move |err| ProviderFault::new(format!("{what} rejected by pqcrypto: {err:?}"))
}

/// ML-KEM and ML-DSA from the PQClean reference implementations
#[derive(Debug, Clone, Copy, Default)]
pub struct PqcryptoProvider;

impl PqcryptoProvider {
    pub fn new() -> Self {
        Self
    }
}

impl PqcProvider for PqcryptoProvider {
    fn name(&self) -> &str {
        "pqcrypto (PQClean)"
    }

    fn keygen(&self, algorithm: &str) -> Result<(Vec<u8>, SecretBytes), ProviderFault> {
        if algorithm.starts_with("ML-KEM") {
            with_kem!(algorithm, kem => {
                let (pk, sk) = kem::keypair();
                Ok((pk.as_bytes().to_vec(), secret_from_slice(sk.as_bytes())))
            })
        } else {
            with_dsa!(algorithm, dsa => {
                let (pk, sk) = dsa::keypair();
                Ok((pk.as_bytes().to_vec(), secret_from_slice(sk.as_bytes())))
            })
        }
    }

    fn encap(
        &self,
        algorithm: &str,
        public_key: &[u8],
    ) -> Result<(Vec<u8>, SecretBytes), ProviderFault> {
        with_kem!(algorithm, kem => {
            let pk = kem::PublicKey::from_bytes(public_key).map_err(rejected("public key"))?;
            let (ss, ct) = kem::encapsulate(&pk);
            Ok((ct.as_bytes().to_vec(), secret_from_slice(ss.as_bytes())))
        })
    }

    fn decap(
        &self,
        algorithm: &str,
        secret_key: &[u8],
        ciphertext: &[u8],
    ) -> Result<SecretBytes, ProviderFault> {
        with_kem!(algorithm, kem => {
            let sk = kem::SecretKey::from_bytes(secret_key).map_err(rejected("secret key"))?;
            let ct = kem::Ciphertext::from_bytes(ciphertext).map_err(rejected("ciphertext"))?;
            let ss = kem::decapsulate(&ct, &sk);
            Ok(secret_from_slice(ss.as_bytes()))
        })
    }

    fn sign(
        &self,
        algorithm: &str,
        secret_key: &[u8],
        message: &[u8],
    ) -> Result<Vec<u8>, ProviderFault> {
        with_dsa!(algorithm, dsa => {
            let sk = dsa::SecretKey::from_bytes(secret_key).map_err(rejected("secret key"))?;
            let sig = dsa::detached_sign(message, &sk);
            Ok(sig.as_bytes().to_vec())
        })
    }

    fn verify(
        &self,
        algorithm: &str,
        public_key: &[u8],
        message: &[u8],
        signature: &[u8],
    ) -> Result<bool, ProviderFault> {
        with_dsa!(algorithm, dsa => {
            let pk = dsa::PublicKey::from_bytes(public_key).map_err(rejected("public key"))?;
            let sig = dsa::DetachedSignature::from_bytes(signature)
                .map_err(rejected("signature"))?;
            Ok(dsa::verify_detached_signature(&sig, message, &pk).is_ok())
        })
    }
}
