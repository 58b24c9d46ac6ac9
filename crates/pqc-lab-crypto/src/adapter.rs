//! Uniform dispatch over KEM and DSA primitives
//!
//! The adapter owns no cryptography. It checks that inputs have exactly the
//! lengths the registry declares (the provider may not) and turns provider
//! faults into errors that name the algorithm and operation.

use secrecy::ExposeSecret;
use tracing::{debug, warn};

use crate::error::{CryptoError, Operation, ProviderFault, Result};
use crate::provider::{PqcProvider, PqcryptoProvider};
use crate::registry::{AlgorithmSpec, Family};
use crate::secret::{Encapsulation, KeyPair, SecretBytes};

pub struct PrimitiveAdapter<P = PqcryptoProvider> {
    provider: P,
}

impl Default for PrimitiveAdapter<PqcryptoProvider> {
    fn default() -> Self {
        Self::new(PqcryptoProvider::new())
    }
}

impl<P: PqcProvider> PrimitiveAdapter<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Generate a key pair for either family
    pub fn generate_keypair(&self, spec: &AlgorithmSpec) -> Result<KeyPair> {
        let (public_key, secret_key) = self
            .provider
            .keygen(spec.id)
            .map_err(|fault| provider_error(spec, Operation::Keygen, fault))?;

        if public_key.len() != spec.public_key_len {
            return Err(short_output(
                spec,
                Operation::Keygen,
                "public key",
                spec.public_key_len,
                public_key.len(),
            ));
        }
        let secret_len = secret_key.expose_secret().len();
        if secret_len != spec.secret_key_len {
            let expected = spec.secret_key_len;
            return Err(short_output(spec, Operation::Keygen, "secret key", expected, secret_len));
        }

        debug!(algorithm = %spec.id, "generated key pair");
        Ok(KeyPair::new(public_key, secret_key))
    }

    pub fn encapsulate(&self, spec: &AlgorithmSpec, public_key: &[u8]) -> Result<Encapsulation> {
        let op = Operation::Encapsulate;
        require_family(spec, Family::Kem, op)?;
        require_len(spec, op, "public key", spec.public_key_len, public_key.len())?;

        let (ciphertext, shared_secret) = self
            .provider
            .encap(spec.id, public_key)
            .map_err(|fault| provider_error(spec, op, fault))?;

        let expected = spec.ciphertext_or_signature_len;
        if ciphertext.len() != expected {
            return Err(short_output(spec, op, "ciphertext", expected, ciphertext.len()));
        }

        Ok(Encapsulation {
            ciphertext,
            shared_secret,
        })
    }

    pub fn decapsulate(
        &self,
        spec: &AlgorithmSpec,
        secret_key: &SecretBytes,
        ciphertext: &[u8],
    ) -> Result<SecretBytes> {
        let op = Operation::Decapsulate;
        require_family(spec, Family::Kem, op)?;
        let secret_key = secret_key.expose_secret();
        require_len(spec, op, "secret key", spec.secret_key_len, secret_key.len())?;
        require_len(spec, op, "ciphertext", spec.ciphertext_or_signature_len, ciphertext.len())?;

        self.provider
            .decap(spec.id, secret_key, ciphertext)
            .map_err(|fault| provider_error(spec, op, fault))
    }

    pub fn sign(
        &self,
        spec: &AlgorithmSpec,
        secret_key: &SecretBytes,
        message: &[u8],
    ) -> Result<Vec<u8>> {
        let op = Operation::Sign;
        require_family(spec, Family::Dsa, op)?;
        let secret_key = secret_key.expose_secret();
        require_len(spec, op, "secret key", spec.secret_key_len, secret_key.len())?;

        let signature = self
            .provider
            .sign(spec.id, secret_key, message)
            .map_err(|fault| provider_error(spec, op, fault))?;

        let expected = spec.ciphertext_or_signature_len;
        if signature.len() != expected {
            return Err(short_output(spec, op, "signature", expected, signature.len()));
        }
        Ok(signature)
    }

    /// Verify a detached signature.
    ///
    /// A signature that does not match yields `Ok(false)`; only structurally
    /// wrong key or signature lengths are errors.
    pub fn verify(
        &self,
        spec: &AlgorithmSpec,
        public_key: &[u8],
        message: &[u8],
        signature: &[u8],
    ) -> Result<bool> {
        let op = Operation::Verify;
        require_family(spec, Family::Dsa, op)?;
        require_len(spec, op, "public key", spec.public_key_len, public_key.len())?;
        require_len(spec, op, "signature", spec.ciphertext_or_signature_len, signature.len())?;

        self.provider
            .verify(spec.id, public_key, message, signature)
            .map_err(|fault| provider_error(spec, op, fault))
    }
}

fn require_family(spec: &AlgorithmSpec, family: Family, op: Operation) -> Result<()> {
    if spec.family == family {
        Ok(())
    } else {
        Err(CryptoError::InvalidInput {
            algorithm: spec.id,
            operation: op,
            reason: format!("{} is a {} algorithm, {op} needs {family}", spec.id, spec.family),
        })
    }
}

fn require_len(
    spec: &AlgorithmSpec,
    op: Operation,
    what: &str,
    expected: usize,
    actual: usize,
) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(CryptoError::length_mismatch(spec.id, op, what, expected, actual))
    }
}

fn provider_error(spec: &AlgorithmSpec, op: Operation, fault: ProviderFault) -> CryptoError {
    warn!(algorithm = %spec.id, operation = %op, error = %fault, "provider call failed");
    CryptoError::Provider {
        algorithm: spec.id,
        operation: op,
        reason: fault.0,
    }
}

// The provider handed back a buffer of the wrong size; that is its fault, not the caller's
fn short_output(
    spec: &AlgorithmSpec,
    op: Operation,
    what: &str,
    expected: usize,
    actual: usize,
) -> CryptoError {
    provider_error(
        spec,
        op,
        ProviderFault::new(format!("returned {what} of {actual} bytes, expected {expected}")),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{self, lookup};
    use crate::secret::secret_from_slice;
    use rand::RngCore;

    type ProviderResult<T> = std::result::Result<T, ProviderFault>;

    fn adapter() -> PrimitiveAdapter {
        PrimitiveAdapter::default()
    }

    /// Provider that always fails, for error-path checks
    struct BrokenProvider;

    impl PqcProvider for BrokenProvider {
        fn name(&self) -> &str {
            "broken"
        }
        fn keygen(&self, _: &str) -> ProviderResult<(Vec<u8>, SecretBytes)> {
            Err(ProviderFault::new("allocation failed"))
        }
        fn encap(&self, _: &str, _: &[u8]) -> ProviderResult<(Vec<u8>, SecretBytes)> {
            Ok((vec![0u8; 3], secret_from_slice(&[0u8; 32])))
        }
        fn decap(&self, _: &str, _: &[u8], _: &[u8]) -> ProviderResult<SecretBytes> {
            Err(ProviderFault::new("internal failure"))
        }
        fn sign(&self, _: &str, _: &[u8], _: &[u8]) -> ProviderResult<Vec<u8>> {
            Err(ProviderFault::new("internal failure"))
        }
        fn verify(&self, _: &str, _: &[u8], _: &[u8], _: &[u8]) -> ProviderResult<bool> {
            panic!("verify must not be reached with malformed input")
        }
    }

    #[test]
    fn test_ml_kem_768_scenario() {
        let spec = lookup("ML-KEM-768").unwrap();
        let adapter = adapter();
        let pair = adapter.generate_keypair(spec).unwrap();
        assert_eq!(pair.public_key.len(), spec.public_key_len);
        assert_eq!(pair.secret_len(), spec.secret_key_len);

        let sent = adapter.encapsulate(spec, &pair.public_key).unwrap();
        assert_eq!(sent.ciphertext.len(), spec.ciphertext_or_signature_len);

        let received = adapter.decapsulate(spec, &pair.secret_key, &sent.ciphertext).unwrap();
        assert_eq!(received.expose_secret(), sent.shared_secret.expose_secret());
        assert_eq!(received.expose_secret().len(), spec.shared_secret_len);
    }

    #[test]
    fn test_kem_roundtrips_all_parameter_sets() {
        let adapter = adapter();
        for spec in registry::kems() {
            for _ in 0..100 {
                let pair = adapter.generate_keypair(spec).unwrap();
                let sent = adapter.encapsulate(spec, &pair.public_key).unwrap();
                let received =
                    adapter.decapsulate(spec, &pair.secret_key, &sent.ciphertext).unwrap();
                let expected = sent.shared_secret.expose_secret();
                assert_eq!(received.expose_secret(), expected, "{}", spec.id);
            }
        }
    }

    #[test]
    fn test_ml_dsa_87_scenario() {
        let spec = lookup("ML-DSA-87").unwrap();
        let adapter = adapter();
        let pair = adapter.generate_keypair(spec).unwrap();
        let message = b"abc";

        let signature = adapter.sign(spec, &pair.secret_key, message).unwrap();
        assert_eq!(signature.len(), spec.ciphertext_or_signature_len);
        assert!(adapter.verify(spec, &pair.public_key, message, &signature).unwrap());
        assert!(!adapter.verify(spec, &pair.public_key, b"abd", &signature).unwrap());
    }

    #[test]
    fn test_dsa_flipped_bit_fails_for_all_parameter_sets() {
        let adapter = adapter();
        let mut rng = rand::thread_rng();
        for spec in registry::signatures() {
            let pair = adapter.generate_keypair(spec).unwrap();
            for _ in 0..5 {
                let mut message = vec![0u8; 64];
                rng.fill_bytes(&mut message);
                let signature = adapter.sign(spec, &pair.secret_key, &message).unwrap();
                assert!(adapter.verify(spec, &pair.public_key, &message, &signature).unwrap());

                let mut corrupted = signature.clone();
                corrupted[0] ^= 0x01;
                assert!(!adapter.verify(spec, &pair.public_key, &message, &corrupted).unwrap());
            }
        }
    }

    #[test]
    fn test_wrong_lengths_are_rejected_before_provider() {
        let spec = lookup("ML-KEM-512").unwrap();
        let adapter = adapter();
        let err = adapter.encapsulate(spec, &[0u8; 10]).unwrap_err();
        assert!(matches!(err, CryptoError::InvalidInput { operation: Operation::Encapsulate, .. }));

        let pair = adapter.generate_keypair(spec).unwrap();
        let err = adapter.decapsulate(spec, &pair.secret_key, &[0u8; 767]).err().unwrap();
        assert!(err.is_caller_mistake());

        let dsa = lookup("ML-DSA-65").unwrap();
        let broken = PrimitiveAdapter::new(BrokenProvider);
        let err = broken.verify(dsa, &[0u8; 1952], b"m", &[0u8; 5]).unwrap_err();
        assert!(matches!(err, CryptoError::InvalidInput { operation: Operation::Verify, .. }));
        let err = broken.verify(dsa, &[0u8; 7], b"m", &[0u8; 3309]).unwrap_err();
        assert!(err.to_string().contains("public key must be 1952 bytes"));
    }

    #[test]
    fn test_family_mismatch_is_invalid_input() {
        let adapter = adapter();
        let kem = lookup("ML-KEM-768").unwrap();
        let pair = adapter.generate_keypair(kem).unwrap();
        let err = adapter.sign(kem, &pair.secret_key, b"hello").unwrap_err();
        assert!(matches!(err, CryptoError::InvalidInput { operation: Operation::Sign, .. }));

        let dsa = lookup("ML-DSA-44").unwrap();
        assert!(adapter.encapsulate(dsa, &[0u8; 1312]).is_err());
    }

    #[test]
    fn test_provider_faults_carry_context() {
        let spec = lookup("ML-KEM-1024").unwrap();
        let broken = PrimitiveAdapter::new(BrokenProvider);

        let err = broken.generate_keypair(spec).unwrap_err();
        assert_eq!(
            err,
            CryptoError::Provider {
                algorithm: "ML-KEM-1024",
                operation: Operation::Keygen,
                reason: "allocation failed".into(),
            }
        );

        // Undersized ciphertext from the provider is a provider fault
        let err = broken.encapsulate(spec, &[0u8; 1568]).unwrap_err();
        assert!(matches!(err, CryptoError::Provider { operation: Operation::Encapsulate, .. }));

        let pair = adapter().generate_keypair(spec).unwrap();
        let err = broken.decapsulate(spec, &pair.secret_key, &[0u8; 1568]).err().unwrap();
        assert!(matches!(err, CryptoError::Provider { operation: Operation::Decapsulate, .. }));
        assert!(format!("{err:?}").contains("internal failure"));
    }
}
