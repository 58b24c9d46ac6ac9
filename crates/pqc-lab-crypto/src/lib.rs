//! PQC Lab Crypto - registry and primitive adapter
//!
//! This crate provides:
//! - The static registry of ML-KEM (FIPS 203) and ML-DSA (FIPS 204) parameter sets
//! - `PqcProvider`, the capability seam in front of the external PQC library
//! - `PrimitiveAdapter`, uniform dispatch plus input-shape validation
//! - Wiping containers for secret keys and shared secrets

pub mod adapter;
pub mod error;
pub mod provider;
pub mod registry;
pub mod secret;

pub use adapter::PrimitiveAdapter;
pub use error::{CryptoError, Operation, ProviderFault, Result};
pub use provider::{PqcProvider, PqcryptoProvider};
pub use registry::{lookup, AlgorithmSpec, Family};
pub use secret::{secret_from_slice, Encapsulation, KeyPair, SecretBytes};
