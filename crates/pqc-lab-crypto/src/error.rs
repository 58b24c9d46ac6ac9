//! Errors raised by the registry and the primitive adapter

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Primitive operations exposed by the adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Keygen,
    Encapsulate,
    Decapsulate,
    Sign,
    Verify,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Keygen => "keygen",
            Operation::Encapsulate => "encapsulate",
            Operation::Decapsulate => "decapsulate",
            Operation::Sign => "sign",
            Operation::Verify => "verify",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("Unknown algorithm: {0}")]
    UnknownAlgorithm(String),

    #[error("Invalid input for {algorithm} {operation}: {reason}")]
    InvalidInput {
        algorithm: &'static str,
        operation: Operation,
        reason: String,
    },

    #[error("Provider error in {algorithm} {operation}: {reason}")]
    Provider {
        algorithm: &'static str,
        operation: Operation,
        reason: String,
    },
}

impl CryptoError {
    /// True for errors caused by the caller (bad id, badly shaped input)
    pub fn is_caller_mistake(&self) -> bool {
        matches!(
            self,
            CryptoError::UnknownAlgorithm(_) | CryptoError::InvalidInput { .. }
        )
    }

    pub(crate) fn length_mismatch(
        algorithm: &'static str,
        operation: Operation,
        what: &str,
        expected: usize,
        actual: usize,
    ) -> Self {
        CryptoError::InvalidInput {
            algorithm,
            operation,
            reason: format!("{what} must be {expected} bytes, got {actual}"),
        }
    }
}

/// Failure reported by a [`crate::PqcProvider`] implementation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct ProviderFault(pub String);

impl ProviderFault {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

pub type Result<T> = std::result::Result<T, CryptoError>;
