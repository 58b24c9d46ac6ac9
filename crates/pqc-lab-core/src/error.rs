//! Harness errors

use std::path::PathBuf;

use pqc_lab_crypto::CryptoError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("All {trials} trials of {operation} failed")]
    AllTrialsFailed {
        operation: String,
        trials: usize,
        #[source]
        source: CryptoError,
    },

    #[error("Cryptographic mismatch in {algorithm}: {failures} trial(s) failed the self-check")]
    CryptographicMismatch { algorithm: String, failures: usize },

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("Self-check of {algorithm} hit {errors} infrastructure error(s)")]
    SelfCheckErrored { algorithm: String, errors: usize },

    #[error("Trial worker failed: {0}")]
    Worker(String),

    #[error("Unable to read config {path}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    ConfigParse(String),
}

/// Coarse classification used for process exit codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad id, bad input shape, bad configuration
    CallerMistake,
    /// Provider fault or every trial failing
    Infrastructure,
    /// A self-check disagreed with itself
    Mismatch,
}

impl HarnessError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            HarnessError::InvalidConfiguration(_)
            | HarnessError::ConfigIo { .. }
            | HarnessError::ConfigParse(_) => ErrorKind::CallerMistake,
            HarnessError::Crypto(err) if err.is_caller_mistake() => ErrorKind::CallerMistake,
            HarnessError::Crypto(_)
            | HarnessError::AllTrialsFailed { .. }
            | HarnessError::SelfCheckErrored { .. }
            | HarnessError::Worker(_) => ErrorKind::Infrastructure,
            HarnessError::CryptographicMismatch { .. } => ErrorKind::Mismatch,
        }
    }
}

pub type Result<T> = std::result::Result<T, HarnessError>;
