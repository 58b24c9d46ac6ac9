//! Self-check runner
//!
//! Each trial walks one protocol round through a fixed sequence of stages:
//!
//! ```text
//! Start -> KeypairGenerated -> OperationPerformed -> InverseOperationPerformed -> Verified -> Done
//! ```
//!
//! A failing transition jumps straight to `Done` with an `Error` outcome, so
//! infrastructure faults never masquerade as cryptographic failures.

use std::fmt;

use pqc_lab_crypto::{AlgorithmSpec, CryptoError, Family, PqcProvider, PrimitiveAdapter};
use rand::{Rng, RngCore};
use secrecy::ExposeSecret;
use serde::Serialize;
use tracing::{debug, error, info};

use crate::error::{HarnessError, Result};

/// Default message size for signature checks
pub const DEFAULT_MESSAGE_LEN: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStage {
    Start,
    KeypairGenerated,
    OperationPerformed,
    InverseOperationPerformed,
    Verified,
    Done,
}

impl fmt::Display for CheckStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CheckStage::Start => "start",
            CheckStage::KeypairGenerated => "keypair generated",
            CheckStage::OperationPerformed => "operation performed",
            CheckStage::InverseOperationPerformed => "inverse operation performed",
            CheckStage::Verified => "verified",
            CheckStage::Done => "done",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TrialOutcome {
    Pass,
    /// The round completed but the invariant did not hold
    Fail { reason: String },
    /// A transition failed; `stage` is the last stage reached
    Error { stage: CheckStage, error: String },
}

impl TrialOutcome {
    pub fn is_pass(&self) -> bool {
        matches!(self, TrialOutcome::Pass)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrialCheck {
    pub trial: usize,
    pub outcome: TrialOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CheckStatus {
    Pass,
    Fail,
    Error,
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckStatus::Pass => f.write_str("PASS"),
            CheckStatus::Fail => f.write_str("FAIL"),
            CheckStatus::Error => f.write_str("ERROR"),
        }
    }
}

/// Outcome of every trial for one algorithm
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelfCheckResult {
    pub algorithm: String,
    pub passed: usize,
    pub failed: usize,
    pub errored: usize,
    /// Non-passing trials only
    pub problems: Vec<TrialCheck>,
}

impl SelfCheckResult {
    fn new(algorithm: &str) -> Self {
        Self {
            algorithm: algorithm.to_string(),
            passed: 0,
            failed: 0,
            errored: 0,
            problems: Vec::new(),
        }
    }

    fn record(&mut self, check: TrialCheck) {
        match check.outcome {
            TrialOutcome::Pass => self.passed += 1,
            TrialOutcome::Fail { .. } => {
                self.failed += 1;
                self.problems.push(check);
            }
            TrialOutcome::Error { .. } => {
                self.errored += 1;
                self.problems.push(check);
            }
        }
    }

    pub fn trials(&self) -> usize {
        self.passed + self.failed + self.errored
    }

    /// Errors outrank mismatches, which outrank passes
    pub fn status(&self) -> CheckStatus {
        if self.errored > 0 {
            CheckStatus::Error
        } else if self.failed > 0 {
            CheckStatus::Fail
        } else {
            CheckStatus::Pass
        }
    }

    /// `CryptographicMismatch` if any trial failed its invariant
    pub fn ensure_consistent(&self) -> Result<()> {
        if self.failed > 0 {
            return Err(HarnessError::CryptographicMismatch {
                algorithm: self.algorithm.clone(),
                failures: self.failed,
            });
        }
        Ok(())
    }
}

pub struct SelfCheckRunner<'a, P> {
    adapter: &'a PrimitiveAdapter<P>,
    message_len: usize,
}

impl<'a, P: PqcProvider> SelfCheckRunner<'a, P> {
    pub fn new(adapter: &'a PrimitiveAdapter<P>) -> Self {
        Self {
            adapter,
            message_len: DEFAULT_MESSAGE_LEN,
        }
    }

    pub fn with_message_len(mut self, message_len: usize) -> Self {
        self.message_len = message_len;
        self
    }

    /// Run `trials` independent rounds, each with its own key pair
    pub fn run(&self, spec: &AlgorithmSpec, trials: usize) -> Result<SelfCheckResult> {
        if trials == 0 {
            return Err(HarnessError::InvalidConfiguration(format!(
                "self-check of {} needs at least one trial",
                spec.id
            )));
        }

        let mut result = SelfCheckResult::new(spec.id);
        for trial in 0..trials {
            let outcome = self.run_trial(spec);
            if let TrialOutcome::Fail { reason } = &outcome {
                error!(algorithm = %spec.id, trial, %reason, "self-check mismatch");
            }
            result.record(TrialCheck { trial, outcome });
        }

        info!(
            algorithm = %spec.id,
            passed = result.passed,
            failed = result.failed,
            errored = result.errored,
            "self-check finished"
        );
        Ok(result)
    }

    /// One full round; the key pair is wiped when this returns
    pub fn run_trial(&self, spec: &AlgorithmSpec) -> TrialOutcome {
        let mut stage = CheckStage::Start;
        let verdict = match spec.family {
            Family::Kem => self.kem_round(spec, &mut stage),
            Family::Dsa => self.dsa_round(spec, &mut stage),
        };

        let outcome = match verdict {
            Ok(None) => TrialOutcome::Pass,
            Ok(Some(reason)) => TrialOutcome::Fail { reason },
            Err(err) => {
                debug!(algorithm = %spec.id, %stage, error = %err, "self-check transition failed");
                return TrialOutcome::Error {
                    stage,
                    error: err.to_string(),
                };
            }
        };
        advance(spec, &mut stage, CheckStage::Verified);
        advance(spec, &mut stage, CheckStage::Done);
        outcome
    }

    // Ok(None) when the invariant holds, Ok(Some(reason)) when it does not
    fn kem_round(
        &self,
        spec: &AlgorithmSpec,
        stage: &mut CheckStage,
    ) -> std::result::Result<Option<String>, CryptoError> {
        let pair = self.adapter.generate_keypair(spec)?;
        advance(spec, stage, CheckStage::KeypairGenerated);

        let sent = self.adapter.encapsulate(spec, &pair.public_key)?;
        advance(spec, stage, CheckStage::OperationPerformed);

        let received = self
            .adapter
            .decapsulate(spec, &pair.secret_key, &sent.ciphertext)?;
        advance(spec, stage, CheckStage::InverseOperationPerformed);

        // Plain equality: this is a test oracle, not a security boundary
        if sent.shared_secret.expose_secret() == received.expose_secret() {
            Ok(None)
        } else {
            Ok(Some("shared secrets differ after decapsulation".into()))
        }
    }

    fn dsa_round(
        &self,
        spec: &AlgorithmSpec,
        stage: &mut CheckStage,
    ) -> std::result::Result<Option<String>, CryptoError> {
        let mut rng = rand::thread_rng();
        let mut message = vec![0u8; self.message_len];
        rng.fill_bytes(&mut message);

        let pair = self.adapter.generate_keypair(spec)?;
        advance(spec, stage, CheckStage::KeypairGenerated);

        let signature = self.adapter.sign(spec, &pair.secret_key, &message)?;
        advance(spec, stage, CheckStage::OperationPerformed);

        let genuine = self
            .adapter
            .verify(spec, &pair.public_key, &message, &signature)?;
        advance(spec, stage, CheckStage::InverseOperationPerformed);

        if !genuine {
            return Ok(Some("genuine signature rejected".into()));
        }

        let mut corrupted = signature.clone();
        let bit = rng.gen_range(0..corrupted.len() * 8);
        corrupted[bit / 8] ^= 1 << (bit % 8);
        if self
            .adapter
            .verify(spec, &pair.public_key, &message, &corrupted)?
        {
            return Ok(Some(format!("signature with bit {bit} flipped was accepted")));
        }

        let mut other = message.clone();
        other.push(0x01);
        if self.adapter.verify(spec, &pair.public_key, &other, &signature)? {
            return Ok(Some("signature accepted for a different message".into()));
        }

        Ok(None)
    }
}

fn advance(spec: &AlgorithmSpec, stage: &mut CheckStage, next: CheckStage) {
    tracing::trace!(algorithm = %spec.id, from = %stage, to = %next, "self-check transition");
    *stage = next;
}
