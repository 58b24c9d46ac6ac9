//! Lab configuration
//!
//! Loaded from TOML; every field has a default so an empty file is valid.

use std::fs;
use std::path::{Path, PathBuf};

use pqc_lab_crypto::{lookup, AlgorithmSpec, Family};
use serde::Deserialize;

use crate::error::{HarnessError, Result};
use crate::report::OutputFormat;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LabConfig {
    pub algorithms: AlgorithmsSection,
    pub benchmark: BenchmarkSection,
    pub self_check: SelfCheckSection,
    pub log_level: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AlgorithmsSection {
    /// KEM ids selected by `--all`
    pub kem: Vec<String>,
    /// Signature ids selected by `--all`
    pub dsa: Vec<String>,
    pub default_kem: String,
    pub default_dsa: String,
}

impl Default for AlgorithmsSection {
    fn default() -> Self {
        Self {
            kem: vec!["ML-KEM-512".into(), "ML-KEM-768".into(), "ML-KEM-1024".into()],
            dsa: vec!["ML-DSA-44".into(), "ML-DSA-65".into(), "ML-DSA-87".into()],
            default_kem: "ML-KEM-768".into(),
            default_dsa: "ML-DSA-65".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BenchmarkSection {
    pub iterations: usize,
    pub warmup: usize,
    pub workers: usize,
    pub message_len: usize,
    pub output_format: OutputFormat,
    pub output: Option<PathBuf>,
}

impl Default for BenchmarkSection {
    fn default() -> Self {
        Self {
            iterations: 100,
            warmup: 10,
            workers: 1,
            message_len: 32,
            output_format: OutputFormat::Text,
            output: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SelfCheckSection {
    pub trials: usize,
    pub message_len: usize,
}

impl Default for SelfCheckSection {
    fn default() -> Self {
        Self {
            trials: 100,
            message_len: 32,
        }
    }
}

impl LabConfig {
    /// Read, parse and validate a config file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|source| HarnessError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&contents)?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: LabConfig =
            toml::from_str(contents).map_err(|err| HarnessError::ConfigParse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let algorithms = &self.algorithms;
        for id in &algorithms.kem {
            expect_family(id, Family::Kem, "algorithms.kem")?;
        }
        for id in &algorithms.dsa {
            expect_family(id, Family::Dsa, "algorithms.dsa")?;
        }
        expect_family(&algorithms.default_kem, Family::Kem, "algorithms.default_kem")?;
        expect_family(&algorithms.default_dsa, Family::Dsa, "algorithms.default_dsa")?;

        for (name, value) in [
            ("benchmark.iterations", self.benchmark.iterations),
            ("benchmark.workers", self.benchmark.workers),
            ("self_check.trials", self.self_check.trials),
        ] {
            if value == 0 {
                return Err(HarnessError::InvalidConfiguration(format!(
                    "{name} must be greater than zero"
                )));
            }
        }
        Ok(())
    }

    /// Algorithms used when none are named: the default KEM and DSA
    pub fn default_algorithms(&self) -> Result<Vec<&'static AlgorithmSpec>> {
        Ok(vec![
            lookup(&self.algorithms.default_kem)?,
            lookup(&self.algorithms.default_dsa)?,
        ])
    }

    /// Every configured algorithm, KEMs first
    pub fn all_algorithms(&self) -> Result<Vec<&'static AlgorithmSpec>> {
        self.algorithms
            .kem
            .iter()
            .chain(&self.algorithms.dsa)
            .map(|id| lookup(id).map_err(HarnessError::from))
            .collect()
    }
}

fn expect_family(id: &str, family: Family, field: &str) -> Result<()> {
    let spec = lookup(id).map_err(|_| {
        HarnessError::InvalidConfiguration(format!("{field}: unknown algorithm '{id}'"))
    })?;
    if spec.family != family {
        return Err(HarnessError::InvalidConfiguration(format!(
            "{field}: {} is a {} algorithm, expected {family}",
            spec.id, spec.family
        )));
    }
    Ok(())
}
