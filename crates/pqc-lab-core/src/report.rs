//! Report emitter
//!
//! Pure formatting over harness and self-check results. Text is meant for a
//! terminal, JSON and CSV for other tools.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use pqc_lab_crypto::{AlgorithmSpec, Family};
use serde::{Deserialize, Serialize};

use crate::error::{HarnessError, Result};
use crate::harness::MeasurementSummary;
use crate::selfcheck::SelfCheckResult;

pub const NO_RESULTS: &str = "no results: zero algorithms tested";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Csv,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "txt" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            other => Err(format!("unknown output format '{other}' (expected text, json or csv)")),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => f.write_str("text"),
            OutputFormat::Json => f.write_str("json"),
            OutputFormat::Csv => f.write_str("csv"),
        }
    }
}

/// Everything measured and checked for one algorithm
#[derive(Debug, Clone, Serialize)]
pub struct AlgorithmReport {
    #[serde(rename = "algorithm")]
    pub spec: &'static AlgorithmSpec,
    pub measurements: Vec<MeasurementSummary>,
    pub self_check: Option<SelfCheckResult>,
}

impl AlgorithmReport {
    pub fn new(spec: &'static AlgorithmSpec) -> Self {
        Self {
            spec,
            measurements: Vec::new(),
            self_check: None,
        }
    }

    pub fn with_measurements(mut self, measurements: Vec<MeasurementSummary>) -> Self {
        self.measurements = measurements;
        self
    }

    pub fn with_self_check(mut self, result: SelfCheckResult) -> Self {
        self.self_check = Some(result);
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub generated_at: DateTime<Utc>,
    pub provider: String,
    pub memory_tracking: bool,
    pub entries: Vec<AlgorithmReport>,
}

impl Report {
    pub fn new(
        provider: impl Into<String>,
        memory_tracking: bool,
        entries: Vec<AlgorithmReport>,
    ) -> Self {
        Self {
            generated_at: Utc::now(),
            provider: provider.into(),
            memory_tracking,
            entries,
        }
    }

    /// Fail on the most severe self-check outcome in the report.
    ///
    /// Mismatches outrank infrastructure errors anywhere in the report.
    pub fn verdict(&self) -> Result<()> {
        let checks = || self.entries.iter().filter_map(|e| e.self_check.as_ref());

        for check in checks() {
            check.ensure_consistent()?;
        }
        if let Some(check) = checks().find(|c| c.errored > 0) {
            return Err(HarnessError::SelfCheckErrored {
                algorithm: check.algorithm.clone(),
                errors: check.errored,
            });
        }
        Ok(())
    }

    pub fn render_as(&self, format: OutputFormat) -> String {
        match format {
            OutputFormat::Text => render(self),
            OutputFormat::Json => render_json(self),
            OutputFormat::Csv => render_csv(self),
        }
    }
}

/// Human-readable report
pub fn render(report: &Report) -> String {
    let mut out = format!(
        "PQC Lab report\nprovider: {}\ngenerated: {}\n",
        report.provider,
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );

    if report.entries.is_empty() {
        out.push('\n');
        out.push_str(NO_RESULTS);
        out.push('\n');
        return out;
    }

    for entry in &report.entries {
        let spec = entry.spec;
        out.push('\n');
        let level = spec.security_level;
        out.push_str(&format!("{}  {}  NIST level {level}\n", spec.id, spec.family));
        out.push_str(&format!("  sizes: {}\n", sizes(spec)));

        if !entry.measurements.is_empty() {
            out.push_str(&format!(
                "  {:<12} {:>7} {:>5} {:>11} {:>11} {:>11} {:>11} {:>12}\n",
                "operation", "trials", "fail", "mean", "min", "max", "stddev", "peak mem"
            ));
            for m in &entry.measurements {
                out.push_str(&format!(
                    "  {:<12} {:>7} {:>5} {:>11} {:>11} {:>11} {:>11} {:>12}\n",
                    m.operation,
                    m.trials,
                    m.failures,
                    format_nanos(m.mean_ns),
                    format_nanos(m.min_ns as f64),
                    format_nanos(m.max_ns as f64),
                    format_nanos(m.stddev_ns),
                    format_bytes(m.peak_bytes),
                ));
            }
        }

        match &entry.self_check {
            Some(check) => {
                out.push_str(&format!(
                    "  self-check: {} ({}/{} passed",
                    check.status(),
                    check.passed,
                    check.trials()
                ));
                if check.failed > 0 {
                    out.push_str(&format!(", {} mismatched", check.failed));
                }
                if check.errored > 0 {
                    out.push_str(&format!(", {} errored", check.errored));
                }
                out.push_str(")\n");
                if let Some(first) = check.problems.first() {
                    let (trial, outcome) = (first.trial, &first.outcome);
                    out.push_str(&format!("    first problem: trial {trial} {outcome:?}\n"));
                }
            }
            None => out.push_str("  self-check: not run\n"),
        }
    }
    out
}

/// Structured report; degrades to `{}` rather than failing
pub fn render_json(report: &Report) -> String {
    serde_json::to_string_pretty(report).unwrap_or_else(|_| "{}".to_string())
}

/// One row per measured operation plus one per self-check
pub fn render_csv(report: &Report) -> String {
    let mut out = String::from(concat!(
        "algorithm,family,security_level,operation,trials,failures,",
        "min_ns,mean_ns,median_ns,max_ns,stddev_ns,peak_bytes,status\n",
    ));

    for entry in &report.entries {
        let spec = entry.spec;
        for m in &entry.measurements {
            out.push_str(&format!(
                "{},{},{},{},{},{},{},{:.1},{},{},{:.1},{},\n",
                spec.id,
                spec.family,
                spec.security_level,
                m.operation,
                m.trials,
                m.failures,
                m.min_ns,
                m.mean_ns,
                m.median_ns,
                m.max_ns,
                m.stddev_ns,
                m.peak_bytes.map(|b| b.to_string()).unwrap_or_default(),
            ));
        }
        if let Some(check) = &entry.self_check {
            out.push_str(&format!(
                "{},{},{},self_check,{},{},,,,,,,{}\n",
                spec.id,
                spec.family,
                spec.security_level,
                check.trials(),
                check.failed + check.errored,
                check.status(),
            ));
        }
    }
    out
}

fn sizes(spec: &AlgorithmSpec) -> String {
    match spec.family {
        Family::Kem => format!(
            "pk {} B, sk {} B, ct {} B, ss {} B",
            spec.public_key_len,
            spec.secret_key_len,
            spec.ciphertext_or_signature_len,
            spec.shared_secret_len
        ),
        Family::Dsa => format!(
            "pk {} B, sk {} B, sig {} B",
            spec.public_key_len, spec.secret_key_len, spec.ciphertext_or_signature_len
        ),
    }
}

fn format_nanos(nanos: f64) -> String {
    if nanos < 1_000.0 {
        format!("{nanos:.0} ns")
    } else if nanos < 1_000_000.0 {
        format!("{:.2} µs", nanos / 1_000.0)
    } else if nanos < 1_000_000_000.0 {
        format!("{:.2} ms", nanos / 1_000_000.0)
    } else {
        format!("{:.2} s", nanos / 1_000_000_000.0)
    }
}

fn format_bytes(bytes: Option<u64>) -> String {
    match bytes {
        None => "unavailable".to_string(),
        Some(b) if b < 1024 => format!("{b} B"),
        Some(b) => format!("{:.1} KiB", b as f64 / 1024.0),
    }
}
