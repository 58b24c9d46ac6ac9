//! PQC Lab Core - measurement, self-checks and reporting
//!
//! This crate drives the primitives exposed by `pqc-lab-crypto`:
//! - `Harness` times operations over many trials (optionally in parallel)
//! - `SelfCheckRunner` runs full protocol rounds and checks their invariants
//! - `Benchmark` measures every operation of one algorithm
//! - `Report` collects the results and renders text, JSON or CSV
//! - `LabConfig` is the TOML configuration shared by the frontends

pub mod alloc;
pub mod bench;
pub mod config;
pub mod error;
pub mod harness;
pub mod report;
pub mod selfcheck;

pub use alloc::{MemoryWindow, TrackingAllocator};
pub use bench::Benchmark;
pub use config::LabConfig;
pub use error::{ErrorKind, HarnessError, Result};
pub use harness::{measure, Harness, MeasurementSummary, TrialMeasurement};
pub use report::{render, render_csv, render_json, AlgorithmReport, OutputFormat, Report};
pub use selfcheck::{
    CheckStage, CheckStatus, SelfCheckResult, SelfCheckRunner, TrialCheck, TrialOutcome,
};

// Memory figures in this crate's tests come from the counting allocator
#[cfg(test)]
#[global_allocator]
static GLOBAL: TrackingAllocator = TrackingAllocator;
