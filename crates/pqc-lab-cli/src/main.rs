//! PQC Lab CLI - post-quantum readiness checks
//!
//! Usage:
//!   pqc-lab bench    Benchmark key generation and the primitive operations
//!   pqc-lab check    Run protocol self-checks
//!   pqc-lab run      Benchmark and self-check in one report
//!   pqc-lab list     Show supported algorithms
//!   pqc-lab info     Show build and runtime information

mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use pqc_lab_core::{ErrorKind, HarnessError, LabConfig, OutputFormat, TrackingAllocator};
use pqc_lab_crypto::CryptoError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[global_allocator]
static GLOBAL: TrackingAllocator = TrackingAllocator;

#[derive(Parser)]
#[command(name = "pqc-lab")]
#[command(author, version, about = "Post-quantum cryptography readiness lab")]
#[command(
    long_about = "PQC Lab - ML-KEM (FIPS 203) and ML-DSA (FIPS 204) benchmarks and self-checks.\n\n\
    Exit codes: 0 success, 1 cryptographic mismatch, 2 infrastructure error, 3 bad configuration."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Benchmark keygen and encapsulate/decapsulate or sign/verify
    Bench {
        #[command(flatten)]
        selection: Selection,
        #[command(flatten)]
        bench: BenchArgs,
        #[command(flatten)]
        output: OutputArgs,
    },

    /// Run full protocol rounds and check their invariants
    Check {
        #[command(flatten)]
        selection: Selection,
        #[command(flatten)]
        check: CheckArgs,
        #[command(flatten)]
        output: OutputArgs,
    },

    /// Benchmark and self-check, one combined report
    Run {
        #[command(flatten)]
        selection: Selection,
        #[command(flatten)]
        bench: BenchArgs,
        #[command(flatten)]
        check: CheckArgs,
        #[command(flatten)]
        output: OutputArgs,
    },

    /// List supported algorithms
    List,

    /// Show version, provider and defaults
    Info,
}

#[derive(Args, Debug, Default, Clone)]
struct Selection {
    /// Algorithm id, repeatable (ML-KEM-768, mldsa65, ...)
    #[arg(short = 'a', long = "alg")]
    algorithms: Vec<String>,

    /// Every configured algorithm
    #[arg(long, conflicts_with = "algorithms")]
    all: bool,
}

#[derive(Args, Debug, Default, Clone)]
struct BenchArgs {
    /// Measured iterations per operation
    #[arg(short = 'n', long)]
    count: Option<usize>,

    /// Untimed iterations before measuring
    #[arg(long)]
    warmup: Option<usize>,

    /// Parallel workers (isolated trials)
    #[arg(short = 'j', long)]
    workers: Option<usize>,

    /// Length of the random message to sign
    #[arg(long)]
    message_len: Option<usize>,
}

#[derive(Args, Debug, Default, Clone)]
struct CheckArgs {
    /// Self-check rounds per algorithm
    #[arg(short, long)]
    trials: Option<usize>,
}

#[derive(Args, Debug, Default, Clone)]
struct OutputArgs {
    /// Report format: text, json or csv
    #[arg(short, long)]
    format: Option<OutputFormat>,

    /// Write the report here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => LabConfig::load(path),
        None => Ok(LabConfig::default()),
    };

    // Initialize logging; reports go to stdout, logs to stderr
    let level = config
        .as_ref()
        .ok()
        .and_then(|c| c.log_level.clone())
        .unwrap_or_else(|| "info".to_string());
    let filter = if cli.verbose { "debug".to_string() } else { level };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let result = match config {
        Ok(config) => commands::execute(cli.command, config).await,
        Err(err) => Err(err.into()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::from(exit_code(&err))
        }
    }
}

/// 1 mismatch, 2 infrastructure, 3 caller mistake
fn exit_code(err: &anyhow::Error) -> u8 {
    for cause in err.chain() {
        if let Some(harness) = cause.downcast_ref::<HarnessError>() {
            return match harness.kind() {
                ErrorKind::Mismatch => 1,
                ErrorKind::Infrastructure => 2,
                ErrorKind::CallerMistake => 3,
            };
        }
        if let Some(crypto) = cause.downcast_ref::<CryptoError>() {
            return if crypto.is_caller_mistake() { 3 } else { 2 };
        }
    }
    2
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parses_bench_flags() {
        let cli = Cli::try_parse_from([
            "pqc-lab", "bench", "--alg", "ML-KEM-512", "-a", "mldsa44", "-n", "5", "--workers", "2",
            "-f", "json",
        ])
        .unwrap();
        match cli.command {
            Commands::Bench { selection, bench, output } => {
                assert_eq!(selection.algorithms, ["ML-KEM-512", "mldsa44"]);
                assert_eq!(bench.count, Some(5));
                assert_eq!(bench.workers, Some(2));
                assert_eq!(output.format, Some(OutputFormat::Json));
            }
            _ => panic!("expected bench"),
        }
    }

    #[test]
    fn test_all_conflicts_with_alg() {
        assert!(Cli::try_parse_from(["pqc-lab", "check", "--all", "--alg", "ML-KEM-768"]).is_err());
        assert!(Cli::try_parse_from(["pqc-lab", "run", "--format", "xml"]).is_err());
    }

    #[test]
    fn test_exit_codes() {
        let mismatch = anyhow::Error::from(HarnessError::CryptographicMismatch {
            algorithm: "ML-DSA-65".into(),
            failures: 1,
        });
        assert_eq!(exit_code(&mismatch), 1);

        let unknown = HarnessError::from(CryptoError::UnknownAlgorithm("x".into()));
        let unknown = anyhow::Error::from(unknown).context("selecting algorithms");
        assert_eq!(exit_code(&unknown), 3);

        let bad_config = anyhow::Error::from(HarnessError::InvalidConfiguration("workers".into()));
        assert_eq!(exit_code(&bad_config), 3);

        let io: anyhow::Result<()> =
            Err(std::io::Error::other("disk full")).context("writing report");
        assert_eq!(exit_code(&io.unwrap_err()), 2);
    }
}
