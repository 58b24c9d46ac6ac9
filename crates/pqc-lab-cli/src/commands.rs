//! Command execution

use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use pqc_lab_core::alloc::is_tracking;
use pqc_lab_core::{
    AlgorithmReport, Benchmark, Harness, LabConfig, OutputFormat, Report, SelfCheckRunner,
};
use pqc_lab_crypto::{lookup, registry, AlgorithmSpec, PrimitiveAdapter};
use tracing::info;

use crate::{BenchArgs, CheckArgs, Commands, OutputArgs, Selection};

pub(crate) async fn execute(command: Commands, config: LabConfig) -> Result<()> {
    match command {
        Commands::Bench { selection, bench, output } => {
            let config = with_overrides(config, &bench, &CheckArgs::default(), &output)?;
            let specs = select(&selection, &config)?;
            let report = build_report(&config, &specs, true, false).await?;
            emit(&report, &config)?;
            report.verdict()?;
        }

        Commands::Check { selection, check, output } => {
            let config = with_overrides(config, &BenchArgs::default(), &check, &output)?;
            let specs = select(&selection, &config)?;
            let report = build_report(&config, &specs, false, true).await?;
            emit(&report, &config)?;
            report.verdict()?;
        }

        Commands::Run { selection, bench, check, output } => {
            let config = with_overrides(config, &bench, &check, &output)?;
            let specs = select(&selection, &config)?;
            let report = build_report(&config, &specs, true, true).await?;
            emit(&report, &config)?;
            report.verdict()?;
        }

        Commands::List => print!("{}", algorithm_table()),

        Commands::Info => print!("{}", runtime_info(&config)),
    }
    Ok(())
}

/// Command-line values win over the config file
fn with_overrides(
    mut config: LabConfig,
    bench: &BenchArgs,
    check: &CheckArgs,
    output: &OutputArgs,
) -> Result<LabConfig> {
    if let Some(count) = bench.count {
        config.benchmark.iterations = count;
    }
    if let Some(warmup) = bench.warmup {
        config.benchmark.warmup = warmup;
    }
    if let Some(workers) = bench.workers {
        config.benchmark.workers = workers;
    }
    if let Some(len) = bench.message_len {
        config.benchmark.message_len = len;
        config.self_check.message_len = len;
    }
    if let Some(trials) = check.trials {
        config.self_check.trials = trials;
    }
    if let Some(format) = output.format {
        config.benchmark.output_format = format;
    }
    if let Some(path) = &output.output {
        config.benchmark.output = Some(path.clone());
    }
    config.validate()?;
    Ok(config)
}

fn select(selection: &Selection, config: &LabConfig) -> Result<Vec<&'static AlgorithmSpec>> {
    let mut specs = if selection.all {
        config.all_algorithms()?
    } else if selection.algorithms.is_empty() {
        config.default_algorithms()?
    } else {
        selection
            .algorithms
            .iter()
            .map(String::as_str)
            .map(lookup)
            .collect::<std::result::Result<Vec<_>, _>>()?
    };

    // `mlkem768` and `ML-KEM-768` name the same set
    let mut seen = Vec::new();
    specs.retain(|spec| {
        if seen.contains(&spec.id) {
            false
        } else {
            seen.push(spec.id);
            true
        }
    });
    Ok(specs)
}

async fn build_report(
    config: &LabConfig,
    specs: &[&'static AlgorithmSpec],
    bench: bool,
    check: bool,
) -> Result<Report> {
    let adapter: Arc<PrimitiveAdapter> = Arc::new(PrimitiveAdapter::default());
    let harness = Harness::new()
        .with_warmup(config.benchmark.warmup)
        .with_workers(config.benchmark.workers);
    let benchmark = Benchmark::new(Arc::clone(&adapter), harness, config.benchmark.iterations)
        .with_message_len(config.benchmark.message_len);
    let runner = SelfCheckRunner::new(&*adapter).with_message_len(config.self_check.message_len);

    let mut entries = Vec::with_capacity(specs.len());
    for &spec in specs {
        let mut entry = AlgorithmReport::new(spec);
        if bench {
            let measurements = benchmark
                .run(spec)
                .await
                .with_context(|| format!("benchmarking {}", spec.id))?;
            entry = entry.with_measurements(measurements);
        }
        if check {
            let result = runner
                .run(spec, config.self_check.trials)
                .with_context(|| format!("self-checking {}", spec.id))?;
            entry = entry.with_self_check(result);
        }
        entries.push(entry);
    }

    Ok(Report::new(adapter.provider_name(), is_tracking(), entries))
}

fn emit(report: &Report, config: &LabConfig) -> Result<()> {
    let rendered = report.render_as(config.benchmark.output_format);
    match &config.benchmark.output {
        Some(path) => {
            write_report(path, &rendered)?;
            let format = config.benchmark.output_format;
            info!(path = %path.display(), %format, "report written");
        }
        None => print!("{rendered}"),
    }
    Ok(())
}

fn write_report(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating report directory {}", parent.display()))?;
    }
    fs::write(path, contents).with_context(|| format!("writing report to {}", path.display()))
}

fn algorithm_table() -> String {
    let mut out = format!(
        "{:<12} {:<4} {:>5} {:>8} {:>8} {:>8}\n",
        "algorithm", "kind", "level", "pk", "sk", "ct/sig"
    );
    for spec in registry::all() {
        out.push_str(&format!(
            "{:<12} {:<4} {:>5} {:>8} {:>8} {:>8}\n",
            spec.id,
            spec.family,
            spec.security_level,
            spec.public_key_len,
            spec.secret_key_len,
            spec.ciphertext_or_signature_len
        ));
    }
    out
}

fn runtime_info(config: &LabConfig) -> String {
    let adapter: PrimitiveAdapter = PrimitiveAdapter::default();
    let formats = [OutputFormat::Text, OutputFormat::Json, OutputFormat::Csv]
        .map(|f| f.to_string())
        .join(", ");
    format!(
        concat!(
            "pqc-lab {}\nprovider: {}\ndefault KEM: {}\ndefault DSA: {}\n",
            "memory tracking: {}\nreport formats: {}\n",
        ),
        env!("CARGO_PKG_VERSION"),
        adapter.provider_name(),
        config.algorithms.default_kem,
        config.algorithms.default_dsa,
        if is_tracking() { "active" } else { "unavailable" },
        formats
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pqc_lab_core::HarnessError;
    use std::path::PathBuf;

    fn selection(ids: &[&str]) -> Selection {
        Selection {
            algorithms: ids.iter().map(|s| s.to_string()).collect(),
            all: false,
        }
    }

    #[test]
    fn test_default_selection() {
        let specs = select(&Selection::default(), &LabConfig::default()).unwrap();
        let ids: Vec<_> = specs.iter().map(|s| s.id).collect();
        assert_eq!(ids, ["ML-KEM-768", "ML-DSA-65"]);
    }

    #[test]
    fn test_selection_deduplicates_spellings() {
        let ids = selection(&["mlkem768", "ML-KEM-768", "ml-dsa-87"]);
        let specs = select(&ids, &LabConfig::default()).unwrap();
        let ids: Vec<_> = specs.iter().map(|s| s.id).collect();
        assert_eq!(ids, ["ML-KEM-768", "ML-DSA-87"]);
    }

    #[test]
    fn test_unknown_algorithm_is_rejected() {
        let err = select(&selection(&["ML-KEM-999"]), &LabConfig::default()).unwrap_err();
        assert_eq!(crate::exit_code(&err), 3);
    }

    #[test]
    fn test_zero_workers_rejected() {
        let bench = BenchArgs {
            workers: Some(0),
            ..Default::default()
        };
        let err = with_overrides(
            LabConfig::default(),
            &bench,
            &CheckArgs::default(),
            &OutputArgs::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<HarnessError>(),
            Some(HarnessError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_overrides_apply() {
        let config = with_overrides(
            LabConfig::default(),
            &BenchArgs {
                count: Some(3),
                message_len: Some(8),
                ..Default::default()
            },
            &CheckArgs { trials: Some(4) },
            &OutputArgs {
                format: Some(OutputFormat::Csv),
                output: Some(PathBuf::from("out/report.csv")),
            },
        )
        .unwrap();
        assert_eq!(config.benchmark.iterations, 3);
        assert_eq!(config.benchmark.warmup, 10);
        assert_eq!(config.self_check.trials, 4);
        assert_eq!(config.self_check.message_len, 8);
        assert_eq!(config.benchmark.output_format, OutputFormat::Csv);
    }

    #[tokio::test]
    async fn test_run_report_for_one_kem() {
        let mut config = LabConfig::default();
        config.benchmark.iterations = 3;
        config.benchmark.warmup = 0;
        config.self_check.trials = 3;

        let specs = [lookup("ML-KEM-512").unwrap()];
        let report = build_report(&config, &specs, true, true).await.unwrap();
        assert_eq!(report.entries.len(), 1);
        assert_eq!(report.entries[0].measurements.len(), 3);
        assert!(report.memory_tracking);
        assert!(report.verdict().is_ok());
    }

    #[test]
    fn test_report_written_with_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/report.json");
        write_report(&path, "{}").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "{}");
    }

    #[test]
    fn test_list_and_info() {
        let listing = algorithm_table();
        assert_eq!(listing.lines().count(), 7);
        assert!(listing.contains("ML-DSA-44"));

        let info = runtime_info(&LabConfig::default());
        assert!(info.contains("default KEM: ML-KEM-768"));
        assert!(info.contains("memory tracking: active"));
    }
}
