//! Measurement harness
//!
//! Runs an operation a fixed number of times, timing each trial with the
//! monotonic clock and sampling heap growth around it. Failed trials are
//! tallied but kept out of the statistics.

use std::sync::Arc;
use std::time::Instant;

use pqc_lab_crypto::CryptoError;
use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::alloc::MemoryWindow;
use crate::error::{HarnessError, Result};

type OpResult<T> = std::result::Result<T, CryptoError>;

/// One successful trial
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrialMeasurement {
    pub duration_nanos: u64,
    /// Zero when heap tracking is unavailable
    pub peak_bytes: u64,
}

/// Aggregate over the successful trials of one operation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeasurementSummary {
    pub operation: String,
    pub trials: usize,
    pub failures: usize,
    pub min_ns: u64,
    pub mean_ns: f64,
    pub median_ns: u64,
    pub max_ns: u64,
    pub stddev_ns: f64,
    /// Largest per-trial heap growth; `None` when the host gives no figure
    pub peak_bytes: Option<u64>,
}

impl MeasurementSummary {
    /// Build a summary from successful samples.
    ///
    /// `samples` must not be empty.
    pub fn from_samples(
        operation: &str,
        samples: &[TrialMeasurement],
        failures: usize,
        memory_tracked: bool,
    ) -> Self {
        let mut durations: Vec<u64> = samples.iter().map(|s| s.duration_nanos).collect();
        durations.sort_unstable();

        let count = durations.len();
        let min_ns = durations.first().copied().unwrap_or(0);
        let max_ns = durations.last().copied().unwrap_or(0);
        let median_ns = if count == 0 {
            0
        } else if count % 2 == 0 {
            let upper = durations[count / 2];
            let lower = durations[count / 2 - 1];
            lower + (upper - lower) / 2
        } else {
            durations[count / 2]
        };

        let (mean_ns, stddev_ns) = if count == 0 {
            (0.0, 0.0)
        } else {
            let mean = durations.iter().map(|&d| d as f64).sum::<f64>() / count as f64;
            let variance = durations
                .iter()
                .map(|&d| {
                    let diff = d as f64 - mean;
                    diff * diff
                })
                .sum::<f64>()
                / count as f64;
            (mean, variance.sqrt())
        };

        let peak_bytes =
            memory_tracked.then(|| samples.iter().map(|s| s.peak_bytes).max().unwrap_or(0));

        Self {
            operation: operation.to_string(),
            trials: count + failures,
            failures,
            min_ns,
            mean_ns,
            median_ns,
            max_ns,
            stddev_ns,
            peak_bytes,
        }
    }

    pub fn successes(&self) -> usize {
        self.trials - self.failures
    }
}

// Outcome of one trial: the timing sample plus whether memory was sampled
type TrialRecord = OpResult<(TrialMeasurement, bool)>;

/// Trial runner with optional warm-up and parallel fan-out
#[derive(Debug, Clone)]
pub struct Harness {
    warmup: usize,
    workers: usize,
}

impl Default for Harness {
    fn default() -> Self {
        Self { warmup: 0, workers: 1 }
    }
}

impl Harness {
    pub fn new() -> Self {
        Self::default()
    }

    /// Untimed iterations run before the measured trials
    pub fn with_warmup(mut self, warmup: usize) -> Self {
        self.warmup = warmup;
        self
    }

    /// Worker count for `measure_parallel`; zero is treated as one
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Time `operation` over `trial_count` trials
    pub fn measure<T, F>(
        &self,
        name: &str,
        trial_count: usize,
        mut operation: F,
    ) -> Result<MeasurementSummary>
    where
        F: FnMut() -> OpResult<T>,
    {
        self.measure_with_setup(name, trial_count, || Ok(()), move |_: &()| operation())
    }

    /// Time `operation` over `trial_count` trials, each with fresh inputs.
    ///
    /// `setup` runs untimed before every trial and its value (key pairs,
    /// ciphertexts) is dropped at the end of that trial. A failing setup
    /// counts as a failed trial.
    pub fn measure_with_setup<S, T, Setup, Op>(
        &self,
        name: &str,
        trial_count: usize,
        mut setup: Setup,
        mut operation: Op,
    ) -> Result<MeasurementSummary>
    where
        Setup: FnMut() -> OpResult<S>,
        Op: FnMut(&S) -> OpResult<T>,
    {
        check_trial_count(name, trial_count)?;
        warm_up(self.warmup, &mut setup, &mut operation);

        let records: Vec<TrialRecord> = (0..trial_count)
            .map(|_| run_trial(&mut setup, &mut operation))
            .collect();
        summarize(name, records)
    }

    /// Like `measure_with_setup`, with trials spread over blocking tasks.
    ///
    /// Every trial still builds its own inputs; nothing mutable is shared
    /// between workers. Results are joined before aggregation.
    pub async fn measure_parallel<S, T, Setup, Op>(
        &self,
        name: &str,
        trial_count: usize,
        setup: Setup,
        operation: Op,
    ) -> Result<MeasurementSummary>
    where
        S: 'static,
        T: 'static,
        Setup: Fn() -> OpResult<S> + Send + Sync + 'static,
        Op: Fn(&S) -> OpResult<T> + Send + Sync + 'static,
    {
        check_trial_count(name, trial_count)?;

        let workers = self.workers.min(trial_count);
        let setup = Arc::new(setup);
        let operation = Arc::new(operation);
        let mut tasks = JoinSet::new();

        for worker in 0..workers {
            let setup = Arc::clone(&setup);
            let operation = Arc::clone(&operation);
            let warmup = if worker == 0 { self.warmup } else { 0 };
            let trials: Vec<usize> = (worker..trial_count).step_by(workers).collect();

            tasks.spawn_blocking(move || {
                let mut setup = || (*setup)();
                let mut operation = |input: &S| (*operation)(input);
                warm_up(warmup, &mut setup, &mut operation);
                trials
                    .into_iter()
                    .map(|trial| (trial, run_trial(&mut setup, &mut operation)))
                    .collect::<Vec<_>>()
            });
        }

        let mut indexed = Vec::with_capacity(trial_count);
        while let Some(joined) = tasks.join_next().await {
            let batch = joined.map_err(|err| HarnessError::Worker(err.to_string()))?;
            indexed.extend(batch);
        }
        // Keep trial order so "last error" means the same thing as in serial mode
        indexed.sort_by_key(|(trial, _)| *trial);

        debug!(operation = name, workers, "parallel trials joined");
        summarize(name, indexed.into_iter().map(|(_, record)| record).collect())
    }
}

/// Time `operation` over `trial_count` trials with default settings
pub fn measure<T, F>(operation: F, trial_count: usize) -> Result<MeasurementSummary>
where
    F: FnMut() -> OpResult<T>,
{
    Harness::default().measure("operation", trial_count, operation)
}

fn check_trial_count(name: &str, trial_count: usize) -> Result<()> {
    if trial_count == 0 {
        return Err(HarnessError::InvalidConfiguration(format!(
            "trial count for {name} must be at least 1"
        )));
    }
    Ok(())
}

fn warm_up<S, T>(
    iterations: usize,
    setup: &mut impl FnMut() -> OpResult<S>,
    operation: &mut impl FnMut(&S) -> OpResult<T>,
) {
    for _ in 0..iterations {
        if let Ok(input) = setup() {
            let _ = operation(&input);
        }
    }
}

fn run_trial<S, T>(
    setup: &mut impl FnMut() -> OpResult<S>,
    operation: &mut impl FnMut(&S) -> OpResult<T>,
) -> TrialRecord {
    let input = setup()?;

    let window = MemoryWindow::start();
    let started = Instant::now();
    let outcome = operation(&input);
    let elapsed = started.elapsed();
    let peak = window.finish();

    // Outputs and inputs (key material included) are wiped here, outside the timed region
    drop(outcome?);
    drop(input);

    Ok((
        TrialMeasurement {
            duration_nanos: u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX),
            peak_bytes: peak.unwrap_or(0),
        },
        peak.is_some(),
    ))
}

fn summarize(name: &str, records: Vec<TrialRecord>) -> Result<MeasurementSummary> {
    let trials = records.len();
    let mut samples = Vec::with_capacity(trials);
    let mut memory_tracked = true;
    let mut last_error = None;

    for record in records {
        match record {
            Ok((sample, tracked)) => {
                memory_tracked &= tracked;
                samples.push(sample);
            }
            Err(err) => {
                debug!(operation = name, error = %err, "trial failed");
                last_error = Some(err);
            }
        }
    }

    let failures = trials - samples.len();
    if samples.is_empty() {
        if let Some(source) = last_error {
            warn!(operation = name, trials, "all trials failed");
            return Err(HarnessError::AllTrialsFailed {
                operation: name.to_string(),
                trials,
                source,
            });
        }
    }
    if failures > 0 {
        warn!(operation = name, failures, trials, "some trials failed");
    }

    let summary = MeasurementSummary::from_samples(name, &samples, failures, memory_tracked);
    info!(
        operation = name,
        trials,
        mean_ns = summary.mean_ns as u64,
        peak_bytes = ?summary.peak_bytes,
        "measurement complete"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pqc_lab_crypto::Operation;
    use std::cell::Cell;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fault(n: usize) -> CryptoError {
        CryptoError::Provider {
            algorithm: "ML-KEM-768",
            operation: Operation::Keygen,
            reason: format!("failure {n}"),
        }
    }

    fn sample(duration_nanos: u64) -> TrialMeasurement {
        TrialMeasurement {
            duration_nanos,
            peak_bytes: 0,
        }
    }

    #[test]
    fn test_zero_trials_is_invalid_configuration() {
        let err = measure(|| Ok(()), 0).unwrap_err();
        assert!(matches!(err, HarnessError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_all_trials_failed_carries_last_error() {
        let calls = Cell::new(0);
        let err = measure(
            || -> OpResult<()> {
                calls.set(calls.get() + 1);
                Err(fault(calls.get()))
            },
            3,
        )
        .unwrap_err();

        match err {
            HarnessError::AllTrialsFailed { trials, source, .. } => {
                assert_eq!(trials, 3);
                assert_eq!(source, fault(3));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_failures_are_tallied_not_timed() {
        let calls = Cell::new(0usize);
        let summary = Harness::new()
            .measure("flaky", 10, || {
                calls.set(calls.get() + 1);
                if calls.get() % 2 == 0 {
                    Err(fault(calls.get()))
                } else {
                    Ok(())
                }
            })
            .unwrap();

        assert_eq!(summary.trials, 10);
        assert_eq!(summary.failures, 5);
        assert_eq!(summary.successes(), 5);
    }

    #[test]
    fn test_setup_failure_counts_as_failure() {
        let summary = Harness::new()
            .measure_with_setup(
                "decapsulate",
                4,
                {
                    let mut n = 0;
                    move || {
                        n += 1;
                        if n == 1 {
                            Err(fault(n))
                        } else {
                            Ok(vec![0u8; 16])
                        }
                    }
                },
                |input: &Vec<u8>| Ok(input.len()),
            )
            .unwrap();
        assert_eq!(summary.failures, 1);
        assert_eq!(summary.successes(), 3);
    }

    #[test]
    fn test_warmup_runs_untimed_iterations() {
        let calls = Cell::new(0);
        let summary = Harness::new()
            .with_warmup(5)
            .measure("keygen", 7, || {
                calls.set(calls.get() + 1);
                Ok(())
            })
            .unwrap();
        assert_eq!(calls.get(), 12);
        assert_eq!(summary.trials, 7);
    }

    #[test]
    fn test_statistics_from_known_samples() {
        let samples = [sample(10), sample(20), sample(30), sample(40)];
        let summary = MeasurementSummary::from_samples("sign", &samples, 1, false);
        assert_eq!(summary.trials, 5);
        assert_eq!(summary.min_ns, 10);
        assert_eq!(summary.max_ns, 40);
        assert_eq!(summary.median_ns, 25);
        assert!((summary.mean_ns - 25.0).abs() < f64::EPSILON);
        assert!((summary.stddev_ns - 125f64.sqrt()).abs() < 1e-9);
        assert_eq!(summary.peak_bytes, None);
    }

    #[test]
    fn test_single_sample_has_zero_spread() {
        let summary = MeasurementSummary::from_samples("verify", &[sample(42)], 0, true);
        assert_eq!(summary.median_ns, 42);
        assert_eq!(summary.stddev_ns, 0.0);
        assert_eq!(summary.peak_bytes, Some(0));
    }

    #[test]
    fn test_memory_is_sampled_around_operation() {
        let summary = Harness::new()
            .measure("alloc", 3, || Ok(std::hint::black_box(vec![7u8; 256 * 1024])))
            .unwrap();
        let peak = summary.peak_bytes.expect("tracking allocator is installed for tests");
        assert!(peak >= 128 * 1024, "peak was {peak}");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_parallel_runs_every_trial_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let summary = Harness::new()
            .with_workers(4)
            .measure_parallel(
                "keygen",
                20,
                || Ok(()),
                move |_: &()| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                },
            )
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 20);
        assert_eq!(summary.trials, 20);
        assert_eq!(summary.failures, 0);
    }

    #[tokio::test]
    async fn test_parallel_all_failing() {
        let err = Harness::new()
            .with_workers(3)
            .measure_parallel("sign", 6, || Err::<(), _>(fault(0)), |_: &()| Ok(()))
            .await
            .unwrap_err();
        assert!(matches!(err, HarnessError::AllTrialsFailed { trials: 6, .. }));
    }

    #[tokio::test]
    async fn test_parallel_zero_trials() {
        let err = Harness::new()
            .measure_parallel("sign", 0, || Ok(()), |_: &()| Ok(()))
            .await
            .unwrap_err();
        assert!(matches!(err, HarnessError::InvalidConfiguration(_)));
    }

    #[tokio::test]
    async fn test_more_workers_than_trials() {
        let summary = Harness::new()
            .with_workers(16)
            .measure_parallel("verify", 3, || Ok(1u8), |x: &u8| Ok(*x))
            .await
            .unwrap();
        assert_eq!(summary.trials, 3);
    }
}
