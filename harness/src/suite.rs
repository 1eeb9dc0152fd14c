//! Single-pass orchestration of a benchmark suite
//!
//! Each benchmark walks `Loaded → Building → Measuring → Reconciling → Done`,
//! or ends in `Failed` at whichever stage went wrong. Benchmarks run strictly
//! one after another: the authentication counters are machine-global, so two
//! overlapping windows would corrupt each other's deltas.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, error, info, warn};

use crate::benchmark::Benchmark;
use crate::counters::{CounterDelta, CounterReconciler, CounterSource};
use crate::drivers::{BuildDriver, BuildRequest, RunDriver};
use crate::error::{ExecutionError, HarnessError};
use crate::instrumentation::{InstrumentationAggregator, InstrumentationTotal};
use crate::outliers::{self, MaskedSampleSet, Summary};
use crate::progress::ProgressSink;
use crate::sampler::{SampleSet, Sampler};

/// Which build of the benchmarks a pass measures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PassKind {
    Baseline,
    Instrumented,
}

impl PassKind {
    /// Stem of the files this pass exports
    pub fn file_stem(&self) -> &'static str {
        match self {
            PassKind::Baseline => "nopac",
            PassKind::Instrumented => "pac",
        }
    }
}

impl fmt::Display for PassKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PassKind::Baseline => write!(f, "baseline"),
            PassKind::Instrumented => write!(f, "instrumented"),
        }
    }
}

/// Feature set of one suite pass
#[derive(Debug, Clone)]
pub struct PassConfig {
    pub kind: PassKind,
    /// Extra environment for the build command
    pub env: BTreeMap<String, String>,
    /// Hand the build an instrumentation log and aggregate it afterwards
    pub collect_instrumentation: bool,
}

impl PassConfig {
    pub fn baseline(env: BTreeMap<String, String>) -> Self {
        Self {
            kind: PassKind::Baseline,
            env,
            collect_instrumentation: false,
        }
    }

    pub fn instrumented(env: BTreeMap<String, String>) -> Self {
        Self {
            kind: PassKind::Instrumented,
            env,
            collect_instrumentation: true,
        }
    }
}

/// Lifecycle state of one benchmark within a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BenchmarkState {
    Loaded,
    Building,
    Measuring,
    Reconciling,
    Done,
    Failed,
}

impl fmt::Display for BenchmarkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BenchmarkState::Loaded => "loaded",
            BenchmarkState::Building => "building",
            BenchmarkState::Measuring => "measuring",
            BenchmarkState::Reconciling => "reconciling",
            BenchmarkState::Done => "done",
            BenchmarkState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Everything a completed benchmark produced in one pass
#[derive(Debug, Clone, Serialize)]
pub struct BenchmarkResult {
    pub samples: MaskedSampleSet,
    pub summary: Option<Summary>,
    /// `None` when counter reconciliation is disabled
    pub counters: Option<CounterDelta>,
    /// Authentications per run, warm-up runs included
    pub auths_per_run: Option<u64>,
    /// `None` unless the pass collects instrumentation
    pub instrumentation: Option<InstrumentationTotal>,
    /// Instrumentation log rows skipped as malformed
    pub rejected_records: usize,
}

/// Why and where a benchmark stopped
#[derive(Debug)]
pub struct BenchmarkFailure {
    /// Last state entered before the failure
    pub stage: BenchmarkState,
    pub error: HarnessError,
}

impl BenchmarkFailure {
    pub fn new(stage: BenchmarkState, error: impl Into<HarnessError>) -> Self {
        Self {
            stage,
            error: error.into(),
        }
    }

    pub fn is_correctness_alarm(&self) -> bool {
        self.error.is_correctness_alarm()
    }
}

#[derive(Debug)]
pub enum BenchmarkOutcome {
    Done(BenchmarkResult),
    Failed(BenchmarkFailure),
}

impl BenchmarkOutcome {
    pub fn result(&self) -> Option<&BenchmarkResult> {
        match self {
            BenchmarkOutcome::Done(result) => Some(result),
            BenchmarkOutcome::Failed(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&BenchmarkFailure> {
        match self {
            BenchmarkOutcome::Done(_) => None,
            BenchmarkOutcome::Failed(failure) => Some(failure),
        }
    }
}

/// Outcomes of one pass, in suite order
#[derive(Debug)]
pub struct SuiteResult {
    pass: PassKind,
    outcomes: Vec<(String, BenchmarkOutcome)>,
}

impl SuiteResult {
    fn new(pass: PassKind) -> Self {
        Self {
            pass,
            outcomes: Vec::new(),
        }
    }

    /// Assemble a result from outcomes already in suite order
    pub fn from_outcomes(pass: PassKind, outcomes: Vec<(String, BenchmarkOutcome)>) -> Self {
        Self { pass, outcomes }
    }

    pub fn pass(&self) -> PassKind {
        self.pass
    }

    pub fn outcomes(&self) -> impl Iterator<Item = (&str, &BenchmarkOutcome)> {
        self.outcomes
            .iter()
            .map(|(name, outcome)| (name.as_str(), outcome))
    }

    pub fn get(&self, benchmark: &str) -> Option<&BenchmarkOutcome> {
        self.outcomes
            .iter()
            .find(|(name, _)| name == benchmark)
            .map(|(_, outcome)| outcome)
    }

    /// Completed benchmarks only
    pub fn completed(&self) -> impl Iterator<Item = (&str, &BenchmarkResult)> {
        self.outcomes()
            .filter_map(|(name, outcome)| outcome.result().map(|result| (name, result)))
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &BenchmarkFailure)> {
        self.outcomes()
            .filter_map(|(name, outcome)| outcome.failure().map(|failure| (name, failure)))
    }

    pub fn is_complete(&self) -> bool {
        self.failures().next().is_none()
    }

    pub fn has_correctness_alarm(&self) -> bool {
        self.failures().any(|(_, failure)| failure.is_correctness_alarm())
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}

/// Builds, measures and reconciles every benchmark of a suite, one at a time.
///
/// The suite holds no state between passes; run it once per build flavour and
/// compare the results outside.
pub struct BenchmarkSuite<B: BuildDriver, R: RunDriver, P: ProgressSink> {
    benchmarks: Vec<Benchmark>,
    builder: B,
    runner: R,
    progress: P,
    counters: Option<Box<dyn CounterSource>>,
}

impl<B: BuildDriver, R: RunDriver, P: ProgressSink> BenchmarkSuite<B, R, P> {
    pub fn new(benchmarks: Vec<Benchmark>, builder: B, runner: R, progress: P) -> Self {
        Self {
            benchmarks,
            builder,
            runner,
            progress,
            counters: None,
        }
    }

    /// Reconcile authentication counters around every measurement window
    pub fn with_counters(mut self, counters: Box<dyn CounterSource>) -> Self {
        self.counters = Some(counters);
        self
    }

    pub fn benchmarks(&self) -> &[Benchmark] {
        &self.benchmarks
    }

    pub fn builder(&self) -> &B {
        &self.builder
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Run one pass over all benchmarks.
    ///
    /// A failing benchmark is recorded and the pass moves on to the next one;
    /// nothing measured so far is discarded.
    pub async fn run_pass(&self, pass: &PassConfig) -> SuiteResult {
        info!(
            pass = %pass.kind,
            benchmarks = self.benchmarks.len(),
            counters = self.counters.is_some(),
            "starting suite pass"
        );

        let mut result = SuiteResult::new(pass.kind);
        for benchmark in &self.benchmarks {
            transition(benchmark, BenchmarkState::Loaded);

            let outcome = match self.run_benchmark(benchmark, pass).await {
                Ok(done) => {
                    transition(benchmark, BenchmarkState::Done);
                    BenchmarkOutcome::Done(done)
                }
                Err(failure) => {
                    transition(benchmark, BenchmarkState::Failed);
                    if failure.is_correctness_alarm() {
                        error!(
                            benchmark = %benchmark.name,
                            "correctness alarm: {}", failure.error
                        );
                    } else {
                        error!(
                            benchmark = %benchmark.name,
                            stage = %failure.stage,
                            "benchmark failed: {}", failure.error
                        );
                    }
                    BenchmarkOutcome::Failed(failure)
                }
            };
            result.outcomes.push((benchmark.name.clone(), outcome));
        }

        info!(
            pass = %pass.kind,
            completed = result.completed().count(),
            failed = result.failures().count(),
            "suite pass finished"
        );
        result
    }

    async fn run_benchmark(
        &self,
        benchmark: &Benchmark,
        pass: &PassConfig,
    ) -> Result<BenchmarkResult, BenchmarkFailure> {
        transition(benchmark, BenchmarkState::Building);
        let instrumentation = self.build(benchmark, pass).await?;

        transition(benchmark, BenchmarkState::Measuring);
        let (samples, counters) = self.measure(benchmark).await?;

        let masked = outliers::filter(samples);
        let summary = masked.summary();
        if let Some(summary) = &summary {
            self.progress.finished(&benchmark.name, &summary.report_line());
        }

        let auths_per_run = counters.map(|delta| delta.rate_per_run(benchmark.total_runs()));
        let (instrumentation, rejected_records) = match instrumentation {
            Some((total, rejected)) => (Some(total), rejected),
            None => (None, 0),
        };

        Ok(BenchmarkResult {
            samples: masked,
            summary,
            counters,
            auths_per_run,
            instrumentation,
            rejected_records,
        })
    }

    /// Build the benchmark and, when collecting, read back its call-site log
    async fn build(
        &self,
        benchmark: &Benchmark,
        pass: &PassConfig,
    ) -> Result<Option<(InstrumentationTotal, usize)>, BenchmarkFailure> {
        let stage = BenchmarkState::Building;
        let log = if pass.collect_instrumentation {
            let file = tempfile::NamedTempFile::new().map_err(|source| {
                BenchmarkFailure::new(
                    stage,
                    ExecutionError::InstrumentationLog {
                        benchmark: benchmark.name.clone(),
                        source,
                    },
                )
            })?;
            Some(file)
        } else {
            None
        };

        let request = BuildRequest {
            env: &pass.env,
            instrumentation_log: log.as_ref().map(|file| file.path()),
        };

        let status = self
            .builder
            .build(benchmark, &request)
            .await
            .map_err(|source| {
                BenchmarkFailure::new(
                    stage,
                    ExecutionError::Spawn {
                        benchmark: benchmark.name.clone(),
                        command: benchmark.build_cmd.clone(),
                        source,
                    },
                )
            })?;

        if !status.success() {
            return Err(BenchmarkFailure::new(
                stage,
                ExecutionError::BuildFailed {
                    benchmark: benchmark.name.clone(),
                    status,
                },
            ));
        }

        let Some(log) = log else {
            return Ok(None);
        };

        let reader = log.reopen().map_err(|source| {
            BenchmarkFailure::new(
                stage,
                ExecutionError::InstrumentationLog {
                    benchmark: benchmark.name.clone(),
                    source,
                },
            )
        })?;

        let mut aggregator = InstrumentationAggregator::new();
        let stats = aggregator
            .ingest_log(&benchmark.name, reader)
            .map_err(|e| BenchmarkFailure::new(stage, e))?;

        if stats.accepted == 0 {
            warn!(
                benchmark = %benchmark.name,
                "build reported no instrumented call sites"
            );
        }
        debug!(
            benchmark = %benchmark.name,
            accepted = stats.accepted,
            rejected = stats.rejected,
            "instrumentation log ingested"
        );

        let total = aggregator.total(&benchmark.name).unwrap_or_default();
        Ok(Some((total, stats.rejected)))
    }

    async fn measure(
        &self,
        benchmark: &Benchmark,
    ) -> Result<(SampleSet, Option<CounterDelta>), BenchmarkFailure> {
        let sampler = Sampler::new(&self.runner, &self.progress);

        let Some(counters) = self.counters.as_deref() else {
            return sampler
                .measure(benchmark)
                .await
                .map(|samples| (samples, None))
                .map_err(|e| BenchmarkFailure::new(BenchmarkState::Measuring, e));
        };

        let window = CounterReconciler::new(counters)
            .windowed(async {
                let samples = sampler.measure(benchmark).await?;
                transition(benchmark, BenchmarkState::Reconciling);
                Ok::<_, HarnessError>(samples)
            })
            .await;

        match window {
            Ok((samples, delta)) => Ok((samples, Some(delta))),
            Err(error @ HarnessError::Execution(_)) => {
                Err(BenchmarkFailure::new(BenchmarkState::Measuring, error))
            }
            Err(error) => Err(BenchmarkFailure::new(BenchmarkState::Reconciling, error)),
        }
    }
}

fn transition(benchmark: &Benchmark, state: BenchmarkState) {
    debug!(benchmark = %benchmark.name, state = %state, "state transition");
}
