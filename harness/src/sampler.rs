//! Repeated timed execution of a benchmark's run command

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::benchmark::Benchmark;
use crate::drivers::RunDriver;
use crate::error::ExecutionError;
use crate::progress::ProgressSink;

/// Durations in seconds of the retained runs, in execution order.
///
/// Warm-up runs are never part of a sample set.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SampleSet {
    values: Vec<f64>,
}

impl SampleSet {
    pub fn from_values(values: Vec<f64>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn into_values(self) -> Vec<f64> {
        self.values
    }
}

/// Runs a benchmark `warmup + samples` times and keeps the last `samples`
/// durations.
pub struct Sampler<'a, R: RunDriver, P: ProgressSink> {
    driver: &'a R,
    progress: &'a P,
}

impl<'a, R: RunDriver, P: ProgressSink> Sampler<'a, R, P> {
    pub fn new(driver: &'a R, progress: &'a P) -> Self {
        Self { driver, progress }
    }

    /// Measure one benchmark.
    ///
    /// Runs are strictly sequential. The first failing run aborts the whole
    /// measurement and no partial sample set is returned.
    pub async fn measure(&self, benchmark: &Benchmark) -> Result<SampleSet, ExecutionError> {
        let total = benchmark.total_runs();
        let mut values = Vec::with_capacity(benchmark.samples);

        self.progress.run_started(&benchmark.name, total);

        for index in 0..total {
            let run = index + 1;
            let outcome = self
                .driver
                .execute(&benchmark.run_cmd, benchmark.path())
                .await
                .map_err(|source| ExecutionError::Spawn {
                    benchmark: benchmark.name.clone(),
                    command: benchmark.run_cmd.clone(),
                    source,
                })?;

            if !outcome.status.success() {
                return Err(ExecutionError::RunFailed {
                    benchmark: benchmark.name.clone(),
                    run,
                    status: outcome.status,
                });
            }

            if index >= benchmark.warmup {
                values.push(outcome.elapsed.as_secs_f64());
            }

            self.progress.run_completed(&benchmark.name, run, total);
        }

        debug!(
            benchmark = %benchmark.name,
            warmup = benchmark.warmup,
            samples = values.len(),
            "measurement complete"
        );

        Ok(SampleSet { values })
    }
}
