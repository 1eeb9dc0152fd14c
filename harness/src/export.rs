//! Tabular export of suite results
//!
//! Column layouts are consumed by downstream comparison scripts and must not
//! change: stats tables are `name,mean,std,min,max`, build tables are
//! `name,inst,total,auths`.

use serde::{Deserialize, Serialize};
use std::io;

use crate::error::Result;
use crate::outliers::Summary;
use crate::suite::SuiteResult;

pub const STATS_HEADER: [&str; 5] = ["name", "mean", "std", "min", "max"];
pub const BUILD_HEADER: [&str; 4] = ["name", "inst", "total", "auths"];
pub const FAILURES_HEADER: [&str; 4] = ["pass", "name", "stage", "error"];

/// Statistics of one completed benchmark
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsRow {
    pub name: String,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

impl StatsRow {
    pub fn new(name: &str, summary: &Summary) -> Self {
        Self {
            name: name.to_string(),
            mean: summary.mean,
            std: summary.std,
            min: summary.min,
            max: summary.max,
        }
    }
}

/// Instrumentation and authentication counts of one completed benchmark
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRow {
    pub name: String,
    pub inst: u64,
    pub total: u64,
    /// Empty when counters were not reconciled
    pub auths: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureRow {
    pub pass: String,
    pub name: String,
    pub stage: String,
    pub error: String,
}

/// Stats rows of the completed benchmarks, in suite order
pub fn stats_rows(result: &SuiteResult) -> Vec<StatsRow> {
    result
        .completed()
        .filter_map(|(name, done)| done.summary.as_ref().map(|s| StatsRow::new(name, s)))
        .collect()
}

/// Build rows of the completed benchmarks that carry instrumentation totals
pub fn build_rows(result: &SuiteResult) -> Vec<BuildRow> {
    result
        .completed()
        .filter_map(|(name, done)| {
            done.instrumentation.map(|totals| BuildRow {
                name: name.to_string(),
                inst: totals.instrumented,
                total: totals.total,
                auths: done.auths_per_run,
            })
        })
        .collect()
}

pub fn failure_rows<'a, I>(results: I) -> Vec<FailureRow>
where
    I: IntoIterator<Item = &'a SuiteResult>,
{
    results
        .into_iter()
        .flat_map(|result| {
            result.failures().map(move |(name, failure)| FailureRow {
                pass: result.pass().to_string(),
                name: name.to_string(),
                stage: failure.stage.to_string(),
                error: failure.error.to_string(),
            })
        })
        .collect()
}

pub fn write_stats<W: io::Write>(writer: W, result: &SuiteResult) -> Result<()> {
    write_table(writer, &STATS_HEADER, stats_rows(result))
}

pub fn write_build<W: io::Write>(writer: W, result: &SuiteResult) -> Result<()> {
    write_table(writer, &BUILD_HEADER, build_rows(result))
}

pub fn write_failures<'a, W, I>(writer: W, results: I) -> Result<()>
where
    W: io::Write,
    I: IntoIterator<Item = &'a SuiteResult>,
{
    write_table(writer, &FAILURES_HEADER, failure_rows(results))
}

/// Every sample of every completed benchmark, one column per benchmark.
///
/// Excluded samples are included. Shorter columns are padded with empty
/// cells.
pub fn write_raw<W: io::Write>(writer: W, result: &SuiteResult) -> Result<()> {
    let columns: Vec<(&str, &[f64])> = result
        .completed()
        .map(|(name, done)| (name, done.samples.samples()))
        .collect();

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    if columns.is_empty() {
        writer.flush()?;
        return Ok(());
    }

    writer.write_record(columns.iter().map(|(name, _)| *name))?;

    let rows = columns.iter().map(|(_, samples)| samples.len()).max().unwrap_or(0);
    for i in 0..rows {
        writer.write_record(
            columns
                .iter()
                .map(|(_, samples)| samples.get(i).map(|v| format!("{:?}", v)).unwrap_or_default()),
        )?;
    }

    writer.flush()?;
    Ok(())
}

/// Header first, even when there are no rows
pub(crate) fn write_table<W, T>(writer: W, header: &[&str], rows: Vec<T>) -> Result<()>
where
    W: io::Write,
    T: Serialize,
{
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    writer.write_record(header)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counters::CounterDelta;
    use crate::drivers::ExitOutcome;
    use crate::error::{CounterError, ExecutionError, HarnessError};
    use crate::instrumentation::InstrumentationTotal;
    use crate::outliers;
    use crate::sampler::SampleSet;
    use crate::suite::{
        BenchmarkFailure, BenchmarkOutcome, BenchmarkResult, BenchmarkState, PassKind,
    };

    fn done(samples: &[f64], auths: Option<u64>, inst: Option<(u64, u64)>) -> BenchmarkOutcome {
        let masked = outliers::filter(SampleSet::from_values(samples.to_vec()));
        BenchmarkOutcome::Done(BenchmarkResult {
            summary: masked.summary(),
            samples: masked,
            counters: auths.map(|a| CounterDelta::new(a, a).unwrap()),
            auths_per_run: auths,
            instrumentation: inst.map(|(instrumented, total)| InstrumentationTotal {
                instrumented,
                total,
            }),
            rejected_records: 0,
        })
    }

    fn failed(stage: BenchmarkState, error: impl Into<HarnessError>) -> BenchmarkOutcome {
        BenchmarkOutcome::Failed(BenchmarkFailure::new(stage, error))
    }

    fn to_string(write: impl FnOnce(&mut Vec<u8>) -> Result<()>) -> String {
        let mut buffer = Vec::new();
        write(&mut buffer).unwrap();
        String::from_utf8(buffer).unwrap()
    }

    fn sample_result() -> SuiteResult {
        SuiteResult::from_outcomes(
            PassKind::Instrumented,
            vec![
                ("b1".to_string(), done(&[1.0, 2.0, 3.0, 4.0], Some(7), Some((5, 15)))),
                (
                    "b2".to_string(),
                    failed(
                        BenchmarkState::Building,
                        ExecutionError::BuildFailed {
                            benchmark: "b2".to_string(),
                            status: ExitOutcome::Code(2),
                        },
                    ),
                ),
                ("b3".to_string(), done(&[0.5, 0.5], None, Some((0, 4)))),
            ],
        )
    }

    #[test]
    fn test_stats_table_skips_failed_benchmarks() {
        let csv = to_string(|out| write_stats(out, &sample_result()));
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines[0], "name,mean,std,min,max");
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("b1,2.5,1.118"));
        assert!(lines[1].ends_with(",1.0,4.0"));
        assert_eq!(lines[2], "b3,0.5,0.0,0.5,0.5");
    }

    #[test]
    fn test_build_table_leaves_auths_empty_without_counters() {
        let csv = to_string(|out| write_build(out, &sample_result()));
        assert_eq!(csv, "name,inst,total,auths\nb1,5,15,7\nb3,0,4,\n");
    }

    #[test]
    fn test_empty_tables_keep_their_header() {
        let empty = SuiteResult::from_outcomes(PassKind::Baseline, Vec::new());
        assert_eq!(to_string(|out| write_stats(out, &empty)), "name,mean,std,min,max\n");
        assert_eq!(to_string(|out| write_build(out, &empty)), "name,inst,total,auths\n");
        assert_eq!(to_string(|out| write_raw(out, &empty)), "");
    }

    #[test]
    fn test_raw_table_pads_short_columns() {
        let csv = to_string(|out| write_raw(out, &sample_result()));
        assert_eq!(csv, "b1,b3\n1.0,0.5\n2.0,0.5\n3.0,\n4.0,\n");
    }

    #[test]
    fn test_failures_span_passes() {
        let mismatch = SuiteResult::from_outcomes(
            PassKind::Baseline,
            vec![(
                "b1".to_string(),
                failed(BenchmarkState::Reconciling, CounterError::Mismatch { pac: 32, aut: 31 }),
            )],
        );
        let instrumented = sample_result();

        let rows = failure_rows([&mismatch, &instrumented]);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].pass, "baseline");
        assert_eq!(rows[0].stage, "reconciling");
        assert!(rows[0].error.contains("PAC and AUT do not match (32 != 31)"));
        assert_eq!(rows[1].pass, "instrumented");
        assert_eq!(rows[1].name, "b2");
        assert_eq!(rows[1].stage, "building");

        let csv = to_string(|out| write_failures(out, [&mismatch]));
        assert!(csv.starts_with("pass,name,stage,error\n"));
    }
}
