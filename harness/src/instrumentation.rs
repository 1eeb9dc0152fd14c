//! Aggregation of static instrumentation counts from build logs
//!
//! The instrumentation plugin appends one CSV row per call site while a
//! benchmark is compiled: `site,instrumented,total`. Rows are summed per
//! benchmark. Summation is order independent, so logs can be ingested in any
//! order or in batches and merged afterwards.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::io;
use std::ops::AddAssign;
use std::path::Path;
use tracing::warn;

use crate::error::RecordError;

/// One instrumented call site reported by a build
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentationRecord {
    pub benchmark: String,
    pub site: String,
    pub instrumented: u64,
    pub total: u64,
}

impl InstrumentationRecord {
    /// Parse a `site,instrumented,total` row attributed to `benchmark`
    pub fn from_row(
        benchmark: &str,
        row: &csv::StringRecord,
        line: u64,
    ) -> Result<Self, RecordError> {
        if row.len() != 3 {
            return Err(RecordError::Malformed {
                line,
                reason: format!("expected 3 fields, found {}", row.len()),
            });
        }

        let count = |index: usize, field: &str| {
            row[index].parse::<u64>().map_err(|_| RecordError::Malformed {
                line,
                reason: format!("{} count {:?} is not a non-negative integer", field, &row[index]),
            })
        };

        Ok(Self {
            benchmark: benchmark.to_string(),
            site: row[0].to_string(),
            instrumented: count(1, "instrumented")?,
            total: count(2, "total")?,
        })
    }
}

/// Per-benchmark sums of instrumented and total call sites
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InstrumentationTotal {
    pub instrumented: u64,
    pub total: u64,
}

impl AddAssign for InstrumentationTotal {
    fn add_assign(&mut self, other: Self) {
        self.instrumented += other.instrumented;
        self.total += other.total;
    }
}

impl From<&InstrumentationRecord> for InstrumentationTotal {
    fn from(record: &InstrumentationRecord) -> Self {
        Self {
            instrumented: record.instrumented,
            total: record.total,
        }
    }
}

/// Row counts of one log ingestion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IngestStats {
    pub accepted: usize,
    pub rejected: usize,
}

/// Streaming reducer of instrumentation records
#[derive(Debug, Default)]
pub struct InstrumentationAggregator {
    totals: BTreeMap<String, InstrumentationTotal>,
    seen_sites: Option<HashSet<(String, String)>>,
    rejected: Vec<RecordError>,
}

impl InstrumentationAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// An aggregator that rejects a second record for the same call site of
    /// the same benchmark.
    pub fn strict() -> Self {
        Self {
            seen_sites: Some(HashSet::new()),
            ..Self::default()
        }
    }

    pub fn ingest(&mut self, record: InstrumentationRecord) -> Result<(), RecordError> {
        if let Some(seen) = self.seen_sites.as_mut() {
            if !seen.insert((record.benchmark.clone(), record.site.clone())) {
                return Err(RecordError::Duplicate {
                    benchmark: record.benchmark,
                    site: record.site,
                });
            }
        }

        self.add(&record);
        Ok(())
    }

    /// Add a record to its benchmark's total without duplicate checks
    pub fn add(&mut self, record: &InstrumentationRecord) {
        *self.totals.entry(record.benchmark.clone()).or_default() +=
            InstrumentationTotal::from(record);
    }

    /// Ingest a build log whose rows all belong to `benchmark`.
    ///
    /// Malformed rows are logged, remembered and skipped; only an I/O error
    /// aborts the ingestion.
    pub fn ingest_log<R: io::Read>(
        &mut self,
        benchmark: &str,
        reader: R,
    ) -> Result<IngestStats, csv::Error> {
        self.ingest_rows(reader, |_site| Some(benchmark.to_string()))
    }

    /// Ingest a combined log where each call site is a source path and the
    /// benchmark is the name of the directory containing it.
    pub fn ingest_path_log<R: io::Read>(&mut self, reader: R) -> Result<IngestStats, csv::Error> {
        self.ingest_rows(reader, |site| {
            Path::new(site)
                .parent()
                .and_then(Path::file_name)
                .map(|name| name.to_string_lossy().into_owned())
        })
    }

    fn ingest_rows<R, F>(&mut self, reader: R, benchmark_of: F) -> Result<IngestStats, csv::Error>
    where
        R: io::Read,
        F: Fn(&str) -> Option<String>,
    {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut stats = IngestStats::default();
        for result in reader.records() {
            let outcome = match result {
                Ok(row) => {
                    let line = row.position().map(|p| p.line()).unwrap_or(0);
                    let site = row.get(0).unwrap_or_default();
                    match benchmark_of(site) {
                        Some(benchmark) => InstrumentationRecord::from_row(&benchmark, &row, line)
                            .and_then(|record| self.ingest(record)),
                        None => Err(RecordError::Malformed {
                            line,
                            reason: format!("call site {:?} names no benchmark directory", site),
                        }),
                    }
                }
                Err(e) if e.is_io_error() => return Err(e),
                Err(e) => Err(RecordError::Malformed {
                    line: e.position().map(|p| p.line()).unwrap_or(0),
                    reason: e.to_string(),
                }),
            };

            match outcome {
                Ok(()) => stats.accepted += 1,
                Err(e) => {
                    warn!("skipping instrumentation record: {}", e);
                    self.rejected.push(e);
                    stats.rejected += 1;
                }
            }
        }

        Ok(stats)
    }

    /// Fold another aggregator's totals and rejections into this one
    pub fn merge(&mut self, other: InstrumentationAggregator) {
        for (benchmark, total) in other.totals {
            *self.totals.entry(benchmark).or_default() += total;
        }
        if let (Some(seen), Some(other_seen)) = (self.seen_sites.as_mut(), other.seen_sites) {
            seen.extend(other_seen);
        }
        self.rejected.extend(other.rejected);
    }

    pub fn total(&self, benchmark: &str) -> Option<InstrumentationTotal> {
        self.totals.get(benchmark).copied()
    }

    pub fn totals(&self) -> &BTreeMap<String, InstrumentationTotal> {
        &self.totals
    }

    pub fn rejected(&self) -> &[RecordError] {
        &self.rejected
    }

    pub fn into_totals(self) -> BTreeMap<String, InstrumentationTotal> {
        self.totals
    }
}

/// Sum records per benchmark
pub fn aggregate<I>(records: I) -> BTreeMap<String, InstrumentationTotal>
where
    I: IntoIterator<Item = InstrumentationRecord>,
{
    let mut aggregator = InstrumentationAggregator::new();
    for record in records {
        aggregator.add(&record);
    }
    aggregator.into_totals()
}
