//! Error handling for the pacbench measurement engine
//!
//! Errors are grouped by the stage that raises them: subordinate process
//! execution, counter reconciliation, instrumentation log ingestion and
//! suite configuration. The suite isolates execution failures per benchmark,
//! while configuration errors abort before anything is built.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::counters::CounterId;
use crate::drivers::ExitOutcome;

/// The main error type for the measurement engine
#[derive(Error, Debug)]
pub enum HarnessError {
    /// A build or run command failed
    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    /// Authentication counters are inconsistent
    #[error("Counter error: {0}")]
    Counter(#[from] CounterError),

    /// An instrumentation log row was rejected
    #[error("Instrumentation record error: {0}")]
    Record(#[from] RecordError),

    /// Suite configuration is unusable
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// CSV export errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON export errors
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Subordinate process failures. Fatal for the affected benchmark only.
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("{benchmark}: run {run} {status}")]
    RunFailed {
        benchmark: String,
        run: usize,
        status: ExitOutcome,
    },

    #[error("{benchmark}: build {status}")]
    BuildFailed {
        benchmark: String,
        status: ExitOutcome,
    },

    #[error("{benchmark}: failed to spawn `{command}`: {source}")]
    Spawn {
        benchmark: String,
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("{benchmark}: failed to stage instrumentation log: {source}")]
    InstrumentationLog {
        benchmark: String,
        #[source]
        source: io::Error,
    },
}

/// Authentication counter errors. Never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CounterError {
    #[error("PAC and AUT do not match ({pac} != {aut})")]
    Mismatch { pac: u64, aut: u64 },

    #[error("{counter} counter went backwards ({before} -> {after}), was it reset?")]
    Regressed {
        counter: CounterId,
        before: u64,
        after: u64,
    },

    #[error("cannot read {counter} counter from {}: {reason}", path.display())]
    Read {
        counter: CounterId,
        path: PathBuf,
        reason: String,
    },
}

/// Instrumentation log row errors. Rejected rows are skipped individually.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    #[error("malformed instrumentation record on line {line}: {reason}")]
    Malformed { line: u64, reason: String },

    #[error("duplicate instrumentation record for call site {site} in {benchmark}")]
    Duplicate { benchmark: String, site: String },
}

/// Suite configuration errors. Raised before any build or run.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("benchmark {benchmark}: missing required field `{field}` and no suite-level default")]
    MissingField { benchmark: String, field: String },

    #[error("invalid value for `{field}`: {reason}")]
    Invalid { field: String, reason: String },

    #[error("cannot parse suite file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("cannot read suite file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot write suite file {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot render suite file: {0}")]
    Render(#[from] toml::ser::Error),
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, HarnessError>;

/// A specialized result type for counter operations
pub type CounterResult<T> = std::result::Result<T, CounterError>;

/// A specialized result type for configuration loading
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

impl HarnessError {
    /// Whether this error means the measured subject itself is broken.
    ///
    /// Counter mismatches and regressions are surfaced to the operator as a
    /// correctness alarm instead of an ordinary benchmark failure.
    pub fn is_correctness_alarm(&self) -> bool {
        matches!(
            self,
            HarnessError::Counter(CounterError::Mismatch { .. })
                | HarnessError::Counter(CounterError::Regressed { .. })
        )
    }

    /// Get the error category for logging and failure tables
    pub fn category(&self) -> &'static str {
        match self {
            HarnessError::Execution(_) => "execution",
            HarnessError::Counter(CounterError::Read { .. }) => "counter_read",
            HarnessError::Counter(_) => "counter_mismatch",
            HarnessError::Record(_) => "record",
            HarnessError::Config(_) => "config",
            HarnessError::Io(_) => "io",
            HarnessError::Csv(_) => "csv",
            HarnessError::Json(_) => "json",
        }
    }
}
