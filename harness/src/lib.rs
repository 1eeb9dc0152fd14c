//! pacbench measurement engine
//!
//! This library builds, runs and times benchmark suites in two flavours, a
//! baseline build and a pointer-authentication instrumented build, and checks
//! that every authentication code generated during a measurement window was
//! also verified.

pub mod analysis;
pub mod benchmark;
pub mod config;
pub mod counters;
pub mod drivers;
pub mod error;
pub mod export;
pub mod instrumentation;
pub mod outliers;
pub mod platform;
pub mod progress;
pub mod sampler;
pub mod suite;

// Re-export commonly used types
pub use benchmark::Benchmark;
pub use config::{CounterSourceKind, SuiteConfig};
pub use counters::{CounterDelta, CounterId, CounterReconciler, CounterSnapshot, CounterSource, KpacdCounters};
pub use drivers::{BuildDriver, BuildRequest, ExitOutcome, RunDriver, RunOutcome, ShellBuildDriver, ShellRunDriver};
pub use error::{ConfigError, CounterError, ExecutionError, HarnessError, RecordError, Result};
pub use instrumentation::{InstrumentationAggregator, InstrumentationRecord, InstrumentationTotal};
pub use outliers::{MaskedSampleSet, Summary};
pub use platform::PlatformInfo;
pub use progress::{BarProgress, ProgressSink, SilentProgress};
pub use sampler::{SampleSet, Sampler};
pub use suite::{
    BenchmarkFailure, BenchmarkOutcome, BenchmarkResult, BenchmarkState, BenchmarkSuite, PassConfig,
    PassKind, SuiteResult,
};
