//! Authentication event counters and their reconciliation
//!
//! Two independent monotonic counters are read around a measurement window:
//! `pac` counts authentication codes generated by the instrumented code and
//! `aut` counts the verifications observed by the kernel. Every `pac` must be
//! paired with an `aut`, so the two deltas of a completed window must match.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{CounterError, CounterResult};

/// Default debugfs directory of the kpacd kernel module
pub const KPACD_DIR: &str = "/sys/kernel/debug/kpacd";

/// Identifies one of the two authentication counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CounterId {
    Pac,
    Aut,
}

impl CounterId {
    fn file_name(&self) -> &'static str {
        match self {
            CounterId::Pac => "nr_pac",
            CounterId::Aut => "nr_aut",
        }
    }
}

impl fmt::Display for CounterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CounterId::Pac => write!(f, "pac"),
            CounterId::Aut => write!(f, "aut"),
        }
    }
}

/// Source of authentication counter values
pub trait CounterSource {
    fn read(&self, counter: CounterId) -> CounterResult<u64>;

    /// Read both counters back to back
    fn snapshot(&self) -> CounterResult<CounterSnapshot> {
        Ok(CounterSnapshot {
            pac: self.read(CounterId::Pac)?,
            aut: self.read(CounterId::Aut)?,
        })
    }
}

/// Reads the kpacd debugfs counters `nr_pac` and `nr_aut`
#[derive(Debug, Clone)]
pub struct KpacdCounters {
    dir: PathBuf,
}

impl KpacdCounters {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl Default for KpacdCounters {
    fn default() -> Self {
        Self::new(KPACD_DIR)
    }
}

impl CounterSource for KpacdCounters {
    fn read(&self, counter: CounterId) -> CounterResult<u64> {
        let path = self.dir.join(counter.file_name());
        let read_error = |reason: String| CounterError::Read {
            counter,
            path: path.clone(),
            reason,
        };

        let content = std::fs::read_to_string(&path).map_err(|e| read_error(e.to_string()))?;
        content
            .trim()
            .parse::<u64>()
            .map_err(|e| read_error(format!("{:?}: {}", content.trim(), e)))
    }
}

/// Both counters read at one instant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CounterSnapshot {
    pub pac: u64,
    pub aut: u64,
}

/// Counter increase over one measurement window.
///
/// Can only be constructed with equal components; `pac == aut` holds for
/// every value of this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CounterDelta {
    pac: u64,
    aut: u64,
}

impl CounterDelta {
    pub fn new(pac: u64, aut: u64) -> CounterResult<Self> {
        if pac != aut {
            return Err(CounterError::Mismatch { pac, aut });
        }
        Ok(Self { pac, aut })
    }

    /// Difference `after - before`, rejecting counters that went backwards
    pub fn between(before: CounterSnapshot, after: CounterSnapshot) -> CounterResult<Self> {
        let pac = Self::component(CounterId::Pac, before.pac, after.pac)?;
        let aut = Self::component(CounterId::Aut, before.aut, after.aut)?;
        Self::new(pac, aut)
    }

    fn component(counter: CounterId, before: u64, after: u64) -> CounterResult<u64> {
        after.checked_sub(before).ok_or(CounterError::Regressed {
            counter,
            before,
            after,
        })
    }

    pub fn pac(&self) -> u64 {
        self.pac
    }

    pub fn aut(&self) -> u64 {
        self.aut
    }

    /// Average authentications per run over a window of `runs` executions.
    ///
    /// Warm-up runs belong in `runs`: they generate authentication traffic
    /// too. Integer division, zero for an empty window.
    pub fn rate_per_run(&self, runs: usize) -> u64 {
        if runs == 0 {
            return 0;
        }
        self.pac / runs as u64
    }
}

/// Brackets an operation with counter snapshots and checks the delta
pub struct CounterReconciler<'a, C: CounterSource + ?Sized> {
    source: &'a C,
}

impl<'a, C: CounterSource + ?Sized> CounterReconciler<'a, C> {
    pub fn new(source: &'a C) -> Self {
        Self { source }
    }

    /// Run `operation` between two snapshots.
    ///
    /// An error from the operation is returned as-is and the closing
    /// snapshot is skipped; a window that did not complete has no delta.
    pub async fn windowed<T, E, Fut>(&self, operation: Fut) -> Result<(T, CounterDelta), E>
    where
        Fut: Future<Output = Result<T, E>>,
        E: From<CounterError>,
    {
        let before = self.source.snapshot()?;
        let value = operation.await?;
        let after = self.source.snapshot()?;

        let delta = CounterDelta::between(before, after)?;
        debug!(pac = delta.pac, aut = delta.aut, "counter window closed");
        Ok((value, delta))
    }
}
