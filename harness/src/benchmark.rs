//! Resolved benchmark definitions

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One benchmark of a suite with every setting resolved.
///
/// Built once by [`crate::config::SuiteConfig::resolve`] and never mutated
/// afterwards. The run and build commands are opaque shell strings handed to
/// the drivers as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Benchmark {
    /// Unique name within the suite
    pub name: String,
    /// Directory the build and run commands execute in
    pub path: PathBuf,
    /// Runs executed and discarded before measurement
    pub warmup: usize,
    /// Runs retained for statistics
    pub samples: usize,
    pub run_cmd: String,
    pub build_cmd: String,
}

impl Benchmark {
    /// Total number of executions of the run command per measurement window
    pub fn total_runs(&self) -> usize {
        self.warmup + self.samples
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_runs_includes_warmup() {
        let bench = Benchmark {
            name: "adpcm".to_string(),
            path: PathBuf::from("kernel/adpcm"),
            warmup: 2,
            samples: 5,
            run_cmd: "./adpcm".to_string(),
            build_cmd: "make".to_string(),
        };
        assert_eq!(bench.total_runs(), 7);
        assert_eq!(bench.path(), Path::new("kernel/adpcm"));
    }
}
