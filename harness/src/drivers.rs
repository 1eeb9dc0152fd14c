//! Process drivers for building and running benchmarks
//!
//! The engine never constructs or parses shell syntax itself. Commands are
//! opaque strings executed by `/bin/sh -c` in an explicit working directory,
//! so the process-wide current directory is never touched.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::debug;

use crate::benchmark::Benchmark;

/// Environment variable carrying the instrumentation log path to a build
pub const INST_LOG_ENV: &str = "PACBENCH_INST_LOG";

/// Environment variable carrying the benchmark name to a build
pub const BENCHMARK_ENV: &str = "PACBENCH_BENCHMARK";

const SHELL: &str = "/bin/sh";

/// How a subordinate process terminated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitOutcome {
    Success,
    Code(i32),
    Signal,
}

impl ExitOutcome {
    pub fn success(&self) -> bool {
        matches!(self, ExitOutcome::Success)
    }
}

impl From<ExitStatus> for ExitOutcome {
    fn from(status: ExitStatus) -> Self {
        match status.code() {
            Some(0) => ExitOutcome::Success,
            Some(code) => ExitOutcome::Code(code),
            None => ExitOutcome::Signal,
        }
    }
}

impl fmt::Display for ExitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitOutcome::Success => write!(f, "succeeded"),
            ExitOutcome::Code(code) => write!(f, "terminated with non-zero return code {}", code),
            ExitOutcome::Signal => write!(f, "terminated due to signal"),
        }
    }
}

/// Result of one timed execution
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunOutcome {
    pub status: ExitOutcome,
    /// Wall-clock time from spawn to completion
    pub elapsed: Duration,
}

/// What a build needs beyond the benchmark itself
#[derive(Debug, Clone, Copy)]
pub struct BuildRequest<'a> {
    /// Extra environment for the build command
    pub env: &'a BTreeMap<String, String>,
    /// Where the instrumentation plugin should write its call-site rows
    pub instrumentation_log: Option<&'a Path>,
}

/// Executes a benchmark's run command and times it
pub trait RunDriver {
    async fn execute(&self, command: &str, cwd: &Path) -> io::Result<RunOutcome>;
}

/// Builds a benchmark
pub trait BuildDriver {
    async fn build(&self, benchmark: &Benchmark, request: &BuildRequest<'_>)
        -> io::Result<ExitOutcome>;
}

fn shell_command(command: &str, cwd: &Path, verbose: bool) -> Command {
    let mut cmd = Command::new(SHELL);
    cmd.arg(if verbose { "-xc" } else { "-c" })
        .arg(command)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .kill_on_drop(true);
    if !verbose {
        cmd.stdout(Stdio::null());
    }
    cmd
}

/// Runs commands through `/bin/sh`
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellRunDriver {
    verbose: bool,
}

impl ShellRunDriver {
    /// With `verbose` the shell traces commands and stdout is kept.
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl RunDriver for ShellRunDriver {
    async fn execute(&self, command: &str, cwd: &Path) -> io::Result<RunOutcome> {
        let mut cmd = shell_command(command, cwd, self.verbose);

        let start = Instant::now();
        let status = cmd.status().await?;
        let elapsed = start.elapsed();

        Ok(RunOutcome {
            status: status.into(),
            elapsed,
        })
    }
}

/// Builds benchmarks through `/bin/sh`
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellBuildDriver {
    verbose: bool,
}

impl ShellBuildDriver {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl BuildDriver for ShellBuildDriver {
    async fn build(
        &self,
        benchmark: &Benchmark,
        request: &BuildRequest<'_>,
    ) -> io::Result<ExitOutcome> {
        let mut cmd = shell_command(&benchmark.build_cmd, benchmark.path(), self.verbose);
        cmd.envs(request.env).env(BENCHMARK_ENV, &benchmark.name);
        match request.instrumentation_log {
            Some(log) => {
                cmd.env(INST_LOG_ENV, log);
            }
            None => {
                cmd.env_remove(INST_LOG_ENV);
            }
        }

        debug!(benchmark = %benchmark.name, command = %benchmark.build_cmd, "building");
        let status = cmd.status().await?;
        Ok(status.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn bench_in(dir: &Path, build_cmd: &str) -> Benchmark {
        Benchmark {
            name: "probe".to_string(),
            path: dir.to_path_buf(),
            warmup: 0,
            samples: 1,
            run_cmd: "true".to_string(),
            build_cmd: build_cmd.to_string(),
        }
    }

    #[test]
    fn test_exit_outcome_display() {
        assert_eq!(ExitOutcome::Success.to_string(), "succeeded");
        assert_eq!(
            ExitOutcome::Code(3).to_string(),
            "terminated with non-zero return code 3"
        );
        assert_eq!(ExitOutcome::Signal.to_string(), "terminated due to signal");
        assert!(ExitOutcome::Success.success());
        assert!(!ExitOutcome::Code(1).success());
    }

    #[tokio::test]
    async fn test_shell_run_driver_reports_status_and_time() {
        let dir = tempfile::tempdir().unwrap();
        let driver = ShellRunDriver::new(false);

        let ok = driver.execute("sleep 0.01", dir.path()).await.unwrap();
        assert_eq!(ok.status, ExitOutcome::Success);
        assert!(ok.elapsed >= Duration::from_millis(10));

        let failed = driver.execute("exit 4", dir.path()).await.unwrap();
        assert_eq!(failed.status, ExitOutcome::Code(4));
    }

    #[tokio::test]
    async fn test_shell_run_driver_uses_cwd_without_changing_process_cwd() {
        let dir = tempfile::tempdir().unwrap();
        let before = std::env::current_dir().unwrap();

        let driver = ShellRunDriver::new(false);
        let outcome = driver.execute("touch marker", dir.path()).await.unwrap();

        assert!(outcome.status.success());
        assert!(dir.path().join("marker").exists());
        assert_eq!(std::env::current_dir().unwrap(), before);
    }

    #[tokio::test]
    async fn test_shell_build_driver_exports_environment() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("inst.csv");
        let mut env = BTreeMap::new();
        env.insert("PAC_FLAGS".to_string(), "-O2".to_string());

        let bench = bench_in(
            dir.path(),
            "printf '%s,%s\\n' \"$PAC_FLAGS\" \"$PACBENCH_BENCHMARK\" > \"$PACBENCH_INST_LOG\"",
        );
        let request = BuildRequest {
            env: &env,
            instrumentation_log: Some(&log),
        };

        let status = ShellBuildDriver::new(false).build(&bench, &request).await.unwrap();
        assert!(status.success());
        assert_eq!(std::fs::read_to_string(&log).unwrap(), "-O2,probe\n");
    }

    #[tokio::test]
    async fn test_missing_directory_is_spawn_error() {
        let driver = ShellRunDriver::new(false);
        let result = driver
            .execute("true", &PathBuf::from("/nonexistent/pacbench/dir"))
            .await;
        assert!(result.is_err());
    }
}
