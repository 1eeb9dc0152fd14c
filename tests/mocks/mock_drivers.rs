use pacbench_harness::drivers::{BuildDriver, BuildRequest, ExitOutcome, RunDriver, RunOutcome};
use pacbench_harness::Benchmark;
use std::collections::{BTreeMap, HashMap};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use crate::mocks::MockCounters;

/// How one run command behaves
#[derive(Clone, Debug)]
pub struct RunBehaviour {
    /// Duration of the i-th run in seconds; the last entry repeats
    pub durations: Vec<f64>,
    /// 1-based run index that exits with the given code
    pub fail_at: Option<(usize, i32)>,
    pub pac_per_run: u64,
    pub aut_per_run: u64,
    /// 1-based run index after which the counters are reset to zero
    pub reset_after: Option<usize>,
}

impl Default for RunBehaviour {
    fn default() -> Self {
        Self {
            durations: vec![0.1],
            fail_at: None,
            pac_per_run: 0,
            aut_per_run: 0,
            reset_after: None,
        }
    }
}

impl RunBehaviour {
    pub fn durations(durations: &[f64]) -> Self {
        Self {
            durations: durations.to_vec(),
            ..Self::default()
        }
    }

    pub fn authenticating(pac_per_run: u64, aut_per_run: u64) -> Self {
        Self {
            pac_per_run,
            aut_per_run,
            ..Self::default()
        }
    }
}

/// Run driver that answers from per-command scripts instead of spawning
#[derive(Default)]
pub struct MockRunDriver {
    behaviours: HashMap<String, RunBehaviour>,
    counters: Option<MockCounters>,
    runs: Mutex<HashMap<String, usize>>,
    calls: Mutex<Vec<(String, PathBuf)>>,
}

impl MockRunDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_behaviour(mut self, command: &str, behaviour: RunBehaviour) -> Self {
        self.behaviours.insert(command.to_string(), behaviour);
        self
    }

    /// Bump these counters on every run
    pub fn with_counters(mut self, counters: MockCounters) -> Self {
        self.counters = Some(counters);
        self
    }

    /// `(command, cwd)` of every execution, in order
    pub fn calls(&self) -> Vec<(String, PathBuf)> {
        self.calls.lock().unwrap().clone()
    }
}

impl RunDriver for MockRunDriver {
    async fn execute(&self, command: &str, cwd: &Path) -> io::Result<RunOutcome> {
        self.calls
            .lock()
            .unwrap()
            .push((command.to_string(), cwd.to_path_buf()));

        let run = {
            let mut runs = self.runs.lock().unwrap();
            let count = runs.entry(command.to_string()).or_default();
            *count += 1;
            *count
        };

        let behaviour = self.behaviours.get(command).cloned().unwrap_or_default();
        if let Some(counters) = &self.counters {
            counters.add(behaviour.pac_per_run, behaviour.aut_per_run);
            if behaviour.reset_after == Some(run) {
                counters.reset();
            }
        }

        let status = match behaviour.fail_at {
            Some((at, code)) if at == run => ExitOutcome::Code(code),
            _ => ExitOutcome::Success,
        };
        let secs = behaviour
            .durations
            .get(run - 1)
            .or(behaviour.durations.last())
            .copied()
            .unwrap_or(0.0);

        Ok(RunOutcome {
            status,
            elapsed: Duration::from_secs_f64(secs),
        })
    }
}

/// What a mock build was asked to do
#[derive(Clone, Debug)]
pub struct BuildCall {
    pub benchmark: String,
    pub env: BTreeMap<String, String>,
    pub instrumentation_log: bool,
}

/// Build driver that fails selected benchmarks and writes scripted call-site logs
#[derive(Default)]
pub struct MockBuildDriver {
    failures: HashMap<String, ExitOutcome>,
    logs: HashMap<String, String>,
    calls: Mutex<Vec<BuildCall>>,
}

impl MockBuildDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self, benchmark: &str, status: ExitOutcome) -> Self {
        self.failures.insert(benchmark.to_string(), status);
        self
    }

    /// Rows appended to the instrumentation log when `benchmark` is built
    pub fn with_log(mut self, benchmark: &str, rows: &str) -> Self {
        self.logs.insert(benchmark.to_string(), rows.to_string());
        self
    }

    pub fn calls(&self) -> Vec<BuildCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl BuildDriver for MockBuildDriver {
    async fn build(&self, benchmark: &Benchmark, request: &BuildRequest<'_>) -> io::Result<ExitOutcome> {
        self.calls.lock().unwrap().push(BuildCall {
            benchmark: benchmark.name.clone(),
            env: request.env.clone(),
            instrumentation_log: request.instrumentation_log.is_some(),
        });

        if let Some(status) = self.failures.get(&benchmark.name) {
            return Ok(*status);
        }

        if let (Some(path), Some(rows)) = (request.instrumentation_log, self.logs.get(&benchmark.name)) {
            let mut log = std::fs::OpenOptions::new().append(true).open(path)?;
            log.write_all(rows.as_bytes())?;
        }

        Ok(ExitOutcome::Success)
    }
}
