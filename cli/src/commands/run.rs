use crate::error::{CliError, Result};
use crate::output::OutputManager;
use clap::{Args, ValueEnum};
use pacbench_harness::{
    analysis, export, Benchmark, BarProgress, BenchmarkSuite, CounterSourceKind, KpacdCounters,
    PassConfig, PlatformInfo, ProgressSink, ShellBuildDriver, ShellRunDriver, SilentProgress,
    SuiteConfig, SuiteResult,
};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum PassSelection {
    Baseline,
    Instrumented,
    Both,
}

impl PassSelection {
    pub fn baseline(&self) -> bool {
        matches!(self, PassSelection::Baseline | PassSelection::Both)
    }

    pub fn instrumented(&self) -> bool {
        matches!(self, PassSelection::Instrumented | PassSelection::Both)
    }
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Suite file (TOML)
    pub suite: PathBuf,

    /// Directory the result tables are written to
    pub dest: PathBuf,

    /// Also write every sample to nopac_raw.csv / pac_raw.csv
    #[arg(short, long)]
    pub raw: bool,

    /// Which builds to measure
    #[arg(long, value_enum, default_value = "both")]
    pub pass: PassSelection,

    /// Skip PAC/AUT counter reconciliation
    #[arg(long)]
    pub no_counters: bool,

    /// CPU clock for the cycles column, defaults to cpufreq's scaling_cur_freq
    #[arg(long, value_name = "HZ")]
    pub clock_hz: Option<f64>,
}

pub async fn run(args: RunArgs, verbose: bool, output: &OutputManager) -> Result<()> {
    let config = SuiteConfig::load(&args.suite)?;
    config.validate()?;
    let benchmarks = config.resolve()?;
    info!(
        suite = %args.suite.display(),
        benchmarks = benchmarks.len(),
        "suite loaded"
    );

    std::fs::create_dir_all(&args.dest)?;

    if output.is_quiet() {
        execute(&args, &config, benchmarks, verbose, SilentProgress, output).await
    } else {
        execute(&args, &config, benchmarks, verbose, BarProgress::new(), output).await
    }
}

async fn execute<P: ProgressSink>(
    args: &RunArgs,
    config: &SuiteConfig,
    benchmarks: Vec<Benchmark>,
    verbose: bool,
    progress: P,
    output: &OutputManager,
) -> Result<()> {
    let counters_dir = (!args.no_counters && config.counters.source == CounterSourceKind::Kpacd)
        .then(|| config.counters.dir.clone());

    let mut suite = BenchmarkSuite::new(
        benchmarks,
        ShellBuildDriver::new(verbose),
        ShellRunDriver::new(verbose),
        progress,
    );
    match &counters_dir {
        Some(dir) => suite = suite.with_counters(Box::new(KpacdCounters::new(dir))),
        None => output.print_info("PAC/AUT counter reconciliation disabled"),
    }

    let baseline = if args.pass.baseline() {
        output.print_info("Baseline pass");
        let result = suite
            .run_pass(&PassConfig::baseline(config.passes.baseline.env.clone()))
            .await;
        write_pass(&args.dest, &result, args.raw)?;
        report(output, &result);
        Some(result)
    } else {
        None
    };

    let instrumented = if args.pass.instrumented() {
        output.print_info("Instrumented pass");
        let result = suite
            .run_pass(&PassConfig::instrumented(config.passes.instrumented.env.clone()))
            .await;
        write_pass(&args.dest, &result, args.raw)?;
        write_file(&args.dest.join("build.csv"), |f| export::write_build(f, &result))?;
        report(output, &result);
        Some(result)
    } else {
        None
    };

    let platform = PlatformInfo::gather(counters_dir.as_deref());
    if let (Some(baseline), Some(instrumented)) = (&baseline, &instrumented) {
        let clock_hz = args.clock_hz.or_else(|| platform.clock_hz());
        let rows = analysis::compare(baseline, instrumented, clock_hz);
        write_file(&args.dest.join("overhead.csv"), |f| {
            analysis::write_overhead(f, &rows)
        })?;
    }
    write_file(&args.dest.join("platform.json"), |f| platform.write_json(f))?;

    let results: Vec<&SuiteResult> = baseline.iter().chain(instrumented.iter()).collect();
    let failed: usize = results.iter().map(|r| r.failures().count()).sum();
    if failed > 0 {
        write_file(&args.dest.join("failures.csv"), |f| {
            export::write_failures(f, results.iter().copied())
        })?;
    }

    let mut alarms = 0;
    for result in &results {
        for (name, failure) in result.failures().filter(|(_, f)| f.is_correctness_alarm()) {
            output.print_error(&format!(
                "CORRECTNESS ALARM ({} pass) {}: {}",
                result.pass(),
                name,
                failure.error
            ));
            alarms += 1;
        }
    }

    if alarms > 0 {
        return Err(CliError::CorrectnessAlarm { count: alarms });
    }
    if failed > 0 {
        return Err(CliError::BenchmarksFailed { count: failed });
    }

    output.print_success(&format!("Results written to {}", args.dest.display()));
    Ok(())
}

/// `<stem>.csv` and, when asked, `<stem>_raw.csv`
fn write_pass(dest: &Path, result: &SuiteResult, raw: bool) -> Result<()> {
    let stem = result.pass().file_stem();
    write_file(&dest.join(format!("{}.csv", stem)), |f| export::write_stats(f, result))?;
    if raw {
        write_file(&dest.join(format!("{}_raw.csv", stem)), |f| export::write_raw(f, result))?;
    }
    Ok(())
}

fn write_file<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(BufWriter<File>) -> pacbench_harness::Result<()>,
{
    let file = File::create(path)?;
    write(BufWriter::new(file)).map_err(|source| CliError::Output {
        path: path.display().to_string(),
        source,
    })?;
    info!(path = %path.display(), "wrote results");
    Ok(())
}

fn report(output: &OutputManager, result: &SuiteResult) {
    for (name, failure) in result.failures() {
        if !failure.is_correctness_alarm() {
            output.print_warning(&format!(
                "{} ({} pass) failed while {}: {}",
                name,
                result.pass(),
                failure.stage,
                failure.error
            ));
        }
    }
    for (name, done) in result.completed() {
        if done.rejected_records > 0 {
            output.print_warning(&format!(
                "{}: {} malformed instrumentation record(s) skipped",
                name, done.rejected_records
            ));
        }
    }
    output.print_info(&format!(
        "{} pass: {} completed, {} failed",
        result.pass(),
        result.completed().count(),
        result.failures().count()
    ));
}
