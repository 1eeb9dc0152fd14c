use crate::error::Result;
use crate::output::OutputManager;
use clap::Args;
use pacbench_harness::{CounterSourceKind, SuiteConfig};
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Suite file (TOML)
    pub suite: PathBuf,
}

pub fn run(args: ValidateArgs, output: &OutputManager) -> Result<()> {
    let config = SuiteConfig::load(&args.suite)?;
    config.validate()?;
    let benchmarks = config.resolve()?;

    output.print_line(&format!(
        "{:<16} {:>6} {:>7}  {:<24} {:<24} {}",
        "NAME", "WARMUP", "SAMPLES", "RUN", "BUILD", "PATH"
    ));
    for bench in &benchmarks {
        output.print_line(&format!(
            "{:<16} {:>6} {:>7}  {:<24} {:<24} {}",
            bench.name,
            bench.warmup,
            bench.samples,
            bench.run_cmd,
            bench.build_cmd,
            bench.path.display()
        ));
    }

    match config.counters.source {
        CounterSourceKind::Kpacd => output.print_info(&format!(
            "Counters read from {}",
            config.counters.dir.display()
        )),
        CounterSourceKind::None => output.print_info("Counter reconciliation disabled"),
    }
    output.print_success(&format!(
        "{}: {} benchmark(s) resolved",
        args.suite.display(),
        benchmarks.len()
    ));
    Ok(())
}
