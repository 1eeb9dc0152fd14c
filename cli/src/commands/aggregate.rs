use crate::error::{CliError, Result};
use crate::output::OutputManager;
use clap::Args;
use pacbench_harness::{InstrumentationAggregator, RecordError};
use std::fs::File;
use std::io::{self, BufReader};
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct AggregateArgs {
    /// Instrumentation log (`site,instrumented,total` rows)
    pub log: PathBuf,

    /// Name benchmarks after the directory of each call site, rejecting duplicate sites
    #[arg(long)]
    pub by_path: bool,

    /// Benchmark name when not aggregating by path (default: log file stem)
    #[arg(long, conflicts_with = "by_path")]
    pub name: Option<String>,

    /// Write the table to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

pub fn run(args: AggregateArgs, output: &OutputManager) -> Result<()> {
    let reader = BufReader::new(File::open(&args.log)?);

    let aggregator = if args.by_path {
        let mut aggregator = InstrumentationAggregator::strict();
        aggregator.ingest_path_log(reader)?;
        aggregator
    } else {
        let name = args.name.clone().unwrap_or_else(|| {
            args.log
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_else(|| "benchmark".to_string())
        });
        let mut aggregator = InstrumentationAggregator::new();
        aggregator.ingest_log(&name, reader)?;
        aggregator
    };

    let rejected = aggregator.rejected();
    for error in rejected {
        output.print_warning(&error.to_string());
    }

    match &args.output {
        Some(path) => write_totals(File::create(path)?, &aggregator)?,
        None => write_totals(io::stdout().lock(), &aggregator)?,
    }

    let duplicates = rejected
        .iter()
        .filter(|e| matches!(e, RecordError::Duplicate { .. }))
        .count();
    if duplicates > 0 {
        return Err(CliError::RecordsRejected { count: duplicates });
    }
    Ok(())
}

fn write_totals<W: io::Write>(writer: W, aggregator: &InstrumentationAggregator) -> Result<()> {
    let mut writer = csv::Writer::from_writer(writer);
    writer.write_record(["name", "inst", "total"])?;
    for (name, totals) in aggregator.totals() {
        writer.write_record([
            name.clone(),
            totals.instrumented.to_string(),
            totals.total.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}
