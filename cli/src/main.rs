use clap::{Parser, Subcommand};
use std::process;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod error;
mod output;

use commands::*;
use error::Result;
use output::OutputManager;

#[derive(Parser)]
#[command(name = "pacbench")]
#[command(about = "pacbench - pointer authentication benchmark harness")]
#[command(version)]
#[command(long_about = "
pacbench builds and times a benchmark suite twice, once as a baseline and once
with pointer-authentication instrumentation, and checks that every PAC
generated during a measurement window was matched by an AUT.

Examples:
  pacbench init suite.toml                  # Write a sample suite
  pacbench validate suite.toml              # Resolve and list benchmarks
  pacbench run suite.toml results -r        # Both passes, raw samples too
  pacbench run suite.toml out --pass baseline --no-counters
  pacbench aggregate build.log --by-path    # Sum instrumentation counts
")]
struct Cli {
    /// Enable verbose logging and echo build/run commands
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Quiet mode (errors only, no progress bars)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build, measure and reconcile a benchmark suite
    Run(RunArgs),

    /// Check a suite file and list its resolved benchmarks
    Validate(ValidateArgs),

    /// Sum an instrumentation log per benchmark
    Aggregate(AggregateArgs),

    /// Write a sample suite file
    Init(InitArgs),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_logging(&cli);

    if let Err(e) = run_command(cli).await {
        let error_msg = error::format_error(&e);
        eprintln!("{}", error_msg);
        process::exit(e.exit_code());
    }
}

async fn run_command(cli: Cli) -> Result<()> {
    let colored = !cli.no_color && console::Term::stdout().features().colors_supported();
    let output = OutputManager::new(colored, cli.quiet);

    match cli.command {
        Commands::Run(args) => commands::run::run(args, cli.verbose, &output).await,
        Commands::Validate(args) => commands::validate::run(args, &output),
        Commands::Aggregate(args) => commands::aggregate::run(args, &output),
        Commands::Init(args) => commands::init::run(args, &output),
    }
}

fn init_logging(cli: &Cli) {
    let log_level = if cli.debug {
        tracing::Level::DEBUG
    } else if cli.verbose {
        tracing::Level::INFO
    } else if cli.quiet {
        tracing::Level::ERROR
    } else {
        tracing::Level::WARN
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("pacbench={level},pacbench_harness={level}", level = log_level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("pacbench started");
}
