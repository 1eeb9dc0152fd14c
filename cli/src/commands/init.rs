use crate::error::Result;
use crate::output::OutputManager;
use clap::Args;
use pacbench_harness::SuiteConfig;
use std::io;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Where to write the sample suite
    #[arg(default_value = "pacbench.toml")]
    pub path: PathBuf,

    /// Overwrite an existing file
    #[arg(short, long)]
    pub force: bool,
}

pub fn run(args: InitArgs, output: &OutputManager) -> Result<()> {
    if args.path.exists() && !args.force {
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("{} already exists, use --force to overwrite", args.path.display()),
        )
        .into());
    }

    SuiteConfig::sample().save_to_file(&args.path)?;
    output.print_success(&format!("Sample suite written to {}", args.path.display()));
    Ok(())
}
