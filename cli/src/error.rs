use pacbench_harness::{ConfigError, HarnessError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Cannot write {path}: {source}")]
    Output {
        path: String,
        #[source]
        source: HarnessError,
    },

    #[error("{count} benchmark(s) tripped the PAC/AUT correctness alarm")]
    CorrectnessAlarm { count: usize },

    #[error("{count} benchmark(s) failed")]
    BenchmarksFailed { count: usize },

    #[error("{count} instrumentation record(s) rejected")]
    RecordsRejected { count: usize },
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config(_) => 2,
            CliError::CorrectnessAlarm { .. } => 3,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, CliError>;

/// Format error for user-friendly display
pub fn format_error(error: &CliError) -> String {
    match error {
        CliError::Config(e) => {
            format!("Configuration Error: {}\n\nTry running 'pacbench validate <SUITE>' to check the suite file.", e)
        }
        CliError::CorrectnessAlarm { count } => {
            format!(
                "Correctness Alarm: {} benchmark(s) generated authentication codes that were never verified.\n\nThe instrumented code is broken, not the harness. See failures.csv for the counter values.",
                count
            )
        }
        CliError::BenchmarksFailed { count } => {
            format!("{} benchmark(s) failed.\n\nSee failures.csv in the destination directory for details.", count)
        }
        _ => error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        let config = CliError::from(ConfigError::Invalid {
            field: "samples".to_string(),
            reason: "must be positive".to_string(),
        });
        assert_eq!(config.exit_code(), 2);
        assert_eq!(CliError::CorrectnessAlarm { count: 1 }.exit_code(), 3);
        assert_eq!(CliError::BenchmarksFailed { count: 2 }.exit_code(), 1);

        let unwritable = CliError::Output {
            path: "out/nopac.csv".to_string(),
            source: HarnessError::from(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "denied",
            )),
        };
        assert_eq!(unwritable.exit_code(), 1);
    }

    #[test]
    fn test_format_error_hints() {
        let message = format_error(&CliError::BenchmarksFailed { count: 2 });
        assert!(message.contains("failures.csv"));
    }
}
