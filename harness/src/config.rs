//! Suite configuration loading and resolution
//!
//! A suite file is TOML. Top-level `warmup`, `samples`, `run_cmd` and
//! `build_cmd` act as defaults for every benchmark table under
//! `[benchmarks.<name>]`; benchmark tables keep their document order.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::benchmark::Benchmark;
use crate::counters::KPACD_DIR;
use crate::error::{ConfigError, ConfigResult};

/// Environment variable overriding the suite-level warm-up count
pub const WARMUP_ENV: &str = "PACBENCH_WARMUP";
/// Environment variable overriding the suite-level sample count
pub const SAMPLES_ENV: &str = "PACBENCH_SAMPLES";
/// Environment variable overriding the kpacd counter directory
pub const KPACD_DIR_ENV: &str = "PACBENCH_KPACD_DIR";

const SAMPLE_HEADER: &str = "\
# pacbench suite
#
# Top-level warmup/samples/run_cmd/build_cmd are defaults; every
# [benchmarks.<name>] table may override them and must set `path`
# (relative to this file). Builds see the pass environment plus
# PACBENCH_INST_LOG, the file the instrumentation plugin writes to.

";

/// Contents of a suite file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SuiteConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warmup: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub samples: Option<usize>,
    #[serde(default, alias = "do_run", skip_serializing_if = "Option::is_none")]
    pub run_cmd: Option<String>,
    #[serde(default, alias = "do_build", skip_serializing_if = "Option::is_none")]
    pub build_cmd: Option<String>,

    #[serde(default)]
    pub counters: CounterSettings,
    #[serde(default)]
    pub passes: PassSettings,

    /// `[benchmarks.<name>]` tables in document order
    #[serde(default)]
    pub benchmarks: toml::Table,

    /// Directory relative benchmark paths are resolved against
    #[serde(skip)]
    pub base_dir: PathBuf,
}

/// Per-benchmark overrides as written in the suite file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BenchmarkEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warmup: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub samples: Option<usize>,
    #[serde(default, alias = "do_run", skip_serializing_if = "Option::is_none")]
    pub run_cmd: Option<String>,
    #[serde(default, alias = "do_build", skip_serializing_if = "Option::is_none")]
    pub build_cmd: Option<String>,
}

/// Where authentication counters come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CounterSourceKind {
    #[default]
    Kpacd,
    None,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterSettings {
    #[serde(default)]
    pub source: CounterSourceKind,
    #[serde(default = "default_kpacd_dir")]
    pub dir: PathBuf,
}

fn default_kpacd_dir() -> PathBuf {
    PathBuf::from(KPACD_DIR)
}

impl Default for CounterSettings {
    fn default() -> Self {
        Self {
            source: CounterSourceKind::default(),
            dir: default_kpacd_dir(),
        }
    }
}

/// Build environments of the two suite passes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassSettings {
    #[serde(default)]
    pub baseline: PassEnv,
    #[serde(default)]
    pub instrumented: PassEnv,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassEnv {
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl SuiteConfig {
    /// Load a suite file without environment overrides
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: SuiteConfig =
            toml::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        config.base_dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        Ok(config)
    }

    /// Load a suite file and apply `PACBENCH_*` environment overrides
    pub fn load<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let mut config = Self::load_from_file(path)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        let path = path.as_ref();
        let content = format!("{}{}", SAMPLE_HEADER, toml::to_string_pretty(self)?);
        std::fs::write(path, content).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn apply_env_overrides(&mut self) -> ConfigResult<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup
    pub fn apply_overrides<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let parse = |key: &str, value: String| {
            value.trim().parse::<usize>().map_err(|e| ConfigError::Invalid {
                field: key.to_string(),
                reason: format!("{:?}: {}", value, e),
            })
        };

        if let Some(warmup) = lookup(WARMUP_ENV) {
            self.warmup = Some(parse(WARMUP_ENV, warmup)?);
        }

        if let Some(samples) = lookup(SAMPLES_ENV) {
            self.samples = Some(parse(SAMPLES_ENV, samples)?);
        }

        if let Some(dir) = lookup(KPACD_DIR_ENV) {
            self.counters.dir = PathBuf::from(dir);
        }

        Ok(())
    }

    /// Resolve every benchmark, falling back to suite-level defaults.
    ///
    /// Fails on the first benchmark that lacks a required setting, so a
    /// broken suite is rejected before anything is built.
    pub fn resolve(&self) -> ConfigResult<Vec<Benchmark>> {
        if self.benchmarks.is_empty() {
            return Err(ConfigError::Invalid {
                field: "benchmarks".to_string(),
                reason: "suite declares no benchmarks".to_string(),
            });
        }

        let mut resolved = Vec::with_capacity(self.benchmarks.len());

        // TOML rejects duplicate table names, so names are unique here
        for (name, value) in &self.benchmarks {
            let entry: BenchmarkEntry =
                value.clone().try_into().map_err(|e: toml::de::Error| ConfigError::Invalid {
                    field: format!("benchmarks.{}", name),
                    reason: e.message().to_string(),
                })?;

            resolved.push(self.resolve_entry(name, entry)?);
        }

        Ok(resolved)
    }

    fn resolve_entry(&self, name: &str, entry: BenchmarkEntry) -> ConfigResult<Benchmark> {
        let missing = |field: &str| ConfigError::MissingField {
            benchmark: name.to_string(),
            field: field.to_string(),
        };

        let path = entry.path.ok_or_else(|| missing("path"))?;
        let samples = entry.samples.or(self.samples).ok_or_else(|| missing("samples"))?;
        if samples == 0 {
            return Err(ConfigError::Invalid {
                field: format!("benchmarks.{}.samples", name),
                reason: "at least one sample is required".to_string(),
            });
        }

        Ok(Benchmark {
            name: name.to_string(),
            path: if path.is_absolute() {
                path
            } else {
                self.base_dir.join(path)
            },
            warmup: entry.warmup.or(self.warmup).unwrap_or(0),
            samples,
            run_cmd: entry
                .run_cmd
                .or_else(|| self.run_cmd.clone())
                .ok_or_else(|| missing("run_cmd"))?,
            build_cmd: entry
                .build_cmd
                .or_else(|| self.build_cmd.clone())
                .ok_or_else(|| missing("build_cmd"))?,
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> ConfigResult<()> {
        self.resolve()?;

        if self.counters.source == CounterSourceKind::Kpacd && self.counters.dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid {
                field: "counters.dir".to_string(),
                reason: "counter directory must not be empty".to_string(),
            });
        }

        Ok(())
    }

    /// A small suite used by `pacbench init`
    pub fn sample() -> Self {
        let mut benchmarks = toml::Table::new();
        for (name, path) in [("adpcm", "kernel/adpcm"), ("fft", "kernel/fft")] {
            let entry = BenchmarkEntry {
                path: Some(PathBuf::from(path)),
                ..BenchmarkEntry::default()
            };
            if let Ok(value) = toml::Value::try_from(entry) {
                benchmarks.insert(name.to_string(), value);
            }
        }

        let mut instrumented = BTreeMap::new();
        instrumented.insert(
            "PAC_FLAGS".to_string(),
            "-fplugin=pac_sw_plugin.so -fplugin-arg-pac_sw_plugin-inst-dump=$PACBENCH_INST_LOG"
                .to_string(),
        );
        let mut baseline = BTreeMap::new();
        baseline.insert("PAC_FLAGS".to_string(), String::new());

        Self {
            warmup: Some(2),
            samples: Some(10),
            run_cmd: Some("./a.out".to_string()),
            build_cmd: Some("make clean all".to_string()),
            counters: CounterSettings::default(),
            passes: PassSettings {
                baseline: PassEnv { env: baseline },
                instrumented: PassEnv { env: instrumented },
            },
            benchmarks,
            base_dir: PathBuf::from("."),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn write_suite(content: &str) -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("suite.toml");
        std::fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn test_benchmark_overrides_fall_back_to_suite_defaults() {
        let (dir, path) = write_suite(
            r#"
warmup = 2
samples = 10
run_cmd = "./run"
build_cmd = "make"

[benchmarks.zeta]
path = "bench/zeta"
samples = 20

[benchmarks.alpha]
path = "/abs/alpha"
warmup = 0
do_run = "./alpha --fast"
"#,
        );

        let benchmarks = SuiteConfig::load_from_file(&path).unwrap().resolve().unwrap();

        assert_eq!(benchmarks.len(), 2);
        let zeta = &benchmarks[0];
        assert_eq!(zeta.name, "zeta");
        assert_eq!(zeta.path, dir.path().join("bench/zeta"));
        assert_eq!((zeta.warmup, zeta.samples), (2, 20));
        assert_eq!(zeta.run_cmd, "./run");

        let alpha = &benchmarks[1];
        assert_eq!(alpha.name, "alpha");
        assert_eq!(alpha.path, PathBuf::from("/abs/alpha"));
        assert_eq!((alpha.warmup, alpha.samples), (0, 10));
        assert_eq!(alpha.run_cmd, "./alpha --fast");
        assert_eq!(alpha.build_cmd, "make");
    }

    #[test]
    fn test_warmup_defaults_to_zero() {
        let (_dir, path) = write_suite(
            r#"
samples = 3
run_cmd = "./run"
build_cmd = "make"

[benchmarks.b1]
path = "b1"
"#,
        );
        let benchmarks = SuiteConfig::load_from_file(&path).unwrap().resolve().unwrap();
        assert_eq!(benchmarks[0].warmup, 0);
    }

    #[test]
    fn test_missing_required_field_is_configuration_error() {
        let (_dir, path) = write_suite(
            r#"
samples = 3
build_cmd = "make"

[benchmarks.b1]
path = "b1"
"#,
        );
        let err = SuiteConfig::load_from_file(&path).unwrap().resolve().unwrap_err();
        match err {
            ConfigError::MissingField { benchmark, field } => {
                assert_eq!(benchmark, "b1");
                assert_eq!(field, "run_cmd");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_path_and_zero_samples_are_rejected() {
        let (_dir, path) = write_suite(
            r#"
samples = 3
run_cmd = "./run"
build_cmd = "make"

[benchmarks.b1]
warmup = 1
"#,
        );
        let err = SuiteConfig::load_from_file(&path).unwrap().resolve().unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { ref field, .. } if field == "path"));

        let (_dir, path) = write_suite(
            r#"
samples = 0
run_cmd = "./run"
build_cmd = "make"

[benchmarks.b1]
path = "b1"
"#,
        );
        let err = SuiteConfig::load_from_file(&path).unwrap().resolve().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn test_empty_suite_and_unknown_keys_are_rejected() {
        let (_dir, path) = write_suite("samples = 3\n");
        assert!(SuiteConfig::load_from_file(&path).unwrap().resolve().is_err());

        let (_dir, path) = write_suite(
            r#"
samples = 3
run_cmd = "./run"
build_cmd = "make"

[benchmarks.b1]
path = "b1"
sample = 4
"#,
        );
        let err = SuiteConfig::load_from_file(&path).unwrap().resolve().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref field, .. } if field == "benchmarks.b1"));
    }

    #[test]
    fn test_unparsable_file_reports_path() {
        let (_dir, path) = write_suite("samples = [");
        let err = SuiteConfig::load_from_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));

        let err = SuiteConfig::load_from_file("/nonexistent/suite.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_overrides_replace_suite_defaults() {
        let mut config = SuiteConfig::sample();
        let vars: HashMap<&str, &str> = [
            (WARMUP_ENV, "0"),
            (SAMPLES_ENV, "3"),
            (KPACD_DIR_ENV, "/tmp/kpacd"),
        ]
        .into_iter()
        .collect();

        config
            .apply_overrides(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.warmup, Some(0));
        assert_eq!(config.samples, Some(3));
        assert_eq!(config.counters.dir, PathBuf::from("/tmp/kpacd"));

        let err = config
            .apply_overrides(|key| (key == SAMPLES_ENV).then(|| "many".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn test_counter_and_pass_settings() {
        let (_dir, path) = write_suite(
            r#"
samples = 3
run_cmd = "./run"
build_cmd = "make"

[counters]
source = "none"

[passes.instrumented]
env = { PAC_FLAGS = "-fplugin=x.so" }

[benchmarks.b1]
path = "b1"
"#,
        );
        let config = SuiteConfig::load_from_file(&path).unwrap();
        assert_eq!(config.counters.source, CounterSourceKind::None);
        assert_eq!(config.counters.dir, PathBuf::from(KPACD_DIR));
        assert!(config.passes.baseline.env.is_empty());
        assert_eq!(config.passes.instrumented.env["PAC_FLAGS"], "-fplugin=x.so");
    }

    #[test]
    fn test_empty_counter_dir_fails_validation() {
        let (_dir, path) = write_suite(
            r#"
samples = 3
run_cmd = "./run"
build_cmd = "make"

[benchmarks.b1]
path = "b1"
"#,
        );
        let mut config = SuiteConfig::load_from_file(&path).unwrap();
        config
            .apply_overrides(|key| (key == KPACD_DIR_ENV).then(String::new))
            .unwrap();

        assert!(config.resolve().is_ok());
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref field, .. } if field == "counters.dir"));

        config.counters.source = CounterSourceKind::None;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_sample_round_trips_through_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("suite.toml");

        SuiteConfig::sample().save_to_file(&path).unwrap();
        let loaded = SuiteConfig::load_from_file(&path).unwrap();
        loaded.validate().unwrap();

        let names: Vec<String> = loaded.resolve().unwrap().into_iter().map(|b| b.name).collect();
        assert_eq!(names, vec!["adpcm", "fft"]);
    }
}
