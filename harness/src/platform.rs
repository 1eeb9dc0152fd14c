//! Facts about the machine a suite ran on
//!
//! Everything is best-effort: a missing sysfs file or an unknown host name is
//! recorded as absent rather than failing the run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;
use sysinfo::System;
use tracing::debug;

use crate::analysis;
use crate::error::Result;

/// Current frequency of the first CPU, in kHz
pub const CPUFREQ_PATH: &str = "/sys/devices/system/cpu/cpu0/cpufreq/scaling_cur_freq";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformInfo {
    pub timestamp: DateTime<Utc>,
    pub arch: String,
    pub host: Option<String>,
    pub kernel: Option<String>,
    pub cpu_count: usize,
    pub scaling_cur_freq_khz: Option<u64>,
    /// Authentication backend reported by the kpacd module
    pub kpacd_backend: Option<String>,
    /// Non-empty per-CPU kpacd masks as `cpu=mask` pairs
    pub kpacd_cpumasks: Option<String>,
    pub cflags: Option<String>,
    pub ld_preload: Option<String>,
    /// Paravirtualisation mode requested from libpac
    pub libpac_pv: Option<String>,
}

impl PlatformInfo {
    /// Gather facts from the live system
    pub fn gather(kpacd_dir: Option<&Path>) -> Self {
        Self::gather_from(Path::new(CPUFREQ_PATH), kpacd_dir)
    }

    pub fn gather_from(cpufreq: &Path, kpacd_dir: Option<&Path>) -> Self {
        let cpu_count = num_cpus::get();
        let info = Self {
            timestamp: Utc::now(),
            arch: std::env::consts::ARCH.to_string(),
            host: hostname::get()
                .ok()
                .map(|name| name.to_string_lossy().into_owned()),
            kernel: System::kernel_version(),
            cpu_count,
            scaling_cur_freq_khz: read_trimmed(cpufreq).and_then(|s| s.parse().ok()),
            kpacd_backend: kpacd_dir.and_then(|dir| read_trimmed(&dir.join("backend"))),
            kpacd_cpumasks: kpacd_dir.and_then(|dir| read_cpumasks(dir, cpu_count)),
            cflags: std::env::var("CFLAGS").ok(),
            ld_preload: std::env::var("LD_PRELOAD").ok(),
            libpac_pv: std::env::var("LIBPAC_PV").ok(),
        };
        debug!(?info, "platform facts gathered");
        info
    }

    /// Clock frequency in Hz, when cpufreq reported one
    pub fn clock_hz(&self) -> Option<f64> {
        self.scaling_cur_freq_khz.and_then(analysis::clock_hz_from_khz)
    }

    pub fn write_json<W: io::Write>(&self, mut writer: W) -> Result<()> {
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }
}

/// `0=mask 2=mask` for every CPU with a non-empty `<dir>/<cpu>/cpumask`
fn read_cpumasks(dir: &Path, cpu_count: usize) -> Option<String> {
    let masks: Vec<String> = (0..cpu_count)
        .filter_map(|cpu| {
            let path = dir.join(cpu.to_string()).join("cpumask");
            read_trimmed(&path).map(|mask| format!("{}={}", cpu, mask))
        })
        .collect();
    (!masks.is_empty()).then(|| masks.join(" "))
}

fn read_trimmed(path: &Path) -> Option<String> {
    std::fs::read_to_string(path)
        .ok()
        .map(|content| content.trim().to_string())
        .filter(|content| !content.is_empty())
}
