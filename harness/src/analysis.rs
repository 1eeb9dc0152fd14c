//! Baseline versus instrumented comparison
//!
//! Combines the two single-pass results of one invocation into per-benchmark
//! overhead figures.

use serde::Serialize;
use std::io;

use crate::error::Result;
use crate::export;
use crate::suite::SuiteResult;

pub const OVERHEAD_HEADER: [&str; 4] = ["name", "overhead", "aut_s", "cycles"];

/// Overhead of the instrumented build of one benchmark
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverheadRow {
    pub name: String,
    /// Slowdown of the instrumented mean in percent of the baseline mean
    pub overhead: f64,
    /// Authentications per second of instrumented execution
    pub aut_s: Option<f64>,
    /// Extra cycles spent per authentication
    pub cycles: Option<f64>,
}

/// Clock frequency in Hz from a cpufreq `scaling_cur_freq` reading (kHz)
pub fn clock_hz_from_khz(khz: u64) -> Option<f64> {
    (khz > 0).then(|| khz as f64 * 1000.0)
}

/// Compare every benchmark that completed in both passes.
///
/// Rows follow the instrumented pass's order. Authentication figures use the
/// instrumented pass's per-run rate and are left empty when it is unknown or
/// zero; `cycles` additionally needs the clock frequency.
pub fn compare(
    baseline: &SuiteResult,
    instrumented: &SuiteResult,
    clock_hz: Option<f64>,
) -> Vec<OverheadRow> {
    instrumented
        .completed()
        .filter_map(|(name, pac)| {
            let base = baseline.get(name)?.result()?.summary?;
            let pac_summary = pac.summary?;

            let delta = pac_summary.mean - base.mean;
            let auths = pac.auths_per_run.filter(|&a| a > 0).map(|a| a as f64);

            Some(OverheadRow {
                name: name.to_string(),
                overhead: delta / base.mean * 100.0,
                aut_s: auths.map(|a| a / pac_summary.mean),
                cycles: auths.zip(clock_hz).map(|(a, hz)| delta / a * hz),
            })
        })
        .collect()
}

pub fn write_overhead<W: io::Write>(writer: W, rows: &[OverheadRow]) -> Result<()> {
    export::write_table(writer, &OVERHEAD_HEADER, rows.to_vec())
}
