//! Progress reporting for measurement windows
//!
//! Purely presentational; nothing here influences what is measured.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::cell::RefCell;

/// Observer notified as a benchmark's runs complete
pub trait ProgressSink {
    fn run_started(&self, benchmark: &str, total: usize);
    fn run_completed(&self, benchmark: &str, completed: usize, total: usize);
    fn finished(&self, benchmark: &str, summary: &str);
}

/// Discards all progress
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentProgress;

impl ProgressSink for SilentProgress {
    fn run_started(&self, _benchmark: &str, _total: usize) {}
    fn run_completed(&self, _benchmark: &str, _completed: usize, _total: usize) {}
    fn finished(&self, _benchmark: &str, _summary: &str) {}
}

/// Renders one progress bar per measurement window on stderr
#[derive(Default)]
pub struct BarProgress {
    bar: RefCell<Option<ProgressBar>>,
}

impl BarProgress {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressSink for BarProgress {
    fn run_started(&self, benchmark: &str, total: usize) {
        let bar = ProgressBar::with_draw_target(Some(total as u64), ProgressDrawTarget::stderr());
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{msg}: {pos}/{len} [{bar:40.cyan/blue}] {elapsed_precise}")
        {
            bar.set_style(style.progress_chars("#>-"));
        }
        bar.set_message(benchmark.to_string());
        *self.bar.borrow_mut() = Some(bar);
    }

    fn run_completed(&self, _benchmark: &str, completed: usize, _total: usize) {
        if let Some(bar) = self.bar.borrow().as_ref() {
            bar.set_position(completed as u64);
        }
    }

    fn finished(&self, benchmark: &str, summary: &str) {
        match self.bar.borrow_mut().take() {
            Some(bar) => bar.finish_with_message(format!("{}: {}", benchmark, summary)),
            None => eprintln!("{}: {}", benchmark, summary),
        }
    }
}
