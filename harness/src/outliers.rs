//! Outlier masking and summary statistics
//!
//! Samples further than two population standard deviations from the mean are
//! masked, not removed: the total count and the masked count both stay
//! observable, and the summary statistics only see the retained samples.

use serde::Serialize;
use statrs::statistics::Statistics;

use crate::sampler::SampleSet;

/// Width of the retained band in standard deviations
pub const OUTLIER_SIGMAS: f64 = 2.0;

/// A sample set with one exclusion flag per sample
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaskedSampleSet {
    samples: SampleSet,
    excluded: Vec<bool>,
    masked_count: usize,
}

impl MaskedSampleSet {
    /// All samples, excluded ones included, in run order
    pub fn samples(&self) -> &[f64] {
        self.samples.values()
    }

    pub fn excluded(&self) -> &[bool] {
        &self.excluded
    }

    pub fn masked_count(&self) -> usize {
        self.masked_count
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Samples that survived the filter, in run order
    pub fn retained(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples
            .values()
            .iter()
            .zip(&self.excluded)
            .filter(|(_, &excluded)| !excluded)
            .map(|(&value, _)| value)
    }

    /// Statistics over the retained samples, `None` if nothing is retained
    pub fn summary(&self) -> Option<Summary> {
        let retained: Vec<f64> = self.retained().collect();
        if retained.is_empty() {
            return None;
        }

        let min = retained.iter().copied().fold(f64::INFINITY, f64::min);
        let max = retained.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        Some(Summary {
            mean: retained.iter().mean(),
            std: retained.iter().population_std_dev(),
            min,
            max,
            count: retained.len(),
            masked: self.masked_count,
        })
    }
}

/// Mask every sample outside `[mean - 2σ, mean + 2σ]`.
///
/// σ is the population standard deviation of the full set. A degenerate set
/// (σ == 0, or fewer than two samples) has nothing masked.
pub fn filter(samples: SampleSet) -> MaskedSampleSet {
    let values = samples.values();
    let mut excluded = vec![false; values.len()];

    if values.len() > 1 {
        let mean = values.iter().mean();
        let std = values.iter().population_std_dev();

        if std > 0.0 && std.is_finite() {
            let lower = mean - OUTLIER_SIGMAS * std;
            let upper = mean + OUTLIER_SIGMAS * std;
            for (flag, &value) in excluded.iter_mut().zip(values) {
                *flag = value < lower || value > upper;
            }
        }
    }

    let masked_count = excluded.iter().filter(|&&flag| flag).count();
    MaskedSampleSet {
        samples,
        excluded,
        masked_count,
    }
}

/// Summary statistics of the retained samples
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Summary {
    pub mean: f64,
    /// Population standard deviation
    pub std: f64,
    pub min: f64,
    pub max: f64,
    /// Number of retained samples
    pub count: usize,
    /// Number of masked samples
    pub masked: usize,
}

impl Summary {
    /// Standard deviation relative to the mean
    pub fn relative_std(&self) -> f64 {
        self.std / self.mean
    }

    /// How far the fastest run is below the mean, relative to the mean
    pub fn relative_min(&self) -> f64 {
        1.0 - self.min / self.mean
    }

    /// How far the slowest run is above the mean, relative to the mean
    pub fn relative_max(&self) -> f64 {
        self.max / self.mean - 1.0
    }

    /// One-line report: `mean (rstd %); N outliers rejected`
    pub fn report_line(&self) -> String {
        format!(
            "{:.9} ({:.3} %); {} outliers rejected",
            self.mean,
            self.relative_std() * 100.0,
            self.masked
        )
    }
}
