//! Descriptive statistics over a group of samples.
//!
//! Values are sorted before anything is accumulated, so the result does not
//! depend on the order the samples arrived in.

use serde::{Deserialize, Serialize};

/// Distribution summary of one metric within a group.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub median: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdev: Option<f64>,
}

impl MetricSummary {
    /// Mean/min/max/median. Returns `None` for an empty slice.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        let sorted = sorted(values)?;
        Some(Self {
            mean: sum(&sorted) / sorted.len() as f64,
            min: sorted[0],
            max: sorted[sorted.len() - 1],
            median: median_sorted(&sorted),
            stdev: None,
        })
    }

    /// Same as [`MetricSummary::from_values`] plus the sample standard deviation.
    pub fn with_stdev(values: &[f64]) -> Option<Self> {
        let mut summary = Self::from_values(values)?;
        summary.stdev = Some(sample_stdev(values));
        Some(summary)
    }
}

/// Mean and peak of a metric where spread is not reported.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeakSummary {
    pub mean: f64,
    pub max: f64,
}

impl PeakSummary {
    pub fn from_values(values: &[f64]) -> Option<Self> {
        let sorted = sorted(values)?;
        Some(Self {
            mean: sum(&sorted) / sorted.len() as f64,
            max: sorted[sorted.len() - 1],
        })
    }
}

pub fn mean(values: &[f64]) -> Option<f64> {
    let sorted = sorted(values)?;
    Some(sum(&sorted) / sorted.len() as f64)
}

/// Sample (n - 1) standard deviation; 0.0 for fewer than two values.
pub fn sample_stdev(values: &[f64]) -> f64 {
    let Some(sorted) = sorted(values) else {
        return 0.0;
    };
    if sorted.len() < 2 {
        return 0.0;
    }

    let n = sorted.len() as f64;
    let mean = sum(&sorted) / n;

    let mut deviations: Vec<f64> = sorted.iter().map(|v| (v - mean) * (v - mean)).collect();
    deviations.sort_by(f64::total_cmp);

    (sum(&deviations) / (n - 1.0)).sqrt()
}

fn sorted(values: &[f64]) -> Option<Vec<f64>> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    Some(sorted)
}

fn sum(values: &[f64]) -> f64 {
    values.iter().sum()
}

fn median_sorted(sorted: &[f64]) -> f64 {
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        return sorted[mid];
    }
    (sorted[mid - 1] + sorted[mid]) / 2.0
}
