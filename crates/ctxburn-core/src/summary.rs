use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::stats::{MetricSummary, PeakSummary};

/// Statistics for one context-length group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedMetrics {
    pub count: usize,
    /// Carries the sample standard deviation.
    pub ttft: MetricSummary,
    pub total_latency: MetricSummary,
    pub decode_throughput: MetricSummary,
    pub gpu_memory: PeakSummary,
    pub prompt_tokens_mean: f64,
    pub output_tokens_mean: f64,
}

impl AggregatedMetrics {
    /// Sample standard deviation of TTFT, 0.0 for singleton groups.
    pub fn ttft_stdev(&self) -> f64 {
        self.ttft.stdev.unwrap_or(0.0)
    }
}

/// Per-context-length statistics, iterated in ascending context length.
pub type ContextSummary = BTreeMap<u64, AggregatedMetrics>;
