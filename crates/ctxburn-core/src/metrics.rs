use serde::{Deserialize, Serialize};

/// One measured inference request, as written to the record store.
///
/// `ttft` is an approximation (`total_latency / (output_tokens + 1)`), not a
/// measured first-token timestamp. `decode_throughput` is derived from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceRecord {
    pub context_length: u64,
    pub sample_id: u64,
    pub prompt_tokens: u64,
    pub output_tokens: u64,
    pub ttft: f64,
    pub total_latency: f64,
    pub decode_throughput: f64,
    pub peak_gpu_memory_gb: f64,
    pub timestamp: f64,
}

/// Approximate latency split derived from an opaque end-to-end duration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatencySplit {
    pub ttft: f64,
    pub decode_time: f64,
    pub decode_throughput: f64,
}

impl LatencySplit {
    /// TTFT is `total / (tokens + 1)`; throughput is zero whenever the
    /// remaining decode time is not positive.
    pub fn approximate(total_latency: f64, output_tokens: u64) -> Self {
        let total_latency = total_latency.max(0.0);
        let ttft = total_latency / (output_tokens as f64 + 1.0);
        let decode_time = total_latency - ttft;

        let decode_throughput = if decode_time > 0.0 {
            output_tokens as f64 / decode_time
        } else {
            0.0
        };

        Self {
            ttft,
            decode_time,
            decode_throughput,
        }
    }
}

/// A record as read back from the store.
///
/// Every field is optional so that older or partial lines still load; missing
/// telemetry counts as zero during aggregation and a missing
/// `context_length` keeps the record out of every group.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    #[serde(default)]
    pub context_length: Option<u64>,
    #[serde(default)]
    pub sample_id: Option<u64>,
    #[serde(default)]
    pub prompt_tokens: Option<u64>,
    #[serde(default)]
    pub output_tokens: Option<u64>,
    #[serde(default)]
    pub ttft: Option<f64>,
    #[serde(default)]
    pub total_latency: Option<f64>,
    #[serde(default)]
    pub decode_throughput: Option<f64>,
    #[serde(default)]
    pub peak_gpu_memory_gb: Option<f64>,
    #[serde(default)]
    pub timestamp: Option<f64>,
}

impl From<PerformanceRecord> for RawRecord {
    fn from(r: PerformanceRecord) -> Self {
        Self {
            context_length: Some(r.context_length),
            sample_id: Some(r.sample_id),
            prompt_tokens: Some(r.prompt_tokens),
            output_tokens: Some(r.output_tokens),
            ttft: Some(r.ttft),
            total_latency: Some(r.total_latency),
            decode_throughput: Some(r.decode_throughput),
            peak_gpu_memory_gb: Some(r.peak_gpu_memory_gb),
            timestamp: Some(r.timestamp),
        }
    }
}
