use std::collections::BTreeMap;
use std::path::Path;

use ctxburn_core::stats::{self, MetricSummary, PeakSummary};
use ctxburn_core::{AggregatedMetrics, ContextSummary, CtxBurnError, RawRecord, Result};
use tracing::instrument;

use crate::reporter::Reporter;
use crate::store;

/// Group records by `context_length` and summarize each group.
///
/// Records without a context length are left out entirely. Missing metric
/// fields count as zero. The result does not depend on input order.
pub fn group_and_summarize(records: &[RawRecord]) -> ContextSummary {
    let mut groups: BTreeMap<u64, Vec<&RawRecord>> = BTreeMap::new();
    for record in records {
        let Some(context_length) = record.context_length else {
            continue;
        };
        groups.entry(context_length).or_default().push(record);
    }

    groups
        .into_iter()
        .filter_map(|(context_length, group)| {
            summarize_group(&group).map(|metrics| (context_length, metrics))
        })
        .collect()
}

/// One metric across the group, absent values read as zero.
fn column(group: &[&RawRecord], field: impl Fn(&RawRecord) -> Option<f64>) -> Vec<f64> {
    group.iter().map(|&r| field(r).unwrap_or(0.0)).collect()
}

fn summarize_group(group: &[&RawRecord]) -> Option<AggregatedMetrics> {
    let ttft = column(group, |r| r.ttft);
    let total_latency = column(group, |r| r.total_latency);
    let decode_throughput = column(group, |r| r.decode_throughput);
    let gpu_memory = column(group, |r| r.peak_gpu_memory_gb);
    let prompt_tokens = column(group, |r| r.prompt_tokens.map(|v| v as f64));
    let output_tokens = column(group, |r| r.output_tokens.map(|v| v as f64));

    Some(AggregatedMetrics {
        count: group.len(),
        ttft: MetricSummary::with_stdev(&ttft)?,
        total_latency: MetricSummary::from_values(&total_latency)?,
        decode_throughput: MetricSummary::from_values(&decode_throughput)?,
        gpu_memory: PeakSummary::from_values(&gpu_memory)?,
        prompt_tokens_mean: stats::mean(&prompt_tokens)?,
        output_tokens_mean: stats::mean(&output_tokens)?,
    })
}

/// Loads a record store and summarizes it, reporting skipped lines.
pub struct ResultAggregator<'a> {
    reporter: &'a dyn Reporter,
}

impl<'a> ResultAggregator<'a> {
    pub fn new(reporter: &'a dyn Reporter) -> Self {
        Self { reporter }
    }

    pub fn load(&self, store_path: &Path) -> Result<Vec<RawRecord>> {
        store::load_records(store_path, self.reporter)
    }

    /// Load and summarize. An empty or fully unparsable store is
    /// [`CtxBurnError::NoData`]; records that all lack a context length are
    /// [`CtxBurnError::NoGroupingKey`].
    #[instrument(skip(self, store_path), fields(path = %store_path.display()))]
    pub fn analyze(&self, store_path: &Path) -> Result<ContextSummary> {
        self.reporter
            .info(&format!("Loading results from: {}", store_path.display()));
        let records = self.load(store_path)?;

        if records.is_empty() {
            return Err(CtxBurnError::NoData {
                path: store_path.to_path_buf(),
            });
        }
        self.reporter
            .info(&format!("Loaded {} result entries", records.len()));

        let summary = group_and_summarize(&records);
        if summary.is_empty() {
            return Err(CtxBurnError::NoGroupingKey {
                path: store_path.to_path_buf(),
            });
        }

        Ok(summary)
    }
}
