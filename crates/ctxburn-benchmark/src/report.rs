//! Table and CSV projections of a [`ContextSummary`].

use std::fmt;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use ctxburn_core::{ContextSummary, CtxBurnError, Result};

const RULE_WIDTH: usize = 80;

pub const CSV_HEADER: [&str; 17] = [
    "context_length",
    "samples",
    "ttft_mean",
    "ttft_min",
    "ttft_max",
    "ttft_median",
    "ttft_stdev",
    "throughput_mean",
    "throughput_min",
    "throughput_max",
    "throughput_median",
    "latency_mean",
    "latency_min",
    "latency_max",
    "latency_median",
    "gpu_memory_mean",
    "gpu_memory_peak",
];

/// Four fixed-width tables: TTFT, decode throughput, total latency and GPU
/// memory, one row per context length in ascending order.
pub fn render_table(summary: &ContextSummary) -> String {
    SummaryTables(summary).to_string()
}

struct SummaryTables<'a>(&'a ContextSummary);

impl fmt::Display for SummaryTables<'_> {
    fn fmt(&self, out: &mut fmt::Formatter<'_>) -> fmt::Result {
        let summary = self.0;
        let rule = "-".repeat(RULE_WIDTH);

        writeln!(out, "{}", "=".repeat(60))?;
        writeln!(out, "Benchmark Results Summary")?;
        writeln!(out, "{}", "=".repeat(60))?;

        writeln!(
            out,
            "\nTime to First Token (TTFT, approximated as total / (output_tokens + 1)) by Context Length:"
        )?;
        writeln!(out, "{rule}")?;
        writeln!(
            out,
            "{:<20} {:<10} {:<12} {:<12} {:<12} {:<12} {:<10}",
            "Context (tokens)", "Samples", "Mean (s)", "Min (s)", "Max (s)", "Median (s)", "StdDev"
        )?;
        writeln!(out, "{rule}")?;
        for (ctx_len, m) in summary {
            writeln!(
                out,
                "{:<20} {:<10} {:<12.4} {:<12.4} {:<12.4} {:<12.4} {:<10.4}",
                ctx_len,
                m.count,
                m.ttft.mean,
                m.ttft.min,
                m.ttft.max,
                m.ttft.median,
                m.ttft_stdev()
            )?;
        }

        writeln!(out, "\nDecode Throughput (tokens/sec) by Context Length:")?;
        writeln!(out, "{rule}")?;
        writeln!(
            out,
            "{:<20} {:<10} {:<12} {:<12} {:<12} {:<12}",
            "Context (tokens)", "Samples", "Mean", "Min", "Max", "Median"
        )?;
        writeln!(out, "{rule}")?;
        for (ctx_len, m) in summary {
            let t = &m.decode_throughput;
            writeln!(
                out,
                "{:<20} {:<10} {:<12.2} {:<12.2} {:<12.2} {:<12.2}",
                ctx_len, m.count, t.mean, t.min, t.max, t.median
            )?;
        }

        writeln!(out, "\nTotal Latency (s) by Context Length:")?;
        writeln!(out, "{rule}")?;
        writeln!(
            out,
            "{:<20} {:<10} {:<12} {:<12} {:<12} {:<12}",
            "Context (tokens)", "Samples", "Mean (s)", "Min (s)", "Max (s)", "Median (s)"
        )?;
        writeln!(out, "{rule}")?;
        for (ctx_len, m) in summary {
            let l = &m.total_latency;
            writeln!(
                out,
                "{:<20} {:<10} {:<12.4} {:<12.4} {:<12.4} {:<12.4}",
                ctx_len, m.count, l.mean, l.min, l.max, l.median
            )?;
        }

        writeln!(out, "\nGPU Memory Usage by Context Length:")?;
        writeln!(out, "{rule}")?;
        writeln!(
            out,
            "{:<20} {:<10} {:<15} {:<15}",
            "Context (tokens)", "Samples", "Mean (GB)", "Peak (GB)"
        )?;
        writeln!(out, "{rule}")?;
        for (ctx_len, m) in summary {
            writeln!(
                out,
                "{:<20} {:<10} {:<15.2} {:<15.2}",
                ctx_len, m.count, m.gpu_memory.mean, m.gpu_memory.max
            )?;
        }

        Ok(())
    }
}

/// Write the header row and one row per context length at full precision.
pub fn export_csv<W: Write>(summary: &ContextSummary, writer: W) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(CSV_HEADER).map_err(csv_error)?;

    for (ctx_len, m) in summary {
        let row: [String; 17] = [
            ctx_len.to_string(),
            m.count.to_string(),
            m.ttft.mean.to_string(),
            m.ttft.min.to_string(),
            m.ttft.max.to_string(),
            m.ttft.median.to_string(),
            m.ttft_stdev().to_string(),
            m.decode_throughput.mean.to_string(),
            m.decode_throughput.min.to_string(),
            m.decode_throughput.max.to_string(),
            m.decode_throughput.median.to_string(),
            m.total_latency.mean.to_string(),
            m.total_latency.min.to_string(),
            m.total_latency.max.to_string(),
            m.total_latency.median.to_string(),
            m.gpu_memory.mean.to_string(),
            m.gpu_memory.max.to_string(),
        ];
        csv.write_record(&row).map_err(csv_error)?;
    }

    csv.flush()?;
    Ok(())
}

/// [`export_csv`] into a file, creating parent directories.
pub fn export_csv_file(summary: &ContextSummary, destination: &Path) -> Result<()> {
    if let Some(parent) = destination.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    export_csv(summary, File::create(destination)?)
}

fn csv_error(e: csv::Error) -> CtxBurnError {
    CtxBurnError::Csv(e.to_string())
}
