// Domain modules
pub mod config;
pub mod error;
pub mod metrics;
pub mod stats;
pub mod summary;
pub mod workload;

pub use config::{
    InferenceConfig, LoggingConfig, ModelConfig, OutputConfig, StudyConfig, WorkloadConfig,
};
pub use error::{CtxBurnError, Result};
pub use metrics::{LatencySplit, PerformanceRecord, RawRecord};
pub use stats::{MetricSummary, PeakSummary};
pub use summary::{AggregatedMetrics, ContextSummary};
pub use workload::{PromptUnit, SamplingConfig};
