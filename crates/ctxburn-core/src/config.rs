use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{CtxBurnError, Result, SamplingConfig};

/// Study configuration, normally read from `configs/baseline.yaml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StudyConfig {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub inference: InferenceConfig,
    #[serde(default)]
    pub workload: WorkloadConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub name: String,
    pub max_model_len: u32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            max_model_len: 32768,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    pub host: String,
    pub cache_prompt: bool,
    pub timeout_secs: u64,
    pub warmup_runs: u32,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            host: "http://localhost:8080".to_string(),
            cache_prompt: false,
            timeout_secs: 600,
            warmup_runs: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkloadConfig {
    pub context_lengths: Vec<u64>,
    pub num_samples: u32,
    pub decode_length: u32,
    pub seed: Option<u64>,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            context_lengths: vec![2048, 4096, 8192, 16384],
            num_samples: 10,
            decode_length: 128,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub results_dir: PathBuf,
    pub filename: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            results_dir: PathBuf::from("results"),
            filename: "baseline_results.jsonl".to_string(),
        }
    }
}

impl OutputConfig {
    pub fn results_path(&self) -> PathBuf {
        self.results_dir.join(&self.filename)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub log_dir: Option<PathBuf>,
    pub console: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            log_dir: None,
            console: true,
        }
    }
}

impl LoggingConfig {
    /// Directive for `EnvFilter`, accepting the Python-style `WARNING`.
    pub fn filter_directive(&self) -> &'static str {
        match self.level.to_ascii_uppercase().as_str() {
            "DEBUG" => "debug",
            "WARNING" | "WARN" => "warn",
            "ERROR" => "error",
            "TRACE" => "trace",
            _ => "info",
        }
    }
}

impl StudyConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            CtxBurnError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)
            .map_err(|e| CtxBurnError::Config(format!("Failed to parse YAML config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let workload = &self.workload;
        if workload.context_lengths.is_empty() {
            return Err(CtxBurnError::Config(
                "workload.context_lengths must not be empty".to_string(),
            ));
        }
        if workload.context_lengths.contains(&0) {
            return Err(CtxBurnError::Config(
                "workload.context_lengths must be positive".to_string(),
            ));
        }
        let max_len = u64::from(self.model.max_model_len);
        if let Some(&too_long) = workload.context_lengths.iter().find(|&&l| l > max_len) {
            return Err(CtxBurnError::Config(format!(
                "workload.context_lengths entry {} exceeds model.max_model_len {}",
                too_long, max_len
            )));
        }
        if workload.num_samples == 0 {
            return Err(CtxBurnError::Config(
                "workload.num_samples must be greater than 0".to_string(),
            ));
        }
        if workload.decode_length == 0 {
            return Err(CtxBurnError::Config(
                "workload.decode_length must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn sampling(&self) -> SamplingConfig {
        SamplingConfig::greedy(self.workload.decode_length)
    }
}
