use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CtxBurnError {
    #[error("Inference engine error: {0}")]
    Engine(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Prompt source error: {0}")]
    PromptSource(String),

    #[error("No valid results found in {}", path.display())]
    NoData { path: PathBuf },

    #[error("No valid analysis data in {} (missing context_length field?)", path.display())]
    NoGroupingKey { path: PathBuf },
}

impl CtxBurnError {
    /// True for the "nothing to summarize" conditions of an analysis run.
    pub fn is_no_data(&self) -> bool {
        matches!(self, Self::NoData { .. } | Self::NoGroupingKey { .. })
    }
}

pub type Result<T> = std::result::Result<T, CtxBurnError>;
