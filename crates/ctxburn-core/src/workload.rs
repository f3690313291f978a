use serde::{Deserialize, Serialize};

/// One unit of work: a rendered prompt for a nominal context length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptUnit {
    pub context_length: u64,
    pub sample_id: u64,
    pub prompt: String,
    #[serde(default)]
    pub query: Option<String>,
}

/// Generation settings passed to the engine with every request.
///
/// Always greedy so that output token counts are reproducible.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplingConfig {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl SamplingConfig {
    pub fn greedy(max_tokens: u32) -> Self {
        Self {
            temperature: 0.0,
            max_tokens,
        }
    }
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self::greedy(128)
    }
}
