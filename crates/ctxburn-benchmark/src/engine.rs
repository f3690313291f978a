use ctxburn_core::{Result, SamplingConfig};

/// Output of one generation request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Generation {
    pub text: String,
    pub token_ids: Vec<u32>,
}

impl Generation {
    pub fn output_tokens(&self) -> u64 {
        self.token_ids.len() as u64
    }
}

/// A blocking inference engine: one prompt in, one generation out.
pub trait InferenceEngine {
    fn generate(&self, prompt: &str, sampling: &SamplingConfig) -> Result<Generation>;
}

/// Counts prompt tokens with the engine's own vocabulary.
pub trait Tokenizer {
    fn count_tokens(&self, text: &str) -> Result<u64>;
}
