use std::time::Duration;

use ctxburn_core::{CtxBurnError, Result, SamplingConfig};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument};

use crate::engine::{Generation, InferenceEngine, Tokenizer};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);
const ERROR_BODY_CHARS: usize = 500;

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    prompt: &'a str,
    n_predict: u32,
    temperature: f32,
    cache_prompt: bool,
    return_tokens: bool,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    content: String,
    #[serde(default)]
    tokens: Vec<u32>,
    #[serde(default)]
    tokens_predicted: Option<u64>,
}

#[derive(Debug, Serialize)]
struct TokenizeRequest<'a> {
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenizeResponse {
    tokens: Vec<u32>,
}

/// Blocking client for a llama.cpp HTTP server (`/completion`, `/tokenize`).
pub struct LlamaServerClient {
    host: String,
    agent: ureq::Agent,
    cache_prompt: bool,
}

impl LlamaServerClient {
    pub fn new(host: impl Into<String>) -> Self {
        Self::with_timeout(host, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(host: impl Into<String>, timeout: Duration) -> Self {
        let host = host.into().trim_end_matches('/').to_string();
        Self {
            host,
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
            cache_prompt: false,
        }
    }

    /// Let the server reuse the KV cache of a shared prompt prefix.
    pub fn cache_prompt(mut self, enabled: bool) -> Self {
        self.cache_prompt = enabled;
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    #[instrument(skip(self), fields(host = %self.host))]
    pub fn health(&self) -> Result<()> {
        let url = format!("{}/health", self.host);
        self.agent
            .get(&url)
            .call()
            .map_err(|e| map_ureq_error(e, "Health check failed"))?;
        debug!("Server healthy");
        Ok(())
    }

    pub fn warmup(&self) -> Result<()> {
        info!(host = %self.host, "Warming up inference server");
        self.generate("hi", &SamplingConfig::greedy(1))?;
        Ok(())
    }
}

impl InferenceEngine for LlamaServerClient {
    #[instrument(skip(self, prompt), fields(prompt_chars = prompt.len(), max_tokens = sampling.max_tokens))]
    fn generate(&self, prompt: &str, sampling: &SamplingConfig) -> Result<Generation> {
        let url = format!("{}/completion", self.host);

        let request = CompletionRequest {
            prompt,
            n_predict: sampling.max_tokens,
            temperature: sampling.temperature,
            cache_prompt: self.cache_prompt,
            return_tokens: true,
            stream: false,
        };

        let response: CompletionResponse = self
            .agent
            .post(&url)
            .send_json(&request)
            .map_err(|e| map_ureq_error(e, "Completion failed"))?
            .into_json()
            .map_err(|e| CtxBurnError::Http(format!("Failed to parse completion: {}", e)))?;

        let predicted = response.tokens_predicted.unwrap_or(0);
        if response.tokens.is_empty() && predicted > 0 {
            return Err(CtxBurnError::Engine(format!(
                "Server predicted {} tokens but returned no token ids (needs return_tokens support)",
                predicted
            )));
        }

        Ok(Generation {
            text: response.content,
            token_ids: response.tokens,
        })
    }
}

impl Tokenizer for LlamaServerClient {
    fn count_tokens(&self, text: &str) -> Result<u64> {
        let url = format!("{}/tokenize", self.host);

        let response: TokenizeResponse = self
            .agent
            .post(&url)
            .send_json(&TokenizeRequest { content: text })
            .map_err(|e| map_ureq_error(e, "Tokenize failed"))?
            .into_json()
            .map_err(|e| CtxBurnError::Http(format!("Failed to parse tokenize response: {}", e)))?;

        Ok(response.tokens.len() as u64)
    }
}

/// Map ureq errors, calling out a server that is not listening.
fn map_ureq_error(e: ureq::Error, context: &str) -> CtxBurnError {
    match e {
        ureq::Error::Transport(t) if t.kind() == ureq::ErrorKind::ConnectionFailed => {
            error!("{}: connection refused", context);
            CtxBurnError::Http(format!(
                "{}: connection refused - is the inference server running?",
                context
            ))
        }
        ureq::Error::Status(code, response) => {
            let body = response.into_string().unwrap_or_default();
            error!(status = code, "{}", context);
            CtxBurnError::Engine(format!(
                "{}: {} - {}",
                context,
                code,
                truncate_chars(&body, ERROR_BODY_CHARS)
            ))
        }
        other => {
            error!("{}: {}", context, other);
            CtxBurnError::Http(format!("{}: {}", context, other))
        }
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
