//! Synthetic long-context RAG prompts and the JSONL prompt file.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use ctxburn_core::{CtxBurnError, PromptUnit, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::{info, instrument};

/// Rough characters-per-token ratio used to size the synthetic context.
const CHARS_PER_TOKEN: usize = 4;

const TOPICS: &[&str] = &[
    "machine learning",
    "neural networks",
    "transformer architecture",
    "attention mechanisms",
    "language models",
    "retrieval augmented generation",
    "vector databases",
    "embedding models",
    "semantic search",
    "knowledge graphs",
    "information retrieval",
    "natural language processing",
];

const QUERIES: &[&str] = &[
    "What are the main findings?",
    "Summarize the key points.",
    "What is the conclusion?",
    "Explain the main idea.",
    "What are the important details?",
    "Give me a brief overview.",
    "What does this tell us?",
    "What is the summary?",
];

pub struct PromptGenerator {
    rng: StdRng,
}

impl PromptGenerator {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { rng }
    }

    /// Document-like text of roughly `length_tokens` tokens.
    pub fn context(&mut self, length_tokens: u64) -> String {
        let target_chars = usize::try_from(length_tokens)
            .unwrap_or(usize::MAX)
            .saturating_mul(CHARS_PER_TOKEN);
        let mut paragraphs = Vec::new();
        let mut current = 0;

        while current < target_chars {
            let topic = TOPICS.choose(&mut self.rng).copied().unwrap_or(TOPICS[0]);
            let paragraph = paragraph(topic);
            current += paragraph.len();
            paragraphs.push(paragraph);
        }

        paragraphs.join("\n")
    }

    pub fn query(&mut self) -> &'static str {
        QUERIES.choose(&mut self.rng).copied().unwrap_or(QUERIES[0])
    }

    /// `num_samples` prompts per context length, context length major.
    pub fn generate(&mut self, context_lengths: &[u64], num_samples: u32) -> Vec<PromptUnit> {
        let mut units = Vec::with_capacity(context_lengths.len() * num_samples as usize);

        for &context_length in context_lengths {
            for sample_id in 0..num_samples as u64 {
                let context = self.context(context_length);
                let query = self.query();
                units.push(PromptUnit {
                    context_length,
                    sample_id,
                    prompt: render_prompt(&context, query),
                    query: Some(query.to_string()),
                });
            }
        }

        units
    }
}

fn paragraph(topic: &str) -> String {
    format!(
        "\nThe field of {topic} has seen significant advances in recent years. \n\
         Researchers have developed novel approaches that combine multiple techniques \n\
         to achieve state-of-the-art performance. These methods leverage large-scale \n\
         datasets and computational resources to train models that can understand \n\
         and generate human-like text. The key innovation lies in the ability to \n\
         process and reason over vast amounts of information efficiently.\n"
    )
}

pub fn render_prompt(context: &str, query: &str) -> String {
    format!("Context:\n{context}\n\nQuestion: {query}\n\nAnswer:")
}

#[instrument(skip(units, path), fields(count = units.len(), path = %path.display()))]
pub fn write_prompts(units: &[PromptUnit], path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut writer = BufWriter::new(File::create(path)?);
    for unit in units {
        serde_json::to_writer(&mut writer, unit)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;

    info!("Wrote prompts");
    Ok(())
}

/// Read a prompt file. Any unreadable line fails the whole load: a run must
/// not silently drop work units.
pub fn load_prompts(path: &Path) -> Result<Vec<PromptUnit>> {
    let file = File::open(path).map_err(|e| {
        CtxBurnError::PromptSource(format!("Failed to open {}: {}", path.display(), e))
    })?;

    let mut units = Vec::new();
    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let unit: PromptUnit = serde_json::from_str(trimmed).map_err(|e| {
            CtxBurnError::PromptSource(format!(
                "{} line {}: {}",
                path.display(),
                idx + 1,
                e
            ))
        })?;
        if unit.prompt.is_empty() {
            return Err(CtxBurnError::PromptSource(format!(
                "{} line {}: empty prompt",
                path.display(),
                idx + 1
            )));
        }
        units.push(unit);
    }

    Ok(units)
}
