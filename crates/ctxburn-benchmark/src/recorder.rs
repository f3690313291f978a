use std::path::Path;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use ctxburn_core::{LatencySplit, PerformanceRecord, PromptUnit, Result, SamplingConfig};
use tracing::instrument;

use crate::engine::{InferenceEngine, Tokenizer};
use crate::memory::MemoryProbe;
use crate::reporter::Reporter;
use crate::store;

/// Times one request at a time against an engine and turns each call into a
/// [`PerformanceRecord`].
///
/// TTFT is approximated from the end-to-end latency because the engine does
/// not expose a first-token timestamp; see [`LatencySplit::approximate`].
pub struct MeasurementRecorder<'a> {
    engine: &'a dyn InferenceEngine,
    tokenizer: &'a dyn Tokenizer,
    memory: Box<dyn MemoryProbe + 'a>,
    reporter: &'a dyn Reporter,
    sampling: SamplingConfig,
}

impl<'a> MeasurementRecorder<'a> {
    pub fn new(
        engine: &'a dyn InferenceEngine,
        tokenizer: &'a dyn Tokenizer,
        memory: Box<dyn MemoryProbe + 'a>,
        reporter: &'a dyn Reporter,
        sampling: SamplingConfig,
    ) -> Self {
        Self {
            engine,
            tokenizer,
            memory,
            reporter,
            sampling,
        }
    }

    /// Run `prompt` once and derive its record. Engine errors are returned
    /// unchanged and nothing is retried.
    #[instrument(skip(self, prompt), fields(prompt_chars = prompt.len()))]
    pub fn measure(
        &mut self,
        prompt: &str,
        context_length: u64,
        sample_id: u64,
    ) -> Result<PerformanceRecord> {
        let prompt_tokens = self.tokenizer.count_tokens(prompt)?;

        self.memory.reset_peak();
        let start = Instant::now();

        let generation = self.engine.generate(prompt, &self.sampling);

        let total_latency = start.elapsed().as_secs_f64();
        let peak_gpu_memory_gb = self.memory.peak_gb();
        let generation = generation?;

        let output_tokens = generation.output_tokens();
        let split = LatencySplit::approximate(total_latency, output_tokens);

        Ok(PerformanceRecord {
            context_length,
            sample_id,
            prompt_tokens,
            output_tokens,
            ttft: split.ttft,
            total_latency,
            decode_throughput: split.decode_throughput,
            peak_gpu_memory_gb,
            timestamp: epoch_seconds(),
        })
    }

    /// Measure a prompt unit and append the record to the store before
    /// returning it.
    pub fn measure_and_append(
        &mut self,
        unit: &PromptUnit,
        store_path: &Path,
    ) -> Result<PerformanceRecord> {
        let record = self.measure(&unit.prompt, unit.context_length, unit.sample_id)?;
        store::append_record(&record, store_path)?;

        self.reporter.info(&format!(
            "  TTFT (approx): {:.3}s | Total: {:.3}s | Throughput: {:.2} tokens/s | Memory: {:.2} GB",
            record.ttft, record.total_latency, record.decode_throughput, record.peak_gpu_memory_gb
        ));

        Ok(record)
    }

    /// Measure every unit in order. Stops at the first failure; records
    /// already appended stay in the store.
    pub fn run(&mut self, units: &[PromptUnit], store_path: &Path) -> Result<Vec<PerformanceRecord>> {
        let mut records = Vec::with_capacity(units.len());

        for (idx, unit) in units.iter().enumerate() {
            self.reporter.info(&format!(
                "[{}/{}] Context length: {} tokens, Sample: {}",
                idx + 1,
                units.len(),
                unit.context_length,
                unit.sample_id
            ));
            records.push(self.measure_and_append(unit, store_path)?);
        }

        Ok(records)
    }
}

fn epoch_seconds() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Generation;
    use crate::reporter::MemoryReporter;
    use crate::store::load_records;
    use ctxburn_core::CtxBurnError;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::thread;
    use std::time::Duration;

    /// Sleeps for a fixed time and returns a fixed number of tokens.
    struct FakeEngine {
        delay: Duration,
        tokens: usize,
        calls: RefCell<Vec<SamplingConfig>>,
    }

    impl FakeEngine {
        fn new(delay_ms: u64, tokens: usize) -> Self {
            Self {
                delay: Duration::from_millis(delay_ms),
                tokens,
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl InferenceEngine for FakeEngine {
        fn generate(&self, _prompt: &str, sampling: &SamplingConfig) -> Result<Generation> {
            self.calls.borrow_mut().push(*sampling);
            thread::sleep(self.delay);
            Ok(Generation {
                text: "answer ".repeat(self.tokens),
                token_ids: (0..self.tokens as u32).collect(),
            })
        }
    }

    struct FailingEngine;

    impl InferenceEngine for FailingEngine {
        fn generate(&self, _prompt: &str, _sampling: &SamplingConfig) -> Result<Generation> {
            Err(CtxBurnError::Engine("out of memory".to_string()))
        }
    }

    struct WordTokenizer;

    impl Tokenizer for WordTokenizer {
        fn count_tokens(&self, text: &str) -> Result<u64> {
            Ok(text.split_whitespace().count() as u64)
        }
    }

    /// Logs the order of probe calls and reports a fixed peak.
    struct ScriptedProbe {
        log: Rc<RefCell<Vec<&'static str>>>,
        peak: f64,
    }

    impl MemoryProbe for ScriptedProbe {
        fn reset_peak(&mut self) {
            self.log.borrow_mut().push("reset");
        }

        fn peak_gb(&mut self) -> f64 {
            self.log.borrow_mut().push("peak");
            self.peak
        }
    }

    fn probe(peak: f64) -> (Box<ScriptedProbe>, Rc<RefCell<Vec<&'static str>>>) {
        let log = Rc::new(RefCell::new(Vec::new()));
        (Box::new(ScriptedProbe { log: log.clone(), peak }), log)
    }

    #[test]
    fn test_measure_derives_record() {
        let engine = FakeEngine::new(20, 9);
        let reporter = MemoryReporter::new();
        let (memory, log) = probe(3.25);
        let mut recorder = MeasurementRecorder::new(
            &engine,
            &WordTokenizer,
            memory,
            &reporter,
            SamplingConfig::greedy(16),
        );

        let record = recorder.measure("one two three four", 2048, 7).unwrap();

        assert_eq!(record.context_length, 2048);
        assert_eq!(record.sample_id, 7);
        assert_eq!(record.prompt_tokens, 4);
        assert_eq!(record.output_tokens, 9);
        assert!(record.total_latency >= 0.02);
        assert_eq!(record.ttft, record.total_latency / 10.0);
        let decode_time = record.total_latency - record.ttft;
        assert!((record.decode_throughput - 9.0 / decode_time).abs() < 1e-9);
        assert_eq!(record.peak_gpu_memory_gb, 3.25);
        assert!(record.timestamp > 0.0);

        assert_eq!(*log.borrow(), vec!["reset", "peak"]);
        assert_eq!(*engine.calls.borrow(), vec![SamplingConfig::greedy(16)]);
    }

    #[test]
    fn test_measure_zero_tokens() {
        let engine = FakeEngine::new(5, 0);
        let reporter = MemoryReporter::new();
        let (memory, _) = probe(0.0);
        let mut recorder = MeasurementRecorder::new(
            &engine,
            &WordTokenizer,
            memory,
            &reporter,
            SamplingConfig::default(),
        );

        let record = recorder.measure("prompt", 4096, 0).unwrap();

        assert_eq!(record.output_tokens, 0);
        assert_eq!(record.ttft, record.total_latency);
        assert_eq!(record.decode_throughput, 0.0);
    }

    #[test]
    fn test_engine_error_propagates_after_window_closes() {
        let reporter = MemoryReporter::new();
        let (memory, log) = probe(1.0);
        let mut recorder = MeasurementRecorder::new(
            &FailingEngine,
            &WordTokenizer,
            memory,
            &reporter,
            SamplingConfig::default(),
        );

        let err = recorder.measure("prompt", 2048, 0).unwrap_err();

        assert!(matches!(err, CtxBurnError::Engine(_)));
        assert_eq!(*log.borrow(), vec!["reset", "peak"]);
    }

    #[test]
    fn test_run_appends_each_record_and_stops_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results/baseline.jsonl");
        let units: Vec<PromptUnit> = [2048u64, 2048, 4096]
            .iter()
            .enumerate()
            .map(|(i, &len)| PromptUnit {
                context_length: len,
                sample_id: i as u64,
                prompt: format!("Context: sample {i}\n\nQuestion: ?\n\nAnswer:"),
                query: None,
            })
            .collect();

        let engine = FakeEngine::new(1, 3);
        let reporter = MemoryReporter::new();
        let mut recorder = MeasurementRecorder::new(
            &engine,
            &WordTokenizer,
            Box::new(crate::memory::NoDeviceProbe),
            &reporter,
            SamplingConfig::default(),
        );
        let records = recorder.run(&units, &path).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(reporter.infos().len(), 6);

        let mut failing = MeasurementRecorder::new(
            &FailingEngine,
            &WordTokenizer,
            Box::new(crate::memory::NoDeviceProbe),
            &reporter,
            SamplingConfig::default(),
        );
        assert!(failing.run(&units, &path).is_err());

        let loaded = load_records(&path, &reporter).unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded[2].context_length, Some(4096));
    }
}
