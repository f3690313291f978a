mod logging;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use ctxburn_benchmark::{
    detect_memory_probe, export_csv_file, group_and_summarize, load_prompts, render_table,
    write_prompts, LlamaServerClient, MeasurementRecorder, PromptGenerator, ResultAggregator,
    TracingReporter,
};
use ctxburn_core::{CtxBurnError, PerformanceRecord, RawRecord, StudyConfig};
use tracing::{error, info};

const MEMORY_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Exit status when there is nothing to summarize.
const EXIT_NO_DATA: u8 = 2;

#[derive(Parser)]
#[command(name = "ctxburn")]
#[command(about = "ctxburn - prefill/decode asymmetry study across context lengths", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate synthetic long-context RAG prompts
    Generate {
        /// Study configuration (YAML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Prompt file to write
        #[arg(short, long, default_value = "data/rag_prompts.jsonl")]
        output: PathBuf,

        /// Context lengths in tokens (overrides config)
        #[arg(long, num_args = 1..)]
        context_lengths: Option<Vec<u64>>,

        /// Samples per context length (overrides config)
        #[arg(short, long)]
        num_samples: Option<u32>,

        /// RNG seed for reproducible prompts (overrides config)
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Run the baseline benchmark and append one record per prompt
    Run {
        /// Study configuration (YAML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Prompt file to read
        #[arg(short, long, default_value = "data/rag_prompts.jsonl")]
        prompts: PathBuf,

        /// Results store (overrides config output path)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Generate prompts if the prompt file is missing, then run the benchmark
    Workflow {
        /// Study configuration (YAML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Prompt file to reuse or create
        #[arg(short, long, default_value = "data/rag_prompts.jsonl")]
        prompts: PathBuf,

        /// Never generate prompts; the prompt file must already exist
        #[arg(long)]
        skip_prompt_generation: bool,

        /// Results store (overrides config output path)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Summarize a results store by context length
    Analyze {
        /// Results store (JSONL)
        results: PathBuf,

        /// Export the summary to this CSV file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Suppress the table display
        #[arg(short, long)]
        quiet: bool,

        /// Study configuration (YAML), used for logging settings
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Generate { .. } => "generate",
            Commands::Run { .. } => "run",
            Commands::Workflow { .. } => "workflow",
            Commands::Analyze { .. } => "analyze",
        }
    }

    fn config_path(&self) -> Option<&Path> {
        match self {
            Commands::Generate { config, .. }
            | Commands::Run { config, .. }
            | Commands::Workflow { config, .. }
            | Commands::Analyze { config, .. } => config.as_deref(),
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(cli.command.config_path()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    let _guard = logging::init(&config.logging, cli.command.name());

    let result = match cli.command {
        Commands::Generate {
            output,
            context_lengths,
            num_samples,
            seed,
            ..
        } => cmd_generate(&config, &output, context_lengths, num_samples, seed),
        Commands::Run {
            prompts, output, ..
        } => cmd_run(&config, &prompts, output),
        Commands::Workflow {
            prompts,
            skip_prompt_generation,
            output,
            ..
        } => cmd_workflow(&config, &prompts, skip_prompt_generation, output),
        Commands::Analyze {
            results,
            output,
            quiet,
            ..
        } => cmd_analyze(&results, output.as_deref(), quiet),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(exit_status(&e))
        }
    }
}

fn exit_status(e: &anyhow::Error) -> u8 {
    let no_data = e
        .downcast_ref::<CtxBurnError>()
        .is_some_and(CtxBurnError::is_no_data);
    if no_data {
        return EXIT_NO_DATA;
    }
    1
}

fn load_config(path: Option<&Path>) -> Result<StudyConfig> {
    let Some(path) = path else {
        return Ok(StudyConfig::default());
    };
    Ok(StudyConfig::load(path)?)
}

fn cmd_generate(
    config: &StudyConfig,
    output: &Path,
    context_lengths: Option<Vec<u64>>,
    num_samples: Option<u32>,
    seed: Option<u64>,
) -> Result<()> {
    let mut workload = config.workload.clone();
    if let Some(lengths) = context_lengths {
        workload.context_lengths = lengths;
    }
    if let Some(n) = num_samples {
        workload.num_samples = n;
    }
    if seed.is_some() {
        workload.seed = seed;
    }

    let checked = StudyConfig {
        workload: workload.clone(),
        ..config.clone()
    };
    checked.validate()?;

    let units = PromptGenerator::new(workload.seed)
        .generate(&workload.context_lengths, workload.num_samples);
    write_prompts(&units, output)?;

    info!("Generated {} prompts saved to {}", units.len(), output.display());
    info!("Context lengths: {:?}", workload.context_lengths);
    info!("Samples per length: {}", workload.num_samples);
    Ok(())
}

fn cmd_run(config: &StudyConfig, prompts_path: &Path, output: Option<PathBuf>) -> Result<()> {
    let results_path = output.unwrap_or_else(|| config.output.results_path());

    info!("{}", "=".repeat(60));
    info!("RAG Prefill-Decode Asymmetry Baseline Benchmark");
    info!("{}", "=".repeat(60));

    let units = load_prompts(prompts_path)?;
    if units.is_empty() {
        bail!("No prompts found in {}", prompts_path.display());
    }

    let inference = &config.inference;
    info!(
        "Connecting to inference server {} (model: {})",
        inference.host, config.model.name
    );
    let client = LlamaServerClient::with_timeout(
        inference.host.as_str(),
        Duration::from_secs(inference.timeout_secs),
    )
    .cache_prompt(inference.cache_prompt);
    client
        .health()
        .with_context(|| format!("Inference server {} is not ready", inference.host))?;

    for i in 0..inference.warmup_runs {
        info!("Warmup run {}/{}", i + 1, inference.warmup_runs);
        client.warmup()?;
    }

    let sampling = config.sampling();
    info!(
        "Sampling params: temperature={}, max_tokens={}",
        sampling.temperature, sampling.max_tokens
    );
    info!("Running inference on {} prompts...", units.len());

    let reporter = TracingReporter;
    let memory = detect_memory_probe(MEMORY_POLL_INTERVAL);
    let mut recorder = MeasurementRecorder::new(&client, &client, memory, &reporter, sampling);
    let records = recorder.run(&units, &results_path)?;

    info!("{}", "=".repeat(60));
    info!("Benchmark complete! Results appended to {}", results_path.display());
    info!("{}", "=".repeat(60));
    log_run_summary(&records);

    Ok(())
}

fn cmd_workflow(
    config: &StudyConfig,
    prompts_path: &Path,
    skip_prompt_generation: bool,
    output: Option<PathBuf>,
) -> Result<()> {
    ensure_prompts(config, prompts_path, skip_prompt_generation)?;
    cmd_run(config, prompts_path, output)?;

    info!("Workflow completed!");
    Ok(())
}

/// Generate the prompt file from the config workload unless it already exists
/// or generation is skipped. Returns whether prompts were written.
fn ensure_prompts(config: &StudyConfig, prompts_path: &Path, skip: bool) -> Result<bool> {
    if skip {
        info!("Skipping prompt generation");
        return Ok(false);
    }
    if prompts_path.exists() {
        info!("Using existing prompts: {}", prompts_path.display());
        return Ok(false);
    }

    info!("Generating RAG prompts...");
    cmd_generate(config, prompts_path, None, None, None)?;
    Ok(true)
}

/// Per-context means for the records of this run only.
fn log_run_summary(records: &[PerformanceRecord]) {
    let raw: Vec<RawRecord> = records.iter().cloned().map(RawRecord::from).collect();
    let summary = group_and_summarize(&raw);

    info!("Summary Statistics (TTFT approximated):");
    for (ctx_len, m) in &summary {
        info!(
            "Context {} tokens: TTFT={:.3}s, Throughput={:.2} tok/s, Latency={:.3}s",
            ctx_len, m.ttft.mean, m.decode_throughput.mean, m.total_latency.mean
        );
    }
}

fn cmd_analyze(results: &Path, output: Option<&Path>, quiet: bool) -> Result<()> {
    if !results.exists() {
        bail!("Results file not found: {}", results.display());
    }

    let reporter = TracingReporter;
    let summary = ResultAggregator::new(&reporter).analyze(results)?;

    if !quiet {
        println!("{}", render_table(&summary));
    }

    if let Some(path) = output {
        export_csv_file(&summary, path)?;
        info!("Results exported to CSV: {}", path.display());
    }

    info!("Analysis complete!");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_parse_analyze() {
        let cli = Cli::try_parse_from([
            "ctxburn",
            "analyze",
            "results/baseline_results.jsonl",
            "--output",
            "summary.csv",
            "--quiet",
        ])
        .unwrap();

        let Commands::Analyze {
            results,
            output,
            quiet,
            config,
        } = cli.command
        else {
            panic!("expected analyze");
        };
        assert_eq!(results, PathBuf::from("results/baseline_results.jsonl"));
        assert_eq!(output, Some(PathBuf::from("summary.csv")));
        assert!(quiet);
        assert!(config.is_none());
    }

    #[test]
    fn test_parse_generate_lengths() {
        let cli = Cli::try_parse_from([
            "ctxburn",
            "generate",
            "--context-lengths",
            "100",
            "200",
            "--num-samples",
            "3",
        ])
        .unwrap();

        assert_eq!(cli.command.name(), "generate");
        let Commands::Generate {
            context_lengths,
            num_samples,
            output,
            ..
        } = cli.command
        else {
            panic!("expected generate");
        };
        assert_eq!(context_lengths, Some(vec![100, 200]));
        assert_eq!(num_samples, Some(3));
        assert_eq!(output, PathBuf::from("data/rag_prompts.jsonl"));
    }

    #[test]
    fn test_no_data_exit_code() {
        let no_data = anyhow::Error::new(CtxBurnError::NoData {
            path: PathBuf::from("r.jsonl"),
        });
        let other = anyhow::anyhow!("Results file not found");

        assert_eq!(exit_status(&no_data), EXIT_NO_DATA);
        assert_eq!(exit_status(&other), 1);
    }

    #[test]
    fn test_analyze_empty_store_is_no_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.jsonl");
        fs::write(&path, "").unwrap();

        let err = cmd_analyze(&path, None, true).unwrap_err();
        assert_eq!(exit_status(&err), EXIT_NO_DATA);
    }

    #[test]
    fn test_analyze_writes_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.jsonl");
        let csv = dir.path().join("out/summary.csv");
        fs::write(
            &path,
            "{\"context_length\": 2048, \"ttft\": 0.1}\nnot json\n{\"context_length\": 2048, \"ttft\": 0.3}\n",
        )
        .unwrap();

        cmd_analyze(&path, Some(&csv), true).unwrap();

        let content = fs::read_to_string(&csv).unwrap();
        let row = content.lines().nth(1).unwrap();
        assert!(row.starts_with("2048,2,0.2,0.1,0.3,0.2,"));
    }

    #[test]
    fn test_generate_writes_prompts() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("data/prompts.jsonl");

        cmd_generate(&StudyConfig::default(), &output, Some(vec![32, 64]), Some(2), Some(5))
            .unwrap();

        let units = load_prompts(&output).unwrap();
        assert_eq!(units.len(), 4);
    }

    #[test]
    fn test_parse_workflow() {
        let cli = Cli::try_parse_from([
            "ctxburn",
            "workflow",
            "--config",
            "configs/baseline.yaml",
            "--skip-prompt-generation",
        ])
        .unwrap();

        assert_eq!(cli.command.name(), "workflow");
        assert_eq!(
            cli.command.config_path(),
            Some(Path::new("configs/baseline.yaml"))
        );
        let Commands::Workflow {
            prompts,
            skip_prompt_generation,
            output,
            ..
        } = cli.command
        else {
            panic!("expected workflow");
        };
        assert_eq!(prompts, PathBuf::from("data/rag_prompts.jsonl"));
        assert!(skip_prompt_generation);
        assert!(output.is_none());
    }

    fn small_config() -> StudyConfig {
        let mut config = StudyConfig::default();
        config.workload.context_lengths = vec![32, 64];
        config.workload.num_samples = 2;
        config.workload.seed = Some(3);
        config
    }

    #[test]
    fn test_ensure_prompts_generates_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let prompts = dir.path().join("data/rag_prompts.jsonl");

        assert!(ensure_prompts(&small_config(), &prompts, false).unwrap());

        let units = load_prompts(&prompts).unwrap();
        assert_eq!(units.len(), 4);
    }

    #[test]
    fn test_ensure_prompts_keeps_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let prompts = dir.path().join("rag_prompts.jsonl");
        let existing = "{\"context_length\": 8, \"sample_id\": 0, \"prompt\": \"Context:\"}\n";
        fs::write(&prompts, existing).unwrap();

        assert!(!ensure_prompts(&small_config(), &prompts, false).unwrap());
        assert_eq!(fs::read_to_string(&prompts).unwrap(), existing);
    }

    #[test]
    fn test_workflow_skip_without_prompts_fails_before_run() {
        let dir = tempfile::tempdir().unwrap();
        let prompts = dir.path().join("missing.jsonl");
        let results = dir.path().join("results.jsonl");

        let err = cmd_workflow(&small_config(), &prompts, true, Some(results.clone())).unwrap_err();

        assert!(!prompts.exists());
        assert!(!results.exists());
        assert_eq!(exit_status(&err), 1);
        assert!(matches!(
            err.downcast_ref::<CtxBurnError>(),
            Some(CtxBurnError::PromptSource(_))
        ));
    }

    #[test]
    fn test_generate_rejects_context_beyond_model_len() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("prompts.jsonl");

        let result = cmd_generate(
            &StudyConfig::default(),
            &output,
            Some(vec![u64::MAX]),
            Some(1),
            None,
        );
        assert!(result.is_err());
        assert!(!output.exists());
    }

    #[test]
    fn test_generate_rejects_zero_samples() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("prompts.jsonl");

        let result = cmd_generate(&StudyConfig::default(), &output, None, Some(0), None);
        assert!(result.is_err());
        assert!(!output.exists());
    }
}
