pub mod aggregator;
pub mod engine;
pub mod llama_server;
pub mod memory;
pub mod prompts;
pub mod recorder;
pub mod report;
pub mod reporter;
pub mod store;

pub use aggregator::{group_and_summarize, ResultAggregator};
pub use engine::{Generation, InferenceEngine, Tokenizer};
pub use llama_server::LlamaServerClient;
pub use memory::{detect_memory_probe, MemoryProbe, NoDeviceProbe, ProbeError, SmiMemoryProbe, SmiTool};
pub use prompts::{load_prompts, render_prompt, write_prompts, PromptGenerator};
pub use recorder::MeasurementRecorder;
pub use report::{export_csv, export_csv_file, render_table, CSV_HEADER};
pub use reporter::{MemoryReporter, Reporter, TracingReporter};
pub use store::{append_record, load_records};
