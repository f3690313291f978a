use std::fs;

use ctxburn_core::LoggingConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Console plus optional `<log_dir>/<command>.log` file output.
///
/// `RUST_LOG` overrides the configured level. The returned guard must be held
/// until exit so buffered file output is flushed.
pub fn init(config: &LoggingConfig, command: &str) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.filter_directive()));

    let console = config.console.then(|| fmt::layer().with_target(false));

    let (file, guard) = match file_writer(config, command) {
        Some((writer, guard)) => (
            Some(fmt::layer().with_ansi(false).with_writer(writer)),
            Some(guard),
        ),
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .init();

    guard
}

fn file_writer(
    config: &LoggingConfig,
    command: &str,
) -> Option<(tracing_appender::non_blocking::NonBlocking, WorkerGuard)> {
    let dir = config.log_dir.as_ref()?;

    if let Err(e) = fs::create_dir_all(dir) {
        eprintln!("Cannot create log directory {}: {}", dir.display(), e);
        return None;
    }

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(command)
        .filename_suffix("log")
        .build(dir);

    match appender {
        Ok(appender) => Some(tracing_appender::non_blocking(appender)),
        Err(e) => {
            eprintln!("Cannot open log file in {}: {}", dir.display(), e);
            None
        }
    }
}
