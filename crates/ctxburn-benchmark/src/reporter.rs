use std::sync::Mutex;

/// Where the recorder and aggregator send progress and warnings.
///
/// Passed in explicitly instead of reaching for a process-wide logger.
pub trait Reporter {
    fn info(&self, message: &str);
    fn warn(&self, message: &str);
}

/// Forwards to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn info(&self, message: &str) {
        tracing::info!("{}", message);
    }

    fn warn(&self, message: &str) {
        tracing::warn!("{}", message);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportLevel {
    Info,
    Warn,
}

/// Keeps every message in memory. Used by tests and by callers that want to
/// inspect warnings after a load.
#[derive(Debug, Default)]
pub struct MemoryReporter {
    entries: Mutex<Vec<(ReportLevel, String)>>,
}

impl MemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.collect(ReportLevel::Warn)
    }

    pub fn infos(&self) -> Vec<String> {
        self.collect(ReportLevel::Info)
    }

    fn collect(&self, level: ReportLevel) -> Vec<String> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m.clone())
            .collect()
    }

    fn push(&self, level: ReportLevel, message: &str) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.push((level, message.to_string()));
    }
}

impl Reporter for MemoryReporter {
    fn info(&self, message: &str) {
        self.push(ReportLevel::Info, message);
    }

    fn warn(&self, message: &str) {
        self.push(ReportLevel::Warn, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_reporter_separates_levels() {
        let reporter = MemoryReporter::new();
        reporter.info("loaded");
        reporter.warn("bad line");
        reporter.info("done");

        assert_eq!(reporter.infos(), vec!["loaded", "done"]);
        assert_eq!(reporter.warnings(), vec!["bad line"]);
    }
}
