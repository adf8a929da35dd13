//! Operator-facing output.
//!
//! Executors and the runner never print directly; they go through a
//! [`ProgressReporter`] so the exact lines can be captured in tests.

use std::sync::Mutex;

use crate::error::PartSqlError;
use crate::shards::Shard;

/// `running on <shard> database`
pub fn running_line(shard: &Shard) -> String {
    format!("running on {} database", shard)
}

/// `<shard>: processed <total> items`
pub fn progress_line(shard: &Shard, total: u64) -> String {
    format!("{}: processed {} items", shard, total)
}

/// `<shard> final: processed <total> items`
pub fn final_line(shard: &Shard, total: u64) -> String {
    format!("{} final: processed {} items", shard, total)
}

/// Sink for progress lines and job failure reports.
pub trait ProgressReporter: Send + Sync {
    fn line(&self, line: &str);

    fn failure(&self, shard: &Shard, error: &PartSqlError);
}

/// Progress on stdout, failures on stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleReporter;

impl ProgressReporter for ConsoleReporter {
    fn line(&self, line: &str) {
        println!("{}", line);
    }

    fn failure(&self, shard: &Shard, error: &PartSqlError) {
        eprintln!("✗ {} failed: {}", shard, error);
    }
}

/// Keeps every emitted line in order, failures prefixed with `FAILED `.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    lines: Mutex<Vec<String>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Record an arbitrary event, e.g. from a test connector.
    pub fn record(&self, line: impl Into<String>) {
        self.lines
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(line.into());
    }
}

impl ProgressReporter for RecordingReporter {
    fn line(&self, line: &str) {
        self.record(line);
    }

    fn failure(&self, shard: &Shard, error: &PartSqlError) {
        self.record(format!("FAILED {}: {}", shard, error));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_formats() {
        let shard = Shard::from("p1");
        assert_eq!(running_line(&shard), "running on p1 database");
        assert_eq!(progress_line(&shard, 2000), "p1: processed 2000 items");
        assert_eq!(final_line(&shard, 0), "p1 final: processed 0 items");
    }

    #[test]
    fn test_recording_reporter_keeps_order() {
        let reporter = RecordingReporter::new();
        reporter.line("first");
        reporter.failure(&Shard::from("p2"), &PartSqlError::execution("p2", "boom"));
        reporter.record("last");
        assert_eq!(
            reporter.lines(),
            vec![
                "first".to_string(),
                "FAILED p2: Execution failed on p2: boom".to_string(),
                "last".to_string(),
            ]
        );
    }
}
