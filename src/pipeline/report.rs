// src/pipeline/report.rs

use std::path::PathBuf;

/// One input file that a stage failed to transform.
#[derive(Debug, Clone)]
pub struct FileFailure {
    /// Source-relative path of the failing input.
    pub path: PathBuf,
    /// Human-readable cause (exit status, IO error, ...).
    pub reason: String,
}

/// Result of a single stage run.
///
/// A stage with any failure has outcome Failed, but `outputs` still lists
/// everything that was written for the files that did succeed.
#[derive(Debug, Clone, Default)]
pub struct StageReport {
    /// Output files written by this run.
    pub outputs: Vec<PathBuf>,
    /// Inputs that failed, with their causes.
    pub failures: Vec<FileFailure>,
}

impl StageReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn record_output(&mut self, path: PathBuf) {
        self.outputs.push(path);
    }

    pub fn record_failure(&mut self, path: PathBuf, reason: impl Into<String>) {
        self.failures.push(FileFailure {
            path,
            reason: reason.into(),
        });
    }
}
