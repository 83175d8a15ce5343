//! Conversion diagnostics.
//!
//! A [`ConversionReport`] collects the notices a run produces (resolved
//! parameters, frame-list bounds, synchronization warnings, per-record
//! failures) alongside the log output, so callers can inspect or print them
//! after the fact.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::time::Duration;

use crate::error::{ErrorKind, GeoframeError};
use crate::synchronization::MergedRecord;

/// A record that could not be extracted or tagged in best-effort mode.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordFailure {
    pub frame_index: u64,
    pub elapsed_time: Duration,
    pub kind: ErrorKind,
    pub message: String,
}

impl RecordFailure {
    pub(crate) fn new(record: &MergedRecord, error: &GeoframeError) -> Self {
        Self {
            frame_index: record.frame_index,
            elapsed_time: record.elapsed_time,
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

impl Display for RecordFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(
            f,
            "frame {} at {:.3}s: {}",
            self.frame_index,
            self.elapsed_time.as_secs_f64(),
            self.message
        )
    }
}

/// Diagnostics gathered during a run.
#[derive(Debug, Clone, Default)]
pub struct ConversionReport {
    /// Informational notices (not problems).
    pub info: Vec<String>,
    /// Conditions that do not stop the run but deserve a look, such as a
    /// video/track duration mismatch.
    pub warnings: Vec<String>,
    /// Records that failed in best-effort mode.
    pub failures: Vec<RecordFailure>,
}

impl ConversionReport {
    /// Returns `true` if no record failed. Warnings do not count.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn issue_count(&self) -> usize {
        self.warnings.len() + self.failures.len()
    }

    pub(crate) fn info(&mut self, message: impl Into<String>) {
        self.info.push(message.into());
    }

    pub(crate) fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }
}

impl Display for ConversionReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        for item in &self.info {
            writeln!(f, "[INFO] {item}")?;
        }
        for item in &self.warnings {
            writeln!(f, "[WARN] {item}")?;
        }
        for failure in &self.failures {
            writeln!(f, "[FAIL] {failure}")?;
        }
        if self.info.is_empty() && self.issue_count() == 0 {
            writeln!(f, "Nothing to report.")?;
        }
        Ok(())
    }
}
