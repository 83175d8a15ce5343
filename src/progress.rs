//! Batch progress and cooperative cancellation.
//!
//! A conversion reports progress once every
//! [`batch_size`](crate::ConvertOptions::with_batch_size) finished records
//! and once more when the batch ends. Snapshots are plain values; the
//! derived figures (percentage, remaining time) are computed on demand.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use geoframe::{ConvertOptions, ProgressCallback, ProgressInfo};
//!
//! struct PrintProgress;
//!
//! impl ProgressCallback for PrintProgress {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         println!(
//!             "{}/{} stills ({} failed), {:.0}%",
//!             info.completed,
//!             info.total,
//!             info.failed,
//!             info.percentage().unwrap_or(0.0)
//!         );
//!     }
//! }
//!
//! let options = ConvertOptions::new().with_progress(Arc::new(PrintProgress));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::synchronization::MergedRecord;

/// Where a batch stands.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressInfo {
    /// Records finished so far, whether they succeeded or not.
    pub completed: u64,
    /// Records that failed so far. Only non-zero in best-effort mode.
    pub failed: u64,
    pub total: u64,
    /// Wall-clock time since the batch started.
    pub elapsed: Duration,
    /// Frame index of the most recently finished record. `None` in the
    /// closing report.
    pub last_frame: Option<u64>,
    /// Video time of the most recently finished record.
    pub last_timestamp: Option<Duration>,
}

impl ProgressInfo {
    /// Completion in percent, `None` for an empty batch.
    pub fn percentage(&self) -> Option<f32> {
        (self.total > 0).then(|| self.completed as f32 * 100.0 / self.total as f32)
    }

    /// Remaining time extrapolated from the average time per record so far.
    pub fn estimated_remaining(&self) -> Option<Duration> {
        if self.completed == 0 {
            return None;
        }
        let remaining = self.total.saturating_sub(self.completed);
        let per_record = self.elapsed.as_secs_f64() / self.completed as f64;
        Some(Duration::from_secs_f64(per_record * remaining as f64))
    }
}

/// Receives progress snapshots during a conversion.
///
/// Implementations must be [`Send`] and [`Sync`]; with the `rayon` feature
/// the callback fires from worker threads. Callbacks cannot stop the batch,
/// use a [`CancellationToken`] for that.
pub trait ProgressCallback: Send + Sync {
    fn on_progress(&self, info: &ProgressInfo);
}

/// Used when no callback is configured.
pub(crate) struct Silent;

impl ProgressCallback for Silent {
    fn on_progress(&self, _info: &ProgressInfo) {}
}

/// Shared cancellation flag.
///
/// Clones observe the same flag. Once cancelled, the batch starts no new
/// records; records already being extracted are finished and tagged.
///
/// # Example
///
/// ```
/// use geoframe::CancellationToken;
///
/// let token = CancellationToken::new();
/// let handle = token.clone();
/// handle.cancel();
/// assert!(token.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// Counts finished records and fires the callback every `batch_size`.
pub(crate) struct ProgressTracker {
    callback: Arc<dyn ProgressCallback>,
    total: u64,
    completed: u64,
    failed: u64,
    batch_size: u64,
    unreported: u64,
    started: Instant,
}

impl ProgressTracker {
    pub(crate) fn new(callback: Arc<dyn ProgressCallback>, total: u64, batch_size: u64) -> Self {
        Self {
            callback,
            total,
            completed: 0,
            failed: 0,
            batch_size: batch_size.max(1),
            unreported: 0,
            started: Instant::now(),
        }
    }

    pub(crate) fn record(&mut self, record: &MergedRecord, succeeded: bool) {
        self.completed += 1;
        self.failed += u64::from(!succeeded);
        self.unreported += 1;
        if self.unreported == self.batch_size {
            self.emit(Some(record));
        }
    }

    /// Closing report. Skipped when the last record already triggered one,
    /// except for an empty batch, which still gets exactly one.
    pub(crate) fn finish(&mut self) {
        if self.unreported > 0 || self.completed == 0 {
            self.emit(None);
        }
    }

    fn emit(&mut self, last: Option<&MergedRecord>) {
        self.unreported = 0;
        self.callback.on_progress(&ProgressInfo {
            completed: self.completed,
            failed: self.failed,
            total: self.total,
            elapsed: self.started.elapsed(),
            last_frame: last.map(|record| record.frame_index),
            last_timestamp: last.map(|record| record.elapsed_time),
        });
    }
}
