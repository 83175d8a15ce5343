//! Per-record execution: extract one still, then geotag it.
//!
//! Records are processed in list order by default. With the `rayon`
//! feature and a concurrency above 1, [`execute`] hands the batch to a
//! bounded worker pool instead. Either way the batch is one logical
//! operation: under [`FailurePolicy::Abort`] the first failure fails it,
//! and files already written stay on disk.

use std::path::{Path, PathBuf};

use crate::configuration::{ConvertOptions, FailurePolicy};
use crate::error::GeoframeError;
use crate::extraction::{FrameExtractor, output_path};
use crate::geotag;
use crate::progress::ProgressTracker;
use crate::report::RecordFailure;
use crate::synchronization::MergedRecord;
use crate::tagging;

/// Where and how one batch writes its stills.
pub(crate) struct BatchContext<'a> {
    pub(crate) extractor: &'a dyn FrameExtractor,
    pub(crate) output_directory: &'a Path,
    pub(crate) stem: &'a str,
    pub(crate) options: &'a ConvertOptions,
}

/// Files written and records that failed.
#[derive(Debug, Default)]
pub(crate) struct BatchOutcome {
    pub(crate) written: Vec<PathBuf>,
    pub(crate) failures: Vec<RecordFailure>,
}

impl BatchContext<'_> {
    /// Extract and tag one record. The file is named after the frame index,
    /// so repeated runs overwrite the same file.
    pub(crate) fn process(&self, record: &MergedRecord) -> Result<PathBuf, GeoframeError> {
        let tag = geotag::encode(record.latitude, record.longitude, record.elevation)?;
        let path = output_path(self.output_directory, self.stem, record.frame_index);

        self.extractor.extract(
            record.frame_index,
            record.elapsed_time,
            &path,
            self.options.jpeg_quality,
        )?;
        tagging::write_geotag(&path, &tag)?;

        log::info!(
            "Wrote {} ({:.6}, {:.6}, {:.1}m)",
            path.display(),
            record.latitude,
            record.longitude,
            record.elevation
        );
        Ok(path)
    }

    pub(crate) fn tracker(&self, total: usize) -> ProgressTracker {
        ProgressTracker::new(
            self.options.progress.clone(),
            total as u64,
            self.options.batch_size,
        )
    }
}

/// Run every record through `context`.
///
/// # Errors
///
/// - The first record error under [`FailurePolicy::Abort`].
/// - [`GeoframeError::Cancelled`] if the cancellation token fired before
///   every record was started.
pub(crate) fn execute(
    records: &[MergedRecord],
    context: &BatchContext<'_>,
) -> Result<BatchOutcome, GeoframeError> {
    if context.options.concurrency > 1 {
        execute_concurrent(records, context)
    } else {
        execute_sequential(records, context)
    }
}

#[cfg(feature = "rayon")]
fn execute_concurrent(
    records: &[MergedRecord],
    context: &BatchContext<'_>,
) -> Result<BatchOutcome, GeoframeError> {
    crate::rayon::execute_parallel(records, context)
}

#[cfg(not(feature = "rayon"))]
fn execute_concurrent(
    records: &[MergedRecord],
    context: &BatchContext<'_>,
) -> Result<BatchOutcome, GeoframeError> {
    log::warn!(
        "Concurrency of {} requested but the rayon feature is disabled; processing sequentially",
        context.options.concurrency
    );
    execute_sequential(records, context)
}

fn execute_sequential(
    records: &[MergedRecord],
    context: &BatchContext<'_>,
) -> Result<BatchOutcome, GeoframeError> {
    let mut tracker = context.tracker(records.len());
    let mut outcome = BatchOutcome::default();

    for record in records {
        if context.options.is_cancelled() {
            tracker.finish();
            log::warn!(
                "Cancelled after {} of {} records",
                outcome.written.len() + outcome.failures.len(),
                records.len()
            );
            return Err(GeoframeError::Cancelled);
        }

        let result = context.process(record);
        tracker.record(record, result.is_ok());

        match result {
            Ok(path) => outcome.written.push(path),
            Err(error) => match context.options.failure_policy {
                FailurePolicy::Abort => {
                    tracker.finish();
                    return Err(error);
                }
                FailurePolicy::BestEffort => {
                    log::warn!("Skipping frame {}: {error}", record.frame_index);
                    outcome.failures.push(RecordFailure::new(record, &error));
                }
            },
        }
    }

    tracker.finish();
    Ok(outcome)
}
