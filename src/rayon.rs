//! Parallel record processing.
//!
//! Distributes records across a dedicated rayon pool sized to the
//! configured concurrency. Each record's extraction opens its own demuxer,
//! so workers share no decoding state; only the progress tracker is behind a
//! lock. Results are folded back in list order so the reported failure is
//! the earliest one, as in a sequential run.
//!
//! Records that share a frame index (clamped onto the last frame) write the
//! same file, so they are grouped and each group runs on a single worker.
//! Members of a group carry the same time and position, so the group's one
//! still stands for all of them.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{
    Mutex,
    atomic::{AtomicBool, Ordering},
};

use ::rayon::ThreadPoolBuilder;
use ::rayon::iter::{IntoParallelRefIterator, ParallelIterator};

use crate::batch::{BatchContext, BatchOutcome};
use crate::configuration::FailurePolicy;
use crate::error::GeoframeError;
use crate::report::RecordFailure;
use crate::synchronization::MergedRecord;

pub(crate) fn execute_parallel(
    records: &[MergedRecord],
    context: &BatchContext<'_>,
) -> Result<BatchOutcome, GeoframeError> {
    let workers = context.options.concurrency;
    let pool = ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|index| format!("geoframe-worker-{index}"))
        .build()
        .map_err(|error| {
            GeoframeError::Configuration(format!("cannot start {workers} worker threads: {error}"))
        })?;
    log::debug!("Processing {} records on {workers} threads", records.len());

    let (groups, group_of) = group_by_frame(records);
    let tracker = Mutex::new(context.tracker(records.len()));
    let aborted = AtomicBool::new(false);
    let abort_on_failure = context.options.failure_policy == FailurePolicy::Abort;

    let mut results: Vec<Option<Result<PathBuf, GeoframeError>>> = pool.install(|| {
        groups
            .par_iter()
            .map(|members| {
                if context.options.is_cancelled() || aborted.load(Ordering::Acquire) {
                    return None;
                }
                let result = context.process(&records[members[0]]);
                if result.is_err() && abort_on_failure {
                    aborted.store(true, Ordering::Release);
                }
                if let Ok(mut tracker) = tracker.lock() {
                    for &member in members {
                        tracker.record(&records[member], result.is_ok());
                    }
                }
                Some(result)
            })
            .collect()
    });

    if let Ok(mut tracker) = tracker.lock() {
        tracker.finish();
    }

    // Groups are ordered by first occurrence, so the first failed group holds
    // the earliest failed record.
    if abort_on_failure {
        let first_failure = results
            .iter_mut()
            .find(|result| matches!(result, Some(Err(_))))
            .and_then(Option::take);
        if let Some(Err(error)) = first_failure {
            return Err(error);
        }
    }

    let mut outcome = BatchOutcome::default();
    let mut skipped = 0usize;
    for (record, &group) in records.iter().zip(&group_of) {
        match &results[group] {
            Some(Ok(path)) => outcome.written.push(path.clone()),
            Some(Err(error)) => {
                log::warn!("Skipping frame {}: {error}", record.frame_index);
                outcome.failures.push(RecordFailure::new(record, error));
            }
            None => skipped += 1,
        }
    }

    if skipped > 0 {
        log::warn!("Cancelled with {skipped} of {} records not started", records.len());
        return Err(GeoframeError::Cancelled);
    }
    Ok(outcome)
}

/// Positions of records sharing a frame index, in order of first
/// occurrence, and the group each record belongs to.
fn group_by_frame(records: &[MergedRecord]) -> (Vec<Vec<usize>>, Vec<usize>) {
    let mut groups: Vec<Vec<usize>> = Vec::new();
    let mut group_of = Vec::with_capacity(records.len());
    let mut by_frame: HashMap<u64, usize> = HashMap::new();

    for (position, record) in records.iter().enumerate() {
        let group = *by_frame.entry(record.frame_index).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[group].push(position);
        group_of.push(group);
    }
    (groups, group_of)
}
