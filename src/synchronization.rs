//! Video/track clock alignment.
//!
//! Both clocks are aligned on elapsed time: frame time since the start of the
//! video, fix time since the first GPS fix. [`merge`] evaluates the track
//! interpolant at every sampled frame time; [`check_durations`] flags tracks
//! whose span disagrees with the video duration, which usually means the two
//! were not started together.

use std::time::Duration;

use crate::interpolation::{Position, TrackInterpolant};
use crate::metadata::VideoMetadata;
use crate::sampling::FrameSample;
use crate::track::GpsTrack;

/// Largest video/track duration difference that is not reported.
pub const DURATION_TOLERANCE: Duration = Duration::from_secs(1);

/// A sampled frame with its interpolated position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MergedRecord {
    pub frame_index: u64,
    pub elapsed_time: Duration,
    pub latitude: f64,
    pub longitude: f64,
    pub elevation: f64,
    /// `true` if `elapsed_time` lies outside the track's time span.
    pub extrapolated: bool,
}

impl MergedRecord {
    pub fn position(&self) -> Position {
        Position {
            latitude: self.latitude,
            longitude: self.longitude,
            elevation: self.elevation,
        }
    }
}

/// Attach an interpolated position to every sample, preserving order.
pub fn merge(samples: &[FrameSample], interpolant: &TrackInterpolant) -> Vec<MergedRecord> {
    let records: Vec<MergedRecord> = samples
        .iter()
        .map(|sample| {
            let position = interpolant.evaluate(sample.elapsed_time);
            MergedRecord {
                frame_index: sample.frame_index,
                elapsed_time: sample.elapsed_time,
                latitude: position.latitude,
                longitude: position.longitude,
                elevation: position.elevation,
                extrapolated: interpolant.is_extrapolated(sample.elapsed_time),
            }
        })
        .collect();

    let extrapolated = records.iter().filter(|record| record.extrapolated).count();
    if extrapolated > 0 {
        log::debug!(
            "{extrapolated} of {} records lie outside the track and were extrapolated",
            records.len()
        );
    }
    records
}

/// Compare the video duration with the track span.
///
/// Returns a warning message when they differ by more than
/// [`DURATION_TOLERANCE`]. The mismatch is never an error.
pub fn check_durations(video: &VideoMetadata, track: &GpsTrack) -> Option<String> {
    let video_seconds = video.duration.as_secs_f64();
    let track_seconds = track.span().as_secs_f64();
    let difference = (video_seconds - track_seconds).abs();

    (difference > DURATION_TOLERANCE.as_secs_f64()).then(|| {
        let message = format!(
            "video duration ({video_seconds:.3}s) and track span ({track_seconds:.3}s) differ by \
             {difference:.3}s; late frames may not line up with late track points"
        );
        log::warn!("{message}");
        message
    })
}
