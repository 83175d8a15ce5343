//! Frame sampling policy.
//!
//! Turns a [`ResolvedSampling`] range and rate into the concrete list of
//! frame indices to extract. Positions advance in steps of
//! `native_fps / clip_fps` frames from `start_time * native_fps` up to (but
//! excluding) `end_time * native_fps`, are clamped into the video, and are
//! truncated to whole frames. Each sample's time is recomputed from the
//! truncated index so it matches the frame that is actually extracted.
//!
//! Clamping can map several positions onto the last frame when the container
//! duration overstates the decodable frame count. Such duplicates are kept.

use std::time::Duration;

use crate::configuration::{ResolvedSampling, SamplingConfig};
use crate::error::GeoframeError;
use crate::metadata::VideoMetadata;

/// One frame selected for extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSample {
    /// Index in `[0, total_frames - 1]`.
    pub frame_index: u64,
    /// `frame_index / native_fps`.
    pub elapsed_time: Duration,
}

/// Resolve `config` against `video` and compute the frames to extract.
///
/// # Errors
///
/// Returns [`GeoframeError::Configuration`] if `config` does not resolve (see
/// [`SamplingConfig::resolve`]) or the range yields no frames.
///
/// # Example
///
/// ```
/// use std::time::Duration;
///
/// use geoframe::{FrameRate, SamplingConfig, VideoMetadata};
///
/// let video = VideoMetadata::new(300, Duration::from_secs(10), FrameRate::new(30, 1)?)?;
/// let config = SamplingConfig::new().with_target_fps(2.0);
/// let samples = geoframe::sampling::sample(&config, &video)?;
/// assert_eq!(samples.len(), 20);
/// assert_eq!(samples[1].frame_index, 15);
/// # Ok::<(), geoframe::GeoframeError>(())
/// ```
pub fn sample(
    config: &SamplingConfig,
    video: &VideoMetadata,
) -> Result<Vec<FrameSample>, GeoframeError> {
    let resolved = config.resolve(video)?;
    sample_resolved(&resolved, video)
}

/// Compute the frames to extract for an already resolved configuration.
///
/// # Errors
///
/// Returns [`GeoframeError::Configuration`] if the video has no frames or
/// the range yields none.
pub fn sample_resolved(
    resolved: &ResolvedSampling,
    video: &VideoMetadata,
) -> Result<Vec<FrameSample>, GeoframeError> {
    let Some(last_index) = video.total_frames.checked_sub(1) else {
        return Err(GeoframeError::Configuration(
            "video has no frames to sample".to_string(),
        ));
    };
    let native_fps = video.frame_rate.as_f64();
    let start_frame = resolved.start_time * native_fps;
    let end_frame = resolved.end_time * native_fps;
    let step = native_fps / resolved.clip_fps;

    if !(step.is_finite() && step > 0.0) {
        return Err(GeoframeError::Configuration(format!(
            "sampling step of {step} frames is not usable"
        )));
    }

    let count = ((end_frame - start_frame) / step).ceil();
    if !(count >= 1.0) {
        return Err(GeoframeError::Configuration(format!(
            "time range {}s..{}s contains no frames",
            resolved.start_time, resolved.end_time
        )));
    }

    let last_frame = last_index as f64;
    let samples: Vec<FrameSample> = (0..count as u64)
        .map(|position| {
            let frame = (start_frame + position as f64 * step).clamp(0.0, last_frame);
            let frame_index = frame as u64;
            FrameSample {
                frame_index,
                elapsed_time: video.frame_rate.frame_to_duration(frame_index),
            }
        })
        .collect();

    if let (Some(first), Some(last)) = (samples.first(), samples.last()) {
        log::info!(
            "Frame list: {} frames from {} to {}",
            samples.len(),
            first.frame_index,
            last.frame_index
        );
    }

    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::FrameRate;

    fn video(total_frames: u64, seconds: u64, numerator: u32, denominator: u32) -> VideoMetadata {
        VideoMetadata::new(
            total_frames,
            Duration::from_secs(seconds),
            FrameRate::new(numerator, denominator).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn end_is_exclusive() {
        let video = video(300, 10, 30, 1);
        let config = SamplingConfig::new()
            .with_start_time(1.0)
            .with_end_time(2.0)
            .with_time_interval(0.5);
        let frames: Vec<u64> = sample(&config, &video)
            .unwrap()
            .iter()
            .map(|sample| sample.frame_index)
            .collect();
        assert_eq!(frames, vec![30, 45]);
    }

    #[test]
    fn positions_are_truncated_not_rounded() {
        // 29.97 fps sampled at 1 fps: positions 0, 29.97, 59.94, ...
        let video = video(300, 10, 30000, 1001);
        let samples = sample(&SamplingConfig::new().with_target_fps(1.0), &video).unwrap();
        assert_eq!(samples[1].frame_index, 29);
        assert_eq!(samples[2].frame_index, 59);
        assert_eq!(samples[1].elapsed_time, Duration::from_nanos(967_633_333));
    }

    #[test]
    fn positions_beyond_last_frame_are_clamped() {
        // Container reports 10s but only 250 frames were decoded.
        let video = video(250, 10, 30, 1);
        let samples = sample(&SamplingConfig::new().with_target_fps(1.0), &video).unwrap();
        assert_eq!(samples.len(), 10);
        assert_eq!(samples[9].frame_index, 249);
        assert_eq!(samples[8].frame_index, 240);
    }

    #[test]
    fn fractional_steps_skip_frames() {
        // Native 2.5 fps sampled at 2 fps: steps of 1.25 frames.
        let video = video(25, 10, 5, 2);
        let samples = sample(&SamplingConfig::new().with_target_fps(2.0), &video).unwrap();
        let frames: Vec<u64> = samples.iter().take(5).map(|s| s.frame_index).collect();
        assert_eq!(frames, vec![0, 1, 2, 3, 5]);
    }

    #[test]
    fn clamped_tail_repeats_last_frame() {
        let video = video(100, 10, 30, 1);
        let frames: Vec<u64> = sample(&SamplingConfig::new().with_target_fps(10.0), &video)
            .unwrap()
            .iter()
            .map(|sample| sample.frame_index)
            .collect();
        assert_eq!(frames.len(), 100);
        assert_eq!(frames[33], 99);
        assert!(frames[33..].iter().all(|&frame| frame == 99));
    }

    #[test]
    fn frameless_video_is_a_configuration_error() {
        let mut video = video(300, 10, 30, 1);
        video.total_frames = 0;
        assert!(matches!(
            sample(&SamplingConfig::new().with_target_fps(1.0), &video),
            Err(GeoframeError::Configuration(_))
        ));
    }

    #[test]
    fn collapsed_range_is_a_configuration_error() {
        let video = video(300, 10, 30, 1);
        let config = SamplingConfig::new()
            .with_start_time(5.0)
            .with_end_time(5.0)
            .with_target_fps(1.0);
        assert!(matches!(
            sample(&config, &video),
            Err(GeoframeError::Configuration(_))
        ));
    }
}
