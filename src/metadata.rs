//! Video metadata types.
//!
//! [`VideoMetadata`] is produced once by [`VideoProbe`](crate::VideoProbe)
//! and passed by reference into every stage that needs the video clock. The
//! native frame rate is kept as an exact [`FrameRate`] ratio so frame index
//! to timestamp conversions never accumulate rounding drift.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::time::Duration;

use chrono::{DateTime, FixedOffset};

use crate::error::GeoframeError;

const NANOS_PER_SECOND: u128 = 1_000_000_000;

/// A frame rate expressed as an exact ratio of two integers (e.g. `30000/1001`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameRate {
    numerator: u32,
    denominator: u32,
}

impl FrameRate {
    /// Create a frame rate of `numerator / denominator` frames per second.
    ///
    /// # Errors
    ///
    /// Returns [`GeoframeError::Configuration`] if either term is zero.
    pub fn new(numerator: u32, denominator: u32) -> Result<Self, GeoframeError> {
        if numerator == 0 || denominator == 0 {
            return Err(GeoframeError::Configuration(format!(
                "frame rate {numerator}/{denominator} is not a positive ratio"
            )));
        }
        Ok(Self {
            numerator,
            denominator,
        })
    }

    pub fn numerator(&self) -> u32 {
        self.numerator
    }

    pub fn denominator(&self) -> u32 {
        self.denominator
    }

    /// Frames per second as a float.
    pub fn as_f64(&self) -> f64 {
        self.numerator as f64 / self.denominator as f64
    }

    /// Presentation time of `frame_index`, computed exactly as
    /// `frame_index * denominator / numerator` and floored to the nanosecond.
    pub fn frame_to_duration(&self, frame_index: u64) -> Duration {
        let nanos = frame_index as u128 * self.denominator as u128 * NANOS_PER_SECOND
            / self.numerator as u128;
        let seconds = (nanos / NANOS_PER_SECOND) as u64;
        let subsec = (nanos % NANOS_PER_SECOND) as u32;
        Duration::new(seconds, subsec)
    }
}

impl Display for FrameRate {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

/// Metadata for the video being sampled.
///
/// # Example
///
/// ```
/// use std::time::Duration;
///
/// use geoframe::{FrameRate, VideoMetadata};
///
/// let video = VideoMetadata::new(300, Duration::from_secs(10), FrameRate::new(30, 1)?)?;
/// assert_eq!(video.frame_rate.as_f64(), 30.0);
/// # Ok::<(), geoframe::GeoframeError>(())
/// ```
#[derive(Debug, Clone)]
#[must_use]
pub struct VideoMetadata {
    /// Number of frames in the stream. Always at least 1.
    pub total_frames: u64,
    /// Container duration.
    pub duration: Duration,
    /// Native frame rate as an exact ratio.
    pub frame_rate: FrameRate,
    /// Recording start time from the container tags, when present.
    pub creation_time: Option<DateTime<FixedOffset>>,
    /// Frame width in pixels (0 when unknown).
    pub width: u32,
    /// Frame height in pixels (0 when unknown).
    pub height: u32,
    /// Codec name (e.g. `"h264"`, `"hevc"`).
    pub codec: String,
}

impl VideoMetadata {
    /// Build metadata from the three values sampling depends on.
    ///
    /// # Errors
    ///
    /// Returns [`GeoframeError::Configuration`] if `total_frames` is zero.
    pub fn new(
        total_frames: u64,
        duration: Duration,
        frame_rate: FrameRate,
    ) -> Result<Self, GeoframeError> {
        if total_frames == 0 {
            return Err(GeoframeError::Configuration(
                "video must contain at least one frame".to_string(),
            ));
        }
        Ok(Self {
            total_frames,
            duration,
            frame_rate,
            creation_time: None,
            width: 0,
            height: 0,
            codec: String::from("unknown"),
        })
    }

    /// Attach the container creation time.
    pub fn with_creation_time(mut self, creation_time: DateTime<FixedOffset>) -> Self {
        self.creation_time = Some(creation_time);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ntsc_frame_times_are_exact() {
        let rate = FrameRate::new(30000, 1001).unwrap();
        assert_eq!(rate.frame_to_duration(0), Duration::ZERO);
        assert_eq!(rate.frame_to_duration(30000), Duration::from_secs(1001));
        assert_eq!(rate.frame_to_duration(1), Duration::from_nanos(33_366_666));
    }

    #[test]
    fn zero_terms_are_rejected() {
        assert!(FrameRate::new(0, 1).is_err());
        assert!(FrameRate::new(30, 0).is_err());
    }

    #[test]
    fn empty_video_is_rejected() {
        let rate = FrameRate::new(30, 1).unwrap();
        assert!(VideoMetadata::new(0, Duration::from_secs(1), rate).is_err());
    }
}
