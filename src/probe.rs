//! Video stream probing.
//!
//! [`VideoProbe`] reads the values the pipeline needs (frame count,
//! duration, native frame rate, creation time) from a video container and
//! closes the demuxer again. Extraction opens its own demuxer per frame, so
//! nothing is kept open between the two.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, FixedOffset};
use ffmpeg_next::{codec::context::Context as CodecContext, media::Type};

use crate::error::GeoframeError;
use crate::ffmpeg;
use crate::metadata::{FrameRate, VideoMetadata};
use crate::utilities::{positive_ratio, pts_to_seconds};

const CREATION_TIME_TAG: &str = "creation_time";

/// Video file probe.
///
/// # Example
///
/// ```no_run
/// use geoframe::VideoProbe;
///
/// let video = VideoProbe::probe("ride.mp4")?;
/// println!(
///     "{} frames at {} fps over {:?}",
///     video.total_frames, video.frame_rate, video.duration
/// );
/// # Ok::<(), geoframe::GeoframeError>(())
/// ```
pub struct VideoProbe;

impl VideoProbe {
    /// Read the metadata of the best video stream in `path`.
    ///
    /// The frame count comes from the stream header, falling back to
    /// `floor(duration × fps)` when the container does not record one. The
    /// frame rate is the stream's base rate, falling back to its average
    /// rate.
    ///
    /// # Errors
    ///
    /// - [`GeoframeError::Input`] if the file cannot be opened or lacks a
    ///   usable frame rate, duration or frame count.
    /// - [`GeoframeError::NoVideoStream`] if it holds no video stream.
    pub fn probe<P: AsRef<Path>>(path: P) -> Result<VideoMetadata, GeoframeError> {
        let path = path.as_ref();
        ffmpeg::initialize(path)?;

        let input_context =
            ffmpeg_next::format::input(&path).map_err(|error| GeoframeError::input(path, error))?;
        let stream = input_context
            .streams()
            .best(Type::Video)
            .ok_or(GeoframeError::NoVideoStream)?;

        let (numerator, denominator) = positive_ratio(stream.rate())
            .or_else(|| positive_ratio(stream.avg_frame_rate()))
            .ok_or_else(|| GeoframeError::input(path, "video stream has no frame rate"))?;
        let frame_rate = FrameRate::new(numerator, denominator)?;

        let duration = if input_context.duration() > 0 {
            Duration::from_micros(input_context.duration() as u64)
        } else if stream.duration() > 0 {
            Duration::from_secs_f64(pts_to_seconds(stream.duration(), stream.time_base()))
        } else {
            return Err(GeoframeError::input(path, "container reports no duration"));
        };

        let total_frames = if stream.frames() > 0 {
            stream.frames() as u64
        } else {
            let estimated = (duration.as_secs_f64() * frame_rate.as_f64()).floor() as u64;
            log::debug!(
                "{} does not record a frame count, estimated {estimated} from the duration",
                path.display()
            );
            estimated
        };
        if total_frames == 0 {
            return Err(GeoframeError::input(path, "video stream contains no frames"));
        }

        let container_tags = input_context.metadata();
        let stream_tags = stream.metadata();
        let creation_time = container_tags
            .get(CREATION_TIME_TAG)
            .or_else(|| stream_tags.get(CREATION_TIME_TAG))
            .and_then(parse_creation_time);

        let decoder = CodecContext::from_parameters(stream.parameters())
            .and_then(|context| context.decoder().video())
            .map_err(|error| {
                GeoframeError::input(path, format!("failed to open video decoder: {error}"))
            })?;

        let mut video = VideoMetadata::new(total_frames, duration, frame_rate)?;
        video.width = decoder.width();
        video.height = decoder.height();
        video.codec = stream.parameters().id().name().to_string();
        if let Some(creation_time) = creation_time {
            video = video.with_creation_time(creation_time);
        }

        log::info!(
            "Probed {}: {} frames, {} fps, {:.3}s, {}x{} {}",
            path.display(),
            video.total_frames,
            video.frame_rate,
            video.duration.as_secs_f64(),
            video.width,
            video.height,
            video.codec
        );
        Ok(video)
    }
}

fn parse_creation_time(value: &str) -> Option<DateTime<FixedOffset>> {
    match DateTime::parse_from_rfc3339(value) {
        Ok(time) => Some(time),
        Err(error) => {
            log::debug!("Ignoring unparseable creation_time '{value}': {error}");
            None
        }
    }
}
