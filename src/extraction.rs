//! Still-frame extraction.
//!
//! [`FrameExtractor`] is the seam between the pipeline and the video
//! decoder: given a frame index and its timestamp it writes one JPEG still.
//! [`FfmpegFrameExtractor`] is the production implementation; tests and
//! embedders can substitute their own.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ffmpeg_next::{
    Rational,
    codec::context::Context as CodecContext,
    format::Pixel,
    frame::Video as VideoFrame,
    media::Type,
    software::scaling::{Context as ScalingContext, Flags as ScalingFlags},
};
use image::{RgbImage, codecs::jpeg::JpegEncoder};

use crate::error::GeoframeError;
use crate::ffmpeg;
use crate::utilities::{duration_to_seek_target, pts_to_seconds, rgb_frame_to_image};

/// Writes the still for one sampled frame.
///
/// Implementations must be [`Send`] and [`Sync`]: with the `rayon` feature,
/// records are extracted from several worker threads at once.
pub trait FrameExtractor: Send + Sync {
    /// Decode the frame at `frame_index` (`timestamp` into the video) and
    /// write it as a JPEG of the given `quality` (1–100) to `output_path`,
    /// replacing any existing file.
    ///
    /// # Errors
    ///
    /// Returns [`GeoframeError::Extraction`] if the frame cannot be decoded
    /// or written.
    fn extract(
        &self,
        frame_index: u64,
        timestamp: Duration,
        output_path: &Path,
        quality: u8,
    ) -> Result<(), GeoframeError>;
}

/// Output file for a frame: `<directory>/<stem>_<frame_index:06>.jpeg`.
///
/// Indices beyond six digits are written in full.
pub fn output_path(directory: &Path, stem: &str, frame_index: u64) -> PathBuf {
    directory.join(format!("{stem}_{frame_index:06}.jpeg"))
}

/// Encode `image` as a baseline JPEG at `quality` (1–100).
///
/// # Errors
///
/// Returns [`GeoframeError::IoError`] or [`GeoframeError::ImageError`] if
/// the file cannot be created or encoded.
pub fn save_jpeg(image: &RgbImage, path: &Path, quality: u8) -> Result<(), GeoframeError> {
    let writer = BufWriter::new(File::create(path)?);
    let mut encoder = JpegEncoder::new_with_quality(writer, quality.clamp(1, 100));
    encoder.encode_image(image)?;
    Ok(())
}

/// Extracts frames with FFmpeg.
///
/// Every call opens its own demuxer and decoder, seeks to the keyframe
/// before the target and decodes forward to the first frame at or after the
/// requested timestamp. Calls are independent and may run concurrently.
#[derive(Debug, Clone)]
pub struct FfmpegFrameExtractor {
    video_path: PathBuf,
}

impl FfmpegFrameExtractor {
    pub fn new<P: AsRef<Path>>(video_path: P) -> Self {
        Self {
            video_path: video_path.as_ref().to_path_buf(),
        }
    }

    pub fn video_path(&self) -> &Path {
        &self.video_path
    }

    /// Decode the frame shown at `timestamp`.
    ///
    /// # Errors
    ///
    /// Returns an FFmpeg, I/O or [`GeoframeError::NoVideoStream`] error if
    /// decoding fails, or [`GeoframeError::FfmpegError`] if no frame at or
    /// after `timestamp` exists.
    pub fn decode_frame(&self, timestamp: Duration) -> Result<RgbImage, GeoframeError> {
        ffmpeg::initialize(&self.video_path)?;
        let mut input_context = ffmpeg_next::format::input(&self.video_path)
            .map_err(|error| GeoframeError::input(&self.video_path, error))?;

        let stream = input_context
            .streams()
            .best(Type::Video)
            .ok_or(GeoframeError::NoVideoStream)?;
        let stream_index = stream.index();
        let time_base = stream.time_base();
        let start_seconds = if stream.start_time() > 0 {
            pts_to_seconds(stream.start_time(), time_base)
        } else {
            0.0
        };
        let frame_seconds = {
            let rate = stream.avg_frame_rate();
            if rate.numerator() > 0 && rate.denominator() > 0 {
                rate.denominator() as f64 / rate.numerator() as f64
            } else {
                0.0
            }
        };

        let decoder_context = CodecContext::from_parameters(stream.parameters())?;
        let mut decoder = decoder_context.decoder().video()?;
        let width = decoder.width();
        let height = decoder.height();
        let mut scaler = ScalingContext::get(
            decoder.format(),
            width,
            height,
            Pixel::RGB24,
            width,
            height,
            ScalingFlags::BILINEAR,
        )?;

        // Half a frame of slack so rounding in the container's timestamps
        // never skips the intended frame.
        let target_seconds = timestamp.as_secs_f64() - 0.5 * frame_seconds;
        let seek_target = duration_to_seek_target(timestamp);
        input_context.seek(seek_target, ..seek_target)?;

        let mut clock = FrameClock::new(time_base, start_seconds, frame_seconds, target_seconds);
        let mut decoded_frame = VideoFrame::empty();
        let mut rgb_frame = VideoFrame::empty();
        let mut reached = |frame: &VideoFrame| {
            clock.seconds(frame.timestamp().or(frame.pts())) >= target_seconds
        };

        for (stream, packet) in input_context.packets() {
            if stream.index() != stream_index {
                continue;
            }
            decoder.send_packet(&packet)?;
            while decoder.receive_frame(&mut decoded_frame).is_ok() {
                if reached(&decoded_frame) {
                    scaler.run(&decoded_frame, &mut rgb_frame)?;
                    return rgb_frame_to_image(&rgb_frame);
                }
            }
        }

        decoder.send_eof()?;
        while decoder.receive_frame(&mut decoded_frame).is_ok() {
            if reached(&decoded_frame) {
                scaler.run(&decoded_frame, &mut rgb_frame)?;
                return rgb_frame_to_image(&rgb_frame);
            }
        }

        Err(GeoframeError::FfmpegError(format!(
            "no frame at or after {:.3}s in the video stream",
            timestamp.as_secs_f64()
        )))
    }
}

impl FrameExtractor for FfmpegFrameExtractor {
    fn extract(
        &self,
        frame_index: u64,
        timestamp: Duration,
        output_path: &Path,
        quality: u8,
    ) -> Result<(), GeoframeError> {
        let to_extraction = |error: GeoframeError| match error {
            GeoframeError::Extraction { .. } => error,
            other => GeoframeError::Extraction {
                frame_index,
                reason: other.to_string(),
            },
        };

        let image = self.decode_frame(timestamp).map_err(to_extraction)?;
        save_jpeg(&image, output_path, quality).map_err(to_extraction)?;
        log::debug!(
            "Extracted frame {frame_index} ({:.3}s) to {}",
            timestamp.as_secs_f64(),
            output_path.display()
        );
        Ok(())
    }
}

/// Presentation time of decoded frames, relative to the stream start.
///
/// Some streams emit frames with neither a best-effort timestamp nor a PTS.
/// Those are placed one frame after the previous decoded frame; an untimed
/// first frame is assumed to sit at the seek target.
struct FrameClock {
    time_base: Rational,
    start_seconds: f64,
    frame_seconds: f64,
    seek_seconds: f64,
    previous: Option<f64>,
}

impl FrameClock {
    fn new(time_base: Rational, start_seconds: f64, frame_seconds: f64, seek_seconds: f64) -> Self {
        Self {
            time_base,
            start_seconds,
            frame_seconds,
            seek_seconds,
            previous: None,
        }
    }

    fn seconds(&mut self, pts: Option<i64>) -> f64 {
        let seconds = match (pts, self.previous) {
            (Some(pts), _) => pts_to_seconds(pts, self.time_base) - self.start_seconds,
            (None, Some(previous)) => previous + self.frame_seconds,
            (None, None) => {
                log::warn!(
                    "Decoded frame has no timestamp; assuming it is the frame at {:.3}s",
                    self.seek_seconds
                );
                self.seek_seconds
            }
        };
        self.previous = Some(seconds);
        seconds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_names_are_zero_padded() {
        let path = output_path(Path::new("res"), "ride", 42);
        assert_eq!(path, Path::new("res").join("ride_000042.jpeg"));

        let path = output_path(Path::new("res"), "ride", 1_234_567);
        assert_eq!(path, Path::new("res").join("ride_1234567.jpeg"));
    }

    #[test]
    fn save_jpeg_writes_decodable_file() {
        let directory = tempfile::tempdir().unwrap();
        let path = directory.path().join("still.jpeg");
        let image = RgbImage::from_pixel(16, 8, image::Rgb([200, 40, 40]));

        save_jpeg(&image, &path, 90).unwrap();
        let decoded = image::open(&path).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (16, 8));
    }

    #[test]
    fn untimed_frames_follow_the_previous_frame() {
        let mut clock = FrameClock::new(Rational::new(1, 1000), 0.5, 0.04, 2.0);
        assert_eq!(clock.seconds(Some(2_500)), 2.0);
        assert!((clock.seconds(None) - 2.04).abs() < 1e-12);
        assert!((clock.seconds(None) - 2.08).abs() < 1e-12);
        assert!((clock.seconds(Some(2_620)) - 2.12).abs() < 1e-12);
    }

    #[test]
    fn untimed_first_frame_sits_at_the_seek_target() {
        let mut clock = FrameClock::new(Rational::new(1, 90_000), 0.0, 1.0 / 30.0, 4.0);
        assert_eq!(clock.seconds(None), 4.0);
        assert!((clock.seconds(None) - (4.0 + 1.0 / 30.0)).abs() < 1e-12);
    }

    #[test]
    fn missing_video_is_an_extraction_error() {
        let directory = tempfile::tempdir().unwrap();
        let extractor = FfmpegFrameExtractor::new(directory.path().join("missing.mp4"));
        let error = extractor
            .extract(7, Duration::ZERO, &directory.path().join("out.jpeg"), 90)
            .unwrap_err();
        assert!(matches!(
            error,
            GeoframeError::Extraction { frame_index: 7, .. }
        ));
    }
}
