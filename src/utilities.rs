//! Internal helpers shared by probing and extraction.

use std::time::Duration;

use ffmpeg_next::{Rational, frame::Video as VideoFrame};
use image::RgbImage;

use crate::error::GeoframeError;

/// Turn a scaled RGB24 frame into an [`RgbImage`].
///
/// Rows in FFmpeg planes may be padded past `width * 3` bytes; only the
/// visible pixels are kept.
pub(crate) fn rgb_frame_to_image(rgb_frame: &VideoFrame) -> Result<RgbImage, GeoframeError> {
    let (width, height) = (rgb_frame.width(), rgb_frame.height());
    if width == 0 || height == 0 || rgb_frame.planes() == 0 {
        return Err(GeoframeError::FfmpegError(format!(
            "scaled frame is empty ({width}x{height})"
        )));
    }

    let visible = width as usize * 3;
    let stride = rgb_frame.stride(0);
    if stride < visible {
        return Err(GeoframeError::FfmpegError(format!(
            "scaled frame rows are {stride} bytes, {width} RGB24 pixels need {visible}"
        )));
    }

    let plane = rgb_frame.data(0);
    let needed = stride * (height as usize - 1) + visible;
    if plane.len() < needed {
        return Err(GeoframeError::FfmpegError(format!(
            "scaled frame holds {} bytes, {width}x{height} RGB24 needs {needed}",
            plane.len()
        )));
    }

    let pixels: Vec<u8> = plane
        .chunks(stride)
        .take(height as usize)
        .flat_map(|row| &row[..visible])
        .copied()
        .collect();
    RgbImage::from_raw(width, height, pixels).ok_or_else(|| {
        GeoframeError::FfmpegError(format!("scaled frame has fewer than {width}x{height} pixels"))
    })
}

/// Convert an FFmpeg rational to `(numerator, denominator)` if both parts
/// are positive.
pub(crate) fn positive_ratio(rational: Rational) -> Option<(u32, u32)> {
    let numerator = u32::try_from(rational.numerator()).ok()?;
    let denominator = u32::try_from(rational.denominator()).ok()?;
    (numerator > 0 && denominator > 0).then_some((numerator, denominator))
}

/// Seconds represented by `pts` in `time_base`.
pub(crate) fn pts_to_seconds(pts: i64, time_base: Rational) -> f64 {
    pts as f64 * time_base.numerator() as f64 / time_base.denominator() as f64
}

/// Container seek target (`AV_TIME_BASE` microseconds) for `timestamp`.
pub(crate) fn duration_to_seek_target(timestamp: Duration) -> i64 {
    i64::try_from(timestamp.as_micros()).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use ffmpeg_next::format::Pixel;

    use super::*;

    #[test]
    fn row_padding_is_dropped() {
        let mut frame = VideoFrame::new(Pixel::RGB24, 5, 3);
        let stride = frame.stride(0);
        assert!(stride >= 15);
        for (row, line) in frame.data_mut(0).chunks_mut(stride).enumerate() {
            line.fill(0xEE);
            line[..15].fill(row as u8 + 1);
        }

        let image = rgb_frame_to_image(&frame).unwrap();
        assert_eq!(image.dimensions(), (5, 3));
        for (row, pixels) in image.rows().enumerate() {
            assert!(pixels.into_iter().all(|pixel| pixel.0 == [row as u8 + 1; 3]));
        }
    }

    #[test]
    fn empty_frame_is_rejected() {
        assert!(matches!(
            rgb_frame_to_image(&VideoFrame::empty()),
            Err(GeoframeError::FfmpegError(_))
        ));
    }

    #[test]
    fn pts_in_ninety_khz() {
        let time_base = Rational::new(1, 90_000);
        assert_eq!(pts_to_seconds(45_000, time_base), 0.5);
    }

    #[test]
    fn zero_ratio_is_rejected() {
        assert_eq!(positive_ratio(Rational::new(30000, 1001)), Some((30000, 1001)));
        assert_eq!(positive_ratio(Rational::new(0, 1)), None);
        assert_eq!(positive_ratio(Rational::new(25, 0)), None);
    }
}
