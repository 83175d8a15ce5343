//! Error types for the `geoframe` crate.
//!
//! This module defines [`GeoframeError`], the unified error type returned by
//! every fallible operation in the crate, and [`ErrorKind`], which folds the
//! variants into the five pipeline failure categories (configuration, input,
//! interpolation, extraction, encoding).

use std::{io::Error as IoError, path::PathBuf};

use ffmpeg_next::Error as FfmpegError;
use image::ImageError;
use thiserror::Error;

/// The unified error type for all `geoframe` operations.
///
/// Variants carry enough context (paths, frame indices, upstream messages)
/// to diagnose a failure without additional logging at the call site.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GeoframeError {
    /// Sampling parameters are invalid or contradictory.
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// The video or track source could not be read or is malformed.
    #[error("Failed to read input {path}: {reason}")]
    Input {
        /// Path of the offending source.
        path: PathBuf,
        /// Underlying reason the read failed.
        reason: String,
    },

    /// The GPS track cannot be turned into an interpolant.
    #[error("Interpolation error: {0}")]
    Interpolation(String),

    /// A still frame could not be extracted for a record.
    #[error("Failed to extract frame {frame_index}: {reason}")]
    Extraction {
        /// Frame index of the record being extracted.
        frame_index: u64,
        /// Underlying reason the extraction failed.
        reason: String,
    },

    /// The geotag could not be written into an image's metadata block.
    #[error("Failed to write geotag to {path}: {reason}")]
    Encoding {
        /// Image whose metadata could not be rewritten.
        path: PathBuf,
        /// Underlying reason the write failed.
        reason: String,
    },

    /// A coordinate cannot be represented as an EXIF geotag.
    #[error("Coordinate cannot be encoded: latitude {latitude}, longitude {longitude}, elevation {elevation}")]
    InvalidCoordinate {
        /// Latitude in degrees.
        latitude: f64,
        /// Longitude in degrees.
        longitude: f64,
        /// Elevation in meters.
        elevation: f64,
    },

    /// The file does not contain a video stream.
    #[error("No video stream found in file")]
    NoVideoStream,

    /// An error originating from the FFmpeg libraries.
    #[error("FFmpeg error: {0}")]
    FfmpegError(String),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    IoError(#[from] IoError),

    /// An error from the `image` crate while encoding a still.
    #[error("Image processing error: {0}")]
    ImageError(#[from] ImageError),

    /// The batch was cancelled via a [`CancellationToken`](crate::CancellationToken).
    #[error("Operation cancelled")]
    Cancelled,

    /// A best-effort batch finished with per-record failures.
    #[error("{failed} of {total} records failed")]
    BatchFailed {
        /// Number of records that failed.
        failed: usize,
        /// Number of records in the batch.
        total: usize,
    },
}

/// Failure category of a [`GeoframeError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid sampling parameters. Fatal before any work begins.
    Configuration,
    /// Unreadable or malformed video/track source. Fatal before sampling.
    Input,
    /// Unusable track. Fatal before any frame is processed.
    Interpolation,
    /// Per-record frame extraction failure.
    Extraction,
    /// Per-record metadata write failure.
    Encoding,
    /// Cooperative cancellation.
    Cancelled,
    /// Anything else (aggregated batch failures, raw I/O).
    Other,
}

impl GeoframeError {
    /// Classify this error into its pipeline failure category.
    pub fn kind(&self) -> ErrorKind {
        match self {
            GeoframeError::Configuration(_) => ErrorKind::Configuration,
            GeoframeError::Input { .. } | GeoframeError::NoVideoStream => ErrorKind::Input,
            GeoframeError::Interpolation(_) => ErrorKind::Interpolation,
            GeoframeError::Extraction { .. }
            | GeoframeError::FfmpegError(_)
            | GeoframeError::ImageError(_) => ErrorKind::Extraction,
            GeoframeError::Encoding { .. } | GeoframeError::InvalidCoordinate { .. } => {
                ErrorKind::Encoding
            }
            GeoframeError::Cancelled => ErrorKind::Cancelled,
            GeoframeError::IoError(_) | GeoframeError::BatchFailed { .. } => ErrorKind::Other,
        }
    }

    pub(crate) fn input(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        GeoframeError::Input {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn encoding(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        GeoframeError::Encoding {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<FfmpegError> for GeoframeError {
    fn from(error: FfmpegError) -> Self {
        GeoframeError::FfmpegError(error.to_string())
    }
}
