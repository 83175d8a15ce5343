//! Sampling and conversion configuration.
//!
//! [`SamplingConfig`] describes which part of the video to sample and at
//! what rate; it is resolved against [`VideoMetadata`] into a
//! [`ResolvedSampling`] before any frame is touched. [`ConvertOptions`] is a
//! builder that threads progress callbacks, cancellation, failure policy and
//! output settings through the pipeline without polluting every signature.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use geoframe::{CancellationToken, ConvertOptions, FailurePolicy, SamplingConfig};
//!
//! let sampling = SamplingConfig::new()
//!     .with_start_time(5.0)
//!     .with_target_fps(2.0);
//!
//! let token = CancellationToken::new();
//! let options = ConvertOptions::new()
//!     .with_output_directory("stills")
//!     .with_failure_policy(FailurePolicy::BestEffort)
//!     .with_cancellation(token.clone());
//! ```

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::GeoframeError;
use crate::metadata::VideoMetadata;
use crate::progress::{CancellationToken, ProgressCallback, Silent};

/// Name of the directory created next to the input video when no output
/// directory is configured.
pub const DEFAULT_OUTPUT_DIRECTORY: &str = "res";

/// Default JPEG quality for extracted stills.
pub const DEFAULT_JPEG_QUALITY: u8 = 100;

/// Time range and rate to sample frames at.
///
/// Exactly one of [`with_time_interval`](SamplingConfig::with_time_interval)
/// and [`with_target_fps`](SamplingConfig::with_target_fps) must be set.
/// Unset bounds default to the start and end of the video.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SamplingConfig {
    /// Start of the sampled range in seconds. `None` means 0.
    pub start_time: Option<f64>,
    /// End of the sampled range in seconds (exclusive). `None` means the
    /// video duration.
    pub end_time: Option<f64>,
    /// Seconds between samples.
    pub time_interval: Option<f64>,
    /// Samples per second.
    pub target_fps: Option<f64>,
}

impl SamplingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_start_time(mut self, seconds: f64) -> Self {
        self.start_time = Some(seconds);
        self
    }

    #[must_use]
    pub fn with_end_time(mut self, seconds: f64) -> Self {
        self.end_time = Some(seconds);
        self
    }

    #[must_use]
    pub fn with_time_interval(mut self, seconds: f64) -> Self {
        self.time_interval = Some(seconds);
        self
    }

    #[must_use]
    pub fn with_target_fps(mut self, fps: f64) -> Self {
        self.target_fps = Some(fps);
        self
    }

    /// Validate the configuration and resolve defaults against `video`.
    ///
    /// A clip rate above the native frame rate is clamped down to it, and the
    /// reported interval is recomputed from the clamped rate.
    ///
    /// # Errors
    ///
    /// Returns [`GeoframeError::Configuration`] when the range is empty or
    /// negative, when a value is not finite, or when not exactly one positive
    /// rate parameter is supplied.
    pub fn resolve(&self, video: &VideoMetadata) -> Result<ResolvedSampling, GeoframeError> {
        let start_time = self.start_time.unwrap_or(0.0);
        let end_time = self
            .end_time
            .unwrap_or_else(|| video.duration.as_secs_f64());

        if !start_time.is_finite() || !end_time.is_finite() {
            return Err(GeoframeError::Configuration(format!(
                "start_time ({start_time}) and end_time ({end_time}) must be finite"
            )));
        }
        if start_time < 0.0 {
            return Err(GeoframeError::Configuration(format!(
                "start_time ({start_time}) must not be negative"
            )));
        }
        if end_time <= start_time {
            return Err(GeoframeError::Configuration(format!(
                "end_time ({end_time}) must be greater than start_time ({start_time})"
            )));
        }

        let requested_fps = match (self.time_interval, self.target_fps) {
            (Some(_), Some(_)) => {
                return Err(GeoframeError::Configuration(
                    "time_interval and target_fps are mutually exclusive".to_string(),
                ));
            }
            (None, None) => {
                return Err(GeoframeError::Configuration(
                    "either time_interval or target_fps must be set".to_string(),
                ));
            }
            (Some(interval), None) => {
                if !(interval.is_finite() && interval > 0.0) {
                    return Err(GeoframeError::Configuration(format!(
                        "time_interval ({interval}) must be a positive number of seconds"
                    )));
                }
                1.0 / interval
            }
            (None, Some(fps)) => {
                if !(fps.is_finite() && fps > 0.0) {
                    return Err(GeoframeError::Configuration(format!(
                        "target_fps ({fps}) must be positive"
                    )));
                }
                fps
            }
        };

        let native_fps = video.frame_rate.as_f64();
        let clamped = requested_fps > native_fps;
        let clip_fps = if clamped { native_fps } else { requested_fps };
        let time_interval = match self.time_interval {
            Some(interval) if !clamped => interval,
            _ => 1.0 / clip_fps,
        };

        let resolved = ResolvedSampling {
            start_time,
            end_time,
            clip_fps,
            time_interval,
            clamped,
        };

        log::info!(
            "Sampling {start_time}s..{end_time}s every {time_interval}s ({clip_fps} fps{})",
            if clamped { ", clamped to native rate" } else { "" }
        );

        Ok(resolved)
    }
}

/// A [`SamplingConfig`] with defaults filled in and the rate clamped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedSampling {
    /// Start of the sampled range in seconds.
    pub start_time: f64,
    /// End of the sampled range in seconds (exclusive).
    pub end_time: f64,
    /// Effective samples per second, never above the native frame rate.
    pub clip_fps: f64,
    /// Seconds between samples, `1 / clip_fps` unless given explicitly.
    pub time_interval: f64,
    /// `true` if the requested rate exceeded the native frame rate.
    pub clamped: bool,
}

/// What to do when extracting or tagging a single record fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Stop the batch at the first failure. This is the default.
    #[default]
    Abort,
    /// Record the failure, continue with the remaining records, and report
    /// a partial-success summary at the end.
    BestEffort,
}

/// Operational settings for a conversion run.
///
/// All fields have defaults: sequential processing, abort on first failure,
/// no progress callback, output next to the input video.
#[derive(Clone)]
pub struct ConvertOptions {
    pub(crate) progress: Arc<dyn ProgressCallback>,
    pub(crate) cancellation: Option<CancellationToken>,
    pub(crate) batch_size: u64,
    pub(crate) output_directory: Option<PathBuf>,
    pub(crate) failure_policy: FailurePolicy,
    pub(crate) concurrency: usize,
    pub(crate) jpeg_quality: u8,
}

impl Debug for ConvertOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("ConvertOptions")
            .field("has_cancellation", &self.cancellation.is_some())
            .field("batch_size", &self.batch_size)
            .field("output_directory", &self.output_directory)
            .field("failure_policy", &self.failure_policy)
            .field("concurrency", &self.concurrency)
            .field("jpeg_quality", &self.jpeg_quality)
            .finish()
    }
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl ConvertOptions {
    pub fn new() -> Self {
        Self {
            progress: Arc::new(Silent),
            cancellation: None,
            batch_size: 1,
            output_directory: None,
            failure_policy: FailurePolicy::Abort,
            concurrency: 1,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }

    /// Attach a progress callback, fired every
    /// [`batch_size`](ConvertOptions::with_batch_size) records.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = callback;
        self
    }

    /// Attach a cancellation token. Once cancelled, no new record is started;
    /// records already in flight are finished.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Set how often the progress callback fires. Clamped to a minimum of 1.
    #[must_use]
    pub fn with_batch_size(mut self, size: u64) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// Write stills into `directory` instead of the default sibling directory.
    #[must_use]
    pub fn with_output_directory<P: AsRef<Path>>(mut self, directory: P) -> Self {
        self.output_directory = Some(directory.as_ref().to_path_buf());
        self
    }

    #[must_use]
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Maximum number of records processed at once. Clamped to a minimum of
    /// 1. Values above 1 only take effect with the `rayon` feature.
    #[must_use]
    pub fn with_concurrency(mut self, workers: usize) -> Self {
        self.concurrency = workers.max(1);
        self
    }

    /// JPEG quality for extracted stills, clamped to `1..=100`.
    #[must_use]
    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality.clamp(1, 100);
        self
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        self.failure_policy
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn jpeg_quality(&self) -> u8 {
        self.jpeg_quality
    }

    /// Directory stills are written to for `video_path`.
    pub fn resolve_output_directory(&self, video_path: &Path) -> PathBuf {
        match &self.output_directory {
            Some(directory) => directory.clone(),
            None => video_path
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join(DEFAULT_OUTPUT_DIRECTORY),
        }
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(|token| token.is_cancelled())
    }
}
