//! # geoframe
//!
//! Turn a video and the GPS track recorded alongside it into geotagged
//! still images.
//!
//! `geoframe` samples frames from a video at a fixed rate, places each one
//! on the track by fitting a quadratic spline through the GPS fixes, extracts
//! the frames as JPEG stills with FFmpeg via
//! [`ffmpeg-next`](https://crates.io/crates/ffmpeg-next), and writes the
//! interpolated position into each still's EXIF GPS fields.
//!
//! ## Quick Start
//!
//! ```no_run
//! use geoframe::{FfmpegFrameExtractor, Pipeline, SamplingConfig, VideoProbe, gpx};
//!
//! let video = VideoProbe::probe("ride.mp4")?;
//! let track = gpx::parse_gpx_file("ride.gpx")?;
//!
//! // One still every two seconds.
//! let sampling = SamplingConfig::new().with_time_interval(2.0);
//! let mut pipeline = Pipeline::new("ride.mp4", video, track, sampling);
//! let summary = pipeline.run(&FfmpegFrameExtractor::new("ride.mp4"))?;
//! for path in &summary.written {
//!     println!("{}", path.display());
//! }
//! # Ok::<(), geoframe::GeoframeError>(())
//! ```
//!
//! ### Inspect the Plan Without Writing Anything
//!
//! ```
//! use std::time::Duration;
//!
//! use geoframe::{FrameRate, GpsTrack, Pipeline, SamplingConfig, TrackFix, VideoMetadata};
//!
//! let video = VideoMetadata::new(300, Duration::from_secs(10), FrameRate::new(30, 1)?)?;
//! let track = GpsTrack::new(vec![
//!     TrackFix::new(Duration::ZERO, 35.6895, 139.6917, 40.0),
//!     TrackFix::new(Duration::from_secs(5), 35.6900, 139.6920, 41.0),
//!     TrackFix::new(Duration::from_secs(10), 35.6905, 139.6925, 42.0),
//! ]);
//!
//! let mut pipeline = Pipeline::new("ride.mp4", video, track, SamplingConfig::new().with_target_fps(1.0));
//! let plan = pipeline.plan()?;
//! assert_eq!(plan.records.len(), 10);
//! assert_eq!(plan.records[5].frame_index, 150);
//! # Ok::<(), geoframe::GeoframeError>(())
//! ```
//!
//! ## Stages
//!
//! - **Sampling**: frame indices from a time range and a rate
//!   ([`sampling`], [`SamplingConfig`])
//! - **Interpolation**: a quadratic spline per coordinate, extrapolating
//!   past the ends of the track ([`TrackInterpolant`])
//! - **Synchronization**: positions attached to frames by elapsed time,
//!   with a warning when the video and track durations disagree
//!   ([`synchronization`])
//! - **Extraction**: one JPEG per record ([`FrameExtractor`])
//! - **Tagging**: degree/minute/second rationals written into the EXIF GPS
//!   block ([`geotag`], [`tagging`])
//!
//! ### Optional Features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `rayon` | Records are processed on a bounded worker pool ([`ConvertOptions::with_concurrency`]) |
//! | `full` | Enables all of the above |
//!
//! ## Requirements
//!
//! FFmpeg development libraries must be installed on your system.

mod batch;
pub mod configuration;
pub mod error;
pub mod extraction;
pub mod ffmpeg;
pub mod geotag;
pub mod gpx;
pub mod interpolation;
pub mod jpeg;
pub mod metadata;
pub mod pipeline;
pub mod probe;
pub mod progress;
#[cfg(feature = "rayon")]
mod rayon;
pub mod report;
pub mod sampling;
pub mod synchronization;
pub mod tagging;
pub mod track;
mod utilities;

pub use configuration::{ConvertOptions, FailurePolicy, ResolvedSampling, SamplingConfig};
pub use error::{ErrorKind, GeoframeError};
pub use extraction::{FfmpegFrameExtractor, FrameExtractor};
pub use ffmpeg::{FfmpegLogLevel, set_ffmpeg_log_level};
pub use geotag::GeoTag;
pub use interpolation::{Position, QuadraticSpline, TrackInterpolant};
pub use metadata::{FrameRate, VideoMetadata};
pub use pipeline::{ConversionSummary, Pipeline, PipelineState, Plan};
pub use probe::VideoProbe;
pub use progress::{CancellationToken, ProgressCallback, ProgressInfo};
pub use report::{ConversionReport, RecordFailure};
pub use sampling::FrameSample;
pub use synchronization::MergedRecord;
pub use track::{GpsTrack, TrackFix};
