//! The conversion orchestrator.
//!
//! A [`Pipeline`] moves strictly forward through
//! `Init → Configured → Sampled → Synced → Extracting → Done`. The first
//! three transitions are pure and run together (see [`Pipeline::plan`]);
//! any error there is terminal and nothing is written to disk.
//! [`Pipeline::run`] then extracts and tags every record.
//!
//! # Example
//!
//! ```no_run
//! use geoframe::{
//!     ConvertOptions, FfmpegFrameExtractor, Pipeline, SamplingConfig, VideoProbe, gpx,
//! };
//!
//! let video = VideoProbe::probe("ride.mp4")?;
//! let track = gpx::parse_gpx_file("ride.gpx")?;
//! let sampling = SamplingConfig::new().with_target_fps(1.0);
//!
//! let mut pipeline = Pipeline::new("ride.mp4", video, track, sampling)
//!     .with_options(ConvertOptions::new().with_output_directory("stills"));
//! let summary = pipeline.run(&FfmpegFrameExtractor::new("ride.mp4"))?;
//! println!("{} stills written", summary.written.len());
//! print!("{}", summary.report);
//! # Ok::<(), geoframe::GeoframeError>(())
//! ```

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::fs;
use std::path::{Path, PathBuf};

use crate::batch::{self, BatchContext};
use crate::configuration::{ConvertOptions, ResolvedSampling, SamplingConfig};
use crate::error::GeoframeError;
use crate::extraction::FrameExtractor;
use crate::interpolation::TrackInterpolant;
use crate::metadata::VideoMetadata;
use crate::report::ConversionReport;
use crate::sampling;
use crate::synchronization::{self, MergedRecord};
use crate::track::GpsTrack;

/// Orchestrator state. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PipelineState {
    Init,
    Configured,
    Sampled,
    Synced,
    Extracting,
    Done,
    /// A stage failed. Terminal.
    Failed,
}

impl Display for PipelineState {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let name = match self {
            PipelineState::Init => "init",
            PipelineState::Configured => "configured",
            PipelineState::Sampled => "sampled",
            PipelineState::Synced => "synced",
            PipelineState::Extracting => "extracting",
            PipelineState::Done => "done",
            PipelineState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// The outcome of [`Pipeline::plan`]: what a run would do.
#[derive(Debug, Clone)]
pub struct Plan {
    pub sampling: ResolvedSampling,
    /// One record per sampled frame, in sampling order.
    pub records: Vec<MergedRecord>,
    pub report: ConversionReport,
}

/// The outcome of [`Pipeline::run`].
#[derive(Debug, Clone)]
pub struct ConversionSummary {
    pub output_directory: PathBuf,
    /// Stills written and tagged, in record order.
    pub written: Vec<PathBuf>,
    /// Records attempted, including failures.
    pub total: usize,
    pub report: ConversionReport,
}

impl ConversionSummary {
    /// Turn recorded best-effort failures into an error.
    ///
    /// # Errors
    ///
    /// Returns [`GeoframeError::BatchFailed`] if any record failed.
    pub fn into_result(self) -> Result<Self, GeoframeError> {
        if self.report.failures.is_empty() {
            Ok(self)
        } else {
            Err(GeoframeError::BatchFailed {
                failed: self.report.failures.len(),
                total: self.total,
            })
        }
    }
}

/// Converts one video and its track into geotagged stills.
pub struct Pipeline {
    video_path: PathBuf,
    video: VideoMetadata,
    track: GpsTrack,
    sampling: SamplingConfig,
    options: ConvertOptions,
    state: PipelineState,
    plan: Option<Plan>,
}

impl Pipeline {
    pub fn new<P: AsRef<Path>>(
        video_path: P,
        video: VideoMetadata,
        track: GpsTrack,
        sampling: SamplingConfig,
    ) -> Self {
        Self {
            video_path: video_path.as_ref().to_path_buf(),
            video,
            track,
            sampling,
            options: ConvertOptions::default(),
            state: PipelineState::Init,
            plan: None,
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: ConvertOptions) -> Self {
        self.options = options;
        self
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Resolve the configuration, sample frames and attach positions,
    /// without touching the filesystem. Stops in [`PipelineState::Synced`].
    ///
    /// Calling it again returns the same plan.
    ///
    /// # Errors
    ///
    /// - [`GeoframeError::Configuration`] if the sampling parameters are
    ///   invalid or the pipeline already ran.
    /// - [`GeoframeError::Interpolation`] if the track is unusable.
    pub fn plan(&mut self) -> Result<Plan, GeoframeError> {
        if let Some(plan) = &self.plan {
            return Ok(plan.clone());
        }
        if self.state != PipelineState::Init {
            return Err(GeoframeError::Configuration(format!(
                "pipeline cannot be planned in the {} state",
                self.state
            )));
        }

        match self.prepare() {
            Ok(plan) => {
                self.plan = Some(plan.clone());
                Ok(plan)
            }
            Err(error) => Err(self.fail(error)),
        }
    }

    /// Plan (if not done yet), then extract and tag every record.
    ///
    /// # Errors
    ///
    /// Everything [`plan`](Pipeline::plan) returns, plus:
    /// - the first per-record error under
    ///   [`FailurePolicy::Abort`](crate::FailurePolicy::Abort);
    /// - [`GeoframeError::Cancelled`] if cancelled mid-batch;
    /// - [`GeoframeError::IoError`] if the output directory cannot be
    ///   created.
    pub fn run(&mut self, extractor: &dyn FrameExtractor) -> Result<ConversionSummary, GeoframeError> {
        let plan = self.plan()?;
        if self.state != PipelineState::Synced {
            return Err(GeoframeError::Configuration(format!(
                "pipeline cannot run in the {} state",
                self.state
            )));
        }
        self.transition(PipelineState::Extracting);

        match self.extract(extractor, plan) {
            Ok(summary) => {
                self.transition(PipelineState::Done);
                Ok(summary)
            }
            Err(error) => Err(self.fail(error)),
        }
    }

    fn prepare(&mut self) -> Result<Plan, GeoframeError> {
        let mut report = ConversionReport::default();

        let resolved = self.sampling.resolve(&self.video)?;
        report.info(format!(
            "Sampling {:.3}s..{:.3}s at {:.3} fps (every {:.3}s) from a {} fps video",
            resolved.start_time,
            resolved.end_time,
            resolved.clip_fps,
            resolved.time_interval,
            self.video.frame_rate
        ));
        if resolved.clamped {
            report.warn(format!(
                "Requested rate exceeds the native frame rate; clamped to {:.3} fps",
                resolved.clip_fps
            ));
        }
        self.transition(PipelineState::Configured);

        let samples = sampling::sample_resolved(&resolved, &self.video)?;
        if let (Some(first), Some(last)) = (samples.first(), samples.last()) {
            report.info(format!(
                "{} frames from {} to {}",
                samples.len(),
                first.frame_index,
                last.frame_index
            ));
        }
        self.transition(PipelineState::Sampled);

        let interpolant = TrackInterpolant::build(&self.track)?;
        if let Some(warning) = synchronization::check_durations(&self.video, &self.track) {
            report.warn(warning);
        }
        let records = synchronization::merge(&samples, &interpolant);
        let extrapolated = records.iter().filter(|record| record.extrapolated).count();
        if extrapolated > 0 {
            report.warn(format!(
                "{extrapolated} frames fall outside the track and use extrapolated positions"
            ));
        }
        self.transition(PipelineState::Synced);

        Ok(Plan {
            sampling: resolved,
            records,
            report,
        })
    }

    fn extract(
        &self,
        extractor: &dyn FrameExtractor,
        plan: Plan,
    ) -> Result<ConversionSummary, GeoframeError> {
        let stem = self
            .video_path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .ok_or_else(|| GeoframeError::input(&self.video_path, "video path has no file name"))?;
        let output_directory = self.options.resolve_output_directory(&self.video_path);
        fs::create_dir_all(&output_directory)?;
        log::info!(
            "Writing {} stills to {}",
            plan.records.len(),
            output_directory.display()
        );

        let context = BatchContext {
            extractor,
            output_directory: &output_directory,
            stem: &stem,
            options: &self.options,
        };
        let outcome = batch::execute(&plan.records, &context)?;

        let mut report = plan.report;
        report.info(format!(
            "{} of {} stills written",
            outcome.written.len(),
            plan.records.len()
        ));
        report.failures = outcome.failures;

        Ok(ConversionSummary {
            output_directory,
            written: outcome.written,
            total: plan.records.len(),
            report,
        })
    }

    fn transition(&mut self, next: PipelineState) {
        debug_assert!(next > self.state, "{} -> {next} moves backwards", self.state);
        log::debug!("Pipeline {} -> {next}", self.state);
        self.state = next;
    }

    fn fail(&mut self, error: GeoframeError) -> GeoframeError {
        log::error!("Pipeline failed in the {} state: {error}", self.state);
        self.state = PipelineState::Failed;
        error
    }
}
