//! End-to-end pipeline tests.
//!
//! Frames come from an in-process extractor that paints a small JPEG, so
//! sampling, synchronization, tagging and batch control run without FFmpeg
//! fixtures.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use geoframe::extraction::save_jpeg;
use geoframe::{
    CancellationToken, ConvertOptions, FailurePolicy, FrameExtractor, FrameRate, GeoframeError,
    GpsTrack, Pipeline, PipelineState, ProgressCallback, ProgressInfo, SamplingConfig, TrackFix,
    VideoMetadata, geotag, tagging,
};
use image::{Rgb, RgbImage};

/// Writes a flat-colored still and remembers which frames it was asked for
/// and at what quality.
#[derive(Default)]
struct PaintingExtractor {
    requested: Mutex<Vec<u64>>,
    qualities: Mutex<Vec<u8>>,
    failing: HashSet<u64>,
}

impl PaintingExtractor {
    fn failing_at(frames: &[u64]) -> Self {
        Self {
            failing: frames.iter().copied().collect(),
            ..Self::default()
        }
    }

    fn requested(&self) -> Vec<u64> {
        self.requested.lock().unwrap().clone()
    }

    fn qualities(&self) -> Vec<u8> {
        self.qualities.lock().unwrap().clone()
    }
}

impl FrameExtractor for PaintingExtractor {
    fn extract(
        &self,
        frame_index: u64,
        _timestamp: Duration,
        output_path: &Path,
        quality: u8,
    ) -> Result<(), GeoframeError> {
        self.requested.lock().unwrap().push(frame_index);
        self.qualities.lock().unwrap().push(quality);
        if self.failing.contains(&frame_index) {
            return Err(GeoframeError::Extraction {
                frame_index,
                reason: "decoder refused".to_string(),
            });
        }
        let shade = (frame_index % 256) as u8;
        let image = RgbImage::from_pixel(16, 16, Rgb([shade, 64, 255 - shade]));
        save_jpeg(&image, output_path, quality)
    }
}

struct Recorder(Mutex<Vec<ProgressInfo>>);

impl ProgressCallback for Recorder {
    fn on_progress(&self, info: &ProgressInfo) {
        self.0.lock().unwrap().push(info.clone());
    }
}

/// Cancels the token once `after` records have finished.
struct CancelAfter {
    token: CancellationToken,
    after: u64,
}

impl ProgressCallback for CancelAfter {
    fn on_progress(&self, info: &ProgressInfo) {
        if info.completed >= self.after {
            self.token.cancel();
        }
    }
}

fn video(seconds: f64) -> VideoMetadata {
    VideoMetadata::new(
        (seconds * 30.0) as u64,
        Duration::from_secs_f64(seconds),
        FrameRate::new(30, 1).unwrap(),
    )
    .unwrap()
}

/// A straight walk north-east over `seconds`, one fix per second.
fn track(seconds: u64) -> GpsTrack {
    GpsTrack::new(
        (0..=seconds)
            .map(|second| {
                TrackFix::new(
                    Duration::from_secs(second),
                    35.6895 + second as f64 * 1e-4,
                    139.6917 + second as f64 * 2e-4,
                    40.0 + second as f64 * 0.5,
                )
            })
            .collect(),
    )
}

fn video_path(directory: &Path) -> PathBuf {
    directory.join("ride.mp4")
}

fn jpeg_files(directory: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = fs::read_dir(directory)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .filter(|path| path.extension().is_some_and(|extension| extension == "jpeg"))
        .collect();
    files.sort();
    files
}

// ── Successful runs ────────────────────────────────────────────────

#[test]
fn every_record_becomes_a_tagged_still() {
    let directory = tempfile::tempdir().unwrap();
    let out = directory.path().join("stills");
    let extractor = PaintingExtractor::default();

    let mut pipeline = Pipeline::new(
        video_path(directory.path()),
        video(10.0),
        track(10),
        SamplingConfig::new().with_time_interval(2.0),
    )
    .with_options(ConvertOptions::new().with_output_directory(&out));
    let plan = pipeline.plan().unwrap();
    let summary = pipeline.run(&extractor).unwrap();

    assert_eq!(pipeline.state(), PipelineState::Done);
    assert_eq!(extractor.requested(), vec![0, 60, 120, 180, 240]);
    assert_eq!(summary.total, 5);
    assert_eq!(summary.written.len(), 5);
    assert_eq!(summary.written[1], out.join("ride_000060.jpeg"));
    assert_eq!(jpeg_files(&out), summary.written);

    for (record, path) in plan.records.iter().zip(&summary.written) {
        let expected = geotag::encode(record.latitude, record.longitude, record.elevation).unwrap();
        assert_eq!(tagging::read_geotag(path).unwrap(), Some(expected));
    }
    assert!(summary.into_result().is_ok());
}

#[test]
fn stills_default_to_a_res_directory_next_to_the_video() {
    let directory = tempfile::tempdir().unwrap();
    let extractor = PaintingExtractor::default();

    let mut pipeline = Pipeline::new(
        video_path(directory.path()),
        video(4.0),
        track(4),
        SamplingConfig::new().with_target_fps(1.0),
    );
    let summary = pipeline.run(&extractor).unwrap();

    assert_eq!(summary.output_directory, directory.path().join("res"));
    assert_eq!(jpeg_files(&directory.path().join("res")).len(), 4);
}

#[test]
fn rerunning_produces_identical_files() {
    let directory = tempfile::tempdir().unwrap();
    let out = directory.path().join("stills");
    let run = || {
        let mut pipeline = Pipeline::new(
            video_path(directory.path()),
            video(6.0),
            track(6),
            SamplingConfig::new().with_target_fps(0.5),
        )
        .with_options(ConvertOptions::new().with_output_directory(&out));
        pipeline.run(&PaintingExtractor::default()).unwrap()
    };

    let first = run();
    let first_bytes: Vec<Vec<u8>> = first.written.iter().map(|path| fs::read(path).unwrap()).collect();
    let second = run();
    let second_bytes: Vec<Vec<u8>> = second.written.iter().map(|path| fs::read(path).unwrap()).collect();

    assert_eq!(first.written, second.written);
    assert_eq!(first_bytes, second_bytes);
    assert_eq!(jpeg_files(&out).len(), 3);
}

#[test]
fn configured_quality_reaches_the_extractor() {
    let directory = tempfile::tempdir().unwrap();
    let run = |name: &str, options: ConvertOptions| {
        let extractor = PaintingExtractor::default();
        let mut pipeline = Pipeline::new(
            video_path(directory.path()),
            video(4.0),
            track(4),
            SamplingConfig::new().with_target_fps(1.0),
        )
        .with_options(options.with_output_directory(directory.path().join(name)));
        let summary = pipeline.run(&extractor).unwrap();
        (extractor.qualities(), summary.written)
    };

    let (default_qualities, best) = run("best", ConvertOptions::new());
    let (low_qualities, low) = run("low", ConvertOptions::new().with_jpeg_quality(40));

    assert_eq!(default_qualities, vec![100; 4]);
    assert_eq!(low_qualities, vec![40; 4]);
    assert_ne!(fs::read(&best[0]).unwrap(), fs::read(&low[0]).unwrap());
}

#[test]
fn duration_mismatch_warns_but_keeps_every_sample() {
    let directory = tempfile::tempdir().unwrap();
    let extractor = PaintingExtractor::default();

    let mut pipeline = Pipeline::new(
        video_path(directory.path()),
        video(11.5),
        track(10),
        SamplingConfig::new().with_target_fps(1.0),
    )
    .with_options(ConvertOptions::new().with_output_directory(directory.path().join("out")));
    let plan = pipeline.plan().unwrap();

    assert!(plan.report.warnings.iter().any(|warning| warning.contains("differ")));
    assert_eq!(plan.records.len(), 12);
    assert!(plan.records[11].extrapolated);
    assert!(!plan.records[10].extrapolated);
    assert!(plan.records[11].latitude > plan.records[10].latitude);

    let summary = pipeline.run(&extractor).unwrap();
    assert_eq!(summary.written.len(), 12);
}

// ── Failures ───────────────────────────────────────────────────────

#[test]
fn abort_stops_at_the_first_failure() {
    let directory = tempfile::tempdir().unwrap();
    let out = directory.path().join("stills");
    let extractor = PaintingExtractor::failing_at(&[90]);

    let mut pipeline = Pipeline::new(
        video_path(directory.path()),
        video(10.0),
        track(10),
        SamplingConfig::new().with_target_fps(1.0),
    )
    .with_options(ConvertOptions::new().with_output_directory(&out));
    let error = pipeline.run(&extractor).unwrap_err();

    assert!(matches!(error, GeoframeError::Extraction { frame_index: 90, .. }));
    assert_eq!(pipeline.state(), PipelineState::Failed);
    assert_eq!(extractor.requested(), vec![0, 30, 60, 90]);
    // Stills written before the failure stay on disk.
    assert_eq!(jpeg_files(&out).len(), 3);
    assert!(pipeline.run(&extractor).is_err());
}

#[test]
fn best_effort_records_failures_and_continues() {
    let directory = tempfile::tempdir().unwrap();
    let extractor = PaintingExtractor::failing_at(&[30, 150]);

    let mut pipeline = Pipeline::new(
        video_path(directory.path()),
        video(10.0),
        track(10),
        SamplingConfig::new().with_target_fps(1.0),
    )
    .with_options(
        ConvertOptions::new()
            .with_output_directory(directory.path().join("out"))
            .with_failure_policy(FailurePolicy::BestEffort),
    );
    let summary = pipeline.run(&extractor).unwrap();

    assert_eq!(extractor.requested().len(), 10);
    assert_eq!(summary.written.len(), 8);
    let failed: Vec<u64> = summary
        .report
        .failures
        .iter()
        .map(|failure| failure.frame_index)
        .collect();
    assert_eq!(failed, vec![30, 150]);
    assert!(summary.report.to_string().contains("[FAIL] frame 30 at 1.000s"));

    let error = summary.into_result().unwrap_err();
    assert!(matches!(error, GeoframeError::BatchFailed { failed: 2, total: 10 }));
}

#[test]
fn invalid_configuration_writes_nothing() {
    let directory = tempfile::tempdir().unwrap();
    let out = directory.path().join("stills");
    let extractor = PaintingExtractor::default();

    let mut pipeline = Pipeline::new(
        video_path(directory.path()),
        video(10.0),
        track(10),
        SamplingConfig::new().with_start_time(8.0).with_end_time(3.0).with_target_fps(1.0),
    )
    .with_options(ConvertOptions::new().with_output_directory(&out));
    let error = pipeline.run(&extractor).unwrap_err();

    assert!(matches!(error, GeoframeError::Configuration(_)));
    assert!(extractor.requested().is_empty());
    assert!(!out.exists());
}

#[test]
fn short_track_is_an_interpolation_error() {
    let directory = tempfile::tempdir().unwrap();
    let extractor = PaintingExtractor::default();

    let mut pipeline = Pipeline::new(
        video_path(directory.path()),
        video(10.0),
        track(1),
        SamplingConfig::new().with_target_fps(1.0),
    );
    let error = pipeline.run(&extractor).unwrap_err();
    assert!(matches!(error, GeoframeError::Interpolation(_)));
    assert!(!directory.path().join("res").exists());
}

// ── Progress and cancellation ──────────────────────────────────────

#[test]
fn progress_reaches_the_total() {
    let directory = tempfile::tempdir().unwrap();
    let recorder = Arc::new(Recorder(Mutex::new(Vec::new())));

    let mut pipeline = Pipeline::new(
        video_path(directory.path()),
        video(10.0),
        track(10),
        SamplingConfig::new().with_target_fps(1.0),
    )
    .with_options(
        ConvertOptions::new()
            .with_output_directory(directory.path().join("out"))
            .with_progress(recorder.clone())
            .with_batch_size(4),
    );
    pipeline.run(&PaintingExtractor::default()).unwrap();

    let reports = recorder.0.lock().unwrap();
    let completed: Vec<u64> = reports.iter().map(|info| info.completed).collect();
    assert_eq!(completed, vec![4, 8, 10]);
    assert!(reports.iter().all(|info| info.total == 10));
    assert_eq!(reports[0].last_frame, Some(90));
    assert_eq!(reports[2].last_frame, None);
}

#[test]
fn cancelled_token_starts_nothing() {
    let directory = tempfile::tempdir().unwrap();
    let extractor = PaintingExtractor::default();
    let token = CancellationToken::new();
    token.cancel();

    let mut pipeline = Pipeline::new(
        video_path(directory.path()),
        video(10.0),
        track(10),
        SamplingConfig::new().with_target_fps(1.0),
    )
    .with_options(
        ConvertOptions::new()
            .with_output_directory(directory.path().join("out"))
            .with_cancellation(token),
    );
    let error = pipeline.run(&extractor).unwrap_err();

    assert!(matches!(error, GeoframeError::Cancelled));
    assert!(extractor.requested().is_empty());
}

#[test]
fn cancellation_mid_batch_keeps_finished_stills() {
    let directory = tempfile::tempdir().unwrap();
    let out = directory.path().join("out");
    let extractor = PaintingExtractor::default();
    let token = CancellationToken::new();

    let mut pipeline = Pipeline::new(
        video_path(directory.path()),
        video(10.0),
        track(10),
        SamplingConfig::new().with_target_fps(1.0),
    )
    .with_options(
        ConvertOptions::new()
            .with_output_directory(&out)
            .with_cancellation(token.clone())
            .with_progress(Arc::new(CancelAfter { token, after: 3 })),
    );
    let error = pipeline.run(&extractor).unwrap_err();

    assert!(matches!(error, GeoframeError::Cancelled));
    assert_eq!(extractor.requested(), vec![0, 30, 60]);
    let files = jpeg_files(&out);
    assert_eq!(files.len(), 3);
    for path in files {
        assert!(tagging::read_geotag(&path).unwrap().is_some());
    }
}

#[cfg(feature = "rayon")]
#[test]
fn parallel_run_matches_sequential_output() {
    let directory = tempfile::tempdir().unwrap();
    let run = |name: &str, workers: usize| {
        let mut pipeline = Pipeline::new(
            video_path(directory.path()),
            video(10.0),
            track(10),
            SamplingConfig::new().with_target_fps(2.0),
        )
        .with_options(
            ConvertOptions::new()
                .with_output_directory(directory.path().join(name))
                .with_concurrency(workers),
        );
        pipeline.run(&PaintingExtractor::default()).unwrap()
    };

    let sequential = run("sequential", 1);
    let parallel = run("parallel", 4);
    assert_eq!(parallel.written.len(), sequential.written.len());
    for (left, right) in sequential.written.iter().zip(&parallel.written) {
        assert_eq!(left.file_name(), right.file_name());
        assert_eq!(fs::read(left).unwrap(), fs::read(right).unwrap());
    }
}

#[cfg(feature = "rayon")]
#[test]
fn parallel_run_writes_clamped_frames_once() {
    let directory = tempfile::tempdir().unwrap();
    // The container claims 10s at 30 fps but holds 200 frames, and the range
    // runs two seconds past the end: every position from frame 200 on is
    // clamped onto frame 199.
    let short_video =
        VideoMetadata::new(200, Duration::from_secs(10), FrameRate::new(30, 1).unwrap()).unwrap();
    let run = |name: &str, workers: usize| {
        let extractor = PaintingExtractor::default();
        let mut pipeline = Pipeline::new(
            video_path(directory.path()),
            short_video.clone(),
            track(12),
            SamplingConfig::new().with_end_time(12.0).with_target_fps(2.0),
        )
        .with_options(
            ConvertOptions::new()
                .with_output_directory(directory.path().join(name))
                .with_concurrency(workers),
        );
        let plan = pipeline.plan().unwrap();
        let summary = pipeline.run(&extractor).unwrap();
        (plan, summary, extractor.requested())
    };

    let (plan, parallel, requested) = run("parallel", 4);
    let clamped = plan.records.iter().filter(|record| record.frame_index == 199).count();
    assert_eq!(clamped, 10);
    assert_eq!(requested.iter().filter(|&&frame| frame == 199).count(), 1);
    assert_eq!(requested.len(), plan.records.len() - clamped + 1);

    let (_, sequential, _) = run("sequential", 1);
    assert_eq!(parallel.written.len(), plan.records.len());
    assert_eq!(parallel.written.len(), sequential.written.len());
    for (left, right) in sequential.written.iter().zip(&parallel.written) {
        assert_eq!(left.file_name(), right.file_name());
    }

    let last = parallel.written.last().unwrap();
    let record = plan.records.last().unwrap();
    let expected = geotag::encode(record.latitude, record.longitude, record.elevation).unwrap();
    assert_eq!(tagging::read_geotag(last).unwrap(), Some(expected));
}
