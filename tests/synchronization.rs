//! Sampling and interpolation composed through the synchronizer.

use std::time::Duration;

use geoframe::synchronization::{check_durations, merge};
use geoframe::{FrameRate, GpsTrack, SamplingConfig, TrackFix, TrackInterpolant, VideoMetadata, sampling};

fn video(seconds: f64, numerator: u32, denominator: u32) -> VideoMetadata {
    let rate = FrameRate::new(numerator, denominator).unwrap();
    VideoMetadata::new(
        (seconds * rate.as_f64()).floor() as u64,
        Duration::from_secs_f64(seconds),
        rate,
    )
    .unwrap()
}

/// Irregular fixes along a line moving 1e-4 degrees north per second.
fn irregular_track() -> GpsTrack {
    let times = [0.0, 0.8, 2.1, 3.0, 4.7, 6.2, 7.0, 8.9, 10.0];
    GpsTrack::new(
        times
            .iter()
            .map(|&t| {
                TrackFix::new(
                    Duration::from_secs_f64(t),
                    51.5 + t * 1e-4,
                    -0.12,
                    15.0 + t,
                )
            })
            .collect(),
    )
}

// ── Alignment ──────────────────────────────────────────────────────

#[test]
fn records_follow_the_sampled_frames() {
    let video = video(10.0, 30, 1);
    let samples = sampling::sample(&SamplingConfig::new().with_target_fps(2.0), &video).unwrap();
    let interpolant = TrackInterpolant::build(&irregular_track()).unwrap();
    let records = merge(&samples, &interpolant);

    assert_eq!(records.len(), samples.len());
    for (record, sample) in records.iter().zip(&samples) {
        assert_eq!(record.frame_index, sample.frame_index);
        assert_eq!(record.elapsed_time, sample.elapsed_time);
        assert!(!record.extrapolated);
    }
}

#[test]
fn linear_motion_is_recovered_between_fixes() {
    let video = video(10.0, 30000, 1001);
    let samples = sampling::sample(&SamplingConfig::new().with_time_interval(0.7), &video).unwrap();
    let interpolant = TrackInterpolant::build(&irregular_track()).unwrap();

    for record in merge(&samples, &interpolant) {
        let t = record.elapsed_time.as_secs_f64();
        assert!((record.latitude - (51.5 + t * 1e-4)).abs() < 1e-9, "latitude at {t}s");
        assert!((record.longitude + 0.12).abs() < 1e-9);
        assert!((record.elevation - (15.0 + t)).abs() < 1e-6, "elevation at {t}s");
    }
}

#[test]
fn frames_past_the_track_are_flagged() {
    let video = video(12.0, 30, 1);
    let samples = sampling::sample(&SamplingConfig::new().with_target_fps(1.0), &video).unwrap();
    let interpolant = TrackInterpolant::build(&irregular_track()).unwrap();
    let records = merge(&samples, &interpolant);

    let flagged: Vec<u64> = records
        .iter()
        .filter(|record| record.extrapolated)
        .map(|record| record.frame_index)
        .collect();
    assert_eq!(flagged, vec![330]);
    // Linear tracks extrapolate linearly.
    assert!((records[11].latitude - (51.5 + 11.0 * 1e-4)).abs() < 1e-9);
}

// ── Duration check ─────────────────────────────────────────────────

#[test]
fn matching_durations_produce_no_warning() {
    assert!(check_durations(&video(10.0, 30, 1), &irregular_track()).is_none());
    assert!(check_durations(&video(11.0, 30, 1), &irregular_track()).is_none());
}

#[test]
fn long_video_produces_a_warning() {
    let warning = check_durations(&video(11.5, 30, 1), &irregular_track()).unwrap();
    assert!(warning.contains("1.500s"));
}

#[test]
fn short_video_produces_a_warning() {
    assert!(check_durations(&video(8.0, 30, 1), &irregular_track()).is_some());
}
