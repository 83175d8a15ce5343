//! Track interpolation integration tests.

use std::time::Duration;

use geoframe::{GeoframeError, GpsTrack, QuadraticSpline, TrackFix, TrackInterpolant};

fn fix(seconds: f64, latitude: f64, longitude: f64, elevation: f64) -> TrackFix {
    TrackFix::new(Duration::from_secs_f64(seconds), latitude, longitude, elevation)
}

fn assert_close(actual: f64, expected: f64, tolerance: f64) {
    assert!(
        (actual - expected).abs() <= tolerance,
        "expected {expected}, got {actual}"
    );
}

// ── Exactness ──────────────────────────────────────────────────────

#[test]
fn every_fix_is_reproduced() {
    let track = GpsTrack::new(vec![
        fix(0.0, 35.6895, 139.6917, 40.0),
        fix(1.0, 35.6897, 139.6921, 40.5),
        fix(2.5, 35.6902, 139.6925, 41.2),
        fix(3.0, 35.6903, 139.6929, 40.9),
        fix(5.0, 35.6911, 139.6933, 39.0),
        fix(8.0, 35.6920, 139.6940, 38.1),
    ]);
    let interpolant = TrackInterpolant::build(&track).unwrap();

    for fix in track.fixes() {
        let position = interpolant.evaluate(fix.elapsed_time);
        assert_close(position.latitude, fix.latitude, 1e-9);
        assert_close(position.longitude, fix.longitude, 1e-9);
        assert_close(position.elevation, fix.elevation, 1e-9);
        assert!(!interpolant.is_extrapolated(fix.elapsed_time));
    }
}

#[test]
fn linear_motion_stays_linear() {
    // Constant velocity north, constant altitude.
    let track = GpsTrack::new(
        (0..6)
            .map(|second| fix(second as f64 * 2.0, 10.0 + second as f64 * 0.002, 20.0, 100.0))
            .collect(),
    );
    let interpolant = TrackInterpolant::build(&track).unwrap();

    let position = interpolant.evaluate(Duration::from_millis(3_300));
    assert_close(position.latitude, 10.0033, 1e-9);
    assert_close(position.longitude, 20.0, 1e-9);
    assert_close(position.elevation, 100.0, 1e-9);
}

#[test]
fn quadratic_profile_is_exact_between_fixes() {
    let elevation = |t: f64| 3.0 * t * t - 2.0 * t + 7.0;
    let times = [0.0, 0.7, 1.9, 2.0, 3.4, 5.0, 5.5];
    let values: Vec<f64> = times.iter().map(|&t| elevation(t)).collect();
    let spline = QuadraticSpline::fit(&times, &values).unwrap();

    for step in 0..=55 {
        let t = step as f64 * 0.1;
        assert_close(spline.evaluate(t), elevation(t), 1e-9);
    }
}

// ── Extrapolation ──────────────────────────────────────────────────

#[test]
fn evaluation_extrapolates_past_the_last_fix() {
    let track = GpsTrack::new(vec![
        fix(0.0, 0.0, 0.0, 0.0),
        fix(1.0, 1.0, 1.0, 1.0),
        fix(2.0, 4.0, 2.0, 4.0),
        fix(3.0, 9.0, 3.0, 9.0),
    ]);
    let interpolant = TrackInterpolant::build(&track).unwrap();

    let later = Duration::from_secs(4);
    let position = interpolant.evaluate(later);
    assert_close(position.latitude, 16.0, 1e-9);
    assert_close(position.longitude, 4.0, 1e-9);
    assert!(interpolant.is_extrapolated(later));
    assert_eq!(interpolant.time_span(), (0.0, 3.0));
}

// ── Rejection ──────────────────────────────────────────────────────

#[test]
fn too_few_fixes_is_an_interpolation_error() {
    let track = GpsTrack::new(vec![fix(0.0, 1.0, 1.0, 1.0), fix(1.0, 2.0, 2.0, 2.0)]);
    let error = TrackInterpolant::build(&track).unwrap_err();
    assert!(matches!(error, GeoframeError::Interpolation(_)));
}

#[test]
fn repeated_fix_time_is_an_interpolation_error() {
    let track = GpsTrack::new(vec![
        fix(0.0, 1.0, 1.0, 1.0),
        fix(1.0, 2.0, 2.0, 2.0),
        fix(1.0, 2.5, 2.5, 2.5),
        fix(2.0, 3.0, 3.0, 3.0),
    ]);
    assert!(matches!(
        TrackInterpolant::build(&track),
        Err(GeoframeError::Interpolation(_))
    ));
}

#[test]
fn empty_track_is_an_interpolation_error() {
    assert!(matches!(
        TrackInterpolant::build(&GpsTrack::default()),
        Err(GeoframeError::Interpolation(_))
    ));
}
