//! Continuous position model built from a discrete GPS track.
//!
//! Each axis (latitude, longitude, elevation) is fitted with an interpolating
//! quadratic B-spline over `(elapsed seconds, value)` pairs. Interior knots
//! sit halfway between consecutive fix times rather than on them, and both
//! ends carry a knot of multiplicity three, so the curve is C1, passes
//! through every fix, and is uniquely determined by the fixes alone.
//!
//! Outside the track's time span the first and last polynomial pieces are
//! extended, so evaluation never clamps. Extrapolated positions are less
//! trustworthy; [`TrackInterpolant::is_extrapolated`] tells them apart.

use std::time::Duration;

use crate::error::GeoframeError;
use crate::track::GpsTrack;

const DEGREE: usize = 2;

/// Minimum number of fixes a quadratic interpolant can be built from.
pub const MIN_FIXES: usize = DEGREE + 1;

/// Interpolated position at one instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
    pub elevation: f64,
}

/// An interpolating quadratic spline over strictly increasing abscissae.
#[derive(Debug, Clone)]
pub struct QuadraticSpline {
    knots: Vec<f64>,
    coefficients: Vec<f64>,
}

impl QuadraticSpline {
    /// Fit a spline through `(times[i], values[i])`.
    ///
    /// # Errors
    ///
    /// Returns [`GeoframeError::Interpolation`] if fewer than three points are
    /// given, the slices differ in length, a value is not finite, or `times`
    /// is not strictly increasing.
    pub fn fit(times: &[f64], values: &[f64]) -> Result<Self, GeoframeError> {
        if times.len() != values.len() {
            return Err(GeoframeError::Interpolation(format!(
                "{} times but {} values",
                times.len(),
                values.len()
            )));
        }
        let knots = knot_vector(times)?;
        if let Some(index) = values.iter().position(|value| !value.is_finite()) {
            return Err(GeoframeError::Interpolation(format!(
                "value {index} is not finite"
            )));
        }

        // Collocation matrix: row i holds the basis functions that are
        // non-zero at times[i], which only ever fall on columns i-1..=i+1.
        let n = times.len();
        let mut lower = vec![0.0; n - 1];
        let mut diagonal = vec![0.0; n];
        let mut upper = vec![0.0; n - 1];

        for (row, &time) in times.iter().enumerate() {
            let span = find_span(&knots, n, time);
            let basis = basis_functions(&knots, span, time);
            for (offset, &weight) in basis.iter().enumerate() {
                let column = span - DEGREE + offset;
                if column + 1 == row {
                    lower[row - 1] = weight;
                } else if column == row {
                    diagonal[row] = weight;
                } else if column == row + 1 {
                    upper[row] = weight;
                } else {
                    debug_assert!(weight == 0.0, "collocation weight outside band");
                }
            }
        }

        let coefficients = solve_tridiagonal(lower, diagonal, upper, values.to_vec())?;
        Ok(Self {
            knots,
            coefficients,
        })
    }

    /// Evaluate the spline at `time`, extrapolating beyond the fitted range.
    pub fn evaluate(&self, time: f64) -> f64 {
        let n = self.coefficients.len();
        let span = find_span(&self.knots, n, time);
        let basis = basis_functions(&self.knots, span, time);
        basis
            .iter()
            .enumerate()
            .map(|(offset, weight)| self.coefficients[span - DEGREE + offset] * weight)
            .sum()
    }
}

/// Clamped knot vector with interior knots at the midpoints between data
/// sites. Has `n + DEGREE + 1` entries for `n` sites.
fn knot_vector(times: &[f64]) -> Result<Vec<f64>, GeoframeError> {
    let n = times.len();
    if n < MIN_FIXES {
        return Err(GeoframeError::Interpolation(format!(
            "at least {MIN_FIXES} track fixes are required, got {n}"
        )));
    }
    if let Some(index) = times.iter().position(|time| !time.is_finite()) {
        return Err(GeoframeError::Interpolation(format!(
            "time {index} is not finite"
        )));
    }
    if let Some(index) = times.windows(2).position(|pair| pair[1] <= pair[0]) {
        return Err(GeoframeError::Interpolation(format!(
            "fix times must be strictly increasing: fix {} at {}s does not follow {}s",
            index + 1,
            times[index + 1],
            times[index]
        )));
    }

    let mut knots = Vec::with_capacity(n + DEGREE + 1);
    knots.extend([times[0]; DEGREE + 1]);
    knots.extend(times[1..n - 1].windows(2).map(|pair| (pair[0] + pair[1]) / 2.0));
    knots.extend([times[n - 1]; DEGREE + 1]);
    Ok(knots)
}

/// Index `l` of the knot span `[knots[l], knots[l + 1])` used for `time`,
/// clamped to the first and last non-degenerate spans.
fn find_span(knots: &[f64], basis_count: usize, time: f64) -> usize {
    let interior = &knots[DEGREE + 1..basis_count];
    DEGREE + interior.partition_point(|&knot| knot <= time)
}

/// The `DEGREE + 1` basis functions that are non-zero on `span`, evaluated at
/// `time` (Cox–de Boor recurrence). Outside the span this evaluates the
/// span's polynomial piece, which is what extrapolation needs.
fn basis_functions(knots: &[f64], span: usize, time: f64) -> [f64; DEGREE + 1] {
    let mut basis = [0.0; DEGREE + 1];
    let mut left = [0.0; DEGREE + 1];
    let mut right = [0.0; DEGREE + 1];
    basis[0] = 1.0;

    for j in 1..=DEGREE {
        left[j] = time - knots[span + 1 - j];
        right[j] = knots[span + j] - time;
        let mut saved = 0.0;
        for r in 0..j {
            let temp = basis[r] / (right[r + 1] + left[j - r]);
            basis[r] = saved + right[r + 1] * temp;
            saved = left[j - r] * temp;
        }
        basis[j] = saved;
    }
    basis
}

/// Solve a tridiagonal system by Gaussian elimination with partial pivoting.
///
/// `lower[i]` is `A[i + 1][i]`, `upper[i]` is `A[i][i + 1]`. Row swaps fill
/// a second superdiagonal, kept in `fill`.
fn solve_tridiagonal(
    mut lower: Vec<f64>,
    mut diagonal: Vec<f64>,
    mut upper: Vec<f64>,
    mut rhs: Vec<f64>,
) -> Result<Vec<f64>, GeoframeError> {
    let n = diagonal.len();
    let mut fill = vec![0.0; n.saturating_sub(2)];
    let singular = || GeoframeError::Interpolation("track fixes yield a singular system".into());

    for i in 0..n - 1 {
        if diagonal[i].abs() >= lower[i].abs() {
            if diagonal[i] == 0.0 {
                return Err(singular());
            }
            let factor = lower[i] / diagonal[i];
            diagonal[i + 1] -= factor * upper[i];
            rhs[i + 1] -= factor * rhs[i];
        } else {
            let factor = diagonal[i] / lower[i];
            diagonal[i] = lower[i];
            let temp = diagonal[i + 1];
            diagonal[i + 1] = upper[i] - factor * temp;
            if i + 2 < n {
                fill[i] = upper[i + 1];
                upper[i + 1] = -factor * upper[i + 1];
            }
            upper[i] = temp;
            let temp = rhs[i];
            rhs[i] = rhs[i + 1];
            rhs[i + 1] = temp - factor * rhs[i + 1];
        }
        lower[i] = 0.0;
    }
    if diagonal[n - 1] == 0.0 {
        return Err(singular());
    }

    rhs[n - 1] /= diagonal[n - 1];
    if n > 1 {
        rhs[n - 2] = (rhs[n - 2] - upper[n - 2] * rhs[n - 1]) / diagonal[n - 2];
    }
    for i in (0..n.saturating_sub(2)).rev() {
        rhs[i] = (rhs[i] - upper[i] * rhs[i + 1] - fill[i] * rhs[i + 2]) / diagonal[i];
    }
    Ok(rhs)
}

/// Per-axis quadratic interpolant over a GPS track.
///
/// # Example
///
/// ```
/// use std::time::Duration;
///
/// use geoframe::{GpsTrack, TrackFix, TrackInterpolant};
///
/// let track = GpsTrack::new(vec![
///     TrackFix::new(Duration::from_secs(0), 35.0, 139.0, 10.0),
///     TrackFix::new(Duration::from_secs(1), 35.1, 139.1, 12.0),
///     TrackFix::new(Duration::from_secs(2), 35.2, 139.2, 14.0),
/// ]);
/// let interpolant = TrackInterpolant::build(&track)?;
/// let position = interpolant.evaluate(Duration::from_millis(500));
/// assert!((position.elevation - 11.0).abs() < 1e-9);
/// # Ok::<(), geoframe::GeoframeError>(())
/// ```
#[derive(Debug, Clone)]
pub struct TrackInterpolant {
    latitude: QuadraticSpline,
    longitude: QuadraticSpline,
    elevation: QuadraticSpline,
    first_time: f64,
    last_time: f64,
}

impl TrackInterpolant {
    /// Fit the three axis splines to `track`.
    ///
    /// # Errors
    ///
    /// Returns [`GeoframeError::Interpolation`] if the track has fewer than
    /// three fixes, fix times are not strictly increasing, or a coordinate is
    /// not finite.
    pub fn build(track: &GpsTrack) -> Result<Self, GeoframeError> {
        let fixes = track.fixes();
        let times: Vec<f64> = fixes
            .iter()
            .map(|fix| fix.elapsed_time.as_secs_f64())
            .collect();
        let latitudes: Vec<f64> = fixes.iter().map(|fix| fix.latitude).collect();
        let longitudes: Vec<f64> = fixes.iter().map(|fix| fix.longitude).collect();
        let elevations: Vec<f64> = fixes.iter().map(|fix| fix.elevation).collect();

        let interpolant = Self {
            latitude: QuadraticSpline::fit(&times, &latitudes)?,
            longitude: QuadraticSpline::fit(&times, &longitudes)?,
            elevation: QuadraticSpline::fit(&times, &elevations)?,
            first_time: times[0],
            last_time: times[times.len() - 1],
        };

        log::debug!(
            "Built quadratic interpolant over {} fixes ({}s..{}s)",
            fixes.len(),
            interpolant.first_time,
            interpolant.last_time
        );
        Ok(interpolant)
    }

    /// Position at `elapsed` since the first fix.
    pub fn evaluate(&self, elapsed: Duration) -> Position {
        self.evaluate_seconds(elapsed.as_secs_f64())
    }

    /// Position at `seconds` since the first fix. Negative values extrapolate
    /// backwards.
    pub fn evaluate_seconds(&self, seconds: f64) -> Position {
        Position {
            latitude: self.latitude.evaluate(seconds),
            longitude: self.longitude.evaluate(seconds),
            elevation: self.elevation.evaluate(seconds),
        }
    }

    /// `true` if `elapsed` lies outside the time span covered by fixes.
    pub fn is_extrapolated(&self, elapsed: Duration) -> bool {
        let seconds = elapsed.as_secs_f64();
        seconds < self.first_time || seconds > self.last_time
    }

    /// Time span covered by fixes, in seconds.
    pub fn time_span(&self) -> (f64, f64) {
        (self.first_time, self.last_time)
    }
}
