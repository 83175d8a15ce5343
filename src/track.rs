//! GPS track data model.
//!
//! A [`GpsTrack`] is the flattened, ordered sequence of [`TrackFix`]es read
//! from a track log. Fix times are stored as elapsed time since the first
//! fix, which is the axis the video clock is aligned against.

use std::time::Duration;

use chrono::{DateTime, FixedOffset};

/// One timestamped GPS observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackFix {
    /// Time since the first fix of the track.
    pub elapsed_time: Duration,
    /// Latitude in degrees, positive north.
    pub latitude: f64,
    /// Longitude in degrees, positive east.
    pub longitude: f64,
    /// Elevation in meters.
    pub elevation: f64,
}

impl TrackFix {
    pub fn new(elapsed_time: Duration, latitude: f64, longitude: f64, elevation: f64) -> Self {
        Self {
            elapsed_time,
            latitude,
            longitude,
            elevation,
        }
    }
}

/// An ordered GPS track.
///
/// Ordering is checked when the track is turned into a
/// [`TrackInterpolant`](crate::TrackInterpolant), not here, so a track read
/// from a messy log can still be inspected.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GpsTrack {
    fixes: Vec<TrackFix>,
    start_time: Option<DateTime<FixedOffset>>,
}

impl GpsTrack {
    pub fn new(fixes: Vec<TrackFix>) -> Self {
        Self {
            fixes,
            start_time: None,
        }
    }

    /// Build a track from absolute timestamps. Elapsed time is measured from
    /// the first point; points earlier than it saturate to zero.
    pub fn from_timestamped<I>(points: I) -> Self
    where
        I: IntoIterator<Item = (DateTime<FixedOffset>, f64, f64, f64)>,
    {
        let mut start_time = None;
        let fixes = points
            .into_iter()
            .map(|(timestamp, latitude, longitude, elevation)| {
                let origin = *start_time.get_or_insert(timestamp);
                let elapsed_time = (timestamp - origin).to_std().unwrap_or(Duration::ZERO);
                TrackFix::new(elapsed_time, latitude, longitude, elevation)
            })
            .collect();
        Self { fixes, start_time }
    }

    pub fn fixes(&self) -> &[TrackFix] {
        &self.fixes
    }

    pub fn len(&self) -> usize {
        self.fixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fixes.is_empty()
    }

    /// Absolute time of the first fix, when the track was built from
    /// timestamps.
    pub fn start_time(&self) -> Option<DateTime<FixedOffset>> {
        self.start_time
    }

    /// Elapsed time of the last fix.
    pub fn span(&self) -> Duration {
        self.fixes
            .last()
            .map(|fix| fix.elapsed_time)
            .unwrap_or(Duration::ZERO)
    }
}
