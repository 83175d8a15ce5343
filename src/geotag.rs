//! Fixed-point geotag encoding.
//!
//! Converts a floating-point position into the rational fields of an EXIF GPS
//! IFD. Coordinates become degrees/minutes/seconds with seconds at a
//! resolution of 1/100000; elevation is stored in millimeters. Every step
//! truncates toward zero, so the same input always yields the same fields.

use std::fmt::{Display, Formatter, Result as FmtResult};

use crate::error::GeoframeError;

/// Denominator of the seconds component.
pub const SECONDS_DENOMINATOR: u32 = 100_000;

/// Denominator of the altitude.
pub const ALTITUDE_DENOMINATOR: u32 = 1_000;

/// An unsigned EXIF rational.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rational {
    pub numerator: u32,
    pub denominator: u32,
}

impl Rational {
    pub const fn new(numerator: u32, denominator: u32) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    pub fn to_f64(self) -> f64 {
        self.numerator as f64 / self.denominator as f64
    }
}

impl Display for Rational {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

/// `GPSLatitudeRef` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatitudeRef {
    North,
    South,
}

/// `GPSLongitudeRef` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LongitudeRef {
    East,
    West,
}

/// `GPSAltitudeRef` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AltitudeRef {
    AboveSeaLevel,
    BelowSeaLevel,
}

impl LatitudeRef {
    pub fn as_str(self) -> &'static str {
        match self {
            LatitudeRef::North => "N",
            LatitudeRef::South => "S",
        }
    }
}

impl LongitudeRef {
    pub fn as_str(self) -> &'static str {
        match self {
            LongitudeRef::East => "E",
            LongitudeRef::West => "W",
        }
    }
}

impl AltitudeRef {
    pub fn as_byte(self) -> u8 {
        match self {
            AltitudeRef::AboveSeaLevel => 0,
            AltitudeRef::BelowSeaLevel => 1,
        }
    }
}

/// The GPS fields written into an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeoTag {
    /// Degrees, minutes, seconds of `|latitude|`.
    pub latitude: [Rational; 3],
    pub latitude_ref: LatitudeRef,
    /// Degrees, minutes, seconds of `|longitude|`.
    pub longitude: [Rational; 3],
    pub longitude_ref: LongitudeRef,
    /// `|elevation|` in millimeters over 1000.
    pub altitude: Rational,
    pub altitude_ref: AltitudeRef,
}

impl GeoTag {
    /// Decode back to signed decimal degrees and meters.
    pub fn to_decimal(&self) -> (f64, f64, f64) {
        let latitude = dms_to_degrees(&self.latitude);
        let longitude = dms_to_degrees(&self.longitude);
        let altitude = self.altitude.to_f64();
        (
            match self.latitude_ref {
                LatitudeRef::North => latitude,
                LatitudeRef::South => -latitude,
            },
            match self.longitude_ref {
                LongitudeRef::East => longitude,
                LongitudeRef::West => -longitude,
            },
            match self.altitude_ref {
                AltitudeRef::AboveSeaLevel => altitude,
                AltitudeRef::BelowSeaLevel => -altitude,
            },
        )
    }
}

/// Encode a position as EXIF GPS fields.
///
/// Negative elevations are written as their magnitude with
/// [`AltitudeRef::BelowSeaLevel`].
///
/// # Errors
///
/// Returns [`GeoframeError::InvalidCoordinate`] if a value is not finite,
/// `|latitude| > 90`, `|longitude| > 180`, or the elevation does not fit the
/// millimeter field.
///
/// # Example
///
/// ```
/// use geoframe::geotag::{encode, LatitudeRef, Rational};
///
/// let tag = encode(35.6895, 139.6917, 123.456)?;
/// assert_eq!(tag.latitude[1], Rational::new(41, 1));
/// assert_eq!(tag.latitude[2], Rational::new(2_220_000, 100_000));
/// assert_eq!(tag.latitude_ref, LatitudeRef::North);
/// assert_eq!(tag.altitude, Rational::new(123_456, 1_000));
/// # Ok::<(), geoframe::GeoframeError>(())
/// ```
pub fn encode(latitude: f64, longitude: f64, elevation: f64) -> Result<GeoTag, GeoframeError> {
    let max_altitude = u32::MAX as f64 / ALTITUDE_DENOMINATOR as f64;
    let valid = latitude.is_finite()
        && longitude.is_finite()
        && elevation.is_finite()
        && latitude.abs() <= 90.0
        && longitude.abs() <= 180.0
        && elevation.abs() < max_altitude;
    if !valid {
        return Err(GeoframeError::InvalidCoordinate {
            latitude,
            longitude,
            elevation,
        });
    }

    Ok(GeoTag {
        latitude: degrees_to_dms(latitude),
        latitude_ref: if latitude >= 0.0 {
            LatitudeRef::North
        } else {
            LatitudeRef::South
        },
        longitude: degrees_to_dms(longitude),
        longitude_ref: if longitude >= 0.0 {
            LongitudeRef::East
        } else {
            LongitudeRef::West
        },
        altitude: Rational::new(
            (elevation.abs() * ALTITUDE_DENOMINATOR as f64).trunc() as u32,
            ALTITUDE_DENOMINATOR,
        ),
        altitude_ref: if elevation >= 0.0 {
            AltitudeRef::AboveSeaLevel
        } else {
            AltitudeRef::BelowSeaLevel
        },
    })
}

/// Degree/minute/second decomposition of `|value|`, truncating each part.
pub fn degrees_to_dms(value: f64) -> [Rational; 3] {
    let magnitude = value.abs();
    let degrees = magnitude.trunc();
    let minutes = ((magnitude - degrees) * 60.0).trunc();
    // Evaluation order matters for bit-exact output: ((m - d) * 60 - min) * 60 * 1e5.
    let seconds = (((magnitude - degrees) * 60.0 - minutes) * 60.0 * SECONDS_DENOMINATOR as f64)
        .trunc();
    [
        Rational::new(degrees as u32, 1),
        Rational::new(minutes as u32, 1),
        Rational::new(seconds as u32, SECONDS_DENOMINATOR),
    ]
}

fn dms_to_degrees(dms: &[Rational; 3]) -> f64 {
    dms[0].to_f64() + dms[1].to_f64() / 60.0 + dms[2].to_f64() / 3600.0
}
