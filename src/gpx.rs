//! GPX track log parsing.
//!
//! Every `<trkpt>` of every `<trk>`/`<trkseg>` is flattened, in document
//! order, into a single [`GpsTrack`]. Segment boundaries are not preserved.

use std::fs;
use std::path::Path;

use chrono::{DateTime, FixedOffset};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::error::GeoframeError;
use crate::track::GpsTrack;

const IN_MEMORY_SOURCE: &str = "<memory>";

#[derive(Clone, Copy, PartialEq, Eq)]
enum PointField {
    Elevation,
    Time,
}

#[derive(Default)]
struct PendingPoint {
    latitude: Option<f64>,
    longitude: Option<f64>,
    elevation: Option<f64>,
    time: Option<DateTime<FixedOffset>>,
}

/// Parse GPX text into a track.
///
/// # Errors
///
/// Returns [`GeoframeError::Input`] if the document is not well-formed XML,
/// or if a track point lacks `lat`/`lon` attributes or a parseable `<time>`.
/// A missing `<ele>` is read as 0 m.
///
/// # Example
///
/// ```
/// let gpx = r#"<gpx><trk><trkseg>
///     <trkpt lat="35.0" lon="139.0"><ele>5</ele><time>2024-10-05T00:00:00Z</time></trkpt>
///     <trkpt lat="35.1" lon="139.1"><ele>6</ele><time>2024-10-05T00:00:01Z</time></trkpt>
/// </trkseg></trk></gpx>"#;
/// let track = geoframe::gpx::parse_gpx_str(gpx)?;
/// assert_eq!(track.len(), 2);
/// # Ok::<(), geoframe::GeoframeError>(())
/// ```
pub fn parse_gpx_str(text: &str) -> Result<GpsTrack, GeoframeError> {
    parse(text, Path::new(IN_MEMORY_SOURCE))
}

/// Read and parse a GPX file.
///
/// # Errors
///
/// Returns [`GeoframeError::Input`] if the file cannot be read or parsed.
pub fn parse_gpx_file<P: AsRef<Path>>(path: P) -> Result<GpsTrack, GeoframeError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|error| GeoframeError::input(path, error))?;
    let track = parse(&text, path)?;
    log::info!(
        "Loaded GPX file {}: {} track points spanning {:.3}s",
        path.display(),
        track.len(),
        track.span().as_secs_f64()
    );
    Ok(track)
}

fn parse(text: &str, source: &Path) -> Result<GpsTrack, GeoframeError> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    let mut points = Vec::new();
    let mut pending: Option<PendingPoint> = None;
    let mut field: Option<PointField> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Eof) => break,
            Ok(Event::Start(element)) => match element.local_name().as_ref() {
                b"trkpt" => pending = Some(start_point(&element, source)?),
                b"ele" if pending.is_some() => field = Some(PointField::Elevation),
                b"time" if pending.is_some() => field = Some(PointField::Time),
                _ => {}
            },
            Ok(Event::Empty(element)) => {
                // Self-closing <trkpt/> has no <time> and is rejected below.
                if element.local_name().as_ref() == b"trkpt" {
                    let point = start_point(&element, source)?;
                    points.push(finish_point(point, points.len(), source)?);
                }
            }
            Ok(Event::Text(content)) => {
                if let (Some(point), Some(kind)) = (pending.as_mut(), field) {
                    let value = content
                        .unescape()
                        .map_err(|error| GeoframeError::input(source, error))?;
                    let value = value.trim();
                    match kind {
                        PointField::Elevation => {
                            point.elevation = Some(value.parse::<f64>().map_err(|_| {
                                GeoframeError::input(
                                    source,
                                    format!("track point {} has invalid <ele> {value:?}", points.len()),
                                )
                            })?);
                        }
                        PointField::Time => {
                            point.time = Some(DateTime::parse_from_rfc3339(value).map_err(|error| {
                                GeoframeError::input(
                                    source,
                                    format!(
                                        "track point {} has invalid <time> {value:?}: {error}",
                                        points.len()
                                    ),
                                )
                            })?);
                        }
                    }
                }
            }
            Ok(Event::End(element)) => match element.local_name().as_ref() {
                b"trkpt" => {
                    if let Some(point) = pending.take() {
                        points.push(finish_point(point, points.len(), source)?);
                    }
                }
                b"ele" | b"time" => field = None,
                _ => {}
            },
            Ok(_) => {}
            Err(error) => return Err(GeoframeError::input(source, error)),
        }
        buf.clear();
    }

    Ok(GpsTrack::from_timestamped(points))
}

fn start_point(element: &BytesStart<'_>, source: &Path) -> Result<PendingPoint, GeoframeError> {
    let mut point = PendingPoint::default();
    for attribute in element.attributes() {
        let attribute = attribute.map_err(|error| GeoframeError::input(source, error))?;
        let target = match attribute.key.local_name().as_ref() {
            b"lat" => &mut point.latitude,
            b"lon" => &mut point.longitude,
            _ => continue,
        };
        let value = std::str::from_utf8(&attribute.value)
            .ok()
            .and_then(|text| text.trim().parse::<f64>().ok())
            .ok_or_else(|| {
                GeoframeError::input(source, "track point has a non-numeric lat/lon attribute")
            })?;
        *target = Some(value);
    }
    Ok(point)
}

fn finish_point(
    point: PendingPoint,
    index: usize,
    source: &Path,
) -> Result<(DateTime<FixedOffset>, f64, f64, f64), GeoframeError> {
    let (Some(latitude), Some(longitude)) = (point.latitude, point.longitude) else {
        return Err(GeoframeError::input(
            source,
            format!("track point {index} is missing lat/lon"),
        ));
    };
    let Some(time) = point.time else {
        return Err(GeoframeError::input(
            source,
            format!("track point {index} has no <time>"),
        ));
    };
    Ok((time, latitude, longitude, point.elevation.unwrap_or(0.0)))
}
