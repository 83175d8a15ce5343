//! Geotag read-modify-write against JPEG files.
//!
//! [`write_geotag`] loads the existing EXIF block (if any), re-emits every
//! field it holds with the GPS position fields replaced, splices the result
//! back into the file and atomically swaps the file into place. A file is
//! therefore either fully tagged or left as it was, and tagging the same file
//! twice with the same [`GeoTag`] produces the same bytes.

use std::fs;
use std::io::{Cursor, Write};
use std::path::Path;

use exif::experimental::Writer;
use exif::{Field, In, Tag, Value};

use crate::error::GeoframeError;
use crate::geotag::{AltitudeRef, GeoTag, LatitudeRef, LongitudeRef, Rational};
use crate::jpeg;

/// Tags owned by the geotagger. Everything else in the file is preserved.
const GEOTAG_FIELDS: [Tag; 6] = [
    Tag::GPSLatitudeRef,
    Tag::GPSLatitude,
    Tag::GPSLongitudeRef,
    Tag::GPSLongitude,
    Tag::GPSAltitudeRef,
    Tag::GPSAltitude,
];

/// Write `tag` into the EXIF GPS block of the JPEG at `path`.
///
/// # Errors
///
/// Returns [`GeoframeError::Encoding`] if the file cannot be read, is not a
/// JPEG, carries an EXIF block that cannot be parsed or re-encoded, or cannot
/// be replaced.
pub fn write_geotag<P: AsRef<Path>>(path: P, tag: &GeoTag) -> Result<(), GeoframeError> {
    let path = path.as_ref();
    let original = fs::read(path).map_err(|error| GeoframeError::encoding(path, error))?;

    let tiff = build_exif(&original, tag).map_err(|reason| GeoframeError::encoding(path, reason))?;
    let updated =
        jpeg::replace_exif(&original, &tiff).map_err(|reason| GeoframeError::encoding(path, reason))?;

    replace_file(path, &updated).map_err(|error| GeoframeError::encoding(path, error))?;
    log::debug!("Geotagged {}", path.display());
    Ok(())
}

/// Read the geotag fields back from the JPEG at `path`.
///
/// Returns `Ok(None)` if the file has no EXIF block or the block lacks any
/// of the latitude/longitude/altitude fields.
///
/// # Errors
///
/// Returns [`GeoframeError::Encoding`] if the file cannot be read or its
/// EXIF block cannot be parsed.
pub fn read_geotag<P: AsRef<Path>>(path: P) -> Result<Option<GeoTag>, GeoframeError> {
    let path = path.as_ref();
    let data = fs::read(path).map_err(|error| GeoframeError::encoding(path, error))?;
    let Some(tiff) = jpeg::find_exif(&data).map_err(|reason| GeoframeError::encoding(path, reason))?
    else {
        return Ok(None);
    };
    let exif = exif::Reader::new()
        .read_raw(tiff.to_vec())
        .map_err(|error| GeoframeError::encoding(path, error))?;

    let rationals = |tag: Tag| match exif.get_field(tag, In::PRIMARY).map(|field| &field.value) {
        Some(Value::Rational(values)) => Some(
            values
                .iter()
                .map(|value| Rational::new(value.num, value.denom))
                .collect::<Vec<_>>(),
        ),
        _ => None,
    };
    let ascii = |tag: Tag| match exif.get_field(tag, In::PRIMARY).map(|field| &field.value) {
        Some(Value::Ascii(values)) => values.first().cloned(),
        _ => None,
    };

    let (Some(latitude), Some(longitude), Some(altitude)) = (
        rationals(Tag::GPSLatitude),
        rationals(Tag::GPSLongitude),
        rationals(Tag::GPSAltitude),
    ) else {
        return Ok(None);
    };
    let (Ok(latitude), Ok(longitude), Some(&altitude)) = (
        <[Rational; 3]>::try_from(latitude),
        <[Rational; 3]>::try_from(longitude),
        altitude.first(),
    ) else {
        return Ok(None);
    };

    let latitude_ref = match ascii(Tag::GPSLatitudeRef).as_deref() {
        Some(b"S") => LatitudeRef::South,
        _ => LatitudeRef::North,
    };
    let longitude_ref = match ascii(Tag::GPSLongitudeRef).as_deref() {
        Some(b"W") => LongitudeRef::West,
        _ => LongitudeRef::East,
    };
    let altitude_ref = match exif
        .get_field(Tag::GPSAltitudeRef, In::PRIMARY)
        .and_then(|field| field.value.get_uint(0))
    {
        Some(1) => AltitudeRef::BelowSeaLevel,
        _ => AltitudeRef::AboveSeaLevel,
    };

    Ok(Some(GeoTag {
        latitude,
        latitude_ref,
        longitude,
        longitude_ref,
        altitude,
        altitude_ref,
    }))
}

/// Serialize the merged EXIF block (TIFF structure, big-endian).
fn build_exif(jpeg_data: &[u8], tag: &GeoTag) -> Result<Vec<u8>, String> {
    let existing = match jpeg::find_exif(jpeg_data)? {
        Some(tiff) => Some(
            exif::Reader::new()
                .read_raw(tiff.to_vec())
                .map_err(|error| format!("existing EXIF block is unreadable: {error}"))?,
        ),
        None => None,
    };

    let geotag_fields = geotag_fields(tag);
    let mut writer = Writer::new();

    if let Some(exif) = &existing {
        for field in exif.fields() {
            if field.ifd_num == In::PRIMARY && GEOTAG_FIELDS.contains(&field.tag) {
                continue;
            }
            if let Value::Unknown(..) = field.value {
                log::debug!("Dropping EXIF field {} with an unknown type", field.tag);
                continue;
            }
            writer.push_field(field);
        }
        if let Some(thumbnail) = thumbnail(exif) {
            writer.set_jpeg(thumbnail, In::THUMBNAIL);
        }
    }
    for field in &geotag_fields {
        writer.push_field(field);
    }

    let mut buffer = Cursor::new(Vec::new());
    writer
        .write(&mut buffer, false)
        .map_err(|error| format!("EXIF block cannot be encoded: {error}"))?;
    Ok(buffer.into_inner())
}

fn thumbnail(exif: &exif::Exif) -> Option<&[u8]> {
    let offset = exif
        .get_field(Tag::JPEGInterchangeFormat, In::THUMBNAIL)?
        .value
        .get_uint(0)? as usize;
    let length = exif
        .get_field(Tag::JPEGInterchangeFormatLength, In::THUMBNAIL)?
        .value
        .get_uint(0)? as usize;
    exif.buf().get(offset..offset.checked_add(length)?)
}

fn geotag_fields(tag: &GeoTag) -> Vec<Field> {
    let rational = |values: &[Rational]| {
        Value::Rational(
            values
                .iter()
                .map(|value| exif::Rational {
                    num: value.numerator,
                    denom: value.denominator,
                })
                .collect(),
        )
    };
    let ascii = |text: &str| Value::Ascii(vec![text.as_bytes().to_vec()]);
    let field = |tag, value| Field {
        tag,
        ifd_num: In::PRIMARY,
        value,
    };

    vec![
        field(Tag::GPSLatitudeRef, ascii(tag.latitude_ref.as_str())),
        field(Tag::GPSLatitude, rational(&tag.latitude)),
        field(Tag::GPSLongitudeRef, ascii(tag.longitude_ref.as_str())),
        field(Tag::GPSLongitude, rational(&tag.longitude)),
        field(
            Tag::GPSAltitudeRef,
            Value::Byte(vec![tag.altitude_ref.as_byte()]),
        ),
        field(Tag::GPSAltitude, rational(&[tag.altitude])),
    ]
}

/// Write `contents` next to `path` and rename it over `path`.
fn replace_file(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let permissions = fs::metadata(path)?.permissions();

    let mut temporary = tempfile::NamedTempFile::new_in(directory)?;
    temporary.write_all(contents)?;
    temporary.as_file().sync_all()?;
    fs::set_permissions(temporary.path(), permissions)?;
    temporary.persist(path).map_err(|error| error.error)?;
    Ok(())
}
