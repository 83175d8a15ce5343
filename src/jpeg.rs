//! JPEG marker-segment surgery for the EXIF APP1 block.
//!
//! Only the header segments between SOI and SOS are walked; entropy-coded
//! image data after SOS is copied through untouched.

const MARKER_PREFIX: u8 = 0xFF;
const SOI: u8 = 0xD8;
const EOI: u8 = 0xD9;
const SOS: u8 = 0xDA;
const APP0: u8 = 0xE0;
const APP1: u8 = 0xE1;
const TEM: u8 = 0x01;

/// Identifier that opens an EXIF APP1 payload.
pub const EXIF_HEADER: &[u8] = b"Exif\0\0";

/// Largest payload a single marker segment can carry.
const MAX_SEGMENT_PAYLOAD: usize = u16::MAX as usize - 2;

#[derive(Debug, Clone, Copy)]
struct Segment {
    marker: u8,
    /// Offset of the 0xFF byte.
    start: usize,
    /// Offset one past the last payload byte.
    end: usize,
    /// Offset of the first payload byte.
    payload: usize,
}

impl Segment {
    fn payload<'a>(&self, data: &'a [u8]) -> &'a [u8] {
        &data[self.payload..self.end]
    }

    fn is_exif(&self, data: &[u8]) -> bool {
        self.marker == APP1 && self.payload(data).starts_with(EXIF_HEADER)
    }
}

struct Layout {
    segments: Vec<Segment>,
    /// Offset where the scan (or EOI) begins; everything after is copied.
    tail: usize,
}

fn parse_layout(data: &[u8]) -> Result<Layout, String> {
    if data.len() < 4 || data[0] != MARKER_PREFIX || data[1] != SOI {
        return Err("not a JPEG file (missing SOI marker)".to_string());
    }

    let mut segments = Vec::new();
    let mut offset = 2;
    loop {
        if offset >= data.len() {
            return Err("JPEG header ends before the first scan".to_string());
        }
        if data[offset] != MARKER_PREFIX {
            return Err(format!("expected a marker at byte {offset}"));
        }
        let start = offset;
        while offset < data.len() && data[offset] == MARKER_PREFIX {
            offset += 1;
        }
        let Some(&marker) = data.get(offset) else {
            return Err("JPEG header ends inside a marker".to_string());
        };
        offset += 1;

        match marker {
            SOS | EOI => {
                return Ok(Layout {
                    segments,
                    tail: start,
                });
            }
            TEM | 0xD0..=0xD7 => continue,
            _ => {}
        }

        let Some(length_bytes) = data.get(offset..offset + 2) else {
            return Err(format!("truncated length for marker 0x{marker:02X}"));
        };
        let length = u16::from_be_bytes([length_bytes[0], length_bytes[1]]) as usize;
        if length < 2 || offset + length > data.len() {
            return Err(format!(
                "marker 0x{marker:02X} at byte {start} has invalid length {length}"
            ));
        }
        segments.push(Segment {
            marker,
            start,
            end: offset + length,
            payload: offset + 2,
        });
        offset += length;
    }
}

/// The TIFF structure inside the first EXIF APP1 segment, if any.
///
/// # Errors
///
/// Returns a description of the problem if `data` is not a JPEG with a
/// well-formed header.
pub fn find_exif(data: &[u8]) -> Result<Option<&[u8]>, String> {
    let layout = parse_layout(data)?;
    Ok(layout
        .segments
        .iter()
        .find(|segment| segment.is_exif(data))
        .map(|segment| &segment.payload(data)[EXIF_HEADER.len()..]))
}

/// Return a copy of `data` whose EXIF block holds `tiff`.
///
/// The first existing EXIF APP1 segment is replaced in place and any further
/// ones are dropped. Without an existing segment the new one goes right after
/// SOI and any APP0 (JFIF) segments. All other bytes are copied unchanged.
///
/// # Errors
///
/// Returns a description of the problem if `data` is not a JPEG or `tiff`
/// does not fit in one segment.
pub fn replace_exif(data: &[u8], tiff: &[u8]) -> Result<Vec<u8>, String> {
    let layout = parse_layout(data)?;

    let payload_length = EXIF_HEADER.len() + tiff.len();
    if payload_length > MAX_SEGMENT_PAYLOAD {
        return Err(format!(
            "EXIF block of {payload_length} bytes exceeds the {MAX_SEGMENT_PAYLOAD} byte segment limit"
        ));
    }
    let mut exif_segment = Vec::with_capacity(payload_length + 4);
    exif_segment.extend_from_slice(&[MARKER_PREFIX, APP1]);
    exif_segment.extend_from_slice(&((payload_length + 2) as u16).to_be_bytes());
    exif_segment.extend_from_slice(EXIF_HEADER);
    exif_segment.extend_from_slice(tiff);

    let insert_at = if layout.segments.iter().any(|segment| segment.is_exif(data)) {
        None
    } else {
        Some(
            layout
                .segments
                .iter()
                .take_while(|segment| segment.marker == APP0)
                .count(),
        )
    };

    let mut output = Vec::with_capacity(data.len() + exif_segment.len());
    output.extend_from_slice(&data[..2]);
    let mut written = false;
    for (index, segment) in layout.segments.iter().enumerate() {
        if insert_at == Some(index) {
            output.extend_from_slice(&exif_segment);
            written = true;
        }
        if segment.is_exif(data) {
            if !written {
                output.extend_from_slice(&exif_segment);
                written = true;
            }
            continue;
        }
        output.extend_from_slice(&data[segment.start..segment.end]);
    }
    if !written {
        output.extend_from_slice(&exif_segment);
    }
    output.extend_from_slice(&data[layout.tail..]);
    Ok(output)
}
