//! JPEG APPn/COM segments: scanning and merging.
//!
//! [`read_markers`] walks the marker stream of a JPEG file up to the first
//! SOS and collects every APP0–APP15 and COM segment in file order.
//! [`merge`] copies a collected sequence into a destination encoder, dropping
//! the JFIF and Adobe headers the destination already writes on its own.
//!
//! The destination is abstracted as a [`MarkerSink`] so the merge rules can be
//! exercised without a live encoder.

use super::backend::CodecError;

pub const SOI: u8 = 0xD8;
pub const EOI: u8 = 0xD9;
pub const SOS: u8 = 0xDA;
pub const APP0: u8 = 0xE0;
pub const APP1: u8 = 0xE1;
pub const APP14: u8 = 0xEE;
pub const APP15: u8 = 0xEF;
pub const COM: u8 = 0xFE;

const JFIF_ID: &[u8] = b"JFIF\0";
const ADOBE_ID: &[u8] = b"Adobe";

/// One APPn or COM segment. `payload` excludes the marker and length bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerSegment {
    pub marker: u8,
    pub payload: Vec<u8>,
}

impl MarkerSegment {
    pub fn new(marker: u8, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            marker,
            payload: payload.into(),
        }
    }

    /// APP0 carrying a JFIF header.
    pub fn is_jfif(&self) -> bool {
        self.marker == APP0 && self.payload.starts_with(JFIF_ID)
    }

    /// APP14 carrying an Adobe header.
    pub fn is_adobe(&self) -> bool {
        self.marker == APP14 && self.payload.starts_with(ADOBE_ID)
    }

    /// Serialized form: `FF <marker> <len_hi> <len_lo> <payload>`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let len = (self.payload.len() + 2) as u16;
        let mut out = Vec::with_capacity(self.payload.len() + 4);
        out.extend_from_slice(&[0xFF, self.marker]);
        out.extend_from_slice(&len.to_be_bytes());
        out.extend_from_slice(&self.payload);
        out
    }
}

/// A JPEG encoder that accepts extra marker segments.
pub trait MarkerSink {
    /// The encoder writes its own JFIF APP0.
    fn emits_jfif(&self) -> bool;
    /// The encoder writes its own Adobe APP14.
    fn emits_adobe(&self) -> bool;
    fn write_marker(&mut self, segment: &MarkerSegment);
}

/// Copy `source` into `dest` in order, skipping the headers `dest` duplicates.
///
/// Returns the number of segments written.
pub fn merge(source: &[MarkerSegment], dest: &mut impl MarkerSink) -> usize {
    let skip_jfif = dest.emits_jfif();
    let skip_adobe = dest.emits_adobe();
    let mut written = 0;
    for segment in source {
        if skip_jfif && segment.is_jfif() {
            continue;
        }
        if skip_adobe && segment.is_adobe() {
            continue;
        }
        dest.write_marker(segment);
        written += 1;
    }
    written
}

fn is_saved_marker(marker: u8) -> bool {
    (APP0..=APP15).contains(&marker) || marker == COM
}

/// Collect APPn/COM segments from a JPEG file image.
///
/// Stops at SOS or EOI. A segment whose declared length runs past the end of
/// the data is truncated to what is present, which is what libjpeg does when
/// it saves markers from a short file.
pub fn read_markers(data: &[u8]) -> Result<Vec<MarkerSegment>, CodecError> {
    if data.len() < 2 || data[0] != 0xFF || data[1] != SOI {
        return Err(CodecError::Decode("missing SOI marker".into()));
    }

    let mut segments = Vec::new();
    let mut pos = 2;
    while pos + 1 < data.len() {
        if data[pos] != 0xFF {
            pos += 1;
            continue;
        }
        let marker = data[pos + 1];
        match marker {
            // Fill bytes before a marker
            0xFF => {
                pos += 1;
                continue;
            }
            SOS | EOI => break,
            0x00 | 0x01 | 0xD0..=0xD7 | SOI => {
                pos += 2;
                continue;
            }
            _ => {}
        }

        if pos + 3 >= data.len() {
            break;
        }
        let len = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
        if len < 2 {
            return Err(CodecError::Decode(format!(
                "bogus length {len} for marker {marker:#04X}"
            )));
        }
        let start = pos + 4;
        let end = (pos + 2 + len).min(data.len());
        if is_saved_marker(marker) {
            segments.push(MarkerSegment::new(marker, &data[start..end]));
        }
        pos += 2 + len;
    }
    Ok(segments)
}
