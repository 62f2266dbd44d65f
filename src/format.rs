//! Content-based format detection.
//!
//! The extension is never consulted. Detection looks at the first bytes only:
//!
//! | Prefix | Type |
//! |---|---|
//! | `FF D8` | JPEG |
//! | `89 50` | PNG |
//! | `49 49 2A 00` / `4D 4D 00 2A` | TIFF (little / big endian) |
//!
//! Anything else, including inputs shorter than two bytes, is `Unknown`.

use crate::error::ErrorCode;
use crate::report::Reporter;
use serde::Serialize;
use std::io::Read;

/// Number of bytes the sniffer ever looks at.
pub const SNIFF_LEN: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageType {
    Jpeg,
    Png,
    Tiff,
    Unknown,
}

impl ImageType {
    /// Whether a pipeline exists for this type.
    pub fn is_supported(self) -> bool {
        self != ImageType::Unknown
    }
}

impl std::fmt::Display for ImageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ImageType::Jpeg => "jpeg",
            ImageType::Png => "png",
            ImageType::Tiff => "tiff",
            ImageType::Unknown => "unknown",
        })
    }
}

/// Classify a leading byte prefix. Pure and total.
pub fn classify(prefix: &[u8]) -> ImageType {
    match prefix {
        [0x49, 0x49, 0x2A, 0x00, ..] | [0x4D, 0x4D, 0x00, 0x2A, ..] => ImageType::Tiff,
        [0xFF, 0xD8, ..] => ImageType::Jpeg,
        [0x89, 0x50, ..] => ImageType::Png,
        _ => ImageType::Unknown,
    }
}

/// Read up to [`SNIFF_LEN`] bytes from `reader` and classify them.
///
/// Reports a warning and returns `Unknown` when the handle is missing (101),
/// fewer than two bytes could be read (102) or the signature is not
/// recognized (103). The reader is left wherever reading stopped.
pub fn detect<R: Read + ?Sized>(reader: Option<&mut R>, reporter: &mut Reporter) -> ImageType {
    let Some(reader) = reader else {
        reporter.report_code(ErrorCode::NullHandle);
        return ImageType::Unknown;
    };

    let mut prefix = [0u8; SNIFF_LEN];
    let read = read_prefix(reader, &mut prefix);
    if read < 2 {
        reporter.report_code(ErrorCode::ShortRead);
        return ImageType::Unknown;
    }

    let kind = classify(&prefix[..read]);
    if kind == ImageType::Unknown {
        reporter.report_code(ErrorCode::UnsupportedType);
    }
    tracing::debug!(%kind, bytes = read, "sniffed input");
    kind
}

/// Fill as much of `buf` as the reader yields. Errors end the read like EOF.
fn read_prefix<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> usize {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(_) => break,
        }
    }
    filled
}
