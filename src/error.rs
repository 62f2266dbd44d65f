//! Error codes, severities and the per-call error value.
//!
//! Every condition the engine can report has a stable numeric code grouped
//! by range:
//!
//! | Range | Area |
//! |---|---|
//! | 100s | Generic (input handling, type detection, parameters) |
//! | 200s | JPEG pipeline |
//! | 300s | PNG pipeline |
//! | 400s | TIFF pipeline |
//!
//! Codes carry a default [`Severity`]. Warnings (unknown type, short read,
//! color-model fallback) never abort a running pipeline; errors always do.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Result type used by pipelines and the orchestrator.
pub type Result<T> = std::result::Result<T, CompressError>;

/// Classification of a reported condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    /// Operation-fatal.
    Error,
    /// Advisory; the caller decides whether to stop.
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => f.write_str("ERROR"),
            Severity::Warning => f.write_str("WARNING"),
        }
    }
}

/// Every documented condition, with its stable numeric code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u32)]
pub enum ErrorCode {
    // Generic
    NullHandle = 101,
    ShortRead = 102,
    UnsupportedType = 103,
    OpenInput = 104,
    InvalidParameters = 105,
    TargetSize = 106,

    // JPEG
    JpegMarkerOpen = 200,
    JpegOptimizeOpenInput = 201,
    JpegOptimizeOpenOutput = 202,
    JpegCompressOpenOutput = 203,
    JpegDecompressOpenInput = 204,
    JpegDecompressSize = 205,
    JpegDecompressOverflow = 206,
    JpegEncoder = 207,
    JpegDecoder = 208,
    JpegCompressSize = 209,
    JpegCompressOverflow = 210,
    JpegColorFallback = 211,
    JpegOptimize = 212,
    JpegScaleFactor = 213,

    // PNG
    PngLoad = 300,
    PngOptimize = 301,
    PngSave = 302,
    PngParameters = 303,
    PngResize = 304,
    PngScaleFactor = 305,

    // TIFF
    TiffLoad = 400,
    TiffColorType = 401,
    TiffEncode = 402,
    TiffSave = 403,
}

impl ErrorCode {
    /// Every documented code, in ascending order.
    pub const ALL: [ErrorCode; 30] = [
        ErrorCode::NullHandle,
        ErrorCode::ShortRead,
        ErrorCode::UnsupportedType,
        ErrorCode::OpenInput,
        ErrorCode::InvalidParameters,
        ErrorCode::TargetSize,
        ErrorCode::JpegMarkerOpen,
        ErrorCode::JpegOptimizeOpenInput,
        ErrorCode::JpegOptimizeOpenOutput,
        ErrorCode::JpegCompressOpenOutput,
        ErrorCode::JpegDecompressOpenInput,
        ErrorCode::JpegDecompressSize,
        ErrorCode::JpegDecompressOverflow,
        ErrorCode::JpegEncoder,
        ErrorCode::JpegDecoder,
        ErrorCode::JpegCompressSize,
        ErrorCode::JpegCompressOverflow,
        ErrorCode::JpegColorFallback,
        ErrorCode::JpegOptimize,
        ErrorCode::JpegScaleFactor,
        ErrorCode::PngLoad,
        ErrorCode::PngOptimize,
        ErrorCode::PngSave,
        ErrorCode::PngParameters,
        ErrorCode::PngResize,
        ErrorCode::PngScaleFactor,
        ErrorCode::TiffLoad,
        ErrorCode::TiffColorType,
        ErrorCode::TiffEncode,
        ErrorCode::TiffSave,
    ];

    /// Look up a numeric code.
    pub fn from_code(code: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.code() == code)
    }

    pub fn code(self) -> u32 {
        self as u32
    }

    pub fn severity(self) -> Severity {
        match self {
            ErrorCode::NullHandle
            | ErrorCode::ShortRead
            | ErrorCode::UnsupportedType
            | ErrorCode::JpegColorFallback => Severity::Warning,
            _ => Severity::Error,
        }
    }

    pub fn message(self) -> &'static str {
        message_for(self.code())
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Human-readable message for a numeric code.
///
/// Total over `u32`: anything outside the documented codes maps to
/// `"Unrecognized error."`.
pub fn message_for(code: u32) -> &'static str {
    match code {
        101 => "Input handle unavailable while checking type.",
        102 => "Could not read enough file bytes for type checking.",
        103 => "File type not supported.",
        104 => "Could not open input file.",
        105 => "Invalid compression parameters.",
        106 => "Could not reach the requested output size.",

        200 => "Failed to open input file for reading markers.",
        201 => "Failed to open input file while optimizing.",
        202 => "Failed to open output file while optimizing.",
        203 => "Failed to open output file while compressing.",
        204 => "Failed to open input file while decompressing.",
        205 => "Failed to retrieve input file size while decompressing.",
        206 => "Input file too big while decompressing.",
        207 => "Compressor failed.",
        208 => "Decompressor failed.",
        209 => "Pixel buffer does not match image size while compressing.",
        210 => "Image dimensions overflow while compressing.",
        211 => "Unsupported color model, falling back to optimization only.",
        212 => "Error while optimizing JPEG.",
        213 => "Invalid JPEG scale factor.",

        300 => "Failed to load PNG file.",
        301 => "Error while optimizing PNG.",
        302 => "Error while writing output PNG file.",
        303 => "Invalid PNG optimization parameters.",
        304 => "Error while resizing PNG.",
        305 => "Invalid scale factor.",

        400 => "Failed to load TIFF file.",
        401 => "Unsupported TIFF color type.",
        402 => "Error while encoding TIFF.",
        403 => "Error while writing output TIFF file.",

        _ => "Unrecognized error.",
    }
}

/// A fatal condition raised by one pipeline step.
///
/// `detail` keeps whatever the collaborator said (I/O error text, libjpeg
/// message code, oxipng error) so callers get more than the table message.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
pub struct CompressError {
    pub code: ErrorCode,
    pub detail: Option<String>,
}

impl fmt::Display for CompressError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}: {}",
            self.code.severity(),
            self.code.code(),
            self.code.message()
        )?;
        if let Some(detail) = &self.detail {
            write!(f, " ({detail})")?;
        }
        Ok(())
    }
}

impl CompressError {
    pub fn new(code: ErrorCode) -> Self {
        Self { code, detail: None }
    }

    pub fn with_detail(code: ErrorCode, detail: impl fmt::Display) -> Self {
        Self {
            code,
            detail: Some(detail.to_string()),
        }
    }

    pub fn severity(&self) -> Severity {
        self.code.severity()
    }
}

impl From<ErrorCode> for CompressError {
    fn from(code: ErrorCode) -> Self {
        Self::new(code)
    }
}
