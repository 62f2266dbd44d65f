//! Codec collaborator traits and their error type.
//!
//! Pipelines never touch a codec library directly. They drive these traits:
//!
//! | Trait | Whole-buffer operations | File operations (provided) |
//! |---|---|---|
//! | [`JpegCodec`] | `decompress_memory`, `compress_memory`, | `decompress`, `compress`, |
//! | | `optimize_memory` | `read_markers`, `optimize` |
//! | [`PngCodec`] | `resize_memory`, `optimize` | `resize` |
//! | [`TiffCodec`] | `recompress` | |
//!
//! The production implementation is [`NativeBackend`](super::NativeBackend).
//! Tests use the recording `MockBackend` from this module's `tests`.
//!
//! Implementors supply the whole-buffer operations. The file operations load
//! the input whole, call them, and write the result; each owns its file
//! handle for exactly the duration of the call.

use super::markers::{self, MarkerSegment};
use crate::params::{
    DctMethod, EncodeSettings, ImageProperties, PixelBuffer, PngParameters, TiffParameters,
};
use std::io::Read;
use std::num::NonZeroU8;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("cannot open input: {0}")]
    OpenInput(#[source] std::io::Error),
    #[error("cannot open output: {0}")]
    OpenOutput(#[source] std::io::Error),
    #[error("cannot determine input size: {0}")]
    Size(String),
    #[error("image dimensions overflow")]
    Overflow,
    #[error("pixel buffer holds {actual} bytes, image needs {expected}")]
    BufferMismatch { expected: usize, actual: usize },
    #[error("unsupported color space: {0}")]
    UnsupportedColorSpace(String),
    #[error("decode failed: {0}")]
    Decode(String),
    #[error("encode failed: {0}")]
    Encode(String),
    #[error("resize failed: {0}")]
    Resize(String),
}

/// Read a whole file, keeping open, size and overflow failures apart.
fn read_input(path: &Path) -> Result<Vec<u8>, CodecError> {
    let mut file = std::fs::File::open(path).map_err(CodecError::OpenInput)?;
    let len = file
        .metadata()
        .map_err(|e| CodecError::Size(e.to_string()))?
        .len();
    let capacity = usize::try_from(len).map_err(|_| CodecError::Overflow)?;
    let mut data = Vec::with_capacity(capacity);
    file.read_to_end(&mut data).map_err(CodecError::OpenInput)?;
    Ok(data)
}

fn write_output(path: &Path, data: &[u8]) -> Result<(), CodecError> {
    std::fs::write(path, data).map_err(CodecError::OpenOutput)
}

/// JPEG collaborator: pixel-level decode/encode plus the coefficient-level
/// lossless transcode.
pub trait JpegCodec {
    /// Decode a whole JPEG file image to packed pixels.
    ///
    /// `scale_factor` in `(0, 1]` is applied by the decoder (nearest eighth).
    /// Returns [`CodecError::UnsupportedColorSpace`] when the stored color
    /// model has no pixel-level path; callers fall back to optimize-only.
    fn decompress_memory(
        &self,
        data: &[u8],
        dct_method: DctMethod,
        scale_factor: f64,
    ) -> Result<(PixelBuffer, ImageProperties), CodecError>;

    /// Encode `pixels` into a JPEG file image. The buffer is consumed.
    fn compress_memory(
        &self,
        pixels: PixelBuffer,
        settings: &EncodeSettings,
    ) -> Result<Vec<u8>, CodecError>;

    /// Transcode a JPEG file image with optimized entropy coding.
    ///
    /// Pixel-exact. When `markers` is given they are merged into the
    /// destination; otherwise no APPn/COM segment from `data` survives.
    fn optimize_memory(
        &self,
        data: &[u8],
        markers: Option<&[MarkerSegment]>,
        progressive: bool,
    ) -> Result<Vec<u8>, CodecError>;

    /// [`decompress_memory`](Self::decompress_memory) over the file at `input`.
    fn decompress(
        &self,
        input: &Path,
        dct_method: DctMethod,
        scale_factor: f64,
    ) -> Result<(PixelBuffer, ImageProperties), CodecError> {
        let data = read_input(input)?;
        self.decompress_memory(&data, dct_method, scale_factor)
    }

    /// Encode `pixels` into `output`.
    fn compress(
        &self,
        output: &Path,
        pixels: PixelBuffer,
        settings: &EncodeSettings,
    ) -> Result<(), CodecError> {
        let encoded = self.compress_memory(pixels, settings)?;
        write_output(output, &encoded)
    }

    /// APPn/COM segments of `path`, in file order.
    fn read_markers(&self, path: &Path) -> Result<Vec<MarkerSegment>, CodecError> {
        let data = std::fs::read(path).map_err(CodecError::OpenInput)?;
        markers::read_markers(&data)
    }

    /// Transcode `input` into `output`. The input is read whole before the
    /// output is opened, so both may be the same path.
    fn optimize(
        &self,
        input: &Path,
        output: &Path,
        markers: Option<&[MarkerSegment]>,
        progressive: bool,
    ) -> Result<(), CodecError> {
        let data = read_input(input)?;
        let encoded = self.optimize_memory(&data, markers, progressive)?;
        write_output(output, &encoded)
    }
}

/// PNG collaborator.
pub trait PngCodec {
    /// Resample a decodable file image by `factor` and encode it as PNG with
    /// the same channel layout.
    fn resize_memory(&self, data: &[u8], factor: f64) -> Result<Vec<u8>, CodecError>;

    /// Re-compress a whole PNG file image.
    fn optimize(
        &self,
        data: &[u8],
        settings: &PngParameters,
        iterations: NonZeroU8,
    ) -> Result<Vec<u8>, CodecError>;

    /// [`resize_memory`](Self::resize_memory) from `input` into `output`.
    fn resize(&self, input: &Path, output: &Path, factor: f64) -> Result<(), CodecError> {
        let data = std::fs::read(input)
            .map_err(|e| CodecError::Resize(format!("cannot open {}: {e}", input.display())))?;
        let resized = self.resize_memory(&data, factor)?;
        std::fs::write(output, resized)
            .map_err(|e| CodecError::Resize(format!("cannot write {}: {e}", output.display())))
    }
}

/// TIFF collaborator.
pub trait TiffCodec {
    /// Decode a whole TIFF file image and re-encode it with `settings`.
    fn recompress(&self, data: &[u8], settings: &TiffParameters) -> Result<Vec<u8>, CodecError>;
}
