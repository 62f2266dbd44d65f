//! # pinch
//!
//! Image-file size reduction engine. Given an input raster image it writes a
//! smaller file of the same format, following a caller-supplied quality
//! policy.
//!
//! # Architecture: Sniff, Dispatch, Optimize
//!
//! ```text
//! input ──▶ format::detect ──▶ pipeline::{jpeg, png, tiff} ──▶ output
//!                 │                         │
//!                 └─────── Reporter ◀───────┘   (last-error slot)
//! ```
//!
//! 1. **Sniff**: the format is read from the first bytes, never from the
//!    extension.
//! 2. **Dispatch**: one pipeline per format, each a short fixed sequence of
//!    codec calls.
//! 3. **Optimize**: every pipeline ends in a structural optimization pass.
//!    Lossy re-encoding, resizing and metadata carry-over are optional steps
//!    in front of it.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`compress`] | Orchestrator: [`Compressor`], [`Outcome`], [`compress()`], |
//! | | [`compress_in_memory()`], [`compress_to_size()`] |
//! | [`format`] | Magic-byte format sniffing |
//! | [`pipeline`] | Per-format pipelines (JPEG, PNG, TIFF) |
//! | [`codec`] | Codec traits, [`NativeBackend`], JPEG marker merge |
//! | [`params`] | Compression parameters and decoded image properties |
//! | [`error`] | Error codes, severities, [`CompressError`] |
//! | [`report`] | Last-error slot and diagnostic lines |
//! | [`config`] | TOML configuration file |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Content-Based Detection
//!
//! A `.jpg` that is really a PNG goes down the PNG pipeline. Unknown content
//! is rejected with a warning and the output path is never touched.
//!
//! ## Traits at the Codec Seam
//!
//! Pipelines are generic over [`JpegCodec`], [`PngCodec`] and [`TiffCodec`].
//! Stage sequencing (which file feeds which step, where metadata is read
//! from) is tested against a recording mock; codec behavior is tested
//! against [`NativeBackend`].
//!
//! ## Files or Buffers
//!
//! Codecs work on whole file images; the file operations are thin provided
//! wrappers. [`compress()`] goes file to file, [`compress_in_memory()`] buffer
//! to buffer, and [`compress_to_size()`] searches quality (JPEG) or scale
//! (PNG) for the best result that fits a byte budget.
//!
//! ## One Slot, Scoped to a Call
//!
//! Codes are reported into a single slot owned by the [`Compressor`]. The slot
//! is cleared when a call begins and overwritten by every report, so a warning
//! raised early in a successful call is still visible afterwards.

pub mod codec;
pub mod compress;
pub mod config;
pub mod error;
pub mod format;
pub mod output;
pub mod params;
pub mod pipeline;
pub mod report;

pub use codec::{JpegCodec, NativeBackend, PngCodec, TiffCodec};
pub use compress::{Compressor, Outcome, compress, compress_in_memory, compress_to_size};
pub use error::{CompressError, ErrorCode, Severity};
pub use format::ImageType;
pub use params::CompressionParameters;

#[cfg(test)]
pub(crate) mod test_helpers;
