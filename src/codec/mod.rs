//! Codec collaborators.
//!
//! | Concern | Crate |
//! |---|---|
//! | JPEG decode / encode / lossless transcode | `mozjpeg-sys` (libjpeg API) |
//! | JPEG APPn/COM scan and merge | [`markers`] |
//! | PNG resize | `image` (`Lanczos3`) |
//! | PNG re-compression | `oxipng` (Zopfli) |
//! | TIFF re-encode | `image` decode + `tiff` encoder |
//!
//! The module is split into:
//! - **Backend**: the [`JpegCodec`], [`PngCodec`] and [`TiffCodec`] traits
//! - **Calculations**: pure dimension and parameter math
//! - **Markers**: metadata scanner and merger
//! - **NativeBackend**: the production implementation of all three traits

pub mod backend;
pub mod calculations;
pub mod markers;
mod mozjpeg;
mod png;
mod tiff;

pub use backend::{CodecError, JpegCodec, PngCodec, TiffCodec};
pub use markers::{MarkerSegment, MarkerSink};

/// Production backend: libjpeg, oxipng, image and tiff, statically linked.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeBackend;
