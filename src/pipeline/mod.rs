//! Per-format pipelines.
//!
//! Each pipeline is a short fixed sequence of codec calls, generic over the
//! backend trait it needs:
//!
//! | Format | Stages |
//! |---|---|
//! | JPEG | `(LossyRecompress)? → LosslessOptimize` |
//! | PNG | `(Resize)? → StructuralOptimize` |
//! | TIFF | `Recompress` |
//!
//! Pipelines return the first fatal failure as a
//! [`CompressError`](crate::error::CompressError) and stop. Partial outputs
//! are left in place.

pub mod jpeg;
pub mod png;
pub mod tiff;
