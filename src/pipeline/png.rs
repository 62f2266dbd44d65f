//! PNG pipeline.
//!
//! ```text
//! Start ──0 < scale < 1──▶ Resize ──▶ StructuralOptimize ──▶ Done
//!   └──────scale == 1───────────────▲
//! ```
//!
//! Parameters are checked before anything is written. The optimizer works on
//! the whole file image in memory: it is loaded from the output when a resize
//! ran and from the input otherwise.

use crate::codec::PngCodec;
use crate::codec::calculations::{is_valid_scale_factor, select_iterations};
use crate::error::{CompressError, ErrorCode, Result};
use crate::params::PngParameters;
use std::path::Path;
use tracing::debug;

/// Check scale factor (305) and iteration counts (303).
pub fn validate(params: &PngParameters) -> Result<()> {
    let factor = params.scale_factor;
    if !is_valid_scale_factor(factor) {
        return Err(CompressError::with_detail(
            ErrorCode::PngScaleFactor,
            format!("{factor} is outside (0, 1]"),
        ));
    }
    if params.iterations == 0 || params.iterations_large == 0 {
        return Err(CompressError::with_detail(
            ErrorCode::PngParameters,
            "iteration counts must be at least 1",
        ));
    }
    Ok(())
}

pub fn run<B: PngCodec>(
    backend: &B,
    input: &Path,
    output: &Path,
    params: &PngParameters,
) -> Result<()> {
    validate(params)?;

    let source = if params.scale_factor < 1.0 {
        backend
            .resize(input, output, params.scale_factor)
            .map_err(|e| CompressError::with_detail(ErrorCode::PngResize, e))?;
        output
    } else {
        input
    };

    let data = std::fs::read(source)
        .map_err(|e| CompressError::with_detail(ErrorCode::PngLoad, e))?;
    let optimized = optimize(backend, &data, params)?;

    std::fs::write(output, &optimized)
        .map_err(|e| CompressError::with_detail(ErrorCode::PngSave, e))
}

/// Run the PNG pipeline over the file image `data`.
pub fn run_in_memory<B: PngCodec>(
    backend: &B,
    data: &[u8],
    params: &PngParameters,
) -> Result<Vec<u8>> {
    validate(params)?;

    if params.scale_factor < 1.0 {
        let resized = backend
            .resize_memory(data, params.scale_factor)
            .map_err(|e| CompressError::with_detail(ErrorCode::PngResize, e))?;
        optimize(backend, &resized, params)
    } else {
        optimize(backend, data, params)
    }
}

fn optimize<B: PngCodec>(backend: &B, data: &[u8], params: &PngParameters) -> Result<Vec<u8>> {
    let iterations = select_iterations(data.len(), params);
    let optimized = backend
        .optimize(data, params, iterations)
        .map_err(|e| CompressError::with_detail(ErrorCode::PngOptimize, e))?;
    debug!(
        before = data.len(),
        after = optimized.len(),
        iterations = iterations.get(),
        "png optimized"
    );
    Ok(optimized)
}
