//! TIFF pipeline: load, re-encode with the configured compression, save.

use crate::codec::{CodecError, TiffCodec};
use crate::error::{CompressError, ErrorCode, Result};
use crate::params::TiffParameters;
use std::path::Path;
use tracing::debug;

pub fn run<B: TiffCodec>(
    backend: &B,
    input: &Path,
    output: &Path,
    params: &TiffParameters,
) -> Result<()> {
    let data =
        std::fs::read(input).map_err(|e| CompressError::with_detail(ErrorCode::TiffLoad, e))?;
    let encoded = run_in_memory(backend, &data, params)?;
    std::fs::write(output, &encoded)
        .map_err(|e| CompressError::with_detail(ErrorCode::TiffSave, e))
}

/// Re-encode the TIFF file image `data`.
pub fn run_in_memory<B: TiffCodec>(
    backend: &B,
    data: &[u8],
    params: &TiffParameters,
) -> Result<Vec<u8>> {
    let encoded = backend.recompress(data, params).map_err(|e| {
        let code = match e {
            CodecError::UnsupportedColorSpace(_) => ErrorCode::TiffColorType,
            CodecError::Decode(_) => ErrorCode::TiffLoad,
            _ => ErrorCode::TiffEncode,
        };
        CompressError::with_detail(code, e)
    })?;
    debug!(before = data.len(), after = encoded.len(), "tiff re-encoded");
    Ok(encoded)
}
