//! JPEG pipeline.
//!
//! ```text
//! Start ──quality != 0──▶ LossyRecompress ──▶ LosslessOptimize ──▶ Done
//!   └──────quality == 0──────────────────────▲
//! ```
//!
//! The lossy stage decodes the original and re-encodes it into the output
//! path, which then becomes the input of the lossless stage. The lossless
//! stage always runs and is pixel-exact. Metadata, when requested, is read
//! from the original input before the lossy stage writes anything, so an
//! in-place run keeps it too.
//!
//! [`run_in_memory`] performs the same stages on a file image and returns the
//! result without touching the filesystem.

use crate::codec::calculations::is_valid_scale_factor;
use crate::codec::markers::{self, MarkerSegment};
use crate::codec::{CodecError, JpegCodec};
use crate::error::{CompressError, ErrorCode, Result};
use crate::params::{EncodeSettings, ImageProperties, JpegParameters, PixelBuffer};
use crate::report::Reporter;
use std::path::Path;
use tracing::{debug, info};

/// How the lossy stage ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LossyOutcome {
    /// The output path now holds the re-encoded image.
    Recompressed,
    /// The color model has no pixel path; nothing was written.
    Unsupported,
}

/// Reject scale factors outside `(0, 1]`, and downscaling without a lossy
/// pass to perform it.
pub fn validate(params: &JpegParameters) -> Result<()> {
    let factor = params.scale_factor;
    if !is_valid_scale_factor(factor) {
        return Err(CompressError::with_detail(
            ErrorCode::JpegScaleFactor,
            format!("{factor} is outside (0, 1]"),
        ));
    }
    if factor < 1.0 && !params.is_lossy() {
        return Err(CompressError::with_detail(
            ErrorCode::JpegScaleFactor,
            "downscaling requires a non-zero quality",
        ));
    }
    Ok(())
}

/// Run the JPEG pipeline from `input` into `output`.
///
/// A color-model fallback is reported as a warning on `reporter`; every other
/// failure is returned.
pub fn run<B: JpegCodec>(
    backend: &B,
    input: &Path,
    output: &Path,
    params: &JpegParameters,
    reporter: &mut Reporter,
) -> Result<()> {
    validate(params)?;

    let markers = if params.metadata_copy {
        let markers = backend.read_markers(input).map_err(marker_error)?;
        debug!(count = markers.len(), "collected markers from original");
        Some(markers)
    } else {
        None
    };

    let mut lossless_input = input;
    if params.is_lossy() {
        match lossy_recompress(backend, input, output, params)? {
            LossyOutcome::Recompressed => lossless_input = output,
            LossyOutcome::Unsupported => {
                info!(input = %input.display(), "color model not supported, optimizing only");
                reporter.report_code(ErrorCode::JpegColorFallback);
            }
        }
    }

    backend
        .optimize(lossless_input, output, markers.as_deref(), params.progressive)
        .map_err(optimize_error)?;
    debug!(output = %output.display(), "jpeg optimized");
    Ok(())
}

/// Run the JPEG pipeline over the file image `data`.
pub fn run_in_memory<B: JpegCodec>(
    backend: &B,
    data: &[u8],
    params: &JpegParameters,
    reporter: &mut Reporter,
) -> Result<Vec<u8>> {
    validate(params)?;

    let markers: Option<Vec<MarkerSegment>> = if params.metadata_copy {
        Some(markers::read_markers(data).map_err(marker_error)?)
    } else {
        None
    };

    let mut recompressed = None;
    if params.is_lossy() {
        match decoded(backend.decompress_memory(data, params.dct_method, params.scale_factor))? {
            Some((pixels, properties)) => {
                let settings = encode_settings(params, &properties);
                let encoded = backend
                    .compress_memory(pixels, &settings)
                    .map_err(compress_error)?;
                recompressed = Some(encoded);
            }
            None => {
                info!(len = data.len(), "color model not supported, optimizing only");
                reporter.report_code(ErrorCode::JpegColorFallback);
            }
        }
    }

    let source = recompressed.as_deref().unwrap_or(data);
    let optimized = backend
        .optimize_memory(source, markers.as_deref(), params.progressive)
        .map_err(optimize_error)?;
    debug!(len = optimized.len(), "jpeg optimized");
    Ok(optimized)
}

fn lossy_recompress<B: JpegCodec>(
    backend: &B,
    input: &Path,
    output: &Path,
    params: &JpegParameters,
) -> Result<LossyOutcome> {
    let decompressed = backend.decompress(input, params.dct_method, params.scale_factor);
    let Some((pixels, properties)) = decoded(decompressed)? else {
        return Ok(LossyOutcome::Unsupported);
    };
    let settings = encode_settings(params, &properties);
    backend
        .compress(output, pixels, &settings)
        .map_err(compress_error)?;
    Ok(LossyOutcome::Recompressed)
}

/// Pixels of a successful decode, or `None` when the color model has no
/// pixel path.
fn decoded(
    result: std::result::Result<(PixelBuffer, ImageProperties), CodecError>,
) -> Result<Option<(PixelBuffer, ImageProperties)>> {
    match result {
        Ok(decoded) => Ok(Some(decoded)),
        Err(CodecError::UnsupportedColorSpace(model)) => {
            debug!(%model, "skipping lossy stage");
            Ok(None)
        }
        Err(e) => Err(decompress_error(e)),
    }
}

fn encode_settings(params: &JpegParameters, decoded: &ImageProperties) -> EncodeSettings {
    let settings = EncodeSettings::resolve(params, decoded);
    debug!(
        width = decoded.width,
        height = decoded.height,
        quality = settings.quality,
        subsampling = ?settings.subsampling,
        "re-encoding jpeg"
    );
    settings
}

fn marker_error(err: CodecError) -> CompressError {
    CompressError::with_detail(ErrorCode::JpegMarkerOpen, err)
}

fn decompress_error(err: CodecError) -> CompressError {
    let code = match err {
        CodecError::OpenInput(_) => ErrorCode::JpegDecompressOpenInput,
        CodecError::Size(_) => ErrorCode::JpegDecompressSize,
        CodecError::Overflow => ErrorCode::JpegDecompressOverflow,
        _ => ErrorCode::JpegDecoder,
    };
    CompressError::with_detail(code, err)
}

fn compress_error(err: CodecError) -> CompressError {
    let code = match err {
        CodecError::OpenOutput(_) => ErrorCode::JpegCompressOpenOutput,
        CodecError::BufferMismatch { .. } => ErrorCode::JpegCompressSize,
        CodecError::Overflow => ErrorCode::JpegCompressOverflow,
        _ => ErrorCode::JpegEncoder,
    };
    CompressError::with_detail(code, err)
}

fn optimize_error(err: CodecError) -> CompressError {
    let code = match err {
        CodecError::OpenInput(_) => ErrorCode::JpegOptimizeOpenInput,
        CodecError::OpenOutput(_) => ErrorCode::JpegOptimizeOpenOutput,
        _ => ErrorCode::JpegOptimize,
    };
    CompressError::with_detail(code, err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::backend::tests::{FailAt, MOCK_BYTES_PER_QUALITY, MockBackend, RecordedOp};
    use crate::params::{ChromaSubsampling, DctMethod};
    use tempfile::TempDir;

    fn paths(tmp: &TempDir) -> (std::path::PathBuf, std::path::PathBuf) {
        let input = tmp.path().join("in.jpg");
        std::fs::write(&input, [0xFF, 0xD8, 0xFF, 0xD9]).unwrap();
        (input, tmp.path().join("out.jpg"))
    }

    fn path_str(p: &Path) -> String {
        p.to_string_lossy().to_string()
    }

    #[test]
    fn quality_zero_only_optimizes() {
        let tmp = TempDir::new().unwrap();
        let (input, output) = paths(&tmp);
        let backend = MockBackend::new();
        let mut reporter = Reporter::default();

        run(&backend, &input, &output, &JpegParameters::default(), &mut reporter).unwrap();

        let ops = backend.get_operations();
        assert_eq!(ops.len(), 1);
        assert!(matches!(
            &ops[0],
            RecordedOp::Optimize { input: i, output: o, markers: None, progressive: true }
                if *i == path_str(&input) && *o == path_str(&output)
        ));
        assert_eq!(reporter.last_code(), 0);
    }

    #[test]
    fn lossless_stage_reads_the_lossy_output() {
        let tmp = TempDir::new().unwrap();
        let (input, output) = paths(&tmp);
        let backend = MockBackend::new();
        let params = JpegParameters {
            quality: 80,
            dct_method: DctMethod::Float,
            ..Default::default()
        };

        run(&backend, &input, &output, &params, &mut Reporter::default()).unwrap();

        let ops = backend.get_operations();
        assert_eq!(ops.len(), 3);
        assert!(matches!(
            &ops[0],
            RecordedOp::Decompress { input: i, dct_method: DctMethod::Float, .. }
                if *i == path_str(&input)
        ));
        assert!(matches!(
            &ops[1],
            RecordedOp::Compress { output: o, quality: 80, .. } if *o == path_str(&output)
        ));
        assert!(matches!(
            &ops[2],
            RecordedOp::Optimize { input: i, output: o, .. }
                if *i == path_str(&output) && *o == path_str(&output)
        ));
    }

    #[test]
    fn auto_subsampling_uses_decoded_value() {
        let tmp = TempDir::new().unwrap();
        let (input, output) = paths(&tmp);
        let backend = MockBackend::new();
        let params = JpegParameters {
            quality: 60,
            ..Default::default()
        };
        run(&backend, &input, &output, &params, &mut Reporter::default()).unwrap();
        assert!(backend.get_operations().iter().any(|op| matches!(
            op,
            RecordedOp::Compress { subsampling: ChromaSubsampling::Cs420, .. }
        )));
    }

    #[test]
    fn metadata_comes_from_original_input() {
        let tmp = TempDir::new().unwrap();
        let (input, output) = paths(&tmp);
        let backend = MockBackend::with_markers(vec![
            MarkerSegment::new(0xE1, b"Exif\0\0".to_vec()),
            MarkerSegment::new(0xFE, b"c".to_vec()),
        ]);
        let params = JpegParameters {
            quality: 50,
            metadata_copy: true,
            ..Default::default()
        };

        run(&backend, &input, &output, &params, &mut Reporter::default()).unwrap();

        let ops = backend.get_operations();
        assert!(ops.contains(&RecordedOp::ReadMarkers(path_str(&input))));
        assert!(matches!(
            ops.last().unwrap(),
            RecordedOp::Optimize { markers: Some(2), .. }
        ));
    }

    #[test]
    fn metadata_is_read_before_the_lossy_stage_writes() {
        let tmp = TempDir::new().unwrap();
        let (input, _) = paths(&tmp);
        let backend = MockBackend::with_markers(vec![MarkerSegment::new(0xE1, b"Exif".to_vec())]);
        let params = JpegParameters {
            quality: 75,
            metadata_copy: true,
            ..Default::default()
        };

        run(&backend, &input, &input, &params, &mut Reporter::default()).unwrap();

        let ops = backend.get_operations();
        let position = |wanted: fn(&RecordedOp) -> bool| ops.iter().position(wanted).unwrap();
        let read = position(|op| matches!(op, RecordedOp::ReadMarkers(_)));
        let compress = position(|op| matches!(op, RecordedOp::Compress { .. }));
        assert!(read < compress, "{ops:?}");
        assert!(matches!(
            ops.last().unwrap(),
            RecordedOp::Optimize { markers: Some(1), .. }
        ));
    }

    #[test]
    fn in_memory_optimize_only() {
        let backend = MockBackend::new();
        let data = [0xFF, 0xD8, 0xFF, 0xD9];
        let out = run_in_memory(
            &backend,
            &data,
            &JpegParameters::default(),
            &mut Reporter::default(),
        )
        .unwrap();
        assert_eq!(out, data);
        assert_eq!(
            backend.get_operations(),
            vec![RecordedOp::OptimizeMemory {
                len: 4,
                markers: None
            }]
        );
    }

    #[test]
    fn in_memory_lossy_feeds_encoder_output_to_optimize() {
        let backend = MockBackend::new();
        let data = [0xFF, 0xD8, 0xFF, 0xFE, 0x00, 0x03, b'c', 0xFF, 0xD9];
        let params = JpegParameters {
            quality: 30,
            metadata_copy: true,
            ..Default::default()
        };

        let out = run_in_memory(&backend, &data, &params, &mut Reporter::default()).unwrap();

        assert_eq!(out.len(), 30 * MOCK_BYTES_PER_QUALITY);
        let ops = backend.get_operations();
        assert_eq!(ops.len(), 3);
        assert!(matches!(ops[0], RecordedOp::DecompressMemory { len: 9, .. }));
        assert!(matches!(ops[1], RecordedOp::CompressMemory { quality: 30, .. }));
        assert_eq!(
            ops[2],
            RecordedOp::OptimizeMemory {
                len: 30 * MOCK_BYTES_PER_QUALITY,
                markers: Some(1)
            }
        );
    }

    #[test]
    fn in_memory_fallback_optimizes_the_original() {
        let backend = MockBackend::failing_at(FailAt::DecompressColorSpace);
        let mut reporter = Reporter::default();
        let params = JpegParameters {
            quality: 50,
            ..Default::default()
        };
        let data = [0xFF, 0xD8, 0xFF, 0xD9];

        let out = run_in_memory(&backend, &data, &params, &mut reporter).unwrap();
        assert_eq!(out, data);
        assert_eq!(reporter.last_code(), 211);
    }

    #[test]
    fn in_memory_errors_keep_their_codes() {
        let params = JpegParameters {
            quality: 50,
            ..Default::default()
        };
        let data = [0xFF, 0xD8, 0xFF, 0xD9];
        let cases = [
            (FailAt::Decompress, ErrorCode::JpegDecoder),
            (FailAt::CompressBuffer, ErrorCode::JpegCompressSize),
            (FailAt::Optimize, ErrorCode::JpegOptimize),
        ];
        for (fail_at, expected) in cases {
            let backend = MockBackend::failing_at(fail_at);
            let err = run_in_memory(&backend, &data, &params, &mut Reporter::default())
                .unwrap_err();
            assert_eq!(err.code, expected, "{fail_at:?}");
        }

        let no_soi = JpegParameters {
            metadata_copy: true,
            ..Default::default()
        };
        let err = run_in_memory(&MockBackend::new(), b"xx", &no_soi, &mut Reporter::default())
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::JpegMarkerOpen);
    }

    #[test]
    fn unsupported_color_model_falls_back_with_warning() {
        let tmp = TempDir::new().unwrap();
        let (input, output) = paths(&tmp);
        let backend = MockBackend::failing_at(FailAt::DecompressColorSpace);
        let mut reporter = Reporter::default();
        let params = JpegParameters {
            quality: 70,
            ..Default::default()
        };

        run(&backend, &input, &output, &params, &mut reporter).unwrap();

        let ops = backend.get_operations();
        assert!(!ops.iter().any(|op| matches!(op, RecordedOp::Compress { .. })));
        assert!(matches!(
            ops.last().unwrap(),
            RecordedOp::Optimize { input: i, .. } if *i == path_str(&input)
        ));
        // The warning outlives the successful optimize
        assert_eq!(reporter.last_code(), 211);
    }

    #[test]
    fn stage_failures_map_to_their_codes() {
        let cases = [
            (FailAt::DecompressOpen, 70, ErrorCode::JpegDecompressOpenInput),
            (FailAt::Decompress, 70, ErrorCode::JpegDecoder),
            (FailAt::CompressOpen, 70, ErrorCode::JpegCompressOpenOutput),
            (FailAt::CompressBuffer, 70, ErrorCode::JpegCompressSize),
            (FailAt::OptimizeOpenInput, 0, ErrorCode::JpegOptimizeOpenInput),
            (FailAt::OptimizeOpenOutput, 0, ErrorCode::JpegOptimizeOpenOutput),
            (FailAt::Optimize, 0, ErrorCode::JpegOptimize),
        ];
        for (fail_at, quality, expected) in cases {
            let tmp = TempDir::new().unwrap();
            let (input, output) = paths(&tmp);
            let backend = MockBackend::failing_at(fail_at);
            let params = JpegParameters {
                quality,
                ..Default::default()
            };
            let err = run(&backend, &input, &output, &params, &mut Reporter::default())
                .unwrap_err();
            assert_eq!(err.code, expected, "{fail_at:?}");
        }
    }

    #[test]
    fn marker_read_failure_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let (input, output) = paths(&tmp);
        let backend = MockBackend::failing_at(FailAt::ReadMarkers);
        let params = JpegParameters {
            metadata_copy: true,
            ..Default::default()
        };
        let err = run(&backend, &input, &output, &params, &mut Reporter::default()).unwrap_err();
        assert_eq!(err.code, ErrorCode::JpegMarkerOpen);
        assert!(!backend
            .get_operations()
            .iter()
            .any(|op| matches!(op, RecordedOp::Optimize { .. })));
    }

    #[test]
    fn lossy_failure_stops_before_optimize() {
        let tmp = TempDir::new().unwrap();
        let (input, output) = paths(&tmp);
        let backend = MockBackend::failing_at(FailAt::Decompress);
        let params = JpegParameters {
            quality: 40,
            ..Default::default()
        };
        run(&backend, &input, &output, &params, &mut Reporter::default()).unwrap_err();
        assert_eq!(backend.get_operations().len(), 1);
    }

    #[test]
    fn scale_factor_validation() {
        let ok = |quality, scale_factor| {
            validate(&JpegParameters {
                quality,
                scale_factor,
                ..Default::default()
            })
            .is_ok()
        };
        assert!(ok(0, 1.0));
        assert!(ok(80, 0.5));
        assert!(!ok(0, 0.5));
        assert!(!ok(80, 0.0));
        assert!(!ok(80, 1.5));
        assert!(!ok(80, f64::NAN));
    }

    #[test]
    fn invalid_scale_touches_nothing() {
        let tmp = TempDir::new().unwrap();
        let (input, output) = paths(&tmp);
        let backend = MockBackend::new();
        let params = JpegParameters {
            quality: 80,
            scale_factor: 2.0,
            ..Default::default()
        };
        let err = run(&backend, &input, &output, &params, &mut Reporter::default()).unwrap_err();
        assert_eq!(err.code, ErrorCode::JpegScaleFactor);
        assert!(backend.get_operations().is_empty());
        assert!(!output.exists());
    }
}
