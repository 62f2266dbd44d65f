//! Compression orchestrator.
//!
//! One call takes one input file to one output file:
//!
//! 1. reset the last-error slot
//! 2. validate parameters (105)
//! 3. open the input (104), sniff its type, close it
//! 4. dispatch to the JPEG, PNG or TIFF pipeline; reject anything else
//!
//! [`Outcome::last_error_code`] is the slot as the call left it: last write
//! wins, so a successful JPEG run that fell back from the lossy stage reports
//! 211 alongside `success == true`.
//!
//! Two buffer entries share the same steps without touching the filesystem:
//! [`Compressor::compress_in_memory`] runs the pipelines once, and
//! [`Compressor::compress_to_size`] searches for the best result within a byte
//! budget (106 when none fits).
//!
//! A [`Compressor`] is not shareable: `compress` takes `&mut self` because the
//! slot is mutated. Wrap it in a `Mutex` to use one instance from several
//! threads.

use crate::codec::calculations::{PNG_SCALE_STEPS, bisect_highest};
use crate::codec::{JpegCodec, NativeBackend, PngCodec, TiffCodec};
use crate::error::{CompressError, ErrorCode};
use crate::format::{self, ImageType};
use crate::params::CompressionParameters;
use crate::pipeline;
use crate::report::Reporter;
use serde::Serialize;
use std::fs::File;
use std::path::Path;
use tracing::{debug, info, warn};

/// Result of one orchestration call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outcome {
    pub success: bool,
    /// Last code written to the slot during the call, `0` if none.
    pub last_error_code: u32,
    /// Sniffed type, if the input could be opened.
    pub image_type: Option<ImageType>,
    /// The failure that ended the call.
    pub error: Option<CompressError>,
}

/// Reusable orchestrator owning a backend and a last-error slot.
pub struct Compressor<B = NativeBackend> {
    backend: B,
    reporter: Reporter,
}

impl Compressor<NativeBackend> {
    pub fn new(verbose: bool) -> Self {
        Self::with_backend(NativeBackend, Reporter::new(verbose))
    }
}

impl Default for Compressor<NativeBackend> {
    fn default() -> Self {
        Self::new(false)
    }
}

impl<B: JpegCodec + PngCodec + TiffCodec> Compressor<B> {
    pub fn with_backend(backend: B, reporter: Reporter) -> Self {
        Self { backend, reporter }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn reporter(&self) -> &Reporter {
        &self.reporter
    }

    /// Code of the most recent report, `0` if none since the last call began.
    pub fn last_error_code(&self) -> u32 {
        self.reporter.last_code()
    }

    pub fn compress(
        &mut self,
        input: &Path,
        output: &Path,
        params: &CompressionParameters,
    ) -> Outcome {
        self.reporter.reset();
        info!(input = %input.display(), output = %output.display(), "compressing");

        let mut image_type = None;
        let result = self.run(input, output, params, &mut image_type);
        self.report_failure(&result, image_type);

        Outcome {
            success: result.is_ok(),
            last_error_code: self.reporter.last_code(),
            image_type,
            error: result.err(),
        }
    }

    /// Compress the file image `data` and return the smaller image.
    ///
    /// Checks, dispatch and slot handling are those of
    /// [`compress`](Self::compress), except that there is no input to open.
    pub fn compress_in_memory(
        &mut self,
        data: &[u8],
        params: &CompressionParameters,
    ) -> Result<Vec<u8>, CompressError> {
        self.reporter.reset();
        info!(len = data.len(), "compressing buffer");

        let mut image_type = None;
        let result = self
            .sniff_memory(data, params, &mut image_type)
            .and_then(|kind| self.run_memory(kind, data, params));
        self.report_failure(&result, image_type);
        result
    }

    /// Compress `data` into at most `max_bytes`.
    ///
    /// The lossless result is tried first. When it is too large, JPEG files
    /// get the highest quality in `1..=100` that fits and PNG files the
    /// largest downscale factor that fits; the other knobs in `params` are
    /// kept. TIFF has no lossy setting to search.
    ///
    /// When nothing fits the call fails with 106, or returns the smallest
    /// result produced if `return_smallest` is set.
    pub fn compress_to_size(
        &mut self,
        data: &[u8],
        max_bytes: usize,
        return_smallest: bool,
        params: &CompressionParameters,
    ) -> Result<Vec<u8>, CompressError> {
        self.reporter.reset();
        info!(len = data.len(), max_bytes, "compressing buffer to size");

        let mut image_type = None;
        let result = self.search_size(data, max_bytes, return_smallest, params, &mut image_type);
        self.report_failure(&result, image_type);
        result
    }

    /// Put the code of a failed call into the slot.
    fn report_failure<T>(
        &mut self,
        result: &Result<T, CompressError>,
        image_type: Option<ImageType>,
    ) {
        if let Err(err) = result {
            warn!(%err, "compression failed");
            // Sniffer warnings are reported where they arise
            if image_type != Some(ImageType::Unknown) {
                self.reporter.report(err.severity(), err.code.code());
            }
        }
    }

    fn run(
        &mut self,
        input: &Path,
        output: &Path,
        params: &CompressionParameters,
        image_type: &mut Option<ImageType>,
    ) -> Result<(), CompressError> {
        validate(params)?;

        let kind = {
            let mut file = File::open(input)
                .map_err(|e| CompressError::with_detail(ErrorCode::OpenInput, e))?;
            format::detect(Some(&mut file), &mut self.reporter)
        };
        *image_type = Some(kind);
        debug!(%kind, "dispatching");

        match kind {
            ImageType::Jpeg => pipeline::jpeg::run(
                &self.backend,
                input,
                output,
                &params.jpeg,
                &mut self.reporter,
            ),
            ImageType::Png => pipeline::png::run(&self.backend, input, output, &params.png),
            ImageType::Tiff => pipeline::tiff::run(&self.backend, input, output, &params.tiff),
            ImageType::Unknown => Err(self.unknown_type()),
        }
    }

    fn sniff_memory(
        &mut self,
        data: &[u8],
        params: &CompressionParameters,
        image_type: &mut Option<ImageType>,
    ) -> Result<ImageType, CompressError> {
        validate(params)?;
        let mut reader = data;
        let kind = format::detect(Some(&mut reader), &mut self.reporter);
        *image_type = Some(kind);
        debug!(%kind, "dispatching buffer");
        Ok(kind)
    }

    fn run_memory(
        &mut self,
        kind: ImageType,
        data: &[u8],
        params: &CompressionParameters,
    ) -> Result<Vec<u8>, CompressError> {
        match kind {
            ImageType::Jpeg => pipeline::jpeg::run_in_memory(
                &self.backend,
                data,
                &params.jpeg,
                &mut self.reporter,
            ),
            ImageType::Png => pipeline::png::run_in_memory(&self.backend, data, &params.png),
            ImageType::Tiff => pipeline::tiff::run_in_memory(&self.backend, data, &params.tiff),
            ImageType::Unknown => Err(self.unknown_type()),
        }
    }

    /// The sniffer already reported the specific cause.
    fn unknown_type(&self) -> CompressError {
        let code =
            ErrorCode::from_code(self.reporter.last_code()).unwrap_or(ErrorCode::UnsupportedType);
        CompressError::new(code)
    }

    fn search_size(
        &mut self,
        data: &[u8],
        max_bytes: usize,
        return_smallest: bool,
        params: &CompressionParameters,
        image_type: &mut Option<ImageType>,
    ) -> Result<Vec<u8>, CompressError> {
        let kind = self.sniff_memory(data, params, image_type)?;

        let lossless = self.run_memory(kind, data, &lossless_parameters(params))?;
        debug!(len = lossless.len(), "lossless size");
        if lossless.len() <= max_bytes {
            return Ok(lossless);
        }
        let mut smallest = lossless;

        let mut attempt = |compressor: &mut Self,
                           trial: &CompressionParameters|
         -> Result<Option<Vec<u8>>, CompressError> {
            let out = compressor.run_memory(kind, data, trial)?;
            debug!(len = out.len(), "size search attempt");
            if out.len() <= max_bytes {
                return Ok(Some(out));
            }
            if out.len() < smallest.len() {
                smallest = out;
            }
            Ok(None)
        };

        let found = match kind {
            ImageType::Jpeg => bisect_highest(1, 100, |quality| {
                let mut trial = params.clone();
                trial.jpeg.quality = quality;
                attempt(self, &trial)
            })?,
            ImageType::Png => bisect_highest(1, PNG_SCALE_STEPS - 1, |step| {
                let mut trial = params.clone();
                trial.png.scale_factor = f64::from(step) / f64::from(PNG_SCALE_STEPS);
                attempt(self, &trial)
            })?,
            ImageType::Tiff | ImageType::Unknown => None,
        };

        match found {
            Some((setting, out)) => {
                debug!(setting, len = out.len(), "size search settled");
                Ok(out)
            }
            None if return_smallest => {
                info!(len = smallest.len(), max_bytes, "no setting fits, returning smallest");
                Ok(smallest)
            }
            None => Err(CompressError::with_detail(
                ErrorCode::TargetSize,
                format!("smallest result is {} bytes, budget is {max_bytes}", smallest.len()),
            )),
        }
    }
}

/// `params` with every lossy step switched off.
fn lossless_parameters(params: &CompressionParameters) -> CompressionParameters {
    let mut lossless = params.clone();
    lossless.jpeg.quality = 0;
    lossless.jpeg.scale_factor = 1.0;
    lossless.png.scale_factor = 1.0;
    lossless
}

/// Checks shared by every format.
fn validate(params: &CompressionParameters) -> Result<(), CompressError> {
    if params.jpeg.quality > 100 {
        return Err(CompressError::with_detail(
            ErrorCode::InvalidParameters,
            format!("jpeg quality {} is above 100", params.jpeg.quality),
        ));
    }
    Ok(())
}

/// Compress `input` into `output` with the native backend.
pub fn compress(input: &Path, output: &Path, params: &CompressionParameters) -> Outcome {
    Compressor::default().compress(input, output, params)
}

/// Compress the file image `data` with the native backend.
pub fn compress_in_memory(
    data: &[u8],
    params: &CompressionParameters,
) -> Result<Vec<u8>, CompressError> {
    Compressor::default().compress_in_memory(data, params)
}

/// Compress the file image `data` into at most `max_bytes` with the native
/// backend. See [`Compressor::compress_to_size`].
pub fn compress_to_size(
    data: &[u8],
    max_bytes: usize,
    return_smallest: bool,
    params: &CompressionParameters,
) -> Result<Vec<u8>, CompressError> {
    Compressor::default().compress_to_size(data, max_bytes, return_smallest, params)
}
