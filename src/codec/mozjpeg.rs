//! [`JpegCodec`] over libjpeg (mozjpeg build).
//!
//! | Operation | libjpeg calls |
//! |---|---|
//! | decompress | `jpeg_read_header`, `jpeg_start_decompress`, `jpeg_read_scanlines` |
//! | compress | `jpeg_set_defaults`, `jpeg_set_quality`, `jpeg_write_scanlines` |
//! | optimize | `jpeg_read_coefficients`, `jpeg_copy_critical_parameters`, |
//! | | `jpeg_write_coefficients` |
//!
//! File images are handed to libjpeg through `jpeg_mem_src`; encoders write to
//! a `jpeg_mem_dest` buffer that is copied out at the end. libjpeg's
//! `error_exit` unwinds out of the C code and is caught at the edge of each
//! operation.

use super::NativeBackend;
use super::backend::{CodecError, JpegCodec};
use super::markers::{self, MarkerSegment, MarkerSink};
use crate::params::{
    ChromaSubsampling, ColorSpace, DctMethod, EncodeSettings, ImageProperties, PixelBuffer,
};
use mozjpeg_sys::{
    J_BOOLEAN_PARAM, J_COLOR_SPACE, J_DCT_METHOD, JPEG_LIB_VERSION, jpeg_c_set_bool_param,
    jpeg_common_struct, jpeg_compress_struct, jpeg_copy_critical_parameters, jpeg_create_decompress,
    jpeg_CreateCompress, jpeg_decompress_struct, jpeg_destroy_compress, jpeg_destroy_decompress,
    jpeg_error_mgr, jpeg_finish_compress, jpeg_finish_decompress, jpeg_mem_dest, jpeg_mem_src,
    jpeg_read_coefficients, jpeg_read_header, jpeg_read_scanlines, jpeg_set_defaults,
    jpeg_set_quality, jpeg_simple_progression, jpeg_start_compress, jpeg_start_decompress,
    jpeg_std_error, jpeg_write_coefficients, jpeg_write_marker, jpeg_write_scanlines,
};
use std::ffi::{c_int, c_uchar, c_uint, c_ulong, c_void};
use std::marker::PhantomData;
use std::ops::Deref;
use std::panic::{AssertUnwindSafe, catch_unwind};

/// Payload carried by the unwind out of `error_exit`.
struct LibjpegAbort(c_int);

extern "C-unwind" fn silence_message(_cinfo: &mut jpeg_common_struct, _msg_level: c_int) {}

extern "C-unwind" fn unwind_error_exit(cinfo: &mut jpeg_common_struct) {
    // SAFETY: `err` is set to a live error manager before any libjpeg call.
    let code = unsafe { cinfo.err.as_ref().map_or(0, |err| err.msg_code) };
    std::panic::resume_unwind(Box::new(LibjpegAbort(code)));
}

fn new_err() -> Box<jpeg_error_mgr> {
    // SAFETY: jpeg_std_error initializes every field of the zeroed struct.
    unsafe {
        let mut err: Box<jpeg_error_mgr> = Box::new(std::mem::zeroed());
        jpeg_std_error(&mut err);
        err.error_exit = Some(unwind_error_exit);
        err.emit_message = Some(silence_message);
        err
    }
}

/// Run `body`, converting a libjpeg abort into `on_abort(message)`.
fn guarded<T>(
    body: impl FnOnce() -> Result<T, CodecError>,
    on_abort: fn(String) -> CodecError,
) -> Result<T, CodecError> {
    match catch_unwind(AssertUnwindSafe(body)) {
        Ok(result) => result,
        Err(payload) => {
            let message = match payload.downcast_ref::<LibjpegAbort>() {
                Some(LibjpegAbort(code)) => format!("libjpeg message code {code}"),
                None => "libjpeg aborted".to_string(),
            };
            Err(on_abort(message))
        }
    }
}

/// Length of a file image as the unsigned long `jpeg_mem_src` takes.
fn source_len(data: &[u8]) -> Result<c_ulong, CodecError> {
    c_ulong::try_from(data.len()).map_err(|_| CodecError::Overflow)
}

/// Encoder output allocated by `jpeg_mem_dest`.
struct EncodedJpeg {
    buf: *mut c_uchar,
    size: c_ulong,
}

impl EncodedJpeg {
    fn new() -> Self {
        Self {
            buf: std::ptr::null_mut(),
            size: 0,
        }
    }
}

impl Deref for EncodedJpeg {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        if self.buf.is_null() || self.size == 0 {
            &[]
        } else {
            // SAFETY: libjpeg wrote `size` bytes at `buf`.
            unsafe { std::slice::from_raw_parts(self.buf, self.size as usize) }
        }
    }
}

impl Drop for EncodedJpeg {
    fn drop(&mut self) {
        if !self.buf.is_null() {
            // SAFETY: allocated with malloc by jpeg_mem_dest.
            unsafe { libc::free(self.buf.cast::<c_void>()) };
            self.buf = std::ptr::null_mut();
        }
    }
}

/// Decompressor reading from a borrowed file image.
///
/// Boxed so the struct address libjpeg sees stays fixed.
struct JpegSource<'a> {
    cinfo: Box<jpeg_decompress_struct>,
    _err: Box<jpeg_error_mgr>,
    _data: PhantomData<&'a [u8]>,
}

impl<'a> JpegSource<'a> {
    fn new(data: &'a [u8]) -> Result<Self, CodecError> {
        let len = source_len(data)?;
        let mut err = new_err();
        // SAFETY: zeroed memory is what jpeg_create_decompress expects; the
        // error manager outlives the struct and the buffer outlives 'a.
        unsafe {
            let mut cinfo: Box<jpeg_decompress_struct> = Box::new(std::mem::zeroed());
            cinfo.common.err = &mut *err;
            jpeg_create_decompress(&mut *cinfo);
            jpeg_mem_src(&mut cinfo, data.as_ptr(), len);
            Ok(Self {
                cinfo,
                _err: err,
                _data: PhantomData,
            })
        }
    }

    fn read_header(&mut self) -> Result<(), CodecError> {
        // SAFETY: source was set up in `new`.
        let status = unsafe { jpeg_read_header(&mut self.cinfo, 1) };
        if status != 1 {
            return Err(CodecError::Decode("no JPEG header".into()));
        }
        Ok(())
    }

    fn subsampling(&self) -> ChromaSubsampling {
        if self.cinfo.num_components < 3 || self.cinfo.comp_info.is_null() {
            return ChromaSubsampling::Auto;
        }
        // SAFETY: comp_info holds num_components entries after read_header.
        let luma = unsafe { &*self.cinfo.comp_info };
        ChromaSubsampling::from_luma_factors(luma.h_samp_factor, luma.v_samp_factor)
    }
}

impl Drop for JpegSource<'_> {
    fn drop(&mut self) {
        // SAFETY: created in `new`.
        unsafe { jpeg_destroy_decompress(&mut self.cinfo) };
    }
}

/// Compressor writing into an [`EncodedJpeg`].
struct JpegDestination {
    cinfo: Box<jpeg_compress_struct>,
    _err: Box<jpeg_error_mgr>,
}

impl JpegDestination {
    fn new() -> Self {
        let mut err = new_err();
        // SAFETY: as for JpegSource::new.
        unsafe {
            let mut cinfo: Box<jpeg_compress_struct> = Box::new(std::mem::zeroed());
            cinfo.common.err = &mut *err;
            jpeg_CreateCompress(
                &mut *cinfo,
                JPEG_LIB_VERSION,
                std::mem::size_of::<jpeg_compress_struct>(),
            );
            cinfo.common.progress = std::ptr::null_mut();
            Self { cinfo, _err: err }
        }
    }

    /// Point the encoder at `out`. `out` must stay in place until `finish`.
    fn attach(&mut self, out: &mut EncodedJpeg) {
        // SAFETY: both pointers are to live locals of the caller.
        unsafe { jpeg_mem_dest(&mut self.cinfo, &mut out.buf, &mut out.size) };
    }

    fn set_scan_mode(&mut self, progressive: bool) {
        // SAFETY: parameters only; no I/O.
        unsafe {
            if progressive {
                jpeg_simple_progression(&mut self.cinfo);
            } else {
                jpeg_c_set_bool_param(
                    &mut self.cinfo,
                    J_BOOLEAN_PARAM::JBOOLEAN_OPTIMIZE_SCANS,
                    0,
                );
                self.cinfo.scan_info = std::ptr::null();
                self.cinfo.num_scans = 0;
            }
        }
    }

    fn finish(&mut self) {
        // SAFETY: called once after a successful start.
        unsafe { jpeg_finish_compress(&mut self.cinfo) };
    }
}

impl Drop for JpegDestination {
    fn drop(&mut self) {
        // SAFETY: created in `new`.
        unsafe { jpeg_destroy_compress(&mut self.cinfo) };
    }
}

impl MarkerSink for JpegDestination {
    fn emits_jfif(&self) -> bool {
        self.cinfo.write_JFIF_header != 0
    }

    fn emits_adobe(&self) -> bool {
        self.cinfo.write_Adobe_marker != 0
    }

    fn write_marker(&mut self, segment: &MarkerSegment) {
        // SAFETY: between jpeg_write_coefficients and jpeg_finish_compress.
        unsafe {
            jpeg_write_marker(
                &mut self.cinfo,
                c_int::from(segment.marker),
                segment.payload.as_ptr(),
                segment.payload.len() as c_uint,
            )
        };
    }
}

fn dct(method: DctMethod) -> J_DCT_METHOD {
    match method {
        DctMethod::Slow => J_DCT_METHOD::JDCT_ISLOW,
        DctMethod::Fast => J_DCT_METHOD::JDCT_IFAST,
        DctMethod::Float => J_DCT_METHOD::JDCT_FLOAT,
    }
}

/// `scale_factor` expressed in eighths, as libjpeg's `scale_num / 8`.
fn scale_eighths(scale_factor: f64) -> c_uint {
    (scale_factor * 8.0).round().clamp(1.0, 8.0) as c_uint
}

impl JpegCodec for NativeBackend {
    fn decompress_memory(
        &self,
        data: &[u8],
        dct_method: DctMethod,
        scale_factor: f64,
    ) -> Result<(PixelBuffer, ImageProperties), CodecError> {
        guarded(
            || {
                let mut src = JpegSource::new(data)?;
                src.read_header()?;

                let color_space = match src.cinfo.jpeg_color_space {
                    J_COLOR_SPACE::JCS_GRAYSCALE => ColorSpace::Grayscale,
                    J_COLOR_SPACE::JCS_YCbCr | J_COLOR_SPACE::JCS_RGB => ColorSpace::Rgb,
                    J_COLOR_SPACE::JCS_CMYK | J_COLOR_SPACE::JCS_YCCK => ColorSpace::Cmyk,
                    other => {
                        return Err(CodecError::UnsupportedColorSpace(format!(
                            "libjpeg color space {}",
                            other as c_int
                        )));
                    }
                };
                let subsampling = src.subsampling();

                src.cinfo.out_color_space = match color_space {
                    ColorSpace::Grayscale => J_COLOR_SPACE::JCS_GRAYSCALE,
                    ColorSpace::Rgb => J_COLOR_SPACE::JCS_RGB,
                    ColorSpace::Cmyk => J_COLOR_SPACE::JCS_CMYK,
                };
                src.cinfo.dct_method = dct(dct_method);
                src.cinfo.scale_num = scale_eighths(scale_factor);
                src.cinfo.scale_denom = 8;

                // SAFETY: header read above.
                unsafe { jpeg_start_decompress(&mut src.cinfo) };

                let width = src.cinfo.output_width;
                let height = src.cinfo.output_height;
                let components = usize::try_from(src.cinfo.output_components)
                    .map_err(|_| CodecError::Decode("negative component count".into()))?;
                if components != color_space.components() {
                    return Err(CodecError::UnsupportedColorSpace(format!(
                        "{components} output components"
                    )));
                }
                let stride = (width as usize)
                    .checked_mul(components)
                    .ok_or(CodecError::Overflow)?;
                let len = stride
                    .checked_mul(height as usize)
                    .ok_or(CodecError::Overflow)?;

                let mut pixels = vec![0u8; len];
                while src.cinfo.output_scanline < height {
                    let offset = src.cinfo.output_scanline as usize * stride;
                    let mut row = [pixels[offset..].as_mut_ptr()];
                    // SAFETY: `row` points at `stride` writable bytes.
                    let read =
                        unsafe { jpeg_read_scanlines(&mut src.cinfo, row.as_mut_ptr(), 1) };
                    if read == 0 {
                        return Err(CodecError::Decode("scanline read stalled".into()));
                    }
                }
                // SAFETY: every scanline was read.
                unsafe { jpeg_finish_decompress(&mut src.cinfo) };

                let properties = ImageProperties {
                    width,
                    height,
                    color_space,
                    subsampling,
                };
                let buffer = PixelBuffer {
                    width,
                    height,
                    color_space,
                    data: pixels,
                };
                Ok((buffer, properties))
            },
            CodecError::Decode,
        )
    }

    fn compress_memory(
        &self,
        pixels: PixelBuffer,
        settings: &EncodeSettings,
    ) -> Result<Vec<u8>, CodecError> {
        let expected = pixels.expected_len().ok_or(CodecError::Overflow)?;
        if pixels.data.len() != expected {
            return Err(CodecError::BufferMismatch {
                expected,
                actual: pixels.data.len(),
            });
        }

        let encoded = guarded(
            || {
                let mut out = EncodedJpeg::new();
                let mut dst = JpegDestination::new();
                dst.attach(&mut out);

                dst.cinfo.image_width = pixels.width;
                dst.cinfo.image_height = pixels.height;
                dst.cinfo.input_components = pixels.color_space.components() as c_int;
                dst.cinfo.in_color_space = match pixels.color_space {
                    ColorSpace::Grayscale => J_COLOR_SPACE::JCS_GRAYSCALE,
                    ColorSpace::Rgb => J_COLOR_SPACE::JCS_RGB,
                    ColorSpace::Cmyk => J_COLOR_SPACE::JCS_CMYK,
                };

                // SAFETY: image geometry is set; defaults depend on it.
                unsafe { jpeg_set_defaults(&mut dst.cinfo) };
                dst.cinfo.dct_method = dct(settings.dct_method);
                dst.cinfo.optimize_coding = 1;

                if pixels.color_space == ColorSpace::Rgb
                    && let Some((h, v)) = settings.subsampling.luma_factors()
                {
                    // SAFETY: RGB input yields three YCbCr components.
                    let comps =
                        unsafe { std::slice::from_raw_parts_mut(dst.cinfo.comp_info, 3) };
                    comps[0].h_samp_factor = h;
                    comps[0].v_samp_factor = v;
                    for chroma in &mut comps[1..] {
                        chroma.h_samp_factor = 1;
                        chroma.v_samp_factor = 1;
                    }
                }

                let quality = settings.quality.min(100) as c_int;
                // SAFETY: parameters only.
                unsafe { jpeg_set_quality(&mut dst.cinfo, quality, 0) };
                dst.set_scan_mode(settings.progressive);

                // SAFETY: destination attached, parameters complete.
                unsafe { jpeg_start_compress(&mut dst.cinfo, 1) };
                let stride = pixels.row_stride();
                while dst.cinfo.next_scanline < dst.cinfo.image_height {
                    let offset = dst.cinfo.next_scanline as usize * stride;
                    let row = [pixels.data[offset..].as_ptr()];
                    // SAFETY: `row` points at `stride` readable bytes.
                    let written =
                        unsafe { jpeg_write_scanlines(&mut dst.cinfo, row.as_ptr(), 1) };
                    if written == 0 {
                        return Err(CodecError::Encode("scanline write stalled".into()));
                    }
                }
                dst.finish();
                drop(dst);
                Ok(out)
            },
            CodecError::Encode,
        )?;
        Ok(encoded.to_vec())
    }

    fn optimize_memory(
        &self,
        data: &[u8],
        markers: Option<&[MarkerSegment]>,
        progressive: bool,
    ) -> Result<Vec<u8>, CodecError> {
        let encoded = guarded(
            || {
                let mut src = JpegSource::new(data)?;
                src.read_header()?;
                // SAFETY: header read; coefficient arrays live in src's pool.
                let coefficients = unsafe { jpeg_read_coefficients(&mut src.cinfo) };
                if coefficients.is_null() {
                    return Err(CodecError::Decode("no coefficients".into()));
                }

                let mut out = EncodedJpeg::new();
                let mut dst = JpegDestination::new();
                // SAFETY: src is past read_coefficients.
                unsafe { jpeg_copy_critical_parameters(&src.cinfo, &mut dst.cinfo) };
                dst.cinfo.optimize_coding = 1;
                dst.set_scan_mode(progressive);
                dst.attach(&mut out);

                // SAFETY: destination attached, coefficients borrowed from src.
                unsafe { jpeg_write_coefficients(&mut dst.cinfo, coefficients) };
                if let Some(markers) = markers {
                    let written = markers::merge(markers, &mut dst);
                    tracing::debug!(written, "merged markers");
                }
                dst.finish();
                drop(dst);
                // SAFETY: all coefficients consumed.
                unsafe { jpeg_finish_decompress(&mut src.cinfo) };
                Ok(out)
            },
            CodecError::Encode,
        )?;
        Ok(encoded.to_vec())
    }
}
