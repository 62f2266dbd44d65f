//! [`TiffCodec`]: decode with `image`, re-encode with the `tiff` encoder.
//!
//! Only the first page is kept. Supported layouts are 8/16-bit gray, RGB and
//! RGBA; anything else (CMYK, float, gray+alpha) is reported as unsupported.

use super::NativeBackend;
use super::backend::{CodecError, TiffCodec};
use crate::params::{TiffCompression, TiffDeflateLevel, TiffParameters};
use image::{DynamicImage, ImageFormat};
use std::io::{Cursor, Seek, Write};
use ::tiff::TiffResult;
use ::tiff::encoder::colortype::{self, ColorType};
use ::tiff::encoder::compression::{Deflate, DeflateLevel, Lzw, Packbits, Uncompressed};
use ::tiff::encoder::{TiffEncoder, TiffValue};

fn deflate_level(level: TiffDeflateLevel) -> DeflateLevel {
    match level {
        TiffDeflateLevel::Fast => DeflateLevel::Fast,
        TiffDeflateLevel::Balanced => DeflateLevel::Balanced,
        TiffDeflateLevel::Best => DeflateLevel::Best,
    }
}

fn write_image<W, C>(
    encoder: &mut TiffEncoder<W>,
    width: u32,
    height: u32,
    data: &[C::Inner],
    settings: &TiffParameters,
) -> TiffResult<()>
where
    W: Write + Seek,
    C: ColorType,
    [C::Inner]: TiffValue,
{
    match settings.compression {
        TiffCompression::Uncompressed => {
            encoder.write_image_with_compression::<C, _>(width, height, Uncompressed, data)
        }
        TiffCompression::Lzw => {
            encoder.write_image_with_compression::<C, _>(width, height, Lzw, data)
        }
        TiffCompression::Deflate => encoder.write_image_with_compression::<C, _>(
            width,
            height,
            Deflate::with_level(deflate_level(settings.deflate_level)),
            data,
        ),
        TiffCompression::Packbits => {
            encoder.write_image_with_compression::<C, _>(width, height, Packbits, data)
        }
    }
}

impl TiffCodec for NativeBackend {
    fn recompress(&self, data: &[u8], settings: &TiffParameters) -> Result<Vec<u8>, CodecError> {
        let img = image::load_from_memory_with_format(data, ImageFormat::Tiff)
            .map_err(|e| CodecError::Decode(e.to_string()))?;
        let (width, height) = (img.width(), img.height());
        tracing::debug!(
            width,
            height,
            color = ?img.color(),
            compression = ?settings.compression,
            "re-encoding tiff"
        );

        let mut cursor = Cursor::new(Vec::new());
        {
            let mut encoder =
                TiffEncoder::new(&mut cursor).map_err(|e| CodecError::Encode(e.to_string()))?;
            let written = match &img {
                DynamicImage::ImageLuma8(buf) => write_image::<_, colortype::Gray8>(
                    &mut encoder,
                    width,
                    height,
                    buf.as_raw(),
                    settings,
                ),
                DynamicImage::ImageLuma16(buf) => write_image::<_, colortype::Gray16>(
                    &mut encoder,
                    width,
                    height,
                    buf.as_raw(),
                    settings,
                ),
                DynamicImage::ImageRgb8(buf) => write_image::<_, colortype::RGB8>(
                    &mut encoder,
                    width,
                    height,
                    buf.as_raw(),
                    settings,
                ),
                DynamicImage::ImageRgb16(buf) => write_image::<_, colortype::RGB16>(
                    &mut encoder,
                    width,
                    height,
                    buf.as_raw(),
                    settings,
                ),
                DynamicImage::ImageRgba8(buf) => write_image::<_, colortype::RGBA8>(
                    &mut encoder,
                    width,
                    height,
                    buf.as_raw(),
                    settings,
                ),
                DynamicImage::ImageRgba16(buf) => write_image::<_, colortype::RGBA16>(
                    &mut encoder,
                    width,
                    height,
                    buf.as_raw(),
                    settings,
                ),
                other => {
                    return Err(CodecError::UnsupportedColorSpace(format!("{:?}", other.color())));
                }
            };
            written.map_err(|e| CodecError::Encode(e.to_string()))?;
        }
        Ok(cursor.into_inner())
    }
}
