//! [`PngCodec`] over `image` (resize) and `oxipng` (re-compression).
//!
//! | Knob | oxipng option |
//! |---|---|
//! | iterations | `Deflaters::Zopfli { iterations }` |
//! | `lossy_8bit` | `scale_16` |
//! | `lossy_transparent` | `optimize_alpha` |
//! | `auto_filter_strategy` | every `RowFilter`, or `MinSum` only |
//!
//! oxipng has no block-splitting control; `block_split_strategy` is accepted
//! and logged.

use super::NativeBackend;
use super::backend::{CodecError, PngCodec};
use super::calculations::scaled_dimensions;
use crate::params::PngParameters;
use image::imageops::FilterType;
use image::ImageFormat;
use oxipng::{Deflaters, Options, RowFilter};
use std::io::Cursor;
use std::num::NonZeroU8;

const ALL_FILTERS: [RowFilter; 10] = [
    RowFilter::None,
    RowFilter::Sub,
    RowFilter::Up,
    RowFilter::Average,
    RowFilter::Paeth,
    RowFilter::MinSum,
    RowFilter::Entropy,
    RowFilter::Bigrams,
    RowFilter::BigEnt,
    RowFilter::Brute,
];

/// oxipng options for one run.
fn oxipng_options(settings: &PngParameters, iterations: NonZeroU8) -> Options {
    let mut opts = Options::from_preset(2);
    opts.deflate = Deflaters::Zopfli { iterations };
    opts.scale_16 = settings.lossy_8bit;
    opts.optimize_alpha = settings.lossy_transparent;
    opts.filter.clear();
    if settings.auto_filter_strategy {
        for filter in ALL_FILTERS {
            opts.filter.insert(filter);
        }
    } else {
        opts.filter.insert(RowFilter::MinSum);
    }
    opts
}

impl PngCodec for NativeBackend {
    fn resize_memory(&self, data: &[u8], factor: f64) -> Result<Vec<u8>, CodecError> {
        let img = image::load_from_memory(data)
            .map_err(|e| CodecError::Resize(format!("decode failed: {e}")))?;

        let (width, height) = scaled_dimensions(img.width(), img.height(), factor);
        if width == 0 || height == 0 {
            return Err(CodecError::Resize(format!(
                "{}x{} at {factor} is empty",
                img.width(),
                img.height()
            )));
        }
        tracing::debug!(
            from_width = img.width(),
            from_height = img.height(),
            width,
            height,
            "resizing png"
        );

        // resize_exact keeps the DynamicImage variant, so channel count survives
        let resized = img.resize_exact(width, height, FilterType::Lanczos3);
        let mut encoded = Cursor::new(Vec::new());
        resized
            .write_to(&mut encoded, ImageFormat::Png)
            .map_err(|e| CodecError::Resize(format!("encode failed: {e}")))?;
        Ok(encoded.into_inner())
    }

    fn optimize(
        &self,
        data: &[u8],
        settings: &PngParameters,
        iterations: NonZeroU8,
    ) -> Result<Vec<u8>, CodecError> {
        tracing::debug!(
            iterations = iterations.get(),
            block_split = ?settings.block_split_strategy,
            "optimizing png"
        );
        let opts = oxipng_options(settings, iterations);
        oxipng::optimize_from_memory(data, &opts).map_err(|e| CodecError::Encode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::create_test_png;
    use tempfile::TempDir;

    #[test]
    fn options_follow_parameters() {
        let mut settings = PngParameters::default();
        let opts = oxipng_options(&settings, NonZeroU8::new(3).unwrap());
        assert!(matches!(opts.deflate, Deflaters::Zopfli { iterations } if iterations.get() == 3));
        assert!(opts.scale_16);
        assert!(opts.optimize_alpha);
        assert_eq!(opts.filter.len(), ALL_FILTERS.len());

        settings.auto_filter_strategy = false;
        settings.lossy_8bit = false;
        settings.lossy_transparent = false;
        let opts = oxipng_options(&settings, NonZeroU8::MIN);
        assert!(!opts.scale_16);
        assert!(!opts.optimize_alpha);
        assert_eq!(opts.filter.len(), 1);
        assert!(opts.filter.contains(&RowFilter::MinSum));
    }

    #[test]
    fn resize_halves_dimensions() {
        let tmp = TempDir::new().unwrap();
        let input = tmp.path().join("in.png");
        let output = tmp.path().join("out.png");
        create_test_png(&input, 100, 100);

        NativeBackend.resize(&input, &output, 0.5).unwrap();
        assert_eq!(image::image_dimensions(&output).unwrap(), (50, 50));
    }

    #[test]
    fn resize_keeps_alpha_channel() {
        let tmp = TempDir::new().unwrap();
        let input = tmp.path().join("in.png");
        let output = tmp.path().join("out.png");
        let img = image::RgbaImage::from_fn(20, 10, |x, _| image::Rgba([x as u8, 0, 0, 128]));
        img.save(&input).unwrap();

        NativeBackend.resize(&input, &output, 0.5).unwrap();
        let out = image::open(&output).unwrap();
        assert_eq!(out.color(), image::ColorType::Rgba8);
        assert_eq!((out.width(), out.height()), (10, 5));
    }

    #[test]
    fn resize_memory_accepts_any_decodable_image() {
        let tmp = TempDir::new().unwrap();
        let input = tmp.path().join("in.png");
        create_test_png(&input, 40, 20);
        let data = std::fs::read(&input).unwrap();

        let resized = NativeBackend.resize_memory(&data, 0.25).unwrap();
        let img = image::load_from_memory_with_format(&resized, ImageFormat::Png).unwrap();
        assert_eq!((img.width(), img.height()), (10, 5));
        assert!(matches!(
            NativeBackend.resize_memory(b"junk", 0.5),
            Err(CodecError::Resize(_))
        ));
    }

    #[test]
    fn resize_missing_input_fails() {
        let tmp = TempDir::new().unwrap();
        let err = NativeBackend
            .resize(&tmp.path().join("gone.png"), &tmp.path().join("out.png"), 0.5)
            .unwrap_err();
        assert!(matches!(err, CodecError::Resize(_)));
    }

    #[test]
    fn resize_to_nothing_fails() {
        let tmp = TempDir::new().unwrap();
        let input = tmp.path().join("in.png");
        create_test_png(&input, 1, 1);
        let err = NativeBackend
            .resize(&input, &tmp.path().join("out.png"), 0.1)
            .unwrap_err();
        assert!(matches!(err, CodecError::Resize(_)));
    }

    #[test]
    fn optimize_keeps_pixels() {
        let tmp = TempDir::new().unwrap();
        let input = tmp.path().join("in.png");
        create_test_png(&input, 64, 64);
        let data = std::fs::read(&input).unwrap();

        let optimized = NativeBackend
            .optimize(&data, &PngParameters::default(), NonZeroU8::MIN)
            .unwrap();
        assert!(optimized.len() <= data.len());

        let before = image::load_from_memory(&data).unwrap().to_rgba8();
        let after = image::load_from_memory(&optimized).unwrap().to_rgba8();
        assert_eq!(before, after);
    }

    #[test]
    fn optimize_rejects_non_png() {
        let err = NativeBackend
            .optimize(b"not a png", &PngParameters::default(), NonZeroU8::MIN)
            .unwrap_err();
        assert!(matches!(err, CodecError::Encode(_)));
    }
}
