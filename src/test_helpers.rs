//! Shared test utilities: synthetic fixtures generated on the fly.
//!
//! Nothing here touches checked-in files. Images are gradients so both
//! entropy coders and resamplers have something to chew on.
//!
//! # Usage
//!
//! ```rust
//! use crate::codec::markers::{COM, MarkerSegment};
//! use crate::test_helpers::*;
//!
//! let tmp = tempfile::TempDir::new().unwrap();
//! let path = tmp.path().join("in.jpg");
//! create_test_jpeg(&path, 200, 150);
//! splice_after_soi(&path, &MarkerSegment::new(COM, b"note".to_vec()));
//! ```

use crate::codec::MarkerSegment;
use image::{DynamicImage, ImageEncoder, ImageFormat, RgbImage};
use std::io::Cursor;
use std::path::Path;

fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    })
}

/// Write a baseline JPEG (with a JFIF APP0) of the given size.
pub fn create_test_jpeg(path: &Path, width: u32, height: u32) {
    let img = gradient(width, height);
    let file = std::fs::File::create(path).unwrap();
    let writer = std::io::BufWriter::new(file);
    image::codecs::jpeg::JpegEncoder::new_with_quality(writer, 90)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
}

/// Write an 8-bit RGB PNG of the given size.
pub fn create_test_png(path: &Path, width: u32, height: u32) {
    gradient(width, height).save_with_format(path, ImageFormat::Png).unwrap();
}

/// Encode `img` as an uncompressed TIFF file image.
pub fn tiff_bytes(img: &DynamicImage) -> Vec<u8> {
    let mut cursor = Cursor::new(Vec::new());
    img.write_to(&mut cursor, ImageFormat::Tiff).unwrap();
    cursor.into_inner()
}

/// Insert `segment` directly after the SOI marker of the JPEG at `path`.
pub fn splice_after_soi(path: &Path, segment: &MarkerSegment) {
    let data = std::fs::read(path).unwrap();
    assert_eq!(&data[..2], &[0xFF, 0xD8], "not a JPEG");
    let mut spliced = data[..2].to_vec();
    spliced.extend(segment.to_bytes());
    spliced.extend_from_slice(&data[2..]);
    std::fs::write(path, spliced).unwrap();
}
