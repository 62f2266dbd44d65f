//! Compression parameters.
//!
//! These structs describe *what* each pipeline should do, never *how*. They
//! are plain configuration: nothing in here is written back by a pipeline run.
//! Values derived from the bitstream during a run (true dimensions, color
//! space, sampling) travel separately as [`ImageProperties`].
//!
//! All three sub-records are independently populated and deserialize from a
//! sparse TOML table (see [`crate::config`]).

use serde::{Deserialize, Serialize};

/// Full set of knobs for one orchestration call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompressionParameters {
    pub jpeg: JpegParameters,
    pub png: PngParameters,
    pub tiff: TiffParameters,
}

impl CompressionParameters {
    pub fn new() -> Self {
        Self::default()
    }
}

/// IDCT/FDCT implementation selector for the lossy stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DctMethod {
    /// Accurate integer transform.
    Slow,
    /// Fast, less accurate integer transform.
    #[default]
    Fast,
    /// Floating-point transform.
    Float,
}

/// Chroma subsampling for the lossy re-encode.
///
/// `Auto` keeps whatever the source was encoded with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChromaSubsampling {
    #[default]
    #[serde(rename = "auto")]
    Auto,
    #[serde(rename = "444")]
    Cs444,
    #[serde(rename = "422")]
    Cs422,
    #[serde(rename = "420")]
    Cs420,
    #[serde(rename = "411")]
    Cs411,
}

impl ChromaSubsampling {
    /// Luma sampling factors `(h, v)` relative to 1x1 chroma.
    pub fn luma_factors(self) -> Option<(i32, i32)> {
        match self {
            ChromaSubsampling::Auto => None,
            ChromaSubsampling::Cs444 => Some((1, 1)),
            ChromaSubsampling::Cs422 => Some((2, 1)),
            ChromaSubsampling::Cs420 => Some((2, 2)),
            ChromaSubsampling::Cs411 => Some((4, 1)),
        }
    }

    /// Inverse of [`luma_factors`](Self::luma_factors); unknown layouts map
    /// to `Auto` (encoder default).
    pub fn from_luma_factors(h: i32, v: i32) -> Self {
        match (h, v) {
            (1, 1) => ChromaSubsampling::Cs444,
            (2, 1) => ChromaSubsampling::Cs422,
            (2, 2) => ChromaSubsampling::Cs420,
            (4, 1) => ChromaSubsampling::Cs411,
            _ => ChromaSubsampling::Auto,
        }
    }
}

/// JPEG pipeline settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JpegParameters {
    /// Target quality, 1–100. `0` skips the lossy stage entirely.
    pub quality: u32,
    /// Carry APPn/COM segments from the original input into the output.
    pub metadata_copy: bool,
    pub dct_method: DctMethod,
    /// Downscale applied while decoding for the lossy stage, in `(0, 1]`.
    /// Rounded to the nearest eighth by the decoder.
    pub scale_factor: f64,
    pub chroma_subsampling: ChromaSubsampling,
    pub progressive: bool,
}

impl Default for JpegParameters {
    fn default() -> Self {
        Self {
            quality: 0,
            metadata_copy: false,
            dct_method: DctMethod::Fast,
            scale_factor: 1.0,
            chroma_subsampling: ChromaSubsampling::Auto,
            progressive: true,
        }
    }
}

impl JpegParameters {
    pub fn is_lossy(&self) -> bool {
        self.quality != 0
    }
}

/// Zopfli block-splitting strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockSplitStrategy {
    #[default]
    None,
    First,
    Last,
    Both,
}

/// PNG pipeline settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PngParameters {
    /// Zopfli iterations for regular inputs.
    pub iterations: u8,
    /// Zopfli iterations for inputs at or above
    /// [`LARGE_PNG_THRESHOLD`](crate::codec::calculations::LARGE_PNG_THRESHOLD).
    pub iterations_large: u8,
    pub block_split_strategy: BlockSplitStrategy,
    /// Allow 16-bit channels to be reduced to 8 bits.
    pub lossy_8bit: bool,
    /// Allow color values of fully transparent pixels to change.
    pub lossy_transparent: bool,
    /// Try every filter heuristic instead of a single predefined one.
    pub auto_filter_strategy: bool,
    /// Resize multiplier in `(0, 1]`; `1.0` means no resize.
    pub scale_factor: f64,
}

impl Default for PngParameters {
    fn default() -> Self {
        Self {
            iterations: 2,
            iterations_large: 1,
            block_split_strategy: BlockSplitStrategy::None,
            lossy_8bit: true,
            lossy_transparent: true,
            auto_filter_strategy: true,
            scale_factor: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TiffCompression {
    Uncompressed,
    Lzw,
    #[default]
    Deflate,
    Packbits,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TiffDeflateLevel {
    Fast,
    #[default]
    Balanced,
    Best,
}

/// TIFF pipeline settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TiffParameters {
    pub compression: TiffCompression,
    /// Only meaningful with [`TiffCompression::Deflate`].
    pub deflate_level: TiffDeflateLevel,
}

/// Color model of a decoded JPEG, as reported by the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSpace {
    Grayscale,
    Rgb,
    Cmyk,
}

impl ColorSpace {
    pub fn components(self) -> usize {
        match self {
            ColorSpace::Grayscale => 1,
            ColorSpace::Rgb => 3,
            ColorSpace::Cmyk => 4,
        }
    }
}

/// Properties the decode step reads from the bitstream.
///
/// Produced by [`JpegCodec::decompress`](crate::codec::JpegCodec::decompress)
/// and consumed by the encode step of the same run. Never caller-supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageProperties {
    pub width: u32,
    pub height: u32,
    pub color_space: ColorSpace,
    pub subsampling: ChromaSubsampling,
}

/// A decoded image: tightly packed samples, no row padding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    pub width: u32,
    pub height: u32,
    pub color_space: ColorSpace,
    pub data: Vec<u8>,
}

impl PixelBuffer {
    /// Byte length implied by the dimensions, `None` on overflow.
    pub fn expected_len(&self) -> Option<usize> {
        (self.width as usize)
            .checked_mul(self.height as usize)?
            .checked_mul(self.color_space.components())
    }

    pub fn row_stride(&self) -> usize {
        self.width as usize * self.color_space.components()
    }
}

/// Everything the lossy encoder needs besides the pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EncodeSettings {
    pub quality: u32,
    pub subsampling: ChromaSubsampling,
    pub dct_method: DctMethod,
    pub progressive: bool,
}

impl EncodeSettings {
    /// Resolve `Auto` subsampling against what the decoder found.
    pub fn resolve(params: &JpegParameters, decoded: &ImageProperties) -> Self {
        let subsampling = match params.chroma_subsampling {
            ChromaSubsampling::Auto => decoded.subsampling,
            forced => forced,
        };
        Self {
            quality: params.quality,
            subsampling,
            dct_method: params.dct_method,
            progressive: params.progressive,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_surface() {
        let params = CompressionParameters::new();
        assert_eq!(params.jpeg.quality, 0);
        assert!(!params.jpeg.metadata_copy);
        assert_eq!(params.jpeg.dct_method, DctMethod::Fast);
        assert_eq!(params.jpeg.scale_factor, 1.0);
        assert_eq!(params.png.iterations, 2);
        assert_eq!(params.png.iterations_large, 1);
        assert!(params.png.lossy_8bit);
        assert!(params.png.lossy_transparent);
        assert!(params.png.auto_filter_strategy);
        assert_eq!(params.png.scale_factor, 1.0);
        assert_eq!(params.tiff.compression, TiffCompression::Deflate);
    }

    #[test]
    fn quality_zero_is_optimize_only() {
        let mut jpeg = JpegParameters::default();
        assert!(!jpeg.is_lossy());
        jpeg.quality = 75;
        assert!(jpeg.is_lossy());
    }

    #[test]
    fn subsampling_factors_round_trip() {
        for s in [
            ChromaSubsampling::Cs444,
            ChromaSubsampling::Cs422,
            ChromaSubsampling::Cs420,
            ChromaSubsampling::Cs411,
        ] {
            let (h, v) = s.luma_factors().unwrap();
            assert_eq!(ChromaSubsampling::from_luma_factors(h, v), s);
        }
        assert_eq!(ChromaSubsampling::from_luma_factors(1, 2), ChromaSubsampling::Auto);
    }

    #[test]
    fn encode_settings_keep_decoded_sampling_on_auto() {
        let decoded = ImageProperties {
            width: 10,
            height: 10,
            color_space: ColorSpace::Rgb,
            subsampling: ChromaSubsampling::Cs422,
        };
        let mut params = JpegParameters {
            quality: 70,
            ..Default::default()
        };
        assert_eq!(
            EncodeSettings::resolve(&params, &decoded).subsampling,
            ChromaSubsampling::Cs422
        );

        params.chroma_subsampling = ChromaSubsampling::Cs444;
        assert_eq!(
            EncodeSettings::resolve(&params, &decoded).subsampling,
            ChromaSubsampling::Cs444
        );
    }

    #[test]
    fn pixel_buffer_expected_len() {
        let buf = PixelBuffer {
            width: 4,
            height: 3,
            color_space: ColorSpace::Rgb,
            data: vec![0; 36],
        };
        assert_eq!(buf.expected_len(), Some(36));
        assert_eq!(buf.row_stride(), 12);

        let huge = PixelBuffer {
            width: u32::MAX,
            height: u32::MAX,
            color_space: ColorSpace::Cmyk,
            data: Vec::new(),
        };
        if usize::BITS == 64 {
            assert_eq!(huge.expected_len(), None);
        }
    }
}
