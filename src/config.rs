//! Configuration file.
//!
//! The CLI accepts an optional TOML file that supplies the compression
//! parameters. Every key is optional; unspecified values keep their defaults
//! and command-line flags are applied on top.
//!
//! ## Configuration Options
//!
//! ```toml
//! [jpeg]
//! quality = 0                # 0 = lossless optimize only, 1-100 = re-encode
//! metadata_copy = false      # Carry APPn/COM markers from the original
//! dct_method = "fast"        # "fast", "slow" or "float"
//! scale_factor = 1.0         # Downscale during lossy decode, (0, 1]
//! chroma_subsampling = "auto" # "auto", "444", "422", "420" or "411"
//! progressive = true
//!
//! [png]
//! iterations = 2             # Zopfli iterations below 200 000 bytes
//! iterations_large = 1       # Zopfli iterations at or above
//! block_split_strategy = "none"
//! lossy_8bit = true
//! lossy_transparent = true
//! auto_filter_strategy = true
//! scale_factor = 1.0         # Resize, (0, 1]
//!
//! [tiff]
//! compression = "deflate"    # "uncompressed", "lzw", "deflate" or "packbits"
//! deflate_level = "balanced" # "fast", "balanced" or "best"
//!
//! [report]
//! verbose = false            # Print each reported code to stderr
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::codec::calculations::is_valid_scale_factor;
use crate::params::{CompressionParameters, JpegParameters, PngParameters, TiffParameters};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Contents of a configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PinchConfig {
    pub jpeg: JpegParameters,
    pub png: PngParameters,
    pub tiff: TiffParameters,
    pub report: ReportConfig,
}

/// Diagnostic output settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReportConfig {
    pub verbose: bool,
}

impl PinchConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jpeg.quality > 100 {
            return Err(ConfigError::Validation("jpeg.quality must be 0-100".into()));
        }
        if !is_valid_scale_factor(self.jpeg.scale_factor) {
            return Err(ConfigError::Validation(
                "jpeg.scale_factor must be in (0, 1]".into(),
            ));
        }
        if self.jpeg.scale_factor < 1.0 && self.jpeg.quality == 0 {
            return Err(ConfigError::Validation(
                "jpeg.scale_factor below 1 requires jpeg.quality above 0".into(),
            ));
        }
        if !is_valid_scale_factor(self.png.scale_factor) {
            return Err(ConfigError::Validation(
                "png.scale_factor must be in (0, 1]".into(),
            ));
        }
        if self.png.iterations == 0 || self.png.iterations_large == 0 {
            return Err(ConfigError::Validation(
                "png.iterations and png.iterations_large must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn parameters(&self) -> CompressionParameters {
        CompressionParameters {
            jpeg: self.jpeg.clone(),
            png: self.png.clone(),
            tiff: self.tiff.clone(),
        }
    }
}

/// Parse and validate a TOML document.
pub fn parse_config(content: &str) -> Result<PinchConfig, ConfigError> {
    let config: PinchConfig = toml::from_str(content)?;
    config.validate()?;
    Ok(config)
}

/// Load config from a TOML file.
pub fn load_config(path: &Path) -> Result<PinchConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Returns a fully-commented stock config file with every key at its default.
pub fn stock_config_toml() -> &'static str {
    r##"# pinch configuration
# ===================
# All settings are optional. Values shown below are the defaults.
# Unknown keys will cause an error.

[jpeg]
# 0 skips re-encoding and only optimizes losslessly; 1-100 re-encodes first.
quality = 0
# Copy EXIF, XMP, ICC and comment markers from the original file.
metadata_copy = false
# DCT implementation for the re-encode: "fast", "slow" or "float".
dct_method = "fast"
# Downscale while decoding, rounded to eighths. Requires quality > 0.
scale_factor = 1.0
# "auto" keeps the original sampling; or "444", "422", "420", "411".
chroma_subsampling = "auto"
# Write progressive scans.
progressive = true

[png]
# Zopfli iterations for files below 200 000 bytes.
iterations = 2
# Zopfli iterations for larger files.
iterations_large = 1
# "none", "first", "last" or "both".
block_split_strategy = "none"
# Allow 16-bit channels to be reduced to 8 bits.
lossy_8bit = true
# Allow color values under fully transparent pixels to change.
lossy_transparent = true
# Try every row filter instead of a single heuristic.
auto_filter_strategy = true
# Resize before optimizing, (0, 1].
scale_factor = 1.0

[tiff]
# "uncompressed", "lzw", "deflate" or "packbits".
compression = "deflate"
# Only used with deflate: "fast", "balanced" or "best".
deflate_level = "balanced"

[report]
# Print every reported code to stderr.
verbose = false
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{ChromaSubsampling, DctMethod, TiffCompression};
    use tempfile::TempDir;

    #[test]
    fn stock_config_matches_defaults() {
        let config = parse_config(stock_config_toml()).unwrap();
        assert_eq!(config, PinchConfig::default());
    }

    #[test]
    fn empty_config_is_default() {
        assert_eq!(parse_config("").unwrap(), PinchConfig::default());
    }

    #[test]
    fn parse_partial_config() {
        let config = parse_config(
            r#"
[jpeg]
quality = 80
chroma_subsampling = "420"
dct_method = "float"

[tiff]
compression = "lzw"
"#,
        )
        .unwrap();
        assert_eq!(config.jpeg.quality, 80);
        assert_eq!(config.jpeg.chroma_subsampling, ChromaSubsampling::Cs420);
        assert_eq!(config.jpeg.dct_method, DctMethod::Float);
        assert_eq!(config.tiff.compression, TiffCompression::Lzw);
        // Unspecified values should be defaults
        assert!(config.jpeg.progressive);
        assert_eq!(config.png, PngParameters::default());
    }

    #[test]
    fn parameters_carry_every_section() {
        let config = parse_config("[png]\niterations = 7\n[jpeg]\nmetadata_copy = true\n").unwrap();
        let params = config.parameters();
        assert_eq!(params.png.iterations, 7);
        assert!(params.jpeg.metadata_copy);
    }

    #[test]
    fn unknown_key_rejected() {
        let result = parse_config("[jpeg]\nqualty = 80\n");
        assert!(matches!(result, Err(ConfigError::Toml(_))));
        let err = result.unwrap_err().to_string();
        assert!(err.contains("unknown field"));
    }

    #[test]
    fn unknown_section_rejected() {
        assert!(parse_config("[gif]\nquality = 1\n").is_err());
    }

    #[test]
    fn validation_rejects_out_of_range_values() {
        for doc in [
            "[jpeg]\nquality = 101\n",
            "[jpeg]\nquality = 50\nscale_factor = 0.0\n",
            "[jpeg]\nscale_factor = 0.5\n",
            "[png]\nscale_factor = 1.5\n",
            "[png]\niterations = 0\n",
        ] {
            assert!(
                matches!(parse_config(doc), Err(ConfigError::Validation(_))),
                "{doc}"
            );
        }
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("pinch.toml");
        fs::write(&path, "[report]\nverbose = true\n").unwrap();
        assert!(load_config(&path).unwrap().report.verbose);
    }

    #[test]
    fn load_config_missing_file_is_io_error() {
        let tmp = TempDir::new().unwrap();
        let result = load_config(&tmp.path().join("absent.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("pinch.toml");
        fs::write(&path, "this is not valid toml [[[").unwrap();
        assert!(matches!(load_config(&path), Err(ConfigError::Toml(_))));
    }
}
