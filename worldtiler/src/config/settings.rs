//! Run settings and their defaults.

use std::path::PathBuf;

use crate::coord::{CoordError, TileGrid, DEFAULT_LEVEL_ZERO_TILE_SIZE};
use crate::dds::DdsFormat;
use crate::raster::Crs;
use crate::texture::{BilLayout, CodecSettings, TileFormat};

use super::file::ConfigFileError;

/// Default tile edge in pixels.
pub const DEFAULT_TILE_SIZE: u32 = 512;

/// Default JPEG quality.
pub const DEFAULT_JPEG_QUALITY: u8 = 90;

/// Largest accepted tile edge in pixels.
pub const MAX_TILE_SIZE: u32 = 16384;

/// Worker count used when none is configured.
pub fn default_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

/// `[source]` section.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceSettings {
    pub path: Option<PathBuf>,
}

/// `[output]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputSettings {
    pub directory: Option<PathBuf>,
    pub format: TileFormat,
    pub dds_compression: DdsFormat,
    pub jpeg_quality: u8,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            directory: None,
            format: TileFormat::Png,
            dds_compression: DdsFormat::BC1,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

/// `[pyramid]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct PyramidSettings {
    /// Finest level produced by raster runs.
    pub level: u32,
    /// Levels clipped by vector runs.
    pub levels: Vec<u32>,
    pub level_zero_tile_size: f64,
}

impl Default for PyramidSettings {
    fn default() -> Self {
        Self {
            level: 0,
            levels: Vec::new(),
            level_zero_tile_size: DEFAULT_LEVEL_ZERO_TILE_SIZE,
        }
    }
}

/// `[raster]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterSettings {
    pub tile_width: u32,
    pub tile_height: u32,
    /// Zero-based band to extract; all bands when unset.
    pub band: Option<usize>,
    /// Append a coverage alpha band.
    pub alpha: bool,
    /// Source nodata override.
    pub nodata: Option<f64>,
    /// Per-band fill for pixels the source does not cover.
    pub outside: Option<Vec<f64>>,
    /// Source CRS override.
    pub source_proj: Option<Crs>,
}

impl Default for RasterSettings {
    fn default() -> Self {
        Self {
            tile_width: DEFAULT_TILE_SIZE,
            tile_height: DEFAULT_TILE_SIZE,
            band: None,
            alpha: false,
            nodata: None,
            outside: None,
            source_proj: None,
        }
    }
}

/// `[processing]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessingSettings {
    pub threads: usize,
}

impl Default for ProcessingSettings {
    fn default() -> Self {
        Self {
            threads: default_threads(),
        }
    }
}

/// Everything one pipeline run needs, loaded from `config.ini` and then
/// overridden from the command line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunConfig {
    pub source: SourceSettings,
    pub output: OutputSettings,
    pub pyramid: PyramidSettings,
    pub raster: RasterSettings,
    pub bil: BilLayout,
    pub processing: ProcessingSettings,
}

impl RunConfig {
    /// Output format with the DDS compression applied.
    pub fn tile_format(&self) -> TileFormat {
        self.output
            .format
            .with_dds_compression(self.output.dds_compression)
    }

    pub fn codec_settings(&self) -> CodecSettings {
        CodecSettings::new(
            self.tile_format(),
            self.raster.tile_width,
            self.raster.tile_height,
        )
        .with_jpeg_quality(self.output.jpeg_quality)
        .with_bil(self.bil)
    }

    pub fn grid(&self) -> Result<TileGrid, CoordError> {
        TileGrid::new(self.pyramid.level_zero_tile_size)
    }

    /// Checks cross-field constraints after CLI overrides are applied.
    pub fn validate(&self) -> Result<(), ConfigFileError> {
        let lzts = self.pyramid.level_zero_tile_size;
        if !(lzts.is_finite() && lzts > 0.0 && lzts <= 180.0) {
            return Err(invalid(
                "pyramid",
                "level_zero_tile_size",
                lzts,
                "must be greater than 0 and at most 180",
            ));
        }
        for (key, size) in [
            ("tile_width", self.raster.tile_width),
            ("tile_height", self.raster.tile_height),
        ] {
            if size == 0 || size > MAX_TILE_SIZE {
                return Err(invalid(
                    "raster",
                    key,
                    size,
                    &format!("must be between 1 and {}", MAX_TILE_SIZE),
                ));
            }
        }
        if !(1..=100).contains(&self.output.jpeg_quality) {
            return Err(invalid(
                "output",
                "jpeg_quality",
                self.output.jpeg_quality,
                "must be between 1 and 100",
            ));
        }
        if self.processing.threads == 0 {
            return Err(invalid("processing", "threads", 0, "must be at least 1"));
        }
        if self.raster.alpha && self.output.format == TileFormat::Bil {
            return Err(invalid(
                "raster",
                "alpha",
                true,
                "BIL tiles hold a single band",
            ));
        }
        if let Some(outside) = &self.raster.outside {
            if outside.is_empty() {
                return Err(invalid("raster", "outside", "", "needs at least one value"));
            }
        }
        Ok(())
    }
}

fn invalid(section: &str, key: &str, value: impl ToString, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RunConfig::default();
        assert_eq!(config.pyramid.level_zero_tile_size, 36.0);
        assert_eq!(config.raster.tile_width, 512);
        assert_eq!(config.output.format, TileFormat::Png);
        assert_eq!(config.bil, BilLayout::default());
        assert!(config.processing.threads >= 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_tile_format_applies_compression() {
        let mut config = RunConfig::default();
        config.output.format = TileFormat::Dds(DdsFormat::BC1);
        config.output.dds_compression = DdsFormat::BC3;
        assert_eq!(config.tile_format(), TileFormat::Dds(DdsFormat::BC3));
        assert_eq!(config.codec_settings().format, TileFormat::Dds(DdsFormat::BC3));
    }

    #[test]
    fn test_validate_rejects_bad_lzts() {
        let mut config = RunConfig::default();
        config.pyramid.level_zero_tile_size = 0.0;
        match config.validate() {
            Err(ConfigFileError::InvalidValue { key, .. }) => {
                assert_eq!(key, "level_zero_tile_size")
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_validate_rejects_zero_threads() {
        let mut config = RunConfig::default();
        config.processing.threads = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_alpha_in_bil() {
        let mut config = RunConfig::default();
        config.output.format = TileFormat::Bil;
        config.raster.alpha = true;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_oversized_tiles() {
        let mut config = RunConfig::default();
        config.raster.tile_height = MAX_TILE_SIZE + 1;
        assert!(config.validate().is_err());
    }
}
