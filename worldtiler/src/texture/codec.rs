//! The tile codec trait and codec construction.

use crate::raster::{RasterTile, SampleType};

use super::{BilCodec, BilLayout, DdsTileCodec, ImageCodec, TextureError, TileFormat};

/// Trait for reading and writing pyramid tiles.
///
/// Implementations must be thread-safe (`Send + Sync`) so one codec can be
/// shared by every worker of a pool.
pub trait TileCodec: Send + Sync {
    /// Encodes a tile into file bytes.
    fn encode(&self, tile: &RasterTile) -> Result<Vec<u8>, TextureError>;

    /// Decodes file bytes back into a fully covered tile.
    fn decode(&self, data: &[u8]) -> Result<RasterTile, TextureError>;

    /// Pixel value marking absent data, one entry per decoded band.
    fn nodata(&self) -> Option<Vec<f64>>;

    /// Band count and sample type of decoded tiles.
    fn layout(&self) -> (usize, SampleType);

    /// File extension without the dot.
    fn extension(&self) -> &str;

    /// Human-readable codec name.
    fn name(&self) -> &str;
}

/// Everything needed to build the codec for a run.
#[derive(Debug, Clone, PartialEq)]
pub struct CodecSettings {
    pub format: TileFormat,
    pub tile_width: u32,
    pub tile_height: u32,
    pub jpeg_quality: u8,
    pub bil: BilLayout,
}

impl CodecSettings {
    pub fn new(format: TileFormat, tile_width: u32, tile_height: u32) -> Self {
        Self {
            format,
            tile_width,
            tile_height,
            jpeg_quality: 90,
            bil: BilLayout::default(),
        }
    }

    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality;
        self
    }

    pub fn with_bil(mut self, bil: BilLayout) -> Self {
        self.bil = bil;
        self
    }

    /// Builds the codec for the configured format.
    pub fn build(&self) -> Result<Box<dyn TileCodec>, TextureError> {
        Ok(match self.format {
            TileFormat::Dds(format) => Box::new(DdsTileCodec::new(format)),
            TileFormat::Bil => Box::new(BilCodec::new(self.bil, self.tile_width, self.tile_height)?),
            format => Box::new(ImageCodec::new(format)?.with_jpeg_quality(self.jpeg_quality)),
        })
    }
}
