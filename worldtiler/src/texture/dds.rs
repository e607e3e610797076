//! DDS tile codec.

use crate::dds::{DdsDecoder, DdsEncoder, DdsFormat, DDS_HEADER_SIZE};
use crate::raster::{RasterTile, SampleType};

use super::{TextureError, TileCodec};

/// Encodes tiles to BC1/BC3 compressed DDS files.
///
/// # Example
///
/// ```
/// use worldtiler::texture::{DdsTileCodec, TileCodec};
/// use worldtiler::dds::DdsFormat;
///
/// let codec = DdsTileCodec::new(DdsFormat::BC1).with_mipmap_count(3);
///
/// assert_eq!(codec.extension(), "dds");
/// assert_eq!(codec.name(), "DDS BC1");
/// ```
#[derive(Debug, Clone)]
pub struct DdsTileCodec {
    format: DdsFormat,
    mipmap_count: usize,
}

impl DdsTileCodec {
    /// Creates a codec that writes the base surface only.
    pub fn new(format: DdsFormat) -> Self {
        Self {
            format,
            mipmap_count: 1,
        }
    }

    /// Set the number of mipmap levels to generate, including the base level.
    pub fn with_mipmap_count(mut self, count: usize) -> Self {
        self.mipmap_count = count.max(1);
        self
    }

    pub fn format(&self) -> DdsFormat {
        self.format
    }

    pub fn mipmap_count(&self) -> usize {
        self.mipmap_count
    }

    /// Total file size for a `width`×`height` tile with the configured chain.
    pub fn expected_size(&self, width: u32, height: u32) -> usize {
        let mut total = DDS_HEADER_SIZE;
        let (mut w, mut h) = (width, height);
        for _ in 0..self.mipmap_count {
            total += self.format.surface_size(w, h);
            if w == 1 && h == 1 {
                break;
            }
            w = (w / 2).max(1);
            h = (h / 2).max(1);
        }
        total
    }
}

impl TileCodec for DdsTileCodec {
    fn encode(&self, tile: &RasterTile) -> Result<Vec<u8>, TextureError> {
        let image = tile.to_rgba_image()?;
        let encoder = DdsEncoder::new(self.format).with_mipmap_count(self.mipmap_count);
        encoder.encode(&image).map_err(TextureError::from)
    }

    fn decode(&self, data: &[u8]) -> Result<RasterTile, TextureError> {
        let image = DdsDecoder::decode(data)?;
        Ok(RasterTile::from_rgba_image(&image))
    }

    fn nodata(&self) -> Option<Vec<f64>> {
        Some(vec![0.0; 4])
    }

    fn layout(&self) -> (usize, SampleType) {
        (4, SampleType::U8)
    }

    fn extension(&self) -> &str {
        "dds"
    }

    fn name(&self) -> &str {
        match self.format {
            DdsFormat::BC1 => "DDS BC1",
            DdsFormat::BC3 => "DDS BC3",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_default_mipmap_count() {
        let codec = DdsTileCodec::new(DdsFormat::BC1);
        assert_eq!(codec.mipmap_count(), 1);
        assert_eq!(codec.format(), DdsFormat::BC1);
    }

    #[test]
    fn test_expected_size_256_bc1() {
        let codec = DdsTileCodec::new(DdsFormat::BC1);
        // 64×64 blocks * 8 bytes + header
        assert_eq!(codec.expected_size(256, 256), 32_896);
    }

    #[test]
    fn test_expected_size_bc3_with_mipmaps() {
        let codec = DdsTileCodec::new(DdsFormat::BC3).with_mipmap_count(3);
        // 16 + 4 + 1 blocks of 16 bytes
        assert_eq!(codec.expected_size(16, 16), 128 + 21 * 16);
    }

    #[test]
    fn test_encode_matches_expected_size() {
        let codec = DdsTileCodec::new(DdsFormat::BC1).with_mipmap_count(4);
        let tile = RasterTile::filled(64, 64, SampleType::U8, &[40.0, 80.0, 120.0]);
        let data = codec.encode(&tile).unwrap();
        assert_eq!(data.len(), codec.expected_size(64, 64));
        assert_eq!(&data[0..4], b"DDS ");
    }

    #[test]
    fn test_encode_rejects_wide_samples() {
        let codec = DdsTileCodec::new(DdsFormat::BC1);
        let tile = RasterTile::filled(4, 4, SampleType::U16, &[1000.0]);
        assert!(matches!(
            codec.encode(&tile),
            Err(TextureError::EncodingFailed(_))
        ));
    }

    #[test]
    fn test_decode_solid_tile() {
        let codec = DdsTileCodec::new(DdsFormat::BC3);
        let tile = RasterTile::filled(8, 8, SampleType::U8, &[255.0, 255.0, 255.0, 255.0]);
        let decoded = codec.decode(&codec.encode(&tile).unwrap()).unwrap();
        assert_eq!(decoded.bands(), 4);
        assert_eq!(decoded.pixel(7, 7), vec![255.0; 4]);
    }
}
