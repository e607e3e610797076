//! Codec for standard image formats (JPEG, PNG, BMP, GIF).

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ExtendedColorType, ImageFormat};

use crate::raster::{RasterTile, SampleType};

use super::{TextureError, TileCodec, TileFormat};

/// Encodes 8-bit tiles with the `image` crate.
///
/// Tiles are expanded to RGBA (palettes included) before encoding. JPEG has
/// no alpha channel, so it is written as RGB.
#[derive(Debug, Clone)]
pub struct ImageCodec {
    format: TileFormat,
    image_format: ImageFormat,
    jpeg_quality: u8,
}

impl ImageCodec {
    pub fn new(format: TileFormat) -> Result<Self, TextureError> {
        let image_format = match format {
            TileFormat::Jpeg => ImageFormat::Jpeg,
            TileFormat::Png => ImageFormat::Png,
            TileFormat::Bmp => ImageFormat::Bmp,
            TileFormat::Gif => ImageFormat::Gif,
            other => {
                return Err(TextureError::UnsupportedFormat(format!(
                    "{} is not an image format",
                    other
                )))
            }
        };
        Ok(Self {
            format,
            image_format,
            jpeg_quality: 90,
        })
    }

    /// JPEG quality from 1 to 100.
    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality.clamp(1, 100);
        self
    }

    pub fn format(&self) -> TileFormat {
        self.format
    }
}

impl TileCodec for ImageCodec {
    fn encode(&self, tile: &RasterTile) -> Result<Vec<u8>, TextureError> {
        let rgba = tile.to_rgba_image()?;
        let mut buffer = Cursor::new(Vec::new());
        if self.format == TileFormat::Jpeg {
            let rgb = DynamicImage::ImageRgba8(rgba).to_rgb8();
            let mut encoder = JpegEncoder::new_with_quality(&mut buffer, self.jpeg_quality);
            encoder.encode(
                rgb.as_raw(),
                rgb.width(),
                rgb.height(),
                ExtendedColorType::Rgb8,
            )?;
        } else {
            rgba.write_to(&mut buffer, self.image_format)?;
        }
        Ok(buffer.into_inner())
    }

    fn decode(&self, data: &[u8]) -> Result<RasterTile, TextureError> {
        let image = image::load_from_memory_with_format(data, self.image_format)?;
        Ok(RasterTile::from_rgba_image(&image.to_rgba8()))
    }

    fn nodata(&self) -> Option<Vec<f64>> {
        Some(vec![0.0; 4])
    }

    fn layout(&self) -> (usize, SampleType) {
        (4, SampleType::U8)
    }

    fn extension(&self) -> &str {
        self.format.extension()
    }

    fn name(&self) -> &str {
        match self.format {
            TileFormat::Jpeg => "JPEG",
            TileFormat::Png => "PNG",
            TileFormat::Bmp => "BMP",
            _ => "GIF",
        }
    }
}
