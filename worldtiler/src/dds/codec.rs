//! DDS encoder and decoder for RGBA tiles.

use image::RgbaImage;

use super::block::{self, Block};
use super::header::{DdsHeader, DDS_HEADER_SIZE};
use super::{DdsError, DdsFormat};

/// Encodes RGBA images to DDS.
///
/// Tiles are written without mipmaps unless a count is set.
#[derive(Debug, Clone)]
pub struct DdsEncoder {
    format: DdsFormat,
    mipmap_count: usize,
}

impl DdsEncoder {
    pub fn new(format: DdsFormat) -> Self {
        Self {
            format,
            mipmap_count: 1,
        }
    }

    /// Number of surfaces including the base level. Chains stop early once
    /// a side reaches one pixel.
    pub fn with_mipmap_count(mut self, count: usize) -> Self {
        self.mipmap_count = count.max(1);
        self
    }

    pub fn format(&self) -> DdsFormat {
        self.format
    }

    /// Encodes `image` and its mipmap chain.
    pub fn encode(&self, image: &RgbaImage) -> Result<Vec<u8>, DdsError> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(DdsError::InvalidDimensions(width, height));
        }

        let mut chain = vec![image.clone()];
        while chain.len() < self.mipmap_count {
            let last = &chain[chain.len() - 1];
            if last.width() == 1 && last.height() == 1 {
                break;
            }
            chain.push(halve(last));
        }

        let header = DdsHeader::new(width, height, chain.len() as u32, self.format);
        let mut out = header.to_bytes();
        for surface in &chain {
            self.compress(surface, &mut out);
        }
        Ok(out)
    }

    fn compress(&self, image: &RgbaImage, out: &mut Vec<u8>) {
        let (width, height) = image.dimensions();
        for by in 0..height.div_ceil(4) {
            for bx in 0..width.div_ceil(4) {
                let pixels = gather_block(image, bx, by);
                match self.format {
                    DdsFormat::BC1 => out.extend_from_slice(&block::encode_color(&pixels, true)),
                    DdsFormat::BC3 => {
                        out.extend_from_slice(&block::encode_alpha(&pixels));
                        out.extend_from_slice(&block::encode_color(&pixels, false));
                    }
                }
            }
        }
    }
}

/// Decodes the base surface of a DDS file.
pub struct DdsDecoder;

impl DdsDecoder {
    pub fn decode(data: &[u8]) -> Result<RgbaImage, DdsError> {
        let header = DdsHeader::parse(data)?;
        let (width, height) = (header.width, header.height);
        if width == 0 || height == 0 {
            return Err(DdsError::InvalidDimensions(width, height));
        }
        let expected = DDS_HEADER_SIZE + header.format.surface_size(width, height);
        if data.len() < expected {
            return Err(DdsError::Truncated {
                expected,
                actual: data.len(),
            });
        }

        let block_size = header.format.block_size();
        let blocks_wide = width.div_ceil(4);
        let mut image = RgbaImage::new(width, height);
        let body = &data[DDS_HEADER_SIZE..expected];

        for (i, chunk) in body.chunks_exact(block_size).enumerate() {
            let bx = i as u32 % blocks_wide;
            let by = i as u32 / blocks_wide;
            let pixels = match header.format {
                DdsFormat::BC1 => block::decode_color(chunk, false),
                DdsFormat::BC3 => {
                    let mut pixels = block::decode_color(&chunk[8..16], true);
                    block::decode_alpha(&chunk[0..8], &mut pixels);
                    pixels
                }
            };
            scatter_block(&mut image, bx, by, &pixels);
        }
        Ok(image)
    }
}

/// Copies a 4×4 block, clamping reads at the right and bottom edges.
fn gather_block(image: &RgbaImage, bx: u32, by: u32) -> Block {
    let (width, height) = image.dimensions();
    let mut pixels = [[0u8; 4]; 16];
    for (i, px) in pixels.iter_mut().enumerate() {
        let x = (bx * 4 + i as u32 % 4).min(width - 1);
        let y = (by * 4 + i as u32 / 4).min(height - 1);
        *px = image.get_pixel(x, y).0;
    }
    pixels
}

fn scatter_block(image: &mut RgbaImage, bx: u32, by: u32, pixels: &Block) {
    let (width, height) = image.dimensions();
    for (i, px) in pixels.iter().enumerate() {
        let x = bx * 4 + i as u32 % 4;
        let y = by * 4 + i as u32 / 4;
        if x < width && y < height {
            image.put_pixel(x, y, image::Rgba(*px));
        }
    }
}

/// Box-filtered half-size surface for the mipmap chain.
fn halve(image: &RgbaImage) -> RgbaImage {
    let (width, height) = image.dimensions();
    let (nw, nh) = ((width / 2).max(1), (height / 2).max(1));
    RgbaImage::from_fn(nw, nh, |x, y| {
        let mut sum = [0u32; 4];
        for (dx, dy) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
            let sx = (x * 2 + dx).min(width - 1);
            let sy = (y * 2 + dy).min(height - 1);
            let p = image.get_pixel(sx, sy).0;
            for c in 0..4 {
                sum[c] += p[c] as u32;
            }
        }
        image::Rgba([
            (sum[0] / 4) as u8,
            (sum[1] / 4) as u8,
            (sum[2] / 4) as u8,
            (sum[3] / 4) as u8,
        ])
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_encode_size_without_mipmaps() {
        let image = RgbaImage::from_pixel(64, 64, Rgba([10, 20, 30, 255]));
        let data = DdsEncoder::new(DdsFormat::BC1).encode(&image).unwrap();
        assert_eq!(data.len(), DDS_HEADER_SIZE + 16 * 16 * 8);
    }

    #[test]
    fn test_encode_size_with_mipmaps() {
        let image = RgbaImage::new(16, 16);
        let data = DdsEncoder::new(DdsFormat::BC3)
            .with_mipmap_count(3)
            .encode(&image)
            .unwrap();
        // 16x16, 8x8 and 4x4 surfaces
        assert_eq!(data.len(), DDS_HEADER_SIZE + (16 + 4 + 1) * 16);
        assert_eq!(DdsHeader::parse(&data).unwrap().mipmap_count, 3);
    }

    #[test]
    fn test_mipmap_chain_stops_at_one_pixel() {
        let image = RgbaImage::new(2, 2);
        let data = DdsEncoder::new(DdsFormat::BC1)
            .with_mipmap_count(10)
            .encode(&image)
            .unwrap();
        assert_eq!(DdsHeader::parse(&data).unwrap().mipmap_count, 2);
    }

    #[test]
    fn test_empty_image_rejected() {
        let image = RgbaImage::new(0, 4);
        assert_eq!(
            DdsEncoder::new(DdsFormat::BC1).encode(&image),
            Err(DdsError::InvalidDimensions(0, 4))
        );
    }

    #[test]
    fn test_quadrant_colors_round_trip() {
        let image = RgbaImage::from_fn(8, 8, |x, y| match (x < 4, y < 4) {
            (true, true) => Rgba([255, 0, 0, 255]),
            (false, true) => Rgba([0, 255, 0, 255]),
            (true, false) => Rgba([0, 0, 255, 255]),
            (false, false) => Rgba([255, 255, 255, 255]),
        });
        for format in [DdsFormat::BC1, DdsFormat::BC3] {
            let data = DdsEncoder::new(format).encode(&image).unwrap();
            let decoded = DdsDecoder::decode(&data).unwrap();
            assert_eq!(decoded, image, "{} round trip", format);
        }
    }

    #[test]
    fn test_non_multiple_of_four_dimensions() {
        let image = RgbaImage::from_pixel(6, 5, Rgba([0, 0, 0, 255]));
        let data = DdsEncoder::new(DdsFormat::BC1).encode(&image).unwrap();
        let decoded = DdsDecoder::decode(&data).unwrap();
        assert_eq!(decoded.dimensions(), (6, 5));
        assert_eq!(decoded, image);
    }

    #[test]
    fn test_decode_truncated_body() {
        let image = RgbaImage::new(8, 8);
        let data = DdsEncoder::new(DdsFormat::BC1).encode(&image).unwrap();
        assert!(matches!(
            DdsDecoder::decode(&data[..DDS_HEADER_SIZE + 4]),
            Err(DdsError::Truncated { .. })
        ));
    }
}
