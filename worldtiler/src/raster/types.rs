//! Sample types, palettes and the in-memory raster tile.

use std::fmt;
use std::str::FromStr;

use image::RgbaImage;

use super::RasterError;

/// Numeric type of one raster sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleType {
    U8,
    U16,
    I16,
    U32,
    I32,
    F32,
    F64,
}

/// Byte order of raw sample data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ByteOrder {
    #[default]
    LittleEndian,
    BigEndian,
}

impl SampleType {
    /// Size of one sample in bytes.
    pub fn size(self) -> usize {
        match self {
            SampleType::U8 => 1,
            SampleType::U16 | SampleType::I16 => 2,
            SampleType::U32 | SampleType::I32 | SampleType::F32 => 4,
            SampleType::F64 => 8,
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, SampleType::F32 | SampleType::F64)
    }

    /// Largest representable value, used for opaque alpha.
    pub fn max_value(self) -> f64 {
        match self {
            SampleType::U8 => u8::MAX as f64,
            SampleType::U16 => u16::MAX as f64,
            SampleType::I16 => i16::MAX as f64,
            SampleType::U32 => u32::MAX as f64,
            SampleType::I32 => i32::MAX as f64,
            SampleType::F32 | SampleType::F64 => 1.0,
        }
    }

    /// Decodes one sample from the front of `bytes`.
    ///
    /// `bytes` must hold at least [`SampleType::size`] bytes.
    pub fn read(self, bytes: &[u8], order: ByteOrder) -> f64 {
        macro_rules! decode {
            ($t:ty, $n:expr) => {{
                let mut buf = [0u8; $n];
                buf.copy_from_slice(&bytes[..$n]);
                match order {
                    ByteOrder::LittleEndian => <$t>::from_le_bytes(buf) as f64,
                    ByteOrder::BigEndian => <$t>::from_be_bytes(buf) as f64,
                }
            }};
        }
        match self {
            SampleType::U8 => bytes[0] as f64,
            SampleType::U16 => decode!(u16, 2),
            SampleType::I16 => decode!(i16, 2),
            SampleType::U32 => decode!(u32, 4),
            SampleType::I32 => decode!(i32, 4),
            SampleType::F32 => decode!(f32, 4),
            SampleType::F64 => decode!(f64, 8),
        }
    }

    /// Encodes `value` into the front of `out`.
    ///
    /// Integer targets truncate the fractional part and saturate at the
    /// type's range; NaN becomes zero.
    pub fn write(self, value: f64, out: &mut [u8], order: ByteOrder) {
        macro_rules! encode {
            ($t:ty) => {{
                let v = value as $t;
                let bytes = match order {
                    ByteOrder::LittleEndian => v.to_le_bytes(),
                    ByteOrder::BigEndian => v.to_be_bytes(),
                };
                out[..bytes.len()].copy_from_slice(&bytes);
            }};
        }
        match self {
            SampleType::U8 => out[0] = value as u8,
            SampleType::U16 => encode!(u16),
            SampleType::I16 => encode!(i16),
            SampleType::U32 => encode!(u32),
            SampleType::I32 => encode!(i32),
            SampleType::F32 => encode!(f32),
            SampleType::F64 => encode!(f64),
        }
    }

    /// Round-trips `value` through this type.
    pub fn narrow(self, value: f64) -> f64 {
        let mut buf = [0u8; 8];
        self.write(value, &mut buf, ByteOrder::LittleEndian);
        self.read(&buf, ByteOrder::LittleEndian)
    }
}

impl fmt::Display for SampleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SampleType::U8 => "u8",
            SampleType::U16 => "u16",
            SampleType::I16 => "i16",
            SampleType::U32 => "u32",
            SampleType::I32 => "i32",
            SampleType::F32 => "f32",
            SampleType::F64 => "f64",
        };
        f.write_str(name)
    }
}

impl FromStr for SampleType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "u8" | "uint8" | "byte" => Ok(SampleType::U8),
            "u16" | "uint16" => Ok(SampleType::U16),
            "i16" | "int16" => Ok(SampleType::I16),
            "u32" | "uint32" => Ok(SampleType::U32),
            "i32" | "int32" => Ok(SampleType::I32),
            "f32" | "float32" => Ok(SampleType::F32),
            "f64" | "float64" => Ok(SampleType::F64),
            other => Err(format!("unknown sample type '{}'", other)),
        }
    }
}

impl fmt::Display for ByteOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ByteOrder::LittleEndian => f.write_str("little"),
            ByteOrder::BigEndian => f.write_str("big"),
        }
    }
}

impl FromStr for ByteOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "little" | "le" | "little_endian" => Ok(ByteOrder::LittleEndian),
            "big" | "be" | "big_endian" => Ok(ByteOrder::BigEndian),
            other => Err(format!("unknown byte order '{}'", other)),
        }
    }
}

/// RGBA color table of an indexed raster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    entries: Vec<[u8; 4]>,
}

impl Palette {
    pub fn new(entries: Vec<[u8; 4]>) -> Self {
        Self { entries }
    }

    /// Builds a palette from a TIFF `ColorMap`: all reds, then greens, then
    /// blues, each scaled to 16 bits.
    pub fn from_tiff_color_map(map: &[u32]) -> Option<Self> {
        if map.is_empty() || map.len() % 3 != 0 {
            return None;
        }
        let n = map.len() / 3;
        let entries = (0..n)
            .map(|i| {
                [
                    (map[i] >> 8) as u8,
                    (map[n + i] >> 8) as u8,
                    (map[2 * n + i] >> 8) as u8,
                    255,
                ]
            })
            .collect();
        Some(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Color for an index; out-of-range indices are transparent black.
    pub fn color(&self, index: usize) -> [u8; 4] {
        self.entries.get(index).copied().unwrap_or([0, 0, 0, 0])
    }
}

/// Sub-rectangle of a tile, in destination pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl DataRect {
    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x && y >= self.y && x < self.x + self.width && y < self.y + self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// In-memory tile image produced by sampling.
///
/// Samples are pixel-interleaved and stored little-endian in `sample_type`.
/// `data_rect` records which part of the tile the source actually covered;
/// `coverage` refines it per pixel after a reprojected read.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterTile {
    width: u32,
    height: u32,
    bands: usize,
    sample_type: SampleType,
    data: Vec<u8>,
    data_rect: Option<DataRect>,
    coverage: Option<Vec<bool>>,
    palette: Option<Palette>,
}

impl RasterTile {
    /// Creates a zero-filled tile with no data coverage.
    pub fn new(width: u32, height: u32, bands: usize, sample_type: SampleType) -> Self {
        let len = width as usize * height as usize * bands * sample_type.size();
        Self {
            width,
            height,
            bands,
            sample_type,
            data: vec![0; len],
            data_rect: None,
            coverage: None,
            palette: None,
        }
    }

    /// Creates a tile where every pixel holds `values` (one per band).
    pub fn filled(width: u32, height: u32, sample_type: SampleType, values: &[f64]) -> Self {
        let mut tile = Self::new(width, height, values.len(), sample_type);
        for y in 0..height {
            for x in 0..width {
                for (band, v) in values.iter().enumerate() {
                    tile.set(x, y, band, *v);
                }
            }
        }
        tile.data_rect = Some(DataRect {
            x: 0,
            y: 0,
            width,
            height,
        });
        tile
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn bands(&self) -> usize {
        self.bands
    }

    pub fn sample_type(&self) -> SampleType {
        self.sample_type
    }

    pub fn data_rect(&self) -> Option<DataRect> {
        self.data_rect
    }

    pub fn palette(&self) -> Option<&Palette> {
        self.palette.as_ref()
    }

    pub fn set_palette(&mut self, palette: Option<Palette>) {
        self.palette = palette;
    }

    /// Raw little-endian sample bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Records the covered region. `mask`, if given, holds one flag per pixel.
    pub fn set_coverage(&mut self, rect: Option<DataRect>, mask: Option<Vec<bool>>) {
        self.data_rect = rect;
        self.coverage = mask.filter(|m| m.len() == (self.width * self.height) as usize);
    }

    /// Whether the source covered pixel `(x, y)`.
    pub fn is_covered(&self, x: u32, y: u32) -> bool {
        let in_rect = self.data_rect.is_some_and(|r| r.contains(x, y));
        match &self.coverage {
            Some(mask) => in_rect && mask[(y * self.width + x) as usize],
            None => in_rect,
        }
    }

    #[inline]
    fn offset(&self, x: u32, y: u32, band: usize) -> usize {
        ((y as usize * self.width as usize + x as usize) * self.bands + band) * self.sample_type.size()
    }

    /// Sample value as `f64`.
    #[inline]
    pub fn get(&self, x: u32, y: u32, band: usize) -> f64 {
        let off = self.offset(x, y, band);
        self.sample_type.read(&self.data[off..], ByteOrder::LittleEndian)
    }

    #[inline]
    pub fn set(&mut self, x: u32, y: u32, band: usize, value: f64) {
        let off = self.offset(x, y, band);
        let st = self.sample_type;
        st.write(value, &mut self.data[off..], ByteOrder::LittleEndian);
    }

    /// All band values of one pixel.
    pub fn pixel(&self, x: u32, y: u32) -> Vec<f64> {
        (0..self.bands).map(|b| self.get(x, y, b)).collect()
    }

    /// Writes `outside` (one value per band) into every uncovered pixel.
    pub fn fill_outside(&mut self, outside: &[f64]) -> Result<(), RasterError> {
        if outside.len() != self.bands {
            return Err(RasterError::InvalidArgument(format!(
                "outside value has {} bands, tile has {}",
                outside.len(),
                self.bands
            )));
        }
        for y in 0..self.height {
            for x in 0..self.width {
                if !self.is_covered(x, y) {
                    for (band, v) in outside.iter().enumerate() {
                        self.set(x, y, band, *v);
                    }
                }
            }
        }
        Ok(())
    }

    /// Explicit, lossy type conversion.
    ///
    /// Values are truncated toward zero and saturated at the target range.
    pub fn convert(&self, target: SampleType) -> RasterTile {
        if target == self.sample_type {
            return self.clone();
        }
        let mut out = RasterTile::new(self.width, self.height, self.bands, target);
        for y in 0..self.height {
            for x in 0..self.width {
                for b in 0..self.bands {
                    out.set(x, y, b, self.get(x, y, b));
                }
            }
        }
        out.data_rect = self.data_rect;
        out.coverage = self.coverage.clone();
        out.palette = self.palette.clone();
        out
    }

    /// Appends an alpha band: opaque where covered, transparent elsewhere.
    pub fn with_alpha_band(&self) -> RasterTile {
        let mut out = RasterTile::new(self.width, self.height, self.bands + 1, self.sample_type);
        let opaque = self.sample_type.max_value();
        for y in 0..self.height {
            for x in 0..self.width {
                for b in 0..self.bands {
                    out.set(x, y, b, self.get(x, y, b));
                }
                let alpha = if self.is_covered(x, y) { opaque } else { 0.0 };
                out.set(x, y, self.bands, alpha);
            }
        }
        out.data_rect = self.data_rect;
        out.coverage = self.coverage.clone();
        out.palette = self.palette.clone();
        out
    }

    /// Builds a fully covered 8-bit RGBA tile from an image.
    pub fn from_rgba_image(image: &RgbaImage) -> RasterTile {
        let (width, height) = image.dimensions();
        RasterTile {
            width,
            height,
            bands: 4,
            sample_type: SampleType::U8,
            data: image.as_raw().clone(),
            data_rect: Some(DataRect {
                x: 0,
                y: 0,
                width,
                height,
            }),
            coverage: None,
            palette: None,
        }
    }

    /// Expands the tile to RGBA for image encoders.
    ///
    /// Requires 8-bit samples. One band is gray, or palette indices when a
    /// palette is attached; two bands are gray plus alpha; three are RGB;
    /// four or more are RGBA with extra bands ignored.
    pub fn to_rgba_image(&self) -> Result<RgbaImage, RasterError> {
        if self.sample_type != SampleType::U8 {
            return Err(RasterError::InvalidArgument(format!(
                "image output needs u8 samples, tile holds {}",
                self.sample_type
            )));
        }
        let bands = self.bands;
        let data = &self.data;
        let palette = self.palette.as_ref();
        let pixel = |i: usize| -> Result<[u8; 4], RasterError> {
            let p = &data[i * bands..(i + 1) * bands];
            Ok(match (bands, palette) {
                (0, _) => {
                    return Err(RasterError::InvalidArgument(
                        "tile has no bands".to_string(),
                    ))
                }
                (1, Some(palette)) => palette.color(p[0] as usize),
                (1, None) => [p[0], p[0], p[0], 255],
                (2, Some(palette)) => {
                    let c = palette.color(p[0] as usize);
                    [c[0], c[1], c[2], p[1]]
                }
                (2, None) => [p[0], p[0], p[0], p[1]],
                (3, _) => [p[0], p[1], p[2], 255],
                _ => [p[0], p[1], p[2], p[3]],
            })
        };

        let count = self.width as usize * self.height as usize;
        let mut raw = Vec::with_capacity(count * 4);
        for i in 0..count {
            raw.extend_from_slice(&pixel(i)?);
        }
        RgbaImage::from_raw(self.width, self.height, raw).ok_or_else(|| {
            RasterError::InvalidArgument(format!(
                "buffer does not match {}x{}",
                self.width, self.height
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_sizes() {
        assert_eq!(SampleType::U8.size(), 1);
        assert_eq!(SampleType::I16.size(), 2);
        assert_eq!(SampleType::F32.size(), 4);
        assert_eq!(SampleType::F64.size(), 8);
    }

    #[test]
    fn test_read_write_big_endian() {
        let mut buf = [0u8; 2];
        SampleType::I16.write(-2.0, &mut buf, ByteOrder::BigEndian);
        assert_eq!(buf, [0xFF, 0xFE]);
        assert_eq!(SampleType::I16.read(&buf, ByteOrder::BigEndian), -2.0);
    }

    #[test]
    fn test_narrowing_truncates_and_saturates() {
        assert_eq!(SampleType::U8.narrow(12.9), 12.0);
        assert_eq!(SampleType::U8.narrow(300.0), 255.0);
        assert_eq!(SampleType::U8.narrow(-4.0), 0.0);
        assert_eq!(SampleType::I16.narrow(-7.6), -7.0);
        assert_eq!(SampleType::U16.narrow(f64::NAN), 0.0);
    }

    #[test]
    fn test_parse_sample_type_and_order() {
        assert_eq!("Int16".parse::<SampleType>().unwrap(), SampleType::I16);
        assert_eq!("f32".parse::<SampleType>().unwrap(), SampleType::F32);
        assert!("i64".parse::<SampleType>().is_err());
        assert_eq!("BE".parse::<ByteOrder>().unwrap(), ByteOrder::BigEndian);
    }

    #[test]
    fn test_palette_from_color_map() {
        // two entries: red and blue
        let map = [0xFFFF, 0, 0, 0, 0, 0xFFFF];
        let palette = Palette::from_tiff_color_map(&map).unwrap();
        assert_eq!(palette.len(), 2);
        assert_eq!(palette.color(0), [255, 0, 0, 255]);
        assert_eq!(palette.color(1), [0, 0, 255, 255]);
        assert_eq!(palette.color(9), [0, 0, 0, 0]);
    }

    #[test]
    fn test_fill_outside_respects_data_rect() {
        let mut tile = RasterTile::filled(4, 4, SampleType::U8, &[9.0]);
        tile.set_coverage(
            Some(DataRect {
                x: 0,
                y: 0,
                width: 2,
                height: 4,
            }),
            None,
        );
        tile.fill_outside(&[1.0]).unwrap();
        assert_eq!(tile.get(1, 3, 0), 9.0);
        assert_eq!(tile.get(2, 0, 0), 1.0);
        assert_eq!(tile.get(3, 3, 0), 1.0);
    }

    #[test]
    fn test_fill_outside_band_mismatch() {
        let mut tile = RasterTile::new(2, 2, 3, SampleType::U8);
        assert!(matches!(
            tile.fill_outside(&[0.0]),
            Err(RasterError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_coverage_mask_refines_rect() {
        let mut tile = RasterTile::new(2, 1, 1, SampleType::U8);
        tile.set_coverage(
            Some(DataRect {
                x: 0,
                y: 0,
                width: 2,
                height: 1,
            }),
            Some(vec![true, false]),
        );
        assert!(tile.is_covered(0, 0));
        assert!(!tile.is_covered(1, 0));
    }

    #[test]
    fn test_convert_u16_to_u8_saturates() {
        let mut tile = RasterTile::new(1, 1, 1, SampleType::U16);
        tile.set(0, 0, 0, 1000.0);
        let narrowed = tile.convert(SampleType::U8);
        assert_eq!(narrowed.sample_type(), SampleType::U8);
        assert_eq!(narrowed.get(0, 0, 0), 255.0);
    }

    #[test]
    fn test_with_alpha_band() {
        let mut tile = RasterTile::filled(2, 1, SampleType::U8, &[10.0, 20.0, 30.0]);
        tile.set_coverage(
            Some(DataRect {
                x: 0,
                y: 0,
                width: 1,
                height: 1,
            }),
            None,
        );
        let with_alpha = tile.with_alpha_band();
        assert_eq!(with_alpha.bands(), 4);
        assert_eq!(with_alpha.get(0, 0, 3), 255.0);
        assert_eq!(with_alpha.get(1, 0, 3), 0.0);
        assert_eq!(with_alpha.get(0, 0, 1), 20.0);
    }

    #[test]
    fn test_to_rgba_uses_palette() {
        let mut tile = RasterTile::filled(1, 1, SampleType::U8, &[1.0]);
        tile.set_palette(Some(Palette::new(vec![[0, 0, 0, 255], [10, 20, 30, 255]])));
        let image = tile.to_rgba_image().unwrap();
        assert_eq!(image.get_pixel(0, 0).0, [10, 20, 30, 255]);
    }

    #[test]
    fn test_to_rgba_rejects_wide_samples() {
        let tile = RasterTile::new(1, 1, 1, SampleType::I16);
        assert!(tile.to_rgba_image().is_err());
    }

    #[test]
    fn test_rgba_round_trip() {
        let image = RgbaImage::from_pixel(3, 2, image::Rgba([1, 2, 3, 4]));
        let tile = RasterTile::from_rgba_image(&image);
        assert_eq!(tile.pixel(2, 1), vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(tile.to_rgba_image().unwrap(), image);
    }
}
