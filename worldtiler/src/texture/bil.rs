//! Raw BIL elevation tiles.
//!
//! A BIL tile is `width * height` samples in row-major order, north row
//! first, with no header. Sample type, byte order and the nodata sentinel
//! travel out of band (run configuration and `tileset.json`).

use serde::{Deserialize, Serialize};

use crate::raster::{ByteOrder, DataRect, RasterTile, SampleType};

use super::{TextureError, TileCodec};

/// Sample layout of BIL tiles.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BilLayout {
    #[serde(with = "sample_type_name")]
    pub sample_type: SampleType,
    #[serde(with = "byte_order_name")]
    pub byte_order: ByteOrder,
    pub nodata: Option<f64>,
}

impl Default for BilLayout {
    fn default() -> Self {
        Self {
            sample_type: SampleType::I16,
            byte_order: ByteOrder::LittleEndian,
            nodata: None,
        }
    }
}

impl BilLayout {
    /// Byte length of a `width`×`height` tile.
    pub fn tile_size(&self, width: u32, height: u32) -> usize {
        width as usize * height as usize * self.sample_type.size()
    }
}

/// Reads and writes single-band BIL tiles of a fixed size.
#[derive(Debug, Clone)]
pub struct BilCodec {
    layout: BilLayout,
    width: u32,
    height: u32,
}

impl BilCodec {
    pub fn new(layout: BilLayout, width: u32, height: u32) -> Result<Self, TextureError> {
        if width == 0 || height == 0 {
            return Err(TextureError::InvalidDimensions {
                width,
                height,
                reason: "BIL tiles need a non-zero size".to_string(),
            });
        }
        Ok(Self {
            layout,
            width,
            height,
        })
    }

    pub fn layout_settings(&self) -> BilLayout {
        self.layout
    }
}

impl TileCodec for BilCodec {
    fn encode(&self, tile: &RasterTile) -> Result<Vec<u8>, TextureError> {
        if tile.bands() != 1 {
            return Err(TextureError::UnsupportedFormat(format!(
                "BIL holds one band, tile has {}",
                tile.bands()
            )));
        }
        let st = self.layout.sample_type;
        let size = st.size();
        let mut out = vec![0u8; self.layout.tile_size(tile.width(), tile.height())];
        for y in 0..tile.height() {
            for x in 0..tile.width() {
                let off = (y as usize * tile.width() as usize + x as usize) * size;
                st.write(tile.get(x, y, 0), &mut out[off..off + size], self.layout.byte_order);
            }
        }
        Ok(out)
    }

    fn decode(&self, data: &[u8]) -> Result<RasterTile, TextureError> {
        let expected = self.layout.tile_size(self.width, self.height);
        if data.len() != expected {
            return Err(TextureError::InvalidDimensions {
                width: self.width,
                height: self.height,
                reason: format!("expected {} bytes, found {}", expected, data.len()),
            });
        }
        let st = self.layout.sample_type;
        let mut tile = RasterTile::new(self.width, self.height, 1, st);
        for (i, chunk) in data.chunks_exact(st.size()).enumerate() {
            let x = i as u32 % self.width;
            let y = i as u32 / self.width;
            tile.set(x, y, 0, st.read(chunk, self.layout.byte_order));
        }
        tile.set_coverage(
            Some(DataRect {
                x: 0,
                y: 0,
                width: self.width,
                height: self.height,
            }),
            None,
        );
        Ok(tile)
    }

    fn nodata(&self) -> Option<Vec<f64>> {
        self.layout.nodata.map(|v| vec![v])
    }

    fn layout(&self) -> (usize, SampleType) {
        (1, self.layout.sample_type)
    }

    fn extension(&self) -> &str {
        "bil"
    }

    fn name(&self) -> &str {
        "BIL"
    }
}

mod sample_type_name {
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::raster::SampleType;

    pub fn serialize<S: Serializer>(value: &SampleType, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<SampleType, D::Error> {
        let name = String::deserialize(d)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}

mod byte_order_name {
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::raster::ByteOrder;

    pub fn serialize<S: Serializer>(value: &ByteOrder, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<ByteOrder, D::Error> {
        let name = String::deserialize(d)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}
