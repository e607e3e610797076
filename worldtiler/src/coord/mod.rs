//! Tile grid addressing.
//!
//! The pyramid uses a plain equirectangular grid anchored at (-90, -180).
//! Level 0 tiles span `lzts` degrees on both axes; every level halves the span.
//!
//! ```text
//!   +90 ┌────┬────┬────┬────┐
//!       │ 1,0│ 1,1│ 1,2│ 1,3│   row grows north
//!     0 ├────┼────┼────┼────┤
//!       │ 0,0│ 0,1│ 0,2│ 0,3│   col grows east
//!   -90 └────┴────┴────┴────┘
//!     -180                  +180
//! ```
//!
//! A coordinate lying on a shared edge belongs to the tile whose minimum edge
//! it is. Coordinates at or beyond +90/+180 clamp to the last row/column.

mod naming;
mod types;

pub use naming::{parse_tile_name, tile_path, tile_relative_path};
pub use types::{CoordError, Sector, TileAddress, MAX_LAT, MAX_LON, MIN_LAT, MIN_LON};

/// Level-zero tile size used when none is configured.
pub const DEFAULT_LEVEL_ZERO_TILE_SIZE: f64 = 36.0;

/// Grid geometry for one pyramid, parameterized by the level-zero tile size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileGrid {
    lzts: f64,
}

impl Default for TileGrid {
    fn default() -> Self {
        Self {
            lzts: DEFAULT_LEVEL_ZERO_TILE_SIZE,
        }
    }
}

impl TileGrid {
    /// Creates a grid with the given level-zero tile size in degrees.
    pub fn new(level_zero_tile_size: f64) -> Result<Self, CoordError> {
        if !level_zero_tile_size.is_finite()
            || level_zero_tile_size <= 0.0
            || level_zero_tile_size > 180.0
        {
            return Err(CoordError::InvalidTileSize(level_zero_tile_size));
        }
        Ok(Self {
            lzts: level_zero_tile_size,
        })
    }

    pub fn level_zero_tile_size(&self) -> f64 {
        self.lzts
    }

    /// Tile span in degrees at `level`.
    #[inline]
    pub fn span(&self, level: u32) -> f64 {
        self.lzts * 0.5_f64.powi(level as i32)
    }

    /// Number of tile rows at `level`.
    pub fn row_count(&self, level: u32) -> u32 {
        (180.0 / self.span(level)).ceil() as u32
    }

    /// Number of tile columns at `level`.
    pub fn col_count(&self, level: u32) -> u32 {
        (360.0 / self.span(level)).ceil() as u32
    }

    /// Column containing `lon`, clamped to the grid.
    #[inline]
    pub fn tile_x(&self, lon: f64, level: u32) -> u32 {
        clamp_index(self.grid_x(lon, level).floor(), self.col_count(level))
    }

    /// Row containing `lat`, clamped to the grid.
    #[inline]
    pub fn tile_y(&self, lat: f64, level: u32) -> u32 {
        clamp_index(self.grid_y(lat, level).floor(), self.row_count(level))
    }

    /// Fractional column coordinate, unclamped.
    #[inline]
    pub fn grid_x(&self, lon: f64, level: u32) -> f64 {
        (lon - MIN_LON) / self.span(level)
    }

    /// Fractional row coordinate, unclamped.
    #[inline]
    pub fn grid_y(&self, lat: f64, level: u32) -> f64 {
        (lat - MIN_LAT) / self.span(level)
    }

    /// Address of the tile containing `(lat, lon)`.
    pub fn address_of(&self, lat: f64, lon: f64, level: u32) -> TileAddress {
        TileAddress::new(level, self.tile_y(lat, level), self.tile_x(lon, level))
    }

    /// Bounding box of a tile. Maximum edges clamp to +90/+180 when the
    /// level-zero size does not divide the globe evenly.
    pub fn sector_for(&self, level: u32, row: u32, col: u32) -> Sector {
        let span = self.span(level);
        let min_lat = MIN_LAT + row as f64 * span;
        let min_lon = MIN_LON + col as f64 * span;
        Sector {
            min_lat,
            min_lon,
            max_lat: (min_lat + span).min(MAX_LAT),
            max_lon: (min_lon + span).min(MAX_LON),
        }
    }

    /// Bounding box of a tile address.
    pub fn sector_of(&self, tile: &TileAddress) -> Sector {
        self.sector_for(tile.level, tile.row, tile.col)
    }

    /// Inclusive range of tiles at `level` overlapping `sector`.
    ///
    /// A maximum edge that falls exactly on a tile boundary does not pull in
    /// the tile beyond it.
    pub fn tiles_in_sector(&self, sector: &Sector, level: u32) -> TileRange {
        let min_row = self.tile_y(sector.min_lat, level);
        let min_col = self.tile_x(sector.min_lon, level);
        let max_row = clamp_index(self.grid_y(sector.max_lat, level).ceil() - 1.0, self.row_count(level))
            .max(min_row);
        let max_col = clamp_index(self.grid_x(sector.max_lon, level).ceil() - 1.0, self.col_count(level))
            .max(min_col);
        TileRange {
            level,
            min_row,
            max_row,
            min_col,
            max_col,
        }
    }
}

#[inline]
fn clamp_index(value: f64, count: u32) -> u32 {
    if value.is_nan() || value <= 0.0 {
        0
    } else {
        (value as u32).min(count.saturating_sub(1))
    }
}

/// Inclusive rectangle of tile addresses at one level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRange {
    pub level: u32,
    pub min_row: u32,
    pub max_row: u32,
    pub min_col: u32,
    pub max_col: u32,
}

impl TileRange {
    pub fn len(&self) -> usize {
        ((self.max_row - self.min_row + 1) as usize) * ((self.max_col - self.min_col + 1) as usize)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, tile: &TileAddress) -> bool {
        tile.level == self.level
            && (self.min_row..=self.max_row).contains(&tile.row)
            && (self.min_col..=self.max_col).contains(&tile.col)
    }

    /// Addresses in row-major order, south to north.
    pub fn iter(&self) -> impl Iterator<Item = TileAddress> + '_ {
        (self.min_row..=self.max_row).flat_map(move |row| {
            (self.min_col..=self.max_col).map(move |col| TileAddress::new(self.level, row, col))
        })
    }
}
