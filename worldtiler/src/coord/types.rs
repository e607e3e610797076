//! Value types for tile addressing: sectors, tile addresses and their errors.

use std::fmt;

/// Southern limit of the grid in degrees.
pub const MIN_LAT: f64 = -90.0;
/// Northern limit of the grid in degrees.
pub const MAX_LAT: f64 = 90.0;
/// Western limit of the grid in degrees.
pub const MIN_LON: f64 = -180.0;
/// Eastern limit of the grid in degrees.
pub const MAX_LON: f64 = 180.0;

/// Errors raised by grid and sector construction.
#[derive(Debug, Clone, PartialEq)]
pub enum CoordError {
    /// Sector minimum exceeds its maximum on some axis.
    InvertedSector {
        min_lat: f64,
        min_lon: f64,
        max_lat: f64,
        max_lon: f64,
    },
    /// A coordinate was NaN or infinite.
    NonFinite(f64),
    /// Level-zero tile size must be positive and no larger than 180 degrees.
    InvalidTileSize(f64),
    /// Tile name did not match `{row}_{col}.{ext}`.
    InvalidTileName(String),
}

impl fmt::Display for CoordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoordError::InvertedSector {
                min_lat,
                min_lon,
                max_lat,
                max_lon,
            } => write!(
                f,
                "Invalid sector: min ({}, {}) exceeds max ({}, {})",
                min_lat, min_lon, max_lat, max_lon
            ),
            CoordError::NonFinite(v) => write!(f, "Coordinate is not finite: {}", v),
            CoordError::InvalidTileSize(v) => {
                write!(f, "Invalid level-zero tile size: {} degrees", v)
            }
            CoordError::InvalidTileName(name) => write!(f, "Invalid tile name: {}", name),
        }
    }
}

impl std::error::Error for CoordError {}

/// Axis-aligned geographic bounding box in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sector {
    pub min_lat: f64,
    pub min_lon: f64,
    pub max_lat: f64,
    pub max_lon: f64,
}

impl Sector {
    /// Creates a sector, rejecting inverted or non-finite bounds.
    pub fn new(min_lat: f64, min_lon: f64, max_lat: f64, max_lon: f64) -> Result<Self, CoordError> {
        for v in [min_lat, min_lon, max_lat, max_lon] {
            if !v.is_finite() {
                return Err(CoordError::NonFinite(v));
            }
        }
        if min_lat > max_lat || min_lon > max_lon {
            return Err(CoordError::InvertedSector {
                min_lat,
                min_lon,
                max_lat,
                max_lon,
            });
        }
        Ok(Self {
            min_lat,
            min_lon,
            max_lat,
            max_lon,
        })
    }

    /// The whole globe.
    pub fn full_globe() -> Self {
        Self {
            min_lat: MIN_LAT,
            min_lon: MIN_LON,
            max_lat: MAX_LAT,
            max_lon: MAX_LON,
        }
    }

    pub fn delta_lat(&self) -> f64 {
        self.max_lat - self.min_lat
    }

    pub fn delta_lon(&self) -> f64 {
        self.max_lon - self.min_lon
    }

    /// Center as `(lat, lon)`.
    pub fn center(&self) -> (f64, f64) {
        (
            (self.min_lat + self.max_lat) * 0.5,
            (self.min_lon + self.max_lon) * 0.5,
        )
    }

    /// Inclusive containment test.
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        lat >= self.min_lat && lat <= self.max_lat && lon >= self.min_lon && lon <= self.max_lon
    }

    /// Overlap of two sectors, `None` when they only touch or are disjoint.
    pub fn intersection(&self, other: &Sector) -> Option<Sector> {
        let min_lat = self.min_lat.max(other.min_lat);
        let min_lon = self.min_lon.max(other.min_lon);
        let max_lat = self.max_lat.min(other.max_lat);
        let max_lon = self.max_lon.min(other.max_lon);
        if min_lat < max_lat && min_lon < max_lon {
            Some(Sector {
                min_lat,
                min_lon,
                max_lat,
                max_lon,
            })
        } else {
            None
        }
    }

    /// Corners in clockwise order starting north-east, as `(lat, lon)`.
    pub fn corners(&self) -> [(f64, f64); 4] {
        [
            (self.max_lat, self.max_lon),
            (self.min_lat, self.max_lon),
            (self.min_lat, self.min_lon),
            (self.max_lat, self.min_lon),
        ]
    }
}

impl fmt::Display for Sector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:.6}, {:.6}] -> [{:.6}, {:.6}]",
            self.min_lat, self.min_lon, self.max_lat, self.max_lon
        )
    }
}

/// Tile address in the pyramid.
///
/// Rows grow northward from -90 and columns grow eastward from -180.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileAddress {
    pub level: u32,
    pub row: u32,
    pub col: u32,
}

impl TileAddress {
    pub fn new(level: u32, row: u32, col: u32) -> Self {
        Self { level, row, col }
    }

    /// The tile one level coarser that covers this one, `None` at level 0.
    pub fn parent(&self) -> Option<TileAddress> {
        if self.level == 0 {
            return None;
        }
        Some(TileAddress::new(self.level - 1, self.row / 2, self.col / 2))
    }

    /// The four children one level finer, ordered
    /// south-west, south-east, north-west, north-east.
    pub fn children(&self) -> [TileAddress; 4] {
        let level = self.level + 1;
        let (r, c) = (self.row * 2, self.col * 2);
        [
            TileAddress::new(level, r, c),
            TileAddress::new(level, r, c + 1),
            TileAddress::new(level, r + 1, c),
            TileAddress::new(level, r + 1, c + 1),
        ]
    }
}

impl fmt::Display for TileAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{:04}/{:04}", self.level, self.row, self.col)
    }
}
