//! `tileset.json`: what a pyramid holds and how it was built.

use std::fs;
use std::path::Path;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::coord::Sector;
use crate::error::{TilerError, TilerResult};
use crate::output::write_atomic;
use crate::progress::LevelSummary;
use crate::texture::BilLayout;

/// File name of the manifest at the output root.
pub const MANIFEST_FILE: &str = "tileset.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TilesetKind {
    Raster,
    Vector,
}

/// Pyramid description written after every run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TilesetManifest {
    pub kind: TilesetKind,
    /// Tile file extension.
    pub format: String,
    pub levels: Vec<u32>,
    pub level_zero_tile_size: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tile_width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tile_height: Option<u32>,
    /// `[min_lat, min_lon, max_lat, max_lon]` of the source data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounds: Option<[f64; 4]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nodata: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bil: Option<BilLayout>,
    pub tiles: Vec<LevelSummary>,
    /// RFC 3339 timestamp.
    pub generated_at: String,
    pub generator: String,
}

impl TilesetManifest {
    pub fn new(kind: TilesetKind, format: impl Into<String>, levels: Vec<u32>, level_zero_tile_size: f64) -> Self {
        Self {
            kind,
            format: format.into(),
            levels,
            level_zero_tile_size,
            tile_width: None,
            tile_height: None,
            bounds: None,
            nodata: None,
            bil: None,
            tiles: Vec::new(),
            generated_at: Utc::now().to_rfc3339(),
            generator: format!("worldtiler {}", env!("CARGO_PKG_VERSION")),
        }
    }

    pub fn with_tile_size(mut self, width: u32, height: u32) -> Self {
        self.tile_width = Some(width);
        self.tile_height = Some(height);
        self
    }

    pub fn with_bounds(mut self, sector: &Sector) -> Self {
        self.bounds = Some([sector.min_lat, sector.min_lon, sector.max_lat, sector.max_lon]);
        self
    }

    pub fn with_nodata(mut self, nodata: Option<Vec<f64>>) -> Self {
        self.nodata = nodata;
        self
    }

    pub fn with_bil(mut self, bil: Option<BilLayout>) -> Self {
        self.bil = bil;
        self
    }

    pub fn with_tiles(mut self, tiles: Vec<LevelSummary>) -> Self {
        self.tiles = tiles;
        self
    }

    /// Writes the manifest into `root`.
    pub fn write(&self, root: &Path) -> TilerResult<()> {
        let json = serde_json::to_vec_pretty(self)
            .map_err(|e| TilerError::InvalidArgument(format!("manifest not serialisable: {}", e)))?;
        let path = root.join(MANIFEST_FILE);
        write_atomic(&path, &json).map_err(|e| TilerError::io(path, e))
    }

    /// Reads the manifest from `root`.
    pub fn read(root: &Path) -> TilerResult<Self> {
        let path = root.join(MANIFEST_FILE);
        let json = fs::read(&path).map_err(|e| TilerError::io(&path, e))?;
        serde_json::from_slice(&json).map_err(|e| TilerError::SourceRead {
            path,
            reason: e.to_string(),
        })
    }
}
