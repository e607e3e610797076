//! Vector clipping: shapefile features split into per-tile archives.
//!
//! # Pipeline
//!
//! ```text
//! ShapefileSource ──► ShapeClipper ──► reconstruct ──► ShapefileTile ──► ArchiveWriter
//!   (features,        (arena of        (orphan join,    (per-address      ({row}_{col}.tgz)
//!    normalised        fragments per    stitching,       accumulator)
//!    rings)            tile and part)   holes, fill)
//! ```
//!
//! Coordinates are longitude/latitude degrees. A vertex on a tile edge
//! belongs to the tile whose minimum edge it lies on, matching
//! [`TileGrid::tile_x`](crate::coord::TileGrid::tile_x).
//!
//! Degenerate geometry in one tile is reported and skipped; a source that
//! cannot be read stops the run.

mod clipper;
mod edge;
mod fill;
mod geometry;
mod reconstruct;
mod record;
mod source;
mod stitch;
mod tile;
mod tiler;
mod traverse;
mod writer;

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::coord::TileAddress;

pub use clipper::{FeatureClip, ShapeClipper};
pub use edge::{clip_segment, Crossing, Edge};
pub use fill::interior_tiles;
pub use geometry::{Attributes, Coord, Feature, Ring, RingRole, ShapeKind};
pub use reconstruct::{reconstruct, FeatureTiles};
pub use record::{FragmentArena, TileRecord};
pub use source::{ShapefileSource, SourceKind};
pub use stitch::{join_orphans, stitch_boundary};
pub use tile::{ShapefileTile, TileFeature};
pub use tiler::{VectorSummary, VectorTiler};
pub use traverse::tiles_between;
pub use writer::{ArchiveWriter, ARCHIVE_EXTENSION, WGS84_PRJ};

/// Errors raised while clipping or writing vector tiles.
#[derive(Debug, Error)]
pub enum VectorError {
    /// The shapefile or its attribute table could not be read.
    #[error("Failed to read vector source {path}: {reason}")]
    Source { path: PathBuf, reason: String },

    /// The source is not in geographic coordinates.
    #[error("Vector source {path} is not geographic: {reason}")]
    Projection { path: PathBuf, reason: String },

    /// A feature could not be clipped or stitched in one tile.
    #[error("Degenerate geometry for shape {shape_id} in tile {tile}: {reason}")]
    DegenerateGeometry {
        shape_id: usize,
        tile: TileAddress,
        reason: String,
    },

    /// A tile archive could not be assembled.
    #[error("Failed to write vector tile {tile}: {reason}")]
    Write { tile: TileAddress, reason: String },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Vector tiling cancelled")]
    Cancelled,
}

impl VectorError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        VectorError::Io {
            path: path.into(),
            source,
        }
    }

    /// True for errors that stop the run rather than one tile.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            VectorError::Source { .. }
                | VectorError::Projection { .. }
                | VectorError::Io { .. }
                | VectorError::Cancelled
        )
    }
}
