//! Crate-level error type.
//!
//! Each module reports its own error enum; [`TilerError`] groups them by the
//! kinds a run reacts to: invalid input, unreadable source data, degenerate
//! geometry, I/O, configuration and cancellation.

use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigFileError;
use crate::coord::{CoordError, TileAddress};
use crate::overview::OverviewError;
use crate::raster::RasterError;
use crate::texture::TextureError;
use crate::vector::VectorError;

/// Result alias used by the pipeline entry points.
pub type TilerResult<T> = Result<T, TilerError>;

/// Top-level error for tiling runs.
#[derive(Debug, Error)]
pub enum TilerError {
    /// Caller supplied something the engine cannot work with.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Source data could not be read or reprojected.
    #[error("Source read failed for {path}: {reason}")]
    SourceRead { path: PathBuf, reason: String },

    /// Geometry could not be clipped or stitched in one tile.
    #[error("Degenerate geometry for shape {shape_id} in tile {tile}: {reason}")]
    DegenerateGeometry {
        shape_id: usize,
        tile: TileAddress,
        reason: String,
    },

    /// Filesystem failure.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Config(#[from] ConfigFileError),

    #[error(transparent)]
    Raster(#[from] RasterError),

    #[error(transparent)]
    Texture(#[from] TextureError),

    #[error(transparent)]
    Overview(#[from] OverviewError),

    #[error(transparent)]
    Vector(#[from] VectorError),

    /// The run was cancelled before it finished.
    #[error("Run cancelled")]
    Cancelled,
}

impl From<CoordError> for TilerError {
    fn from(err: CoordError) -> Self {
        TilerError::InvalidArgument(err.to_string())
    }
}

impl TilerError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TilerError::Io {
            path: path.into(),
            source,
        }
    }

    /// True for errors that should stop the whole run rather than one tile.
    pub fn is_fatal(&self) -> bool {
        match self {
            TilerError::Cancelled | TilerError::Config(_) | TilerError::Io { .. } => true,
            TilerError::Vector(e) => e.is_fatal(),
            _ => false,
        }
    }
}
