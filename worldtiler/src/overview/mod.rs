//! Overview (coarser level) generation.
//!
//! A parent tile at `(level, row, col)` is built from the four children at
//! `level + 1`:
//!
//! ```text
//!          parent (L, r, c)
//!   ┌──────────────┬──────────────┐
//!   │ (L+1, 2r+1,  │ (L+1, 2r+1,  │
//!   │       2c)    │       2c+1)  │
//!   ├──────────────┼──────────────┤
//!   │ (L+1, 2r,    │ (L+1, 2r,    │
//!   │       2c)    │       2c+1)  │
//!   └──────────────┴──────────────┘
//! ```
//!
//! Rows grow northwards, so the children with the higher row sit on top.

mod average;
mod builder;

use std::fmt;
use std::path::PathBuf;

pub use average::{average_mosaic, ChildMosaic};
pub use builder::{parent_candidates, OverviewBuilder, OverviewSummary};

use crate::coord::TileAddress;
use crate::texture::TextureError;

/// Errors that stop an overview tile or run.
#[derive(Debug)]
pub enum OverviewError {
    /// The worker pool could not be created.
    Pool(String),
    /// Reading the level directory or writing a tile failed.
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The averaged tile could not be encoded.
    Encode {
        tile: TileAddress,
        source: TextureError,
    },
    /// The run was cancelled.
    Cancelled,
}

impl fmt::Display for OverviewError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverviewError::Pool(msg) => write!(f, "Failed to start worker pool: {}", msg),
            OverviewError::Io { path, source } => {
                write!(f, "I/O error at {}: {}", path.display(), source)
            }
            OverviewError::Encode { tile, source } => {
                write!(f, "Failed to encode overview tile {}: {}", tile, source)
            }
            OverviewError::Cancelled => write!(f, "Overview build cancelled"),
        }
    }
}

impl std::error::Error for OverviewError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            OverviewError::Io { source, .. } => Some(source),
            OverviewError::Encode { source, .. } => Some(source),
            _ => None,
        }
    }
}
