//! Raster sources and tile sampling.
//!
//! ```text
//! ┌──────────────┐  open() per worker  ┌─────────────────┐
//! │DatasetOpener │ ──────────────────▶ │ RasterDataset   │
//! └──────────────┘                     │ (GeoTIFF / mem) │
//!                                      └────────┬────────┘
//!                                               │ sample(sector, size)
//!                                               ▼
//!                  projected? ──yes──▶ warp into geographic MemoryDataset
//!                                               │
//!                                               ▼
//!                                      ┌─────────────────┐
//!                                      │   RasterTile    │ data rect + outside fill
//!                                      └─────────────────┘
//! ```

mod dataset;
mod geotiff;
mod reproject;
mod sampler;
mod types;

pub use dataset::{
    Crs, DatasetOpener, GeoTiffOpener, GeoTransform, MemoryDataset, MemoryOpener, RasterDataset,
};
pub use geotiff::GeoTiffDataset;
pub use reproject::{dataset_bounds, CrsTransformer};
pub use sampler::{RasterSampler, SampleRequest};
pub use types::{ByteOrder, DataRect, Palette, RasterTile, SampleType};

use std::fmt;
use std::path::PathBuf;

/// Errors from reading, reprojecting or sampling rasters.
#[derive(Debug, Clone, PartialEq)]
pub enum RasterError {
    /// Bad request: zero bands, band out of range, bad window.
    InvalidArgument(String),
    /// Source layout the sampler does not handle, e.g. mixed band types.
    UnsupportedRaster(String),
    /// The source could not be read or decoded.
    Read { path: PathBuf, reason: String },
    /// Coordinate transformation failed.
    Reprojection(String),
}

impl fmt::Display for RasterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RasterError::InvalidArgument(msg) => write!(f, "Invalid raster request: {}", msg),
            RasterError::UnsupportedRaster(msg) => write!(f, "Unsupported raster: {}", msg),
            RasterError::Read { path, reason } => {
                write!(f, "Failed to read {}: {}", path.display(), reason)
            }
            RasterError::Reprojection(msg) => write!(f, "Reprojection failed: {}", msg),
        }
    }
}

impl std::error::Error for RasterError {}

impl RasterError {
    /// True for errors caused by the caller's request rather than the source.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(
            self,
            RasterError::InvalidArgument(_) | RasterError::UnsupportedRaster(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raster_error_display() {
        let err = RasterError::Read {
            path: PathBuf::from("/data/dem.tif"),
            reason: "truncated strip".to_string(),
        };
        assert_eq!(err.to_string(), "Failed to read /data/dem.tif: truncated strip");
        assert_eq!(
            RasterError::UnsupportedRaster("bands have mixed data types".to_string()).to_string(),
            "Unsupported raster: bands have mixed data types"
        );
    }

    #[test]
    fn test_invalid_argument_kinds() {
        assert!(RasterError::InvalidArgument("x".into()).is_invalid_argument());
        assert!(RasterError::UnsupportedRaster("x".into()).is_invalid_argument());
        assert!(!RasterError::Reprojection("x".into()).is_invalid_argument());
    }
}
