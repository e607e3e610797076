//! WorldTiler - geographic tile pyramids from rasters and shapefiles
//!
//! This library cuts a georeferenced raster or a shapefile into the regular
//! level/row/column tile grid used by World Wind style clients:
//!
//! - [`pipeline::RasterPipeline`] samples a raster into the finest level and
//!   builds every coarser level from it.
//! - [`pipeline::OverviewPipeline`] rebuilds the coarser levels of an
//!   existing pyramid.
//! - [`pipeline::VectorPipeline`] clips a shapefile into one small shapefile
//!   archive per tile.
//!
//! # Example
//!
//! ```no_run
//! use worldtiler::config::RunConfig;
//! use worldtiler::pipeline::RasterPipeline;
//!
//! let mut config = RunConfig::default();
//! config.source.path = Some("dem.tif".into());
//! config.output.directory = Some("tiles".into());
//! config.pyramid.level = 5;
//!
//! let summary = RasterPipeline::new(config).unwrap().run().unwrap();
//! println!("{} tiles written", summary.sampled.counts.written);
//! ```

pub mod config;
pub mod coord;
pub mod dds;
pub mod error;
pub mod logging;
pub mod output;
pub mod overview;
pub mod pipeline;
pub mod progress;
pub mod raster;
pub mod texture;
pub mod vector;

pub use config::RunConfig;
pub use coord::{Sector, TileAddress, TileGrid};
pub use error::{TilerError, TilerResult};
pub use pipeline::{OverviewPipeline, RasterPipeline, VectorPipeline};

/// Name and version written into every tileset manifest.
pub fn generator() -> String {
    format!("worldtiler {}", env!("CARGO_PKG_VERSION"))
}
