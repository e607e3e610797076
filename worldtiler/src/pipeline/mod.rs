//! Run orchestration.
//!
//! Each run type ties the building blocks together for one invocation:
//!
//! | Run                  | Input                | Output                          |
//! |----------------------|----------------------|---------------------------------|
//! | [`RasterPipeline`]   | GeoTIFF (or opener)  | level N tiles, then N-1..0      |
//! | [`OverviewPipeline`] | existing level N     | levels N-1..0                   |
//! | [`VectorPipeline`]   | shapefile            | one `.tgz` per tile and level   |
//!
//! All runs share a [`RunContext`] carrying the cancellation token and the
//! progress reporter, and finish by writing `tileset.json` at the output
//! root.

mod manifest;
mod overview;
mod raster;
mod vector;

use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::RunConfig;
use crate::error::{TilerError, TilerResult};
use crate::overview::OverviewError;
use crate::progress::{NoProgress, SharedProgress};
use crate::vector::VectorError;

pub use manifest::{TilesetKind, TilesetManifest, MANIFEST_FILE};
pub use overview::OverviewPipeline;
pub use raster::{RasterPipeline, RasterSummary};
pub use vector::VectorPipeline;

/// Cancellation and progress shared by every stage of a run.
#[derive(Clone)]
pub struct RunContext {
    pub cancel: CancellationToken,
    pub progress: SharedProgress,
}

impl Default for RunContext {
    fn default() -> Self {
        Self {
            cancel: CancellationToken::new(),
            progress: Arc::new(NoProgress),
        }
    }
}

impl RunContext {
    pub fn new(cancel: CancellationToken, progress: SharedProgress) -> Self {
        Self { cancel, progress }
    }
}

impl std::fmt::Debug for RunContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunContext")
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

fn output_directory(config: &RunConfig) -> TilerResult<PathBuf> {
    config
        .output
        .directory
        .clone()
        .ok_or_else(|| TilerError::InvalidArgument("no output directory configured".to_string()))
}

fn source_path(config: &RunConfig) -> TilerResult<PathBuf> {
    config
        .source
        .path
        .clone()
        .ok_or_else(|| TilerError::InvalidArgument("no source path configured".to_string()))
}

/// Stage cancellation becomes [`TilerError::Cancelled`].
fn overview_error(err: OverviewError) -> TilerError {
    match err {
        OverviewError::Cancelled => TilerError::Cancelled,
        other => TilerError::Overview(other),
    }
}

fn vector_error(err: VectorError) -> TilerError {
    match err {
        VectorError::Cancelled => TilerError::Cancelled,
        other => TilerError::Vector(other),
    }
}
