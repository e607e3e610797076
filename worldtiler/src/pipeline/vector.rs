//! Vector runs: clip a shapefile at each requested level.

use tracing::info;

use crate::config::RunConfig;
use crate::coord::Sector;
use crate::error::{TilerError, TilerResult};
use crate::vector::{ShapefileSource, VectorSummary, VectorTiler, ARCHIVE_EXTENSION};

use super::manifest::{TilesetKind, TilesetManifest};
use super::{output_directory, source_path, vector_error, RunContext};

/// Clips the configured shapefile into per-tile archives.
pub struct VectorPipeline {
    config: RunConfig,
    context: RunContext,
}

impl VectorPipeline {
    pub fn new(config: RunConfig) -> Self {
        Self {
            config,
            context: RunContext::default(),
        }
    }

    pub fn with_context(mut self, context: RunContext) -> Self {
        self.context = context;
        self
    }

    /// Levels to clip: `pyramid.levels`, or `pyramid.level` when empty.
    pub fn levels(&self) -> Vec<u32> {
        let mut levels = if self.config.pyramid.levels.is_empty() {
            vec![self.config.pyramid.level]
        } else {
            self.config.pyramid.levels.clone()
        };
        levels.sort_unstable();
        levels.dedup();
        levels
    }

    pub fn run(&self) -> TilerResult<VectorSummary> {
        let root = output_directory(&self.config)?;
        let path = source_path(&self.config)?;
        let grid = self.config.grid()?;
        let levels = self.levels();
        if levels.is_empty() {
            return Err(TilerError::InvalidArgument("no levels requested".to_string()));
        }

        let source = ShapefileSource::open(&path).map_err(vector_error)?;
        info!(
            source = %path.display(),
            features = source.features().len(),
            levels = ?levels,
            "Starting vector run"
        );

        let summary = VectorTiler::new(grid, &root)
            .with_cancellation(self.context.cancel.clone())
            .with_progress(self.context.progress.clone())
            .run(&source, &levels)
            .map_err(vector_error)?;

        let mut manifest = TilesetManifest::new(
            TilesetKind::Vector,
            ARCHIVE_EXTENSION,
            levels,
            grid.level_zero_tile_size(),
        )
        .with_tiles(summary.levels.clone());
        if let Some(bounds) = source
            .features()
            .iter()
            .filter_map(|f| f.bounds())
            .reduce(|a, b| Sector {
                min_lat: a.min_lat.min(b.min_lat),
                min_lon: a.min_lon.min(b.min_lon),
                max_lat: a.max_lat.max(b.max_lat),
                max_lon: a.max_lon.max(b.max_lon),
            })
        {
            manifest = manifest.with_bounds(&bounds);
        }
        manifest.write(&root)?;

        Ok(summary)
    }
}
