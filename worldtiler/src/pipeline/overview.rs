//! Overview-only runs over an existing finest level.

use std::sync::Arc;

use tracing::info;

use crate::config::RunConfig;
use crate::error::{TilerError, TilerResult};
use crate::overview::{OverviewBuilder, OverviewSummary};
use crate::texture::{TileCodec, TileFormat};

use super::manifest::{TilesetKind, TilesetManifest};
use super::{output_directory, overview_error, RunContext};

/// Rebuilds levels N-1..0 from tiles already present at level N.
pub struct OverviewPipeline {
    config: RunConfig,
    context: RunContext,
}

impl OverviewPipeline {
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

    pub fn run(&self) -> TilerResult<OverviewSummary> {
        let config = &self.config;
        let root = output_directory(config)?;
        let level = config.pyramid.level;
        if level == 0 {
            return Err(TilerError::InvalidArgument(
                "level 0 has no coarser levels to build".to_string(),
            ));
        }
        let codec: Arc<dyn TileCodec> = Arc::from(config.codec_settings().build()?);
        info!(root = %root.display(), level, format = codec.name(), "Starting overview run");

        let summary = OverviewBuilder::new(
            &root,
            Arc::clone(&codec),
            config.raster.tile_width,
            config.raster.tile_height,
        )
        .with_threads(config.processing.threads)
        .with_cancellation(self.context.cancel.clone())
        .with_progress(Arc::clone(&self.context.progress))
        .build(level)
        .map_err(overview_error)?;

        TilesetManifest::new(
            TilesetKind::Raster,
            codec.extension(),
            (0..=level).collect(),
            config.pyramid.level_zero_tile_size,
        )
        .with_tile_size(config.raster.tile_width, config.raster.tile_height)
        .with_nodata(codec.nodata())
        .with_bil((config.output.format == TileFormat::Bil).then_some(config.bil))
        .with_tiles(summary.levels.clone())
        .write(&root)?;

        Ok(summary)
    }
}
