//! Overview command - rebuild coarser levels of an existing pyramid.

use std::path::{Path, PathBuf};

use clap::Args;
use worldtiler::pipeline::OverviewPipeline;
use worldtiler::texture::TileFormat;
use worldtiler::RunConfig;

use super::common::{coarsest_first, print_levels};
use crate::error::CliError;
use crate::runner::CliRunner;

/// Arguments for the overview command.
#[derive(Debug, Args)]
pub struct OverviewArgs {
    /// Pyramid root directory
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Existing level to build from
    #[arg(long)]
    pub level: Option<u32>,

    /// Tile format of the existing level
    #[arg(long)]
    pub format: Option<TileFormat>,

    /// Worker threads
    #[arg(long)]
    pub threads: Option<usize>,

    /// Tile width and height in pixels
    #[arg(long)]
    pub tile_size: Option<u32>,

    /// Level-zero tile size in degrees
    #[arg(long)]
    pub lzts: Option<f64>,
}

impl OverviewArgs {
    pub fn apply(&self, config: &mut RunConfig) {
        if let Some(output) = &self.output {
            config.output.directory = Some(output.clone());
        }
        if let Some(level) = self.level {
            config.pyramid.level = level;
        }
        if let Some(format) = self.format {
            config.output.format = format;
        }
        if let Some(threads) = self.threads {
            config.processing.threads = threads;
        }
        if let Some(size) = self.tile_size {
            config.raster.tile_width = size;
            config.raster.tile_height = size;
        }
        if let Some(lzts) = self.lzts {
            config.pyramid.level_zero_tile_size = lzts;
        }
    }
}

/// Run the overview command.
pub fn run(config_path: Option<&Path>, verbose: bool, args: OverviewArgs) -> Result<(), CliError> {
    let mut runner = CliRunner::new(config_path, verbose)?;
    runner.log_startup("overview");
    args.apply(runner.config_mut());
    let config = runner.finish_config()?;

    println!(
        "Building levels {}..0 from level {}",
        config.pyramid.level.saturating_sub(1),
        config.pyramid.level
    );
    let summary = OverviewPipeline::new(config)
        .with_context(runner.context())
        .run()?;

    print_levels("Overview Summary", &coarsest_first(summary.levels));
    Ok(())
}
