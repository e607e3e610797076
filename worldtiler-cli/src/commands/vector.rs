//! Vector command - clip a shapefile into per-tile archives.

use std::path::{Path, PathBuf};

use clap::Args;
use console::style;
use worldtiler::pipeline::VectorPipeline;
use worldtiler::RunConfig;

use super::common::{coarsest_first, print_levels};
use crate::error::CliError;
use crate::runner::CliRunner;

/// Arguments for the vector command.
#[derive(Debug, Args)]
pub struct VectorArgs {
    /// Shapefile (.shp) to clip
    #[arg(long)]
    pub source: Option<PathBuf>,

    /// Output root directory
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Levels to clip, e.g. 3,4,5
    #[arg(long, value_delimiter = ',')]
    pub levels: Vec<u32>,

    /// Level-zero tile size in degrees
    #[arg(long)]
    pub lzts: Option<f64>,
}

impl VectorArgs {
    pub fn apply(&self, config: &mut RunConfig) {
        if let Some(source) = &self.source {
            config.source.path = Some(source.clone());
        }
        if let Some(output) = &self.output {
            config.output.directory = Some(output.clone());
        }
        if !self.levels.is_empty() {
            config.pyramid.levels = self.levels.clone();
        }
        if let Some(lzts) = self.lzts {
            config.pyramid.level_zero_tile_size = lzts;
        }
    }
}

/// Run the vector command.
pub fn run(config_path: Option<&Path>, verbose: bool, args: VectorArgs) -> Result<(), CliError> {
    let mut runner = CliRunner::new(config_path, verbose)?;
    runner.log_startup("vector");
    args.apply(runner.config_mut());
    let config = runner.finish_config()?;

    let pipeline = VectorPipeline::new(config).with_context(runner.context());
    println!("Clipping levels {:?}", pipeline.levels());
    let summary = pipeline.run()?;

    print_levels("Vector Summary", &coarsest_first(summary.levels.clone()));
    if summary.degenerate > 0 {
        println!(
            "  {} feature/tile pairs dropped as degenerate (see log)",
            style(summary.degenerate).yellow()
        );
    }
    Ok(())
}
