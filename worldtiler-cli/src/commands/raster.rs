//! Raster command - sample a raster and build its overviews.

use std::path::{Path, PathBuf};

use clap::Args;
use worldtiler::pipeline::RasterPipeline;
use worldtiler::raster::Crs;
use worldtiler::texture::TileFormat;
use worldtiler::RunConfig;

use super::common::{coarsest_first, print_levels};
use crate::error::CliError;
use crate::runner::CliRunner;

/// Arguments for the raster command.
#[derive(Debug, Args)]
pub struct RasterArgs {
    /// GeoTIFF to tile
    #[arg(long)]
    pub source: Option<PathBuf>,

    /// Pyramid root directory
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Finest level to sample
    #[arg(long)]
    pub level: Option<u32>,

    /// Tile format: jpg, png, dds, bmp, gif or bil
    #[arg(long)]
    pub format: Option<TileFormat>,

    /// Worker threads
    #[arg(long)]
    pub threads: Option<usize>,

    /// Write a single source band (zero-based)
    #[arg(long)]
    pub band: Option<usize>,

    /// Add an alpha band marking nodata as transparent
    #[arg(long)]
    pub alpha: bool,

    /// Source nodata value, overriding the file's own
    #[arg(long)]
    pub nodata: Option<f64>,

    /// Source projection (EPSG:<code> or a proj string)
    #[arg(long)]
    pub source_proj: Option<Crs>,

    /// Level-zero tile size in degrees
    #[arg(long)]
    pub lzts: Option<f64>,

    /// Tile width and height in pixels
    #[arg(long)]
    pub tile_size: Option<u32>,
}

impl RasterArgs {
    /// Applies flags on top of the loaded configuration.
    pub fn apply(&self, config: &mut RunConfig) {
        if let Some(source) = &self.source {
            config.source.path = Some(source.clone());
        }
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
        if self.band.is_some() {
            config.raster.band = self.band;
        }
        if self.alpha {
            config.raster.alpha = true;
        }
        if self.nodata.is_some() {
            config.raster.nodata = self.nodata;
        }
        if let Some(crs) = &self.source_proj {
            config.raster.source_proj = Some(crs.clone());
        }
        if let Some(lzts) = self.lzts {
            config.pyramid.level_zero_tile_size = lzts;
        }
        if let Some(size) = self.tile_size {
            config.raster.tile_width = size;
            config.raster.tile_height = size;
        }
    }
}

/// Run the raster command.
pub fn run(config_path: Option<&Path>, verbose: bool, args: RasterArgs) -> Result<(), CliError> {
    let mut runner = CliRunner::new(config_path, verbose)?;
    runner.log_startup("raster");
    args.apply(runner.config_mut());
    let config = runner.finish_config()?;

    println!(
        "Tiling {} into level {} ({})",
        display(&config.source.path),
        config.pyramid.level,
        config.tile_format()
    );
    let summary = RasterPipeline::new(config)?
        .with_context(runner.context())
        .run()?;

    let mut levels = vec![summary.sampled];
    levels.extend(summary.overviews.levels);
    print_levels("Raster Summary", &coarsest_first(levels));
    Ok(())
}

fn display(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "(no source)".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> RasterArgs {
        RasterArgs {
            source: Some(PathBuf::from("dem.tif")),
            output: None,
            level: Some(6),
            format: Some(TileFormat::Bil),
            threads: None,
            band: Some(0),
            alpha: false,
            nodata: Some(-32768.0),
            source_proj: None,
            lzts: None,
            tile_size: Some(150),
        }
    }

    #[test]
    fn test_flags_override_config() {
        let mut config = RunConfig::default();
        config.output.directory = Some(PathBuf::from("from-ini"));
        config.processing.threads = 3;
        args().apply(&mut config);

        assert_eq!(config.source.path, Some(PathBuf::from("dem.tif")));
        assert_eq!(config.output.directory, Some(PathBuf::from("from-ini")));
        assert_eq!(config.pyramid.level, 6);
        assert_eq!(config.output.format, TileFormat::Bil);
        assert_eq!(config.processing.threads, 3);
        assert_eq!(config.raster.band, Some(0));
        assert_eq!(config.raster.nodata, Some(-32768.0));
        assert_eq!(config.raster.tile_width, 150);
        assert_eq!(config.raster.tile_height, 150);
    }
}
