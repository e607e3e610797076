//! Raster runs: sample the finest level from the source, then overviews.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rayon::prelude::*;
use rayon::ThreadPool;
use serde::Serialize;
use tracing::{debug, info, trace, warn};

use crate::config::RunConfig;
use crate::coord::{tile_path, Sector, TileAddress, TileGrid};
use crate::error::{TilerError, TilerResult};
use crate::output::write_atomic;
use crate::overview::{OverviewBuilder, OverviewSummary};
use crate::progress::{LevelSummary, TileCounters, TileOutcome};
use crate::raster::{
    dataset_bounds, DatasetOpener, GeoTiffOpener, RasterDataset, RasterError, RasterSampler,
    SampleRequest,
};
use crate::texture::{TileCodec, TileFormat};

use super::manifest::{TilesetKind, TilesetManifest};
use super::{output_directory, overview_error, source_path, RunContext};

/// What a raster run produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RasterSummary {
    /// Source extent in geographic coordinates.
    pub bounds: [f64; 4],
    /// Tiles sampled at the finest level.
    pub sampled: LevelSummary,
    pub overviews: OverviewSummary,
}

/// Samples level N from a raster source and builds levels N-1..0.
pub struct RasterPipeline {
    config: RunConfig,
    opener: Arc<dyn DatasetOpener>,
    context: RunContext,
}

impl RasterPipeline {
    /// Pipeline reading the GeoTIFF named in the configuration.
    pub fn new(config: RunConfig) -> TilerResult<Self> {
        let path = source_path(&config)?;
        let opener = GeoTiffOpener::new(path).with_crs_override(config.raster.source_proj.clone());
        Ok(Self::with_opener(config, Arc::new(opener)))
    }

    /// Pipeline reading through a caller-supplied opener.
    pub fn with_opener(config: RunConfig, opener: Arc<dyn DatasetOpener>) -> Self {
        Self {
            config,
            opener,
            context: RunContext::default(),
        }
    }

    pub fn with_context(mut self, context: RunContext) -> Self {
        self.context = context;
        self
    }

    pub fn run(&self) -> TilerResult<RasterSummary> {
        let config = &self.config;
        let root = output_directory(config)?;
        let grid = config.grid()?;
        let level = config.pyramid.level;
        let codec: Arc<dyn TileCodec> = Arc::from(config.codec_settings().build()?);

        let bounds = {
            let dataset = self.opener.open()?;
            self.check_source(dataset.as_ref())?;
            dataset_bounds(dataset.as_ref())?
        };
        info!(
            source = %self.opener.describe(),
            level,
            format = codec.name(),
            bounds = %bounds,
            "Starting raster run"
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.processing.threads.max(1))
            .thread_name(|i| format!("sampler-{}", i))
            .build()
            .map_err(|e| TilerError::InvalidArgument(format!("worker pool: {}", e)))?;

        let sampled = self.sample_level(&pool, &grid, &bounds, &root, &codec)?;

        let overviews = OverviewBuilder::new(
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

        let mut tiles = vec![sampled];
        tiles.extend(overviews.levels.iter().copied());
        TilesetManifest::new(TilesetKind::Raster, codec.extension(), (0..=level).collect(), grid.level_zero_tile_size())
            .with_tile_size(config.raster.tile_width, config.raster.tile_height)
            .with_bounds(&bounds)
            .with_nodata(codec.nodata())
            .with_bil((config.output.format == TileFormat::Bil).then_some(config.bil))
            .with_tiles(tiles)
            .write(&root)?;

        Ok(RasterSummary {
            bounds: [bounds.min_lat, bounds.min_lon, bounds.max_lat, bounds.max_lon],
            sampled,
            overviews,
        })
    }

    /// Rejects sources the configured output cannot represent.
    fn check_source(&self, dataset: &dyn RasterDataset) -> TilerResult<()> {
        let bands = dataset.band_count();
        if bands == 0 {
            return Err(TilerError::InvalidArgument("source has no bands".to_string()));
        }
        if self.config.output.format == TileFormat::Bil && bands > 1 && self.config.raster.band.is_none() {
            return Err(TilerError::InvalidArgument(format!(
                "BIL output needs one band, source has {}; select one with band",
                bands
            )));
        }
        Ok(())
    }

    /// Samples every tile of the finest level that overlaps `bounds`.
    fn sample_level(
        &self,
        pool: &ThreadPool,
        grid: &TileGrid,
        bounds: &Sector,
        root: &Path,
        codec: &Arc<dyn TileCodec>,
    ) -> TilerResult<LevelSummary> {
        let level = self.config.pyramid.level;
        let tiles: Vec<TileAddress> = grid.tiles_in_sector(bounds, level).iter().collect();
        debug!(level, tiles = tiles.len(), "Sampling level");

        let progress = &self.context.progress;
        let cancel = &self.context.cancel;
        progress.stage_started(&format!("Level {}", level), tiles.len() as u64);
        let counters = TileCounters::default();

        pool.install(|| {
            tiles.par_iter().for_each_init(
                || self.opener.open(),
                |dataset, tile| {
                    if cancel.is_cancelled() {
                        return;
                    }
                    let result = match dataset {
                        Ok(dataset) => self.sample_tile(dataset.as_mut(), grid, *tile, root, codec.as_ref()),
                        Err(e) => Err(TilerError::SourceRead {
                            path: PathBuf::from(self.opener.describe()),
                            reason: e.to_string(),
                        }),
                    };
                    let outcome = result.unwrap_or_else(|e| {
                        warn!(
                            level = tile.level,
                            row = tile.row,
                            col = tile.col,
                            error = %e,
                            "Raster tile failed"
                        );
                        TileOutcome::Failed
                    });
                    counters.record(outcome);
                    progress.tile_finished(outcome);
                },
            );
        });
        progress.stage_finished();

        if cancel.is_cancelled() {
            return Err(TilerError::Cancelled);
        }
        let counts = counters.snapshot();
        info!(
            level,
            written = counts.written,
            skipped = counts.skipped,
            failed = counts.failed,
            "Level sampled"
        );
        Ok(LevelSummary { level, counts })
    }

    /// Samples, encodes and writes one tile unless it already exists.
    fn sample_tile(
        &self,
        dataset: &mut dyn RasterDataset,
        grid: &TileGrid,
        tile: TileAddress,
        root: &Path,
        codec: &dyn TileCodec,
    ) -> TilerResult<TileOutcome> {
        let dest = tile_path(root, &tile, codec.extension());
        if dest.exists() {
            trace!(tile = %tile, "Tile exists, skipping");
            return Ok(TileOutcome::Skipped);
        }

        let raster = &self.config.raster;
        let request = SampleRequest::new(grid.sector_of(&tile), raster.tile_width, raster.tile_height)
            .with_band(raster.band)
            .with_alpha(raster.alpha)
            .with_nodata(raster.nodata);
        let mut sampled = RasterSampler::sample(dataset, &request).map_err(|e| source_error(&tile, e))?;
        if sampled.data_rect().is_none() {
            trace!(tile = %tile, "Tile has no source coverage");
            return Ok(TileOutcome::Skipped);
        }

        sampled.fill_outside(&self.outside_value(sampled.bands()))?;
        let (_, sample_type) = codec.layout();
        let bytes = codec.encode(&sampled.convert(sample_type))?;
        write_atomic(&dest, &bytes).map_err(|e| TilerError::io(&dest, e))?;
        trace!(tile = %tile, bytes = bytes.len(), "Wrote tile");
        Ok(TileOutcome::Written)
    }

    /// Per-band fill for pixels the source does not cover.
    fn outside_value(&self, bands: usize) -> Vec<f64> {
        if let Some(outside) = &self.config.raster.outside {
            return outside.clone();
        }
        if self.config.output.format == TileFormat::Bil {
            let fill = self.config.bil.nodata.or(self.config.raster.nodata).unwrap_or(0.0);
            return vec![fill; bands];
        }
        vec![0.0; bands]
    }
}

fn source_error(tile: &TileAddress, err: RasterError) -> TilerError {
    if err.is_invalid_argument() {
        TilerError::InvalidArgument(format!("tile {}: {}", tile, err))
    } else {
        TilerError::Raster(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::{Crs, GeoTransform, MemoryDataset, MemoryOpener, SampleType};
    use crate::texture::BilLayout;
    use tempfile::TempDir;

    /// 1-degree pixels over lon -36..36, lat -18..18, value = column.
    fn opener() -> Arc<dyn DatasetOpener> {
        let mut dataset = MemoryDataset::new(
            72,
            36,
            &[SampleType::I16],
            GeoTransform::north_up(-36.0, 18.0, 1.0, 1.0),
            Crs::Geographic,
        );
        dataset.fill_band(0, |x, _| x as f64);
        Arc::new(MemoryOpener::new(dataset))
    }

    fn config(dir: &TempDir) -> RunConfig {
        let mut config = RunConfig::default();
        config.output.directory = Some(dir.path().to_path_buf());
        config.output.format = TileFormat::Bil;
        config.bil = BilLayout::default();
        config.pyramid.level = 1;
        config.pyramid.level_zero_tile_size = 36.0;
        config.raster.tile_width = 18;
        config.raster.tile_height = 18;
        config.processing.threads = 2;
        config
    }

    #[test]
    fn test_raster_run_writes_levels_and_manifest() {
        let dir = TempDir::new().unwrap();
        let summary = RasterPipeline::with_opener(config(&dir), opener()).run().unwrap();

        assert_eq!(summary.bounds, [-18.0, -36.0, 18.0, 36.0]);
        // lzts 36 level 1 spans 18 degrees: 4 columns x 2 rows.
        assert_eq!(summary.sampled.counts.written, 8);
        assert_eq!(summary.overviews.levels.len(), 1);
        assert!(dir.path().join("1/0004/0004_0008.bil").exists());
        assert!(dir.path().join("1/0005/0005_0011.bil").exists());
        assert!(dir.path().join("0/0002/0002_0004.bil").exists());

        let manifest = TilesetManifest::read(dir.path()).unwrap();
        assert_eq!(manifest.levels, vec![0, 1]);
        assert_eq!(manifest.format, "bil");
    }

    #[test]
    fn test_rerun_skips_existing_tiles() {
        let dir = TempDir::new().unwrap();
        RasterPipeline::with_opener(config(&dir), opener()).run().unwrap();
        let again = RasterPipeline::with_opener(config(&dir), opener()).run().unwrap();
        assert_eq!(again.sampled.counts.written, 0);
        assert_eq!(again.sampled.counts.skipped, 8);
    }

    #[test]
    fn test_cancelled_run() {
        let dir = TempDir::new().unwrap();
        let context = RunContext::default();
        context.cancel.cancel();
        let result = RasterPipeline::with_opener(config(&dir), opener())
            .with_context(context)
            .run();
        assert!(matches!(result, Err(TilerError::Cancelled)));
    }

    #[test]
    fn test_missing_output_directory() {
        let dir = TempDir::new().unwrap();
        let mut config = config(&dir);
        config.output.directory = None;
        let result = RasterPipeline::with_opener(config, opener()).run();
        assert!(matches!(result, Err(TilerError::InvalidArgument(_))));
    }
}
