//! Clipping runs over one or more levels.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::coord::{TileAddress, TileGrid};
use crate::progress::{LevelSummary, NoProgress, SharedProgress, TileCounts, TileOutcome};

use super::clipper::ShapeClipper;
use super::reconstruct::reconstruct;
use super::source::ShapefileSource;
use super::tile::ShapefileTile;
use super::writer::ArchiveWriter;
use super::VectorError;

/// Tiles written per level plus geometry that had to be skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VectorSummary {
    pub levels: Vec<LevelSummary>,
    /// Feature/tile pairs dropped as degenerate.
    pub degenerate: u64,
}

impl VectorSummary {
    pub fn total(&self) -> TileCounts {
        let mut total = TileCounts::default();
        for level in &self.levels {
            total.add(level.counts);
        }
        total
    }
}

/// Clips a shapefile into per-tile archives.
///
/// Every level is clipped from the original features. Runs are
/// single-threaded; the cancellation token is checked between features and
/// between tiles.
pub struct VectorTiler {
    grid: TileGrid,
    root: PathBuf,
    cancel: CancellationToken,
    progress: SharedProgress,
}

impl VectorTiler {
    pub fn new(grid: TileGrid, root: impl Into<PathBuf>) -> Self {
        Self {
            grid,
            root: root.into(),
            cancel: CancellationToken::new(),
            progress: Arc::new(NoProgress),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_progress(mut self, progress: SharedProgress) -> Self {
        self.progress = progress;
        self
    }

    /// Clips and writes every level in `levels`.
    pub fn run(&self, source: &ShapefileSource, levels: &[u32]) -> Result<VectorSummary, VectorError> {
        let mut summary = VectorSummary::default();
        let Some(kind) = source.kind() else {
            warn!(path = %source.path().display(), "Shapefile has no features, nothing to tile");
            return Ok(summary);
        };
        let writer = ArchiveWriter::new(&self.root, kind, source.dbf_path());

        for &level in levels {
            if self.cancel.is_cancelled() {
                return Err(VectorError::Cancelled);
            }
            let (tiles, degenerate) = self.clip_level(source, level)?;
            summary.degenerate += degenerate;

            let counts = self.write_level(&writer, level, &tiles)?;
            info!(
                level,
                written = counts.written,
                skipped = counts.skipped,
                failed = counts.failed,
                "Vector level complete"
            );
            summary.levels.push(LevelSummary { level, counts });
        }

        Ok(summary)
    }

    /// Clips every feature at `level` into per-tile accumulators.
    ///
    /// Returns the tiles and the number of degenerate feature/tile pairs
    /// that were skipped.
    pub fn clip_level(
        &self,
        source: &ShapefileSource,
        level: u32,
    ) -> Result<(BTreeMap<TileAddress, ShapefileTile>, u64), VectorError> {
        let clipper = ShapeClipper::new(&self.grid, level);
        let mut tiles: BTreeMap<TileAddress, ShapefileTile> = BTreeMap::new();
        let mut degenerate = 0;

        for feature in source.features() {
            if self.cancel.is_cancelled() {
                return Err(VectorError::Cancelled);
            }
            let clip = clipper.clip(feature);
            let result = reconstruct(&self.grid, clip, feature);

            for problem in &result.problems {
                if let VectorError::DegenerateGeometry { shape_id, tile, reason } = problem {
                    warn!(shape_id, tile = %tile, reason = %reason, "Skipping degenerate geometry");
                }
                degenerate += 1;
            }

            for (address, records) in result.tiles {
                tiles
                    .entry(address)
                    .or_insert_with(|| ShapefileTile::new(address, self.grid.sector_of(&address)))
                    .extend(records);
            }
        }

        debug!(level, tiles = tiles.len(), "Clipping pass complete");
        Ok((tiles, degenerate))
    }

    fn write_level(
        &self,
        writer: &ArchiveWriter,
        level: u32,
        tiles: &BTreeMap<TileAddress, ShapefileTile>,
    ) -> Result<TileCounts, VectorError> {
        let mut counts = TileCounts::default();
        self.progress
            .stage_started(&format!("vector level {}", level), tiles.len() as u64);

        for tile in tiles.values() {
            if self.cancel.is_cancelled() {
                self.progress.stage_finished();
                return Err(VectorError::Cancelled);
            }
            let outcome = match writer.write(tile) {
                Ok(true) => TileOutcome::Written,
                Ok(false) => {
                    warn!(
                        tile = %tile.address(),
                        path = %writer.destination(&tile.address()).display(),
                        "Tile archive already exists, skipping"
                    );
                    TileOutcome::Skipped
                }
                Err(e) if e.is_fatal() => {
                    self.progress.stage_finished();
                    return Err(e);
                }
                Err(e) => {
                    warn!(tile = %tile.address(), error = %e, "Tile archive failed");
                    TileOutcome::Failed
                }
            };
            match outcome {
                TileOutcome::Written => counts.written += 1,
                TileOutcome::Skipped => counts.skipped += 1,
                TileOutcome::Failed => counts.failed += 1,
            }
            self.progress.tile_finished(outcome);
        }

        self.progress.stage_finished();
        Ok(counts)
    }
}
