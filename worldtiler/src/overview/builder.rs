//! Level-by-level overview generation.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rayon::prelude::*;
use rayon::ThreadPool;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::average::{average_mosaic, ChildMosaic};
use super::OverviewError;
use crate::coord::{parse_tile_name, tile_path, TileAddress};
use crate::output::write_atomic;
use crate::progress::{LevelSummary, NoProgress, SharedProgress, TileCounters, TileCounts, TileOutcome};
use crate::raster::RasterTile;
use crate::texture::TileCodec;

/// Tiles built for every level of a run, finest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OverviewSummary {
    pub levels: Vec<LevelSummary>,
}

impl OverviewSummary {
    pub fn total(&self) -> TileCounts {
        let mut total = TileCounts::default();
        for level in &self.levels {
            total.add(level.counts);
        }
        total
    }
}

/// Builds coarser pyramid levels from a populated finer level.
///
/// Each parent tile averages its four children 2×2. Levels run finest to
/// coarsest with a barrier in between; tiles of one level run in parallel
/// on a dedicated pool. Existing parents are skipped, so an interrupted
/// run can be resumed.
pub struct OverviewBuilder {
    root: PathBuf,
    codec: Arc<dyn TileCodec>,
    tile_width: u32,
    tile_height: u32,
    threads: usize,
    cancel: CancellationToken,
    progress: SharedProgress,
}

impl OverviewBuilder {
    pub fn new(
        root: impl Into<PathBuf>,
        codec: Arc<dyn TileCodec>,
        tile_width: u32,
        tile_height: u32,
    ) -> Self {
        Self {
            root: root.into(),
            codec,
            tile_width,
            tile_height,
            threads: 1,
            cancel: CancellationToken::new(),
            progress: Arc::new(NoProgress),
        }
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads.max(1);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_progress(mut self, progress: SharedProgress) -> Self {
        self.progress = progress;
        self
    }

    /// Builds levels `finest_level - 1` down to 0.
    pub fn build(&self, finest_level: u32) -> Result<OverviewSummary, OverviewError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.threads)
            .thread_name(|i| format!("overview-{}", i))
            .build()
            .map_err(|e| OverviewError::Pool(e.to_string()))?;

        let mut summary = OverviewSummary::default();
        for level in (0..finest_level).rev() {
            if self.cancel.is_cancelled() {
                return Err(OverviewError::Cancelled);
            }
            summary.levels.push(self.build_level(&pool, level)?);
        }

        let total = summary.total();
        info!(
            levels = summary.levels.len(),
            written = total.written,
            skipped = total.skipped,
            failed = total.failed,
            "Overviews complete"
        );
        Ok(summary)
    }

    /// Builds every parent at `level` whose children exist at `level + 1`.
    pub fn build_level(&self, pool: &ThreadPool, level: u32) -> Result<LevelSummary, OverviewError> {
        let parents: Vec<TileAddress> =
            parent_candidates(&self.root, level + 1, self.codec.extension())?
                .into_iter()
                .collect();
        debug!(level, tiles = parents.len(), "Building overview level");

        self.progress
            .stage_started(&format!("Overview level {}", level), parents.len() as u64);
        let counters = TileCounters::default();

        pool.install(|| {
            parents.par_iter().for_each(|parent| {
                if self.cancel.is_cancelled() {
                    return;
                }
                let outcome = match self.build_tile(*parent) {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        warn!(
                            level = parent.level,
                            row = parent.row,
                            col = parent.col,
                            error = %e,
                            "Overview tile failed"
                        );
                        TileOutcome::Failed
                    }
                };
                counters.record(outcome);
                self.progress.tile_finished(outcome);
            });
        });
        self.progress.stage_finished();

        if self.cancel.is_cancelled() {
            return Err(OverviewError::Cancelled);
        }
        Ok(LevelSummary {
            level,
            counts: counters.snapshot(),
        })
    }

    /// Builds one parent tile unless it already exists.
    pub fn build_tile(&self, parent: TileAddress) -> Result<TileOutcome, OverviewError> {
        let dest = tile_path(&self.root, &parent, self.codec.extension());
        if dest.exists() {
            trace!(tile = %parent, "Overview tile exists, skipping");
            return Ok(TileOutcome::Skipped);
        }

        // children() is ordered SW, SE, NW, NE
        let [sw, se, nw, ne] = parent.children().map(|child| self.load_child(&child));
        let mosaic = ChildMosaic {
            top_left: &nw,
            top_right: &ne,
            bottom_left: &sw,
            bottom_right: &se,
        };
        let nodata = self.codec.nodata();
        let tile = average_mosaic(&mosaic, nodata.as_deref());

        let bytes = self
            .codec
            .encode(&tile)
            .map_err(|source| OverviewError::Encode {
                tile: parent,
                source,
            })?;
        write_atomic(&dest, &bytes).map_err(|source| OverviewError::Io {
            path: dest.clone(),
            source,
        })?;
        trace!(tile = %parent, bytes = bytes.len(), "Wrote overview tile");
        Ok(TileOutcome::Written)
    }

    /// Reads a child tile; missing or unreadable children are all nodata.
    fn load_child(&self, child: &TileAddress) -> RasterTile {
        let path = tile_path(&self.root, child, self.codec.extension());
        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return self.blank(),
            Err(e) => {
                warn!(tile = %child, path = %path.display(), error = %e, "Unreadable child tile");
                return self.blank();
            }
        };
        match self.codec.decode(&data) {
            Ok(tile) if self.fits(&tile) => tile,
            Ok(tile) => {
                warn!(
                    tile = %child,
                    width = tile.width(),
                    height = tile.height(),
                    bands = tile.bands(),
                    "Child tile has the wrong layout, treating as nodata"
                );
                self.blank()
            }
            Err(e) => {
                warn!(tile = %child, error = %e, "Undecodable child tile, treating as nodata");
                self.blank()
            }
        }
    }

    fn fits(&self, tile: &RasterTile) -> bool {
        tile.width() == self.tile_width
            && tile.height() == self.tile_height
            && (tile.bands(), tile.sample_type()) == self.codec.layout()
    }

    /// A tile holding only nodata (zeros when the codec has no nodata).
    fn blank(&self) -> RasterTile {
        let (bands, sample_type) = self.codec.layout();
        let values = self.codec.nodata().unwrap_or_else(|| vec![0.0; bands]);
        RasterTile::filled(self.tile_width, self.tile_height, sample_type, &values)
    }
}

/// Parents of every tile found under `{root}/{child_level}/*/*.{ext}`.
pub fn parent_candidates(
    root: &Path,
    child_level: u32,
    ext: &str,
) -> Result<BTreeSet<TileAddress>, OverviewError> {
    let level_dir = root.join(child_level.to_string());
    let mut parents = BTreeSet::new();
    if !level_dir.is_dir() {
        return Ok(parents);
    }

    for row_entry in fs::read_dir(&level_dir).map_err(io_error(&level_dir))? {
        let row_entry = row_entry.map_err(io_error(&level_dir))?;
        let row_dir = row_entry.path();
        if !row_dir.is_dir() {
            continue;
        }
        for entry in fs::read_dir(&row_dir).map_err(io_error(&row_dir))? {
            let entry = entry.map_err(io_error(&row_dir))?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if let Some(parent) = parse_tile_name(child_level, name, ext)
                .ok()
                .and_then(|child| child.parent())
            {
                parents.insert(parent);
            }
        }
    }
    Ok(parents)
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> OverviewError {
    let path = path.to_path_buf();
    move |source| OverviewError::Io { path, source }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::SampleType;
    use crate::texture::{BilCodec, BilLayout, ImageCodec, TileFormat};
    use tempfile::TempDir;

    fn png_codec() -> Arc<dyn TileCodec> {
        Arc::new(ImageCodec::new(TileFormat::Png).unwrap())
    }

    fn write_tile(root: &Path, codec: &dyn TileCodec, addr: TileAddress, tile: &RasterTile) {
        let path = tile_path(root, &addr, codec.extension());
        write_atomic(&path, &codec.encode(tile).unwrap()).unwrap();
    }

    #[test]
    fn test_four_colors_make_quadrants() {
        let temp = TempDir::new().unwrap();
        let codec = png_codec();
        let red = RasterTile::filled(256, 256, SampleType::U8, &[255.0, 0.0, 0.0, 255.0]);
        let green = RasterTile::filled(256, 256, SampleType::U8, &[0.0, 255.0, 0.0, 255.0]);
        let blue = RasterTile::filled(256, 256, SampleType::U8, &[0.0, 0.0, 255.0, 255.0]);
        let yellow = RasterTile::filled(256, 256, SampleType::U8, &[255.0, 255.0, 0.0, 255.0]);
        write_tile(temp.path(), codec.as_ref(), TileAddress::new(1, 1, 0), &red);
        write_tile(temp.path(), codec.as_ref(), TileAddress::new(1, 1, 1), &green);
        write_tile(temp.path(), codec.as_ref(), TileAddress::new(1, 0, 0), &blue);
        write_tile(temp.path(), codec.as_ref(), TileAddress::new(1, 0, 1), &yellow);

        let builder = OverviewBuilder::new(temp.path(), codec.clone(), 256, 256).with_threads(2);
        let summary = builder.build(1).unwrap();
        assert_eq!(summary.total().written, 1);

        let path = tile_path(temp.path(), &TileAddress::new(0, 0, 0), "png");
        let parent = codec.decode(&fs::read(path).unwrap()).unwrap();
        assert_eq!((parent.width(), parent.height()), (256, 256));
        assert_eq!(parent.pixel(0, 0), red.pixel(0, 0));
        assert_eq!(parent.pixel(255, 0), green.pixel(0, 0));
        assert_eq!(parent.pixel(0, 255), blue.pixel(0, 0));
        assert_eq!(parent.pixel(255, 255), yellow.pixel(0, 0));
    }

    #[test]
    fn test_missing_children_are_nodata() {
        let temp = TempDir::new().unwrap();
        let layout = BilLayout {
            nodata: Some(-32768.0),
            ..BilLayout::default()
        };
        let codec: Arc<dyn TileCodec> = Arc::new(BilCodec::new(layout, 4, 4).unwrap());
        let ground = RasterTile::filled(4, 4, SampleType::I16, &[100.0]);
        // only the north-west child exists
        write_tile(temp.path(), codec.as_ref(), TileAddress::new(3, 5, 8), &ground);

        let builder = OverviewBuilder::new(temp.path(), codec.clone(), 4, 4);
        let pool = rayon::ThreadPoolBuilder::new().num_threads(1).build().unwrap();
        let summary = builder.build_level(&pool, 2).unwrap();
        assert_eq!(summary.counts.written, 1);

        let path = tile_path(temp.path(), &TileAddress::new(2, 2, 4), "bil");
        let parent = codec.decode(&fs::read(path).unwrap()).unwrap();
        assert_eq!(parent.get(0, 0, 0), 100.0);
        assert_eq!(parent.get(3, 0, 0), -32768.0);
        assert_eq!(parent.get(0, 3, 0), -32768.0);
        assert_eq!(parent.get(3, 3, 0), -32768.0);
    }

    #[test]
    fn test_existing_parent_is_skipped() {
        let temp = TempDir::new().unwrap();
        let codec = png_codec();
        let tile = RasterTile::filled(8, 8, SampleType::U8, &[9.0, 9.0, 9.0, 255.0]);
        write_tile(temp.path(), codec.as_ref(), TileAddress::new(1, 0, 0), &tile);
        let parent_path = tile_path(temp.path(), &TileAddress::new(0, 0, 0), "png");
        write_atomic(&parent_path, b"keep").unwrap();

        let builder = OverviewBuilder::new(temp.path(), codec, 8, 8);
        let summary = builder.build(1).unwrap();
        assert_eq!(summary.total().skipped, 1);
        assert_eq!(fs::read(parent_path).unwrap(), b"keep");
    }

    #[test]
    fn test_builds_down_to_level_zero() {
        let temp = TempDir::new().unwrap();
        let codec = png_codec();
        let tile = RasterTile::filled(8, 8, SampleType::U8, &[50.0, 60.0, 70.0, 255.0]);
        write_tile(temp.path(), codec.as_ref(), TileAddress::new(3, 6, 9), &tile);

        let builder = OverviewBuilder::new(temp.path(), codec, 8, 8).with_threads(3);
        let summary = builder.build(3).unwrap();
        let levels: Vec<u32> = summary.levels.iter().map(|l| l.level).collect();
        assert_eq!(levels, vec![2, 1, 0]);
        assert!(tile_path(temp.path(), &TileAddress::new(2, 3, 4), "png").exists());
        assert!(tile_path(temp.path(), &TileAddress::new(1, 1, 2), "png").exists());
        assert!(tile_path(temp.path(), &TileAddress::new(0, 0, 1), "png").exists());
    }

    #[test]
    fn test_cancelled_before_start() {
        let temp = TempDir::new().unwrap();
        let token = CancellationToken::new();
        token.cancel();
        let builder =
            OverviewBuilder::new(temp.path(), png_codec(), 8, 8).with_cancellation(token);
        assert!(matches!(builder.build(2), Err(OverviewError::Cancelled)));
    }

    #[test]
    fn test_parent_candidates_ignore_other_files() {
        let temp = TempDir::new().unwrap();
        let row_dir = temp.path().join("4").join("0003");
        fs::create_dir_all(&row_dir).unwrap();
        fs::write(row_dir.join("0003_0007.png"), b"").unwrap();
        fs::write(row_dir.join("0003_0008.png"), b"").unwrap();
        fs::write(row_dir.join("0003_0009.png.tmp"), b"").unwrap();
        fs::write(row_dir.join("0003_0010.jpg"), b"").unwrap();
        fs::write(temp.path().join("4").join("notes.txt"), b"").unwrap();

        let parents = parent_candidates(temp.path(), 4, "png").unwrap();
        let expected: BTreeSet<_> = [TileAddress::new(3, 1, 3), TileAddress::new(3, 1, 4)]
            .into_iter()
            .collect();
        assert_eq!(parents, expected);
    }

    #[test]
    fn test_missing_level_has_no_candidates() {
        let temp = TempDir::new().unwrap();
        assert!(parent_candidates(temp.path(), 5, "png").unwrap().is_empty());
    }
}
