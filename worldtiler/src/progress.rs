//! Progress reporting for tiling runs.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// What happened to one tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileOutcome {
    /// The tile file was written.
    Written,
    /// The destination already existed, or the tile had nothing to write.
    Skipped,
    /// The tile failed and was left out; the run continues.
    Failed,
}

/// Observer for run progress.
///
/// Implementations must be `Send + Sync`: tiles finish on pool workers.
pub trait ProgressReporter: Send + Sync {
    /// A stage (one pyramid level, or one vector level) is starting.
    fn stage_started(&self, stage: &str, total: u64);

    /// One tile of the current stage finished.
    fn tile_finished(&self, outcome: TileOutcome);

    /// The current stage is done.
    fn stage_finished(&self) {}
}

/// Shared progress reporter.
pub type SharedProgress = Arc<dyn ProgressReporter>;

/// Reporter that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn stage_started(&self, _stage: &str, _total: u64) {}

    fn tile_finished(&self, _outcome: TileOutcome) {}
}

/// Outcome totals for a stage or a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileCounts {
    pub written: u64,
    pub skipped: u64,
    pub failed: u64,
}

impl TileCounts {
    pub fn total(&self) -> u64 {
        self.written + self.skipped + self.failed
    }

    pub fn add(&mut self, other: TileCounts) {
        self.written += other.written;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }
}

/// Tiles produced for one level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelSummary {
    pub level: u32,
    pub counts: TileCounts,
}

/// Thread-safe outcome counter used inside a worker pool.
#[derive(Debug, Default)]
pub struct TileCounters {
    written: AtomicU64,
    skipped: AtomicU64,
    failed: AtomicU64,
}

impl TileCounters {
    pub fn record(&self, outcome: TileOutcome) {
        let counter = match outcome {
            TileOutcome::Written => &self.written,
            TileOutcome::Skipped => &self.skipped,
            TileOutcome::Failed => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> TileCounts {
        TileCounts {
            written: self.written.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_snapshot() {
        let counters = TileCounters::default();
        counters.record(TileOutcome::Written);
        counters.record(TileOutcome::Written);
        counters.record(TileOutcome::Failed);
        let counts = counters.snapshot();
        assert_eq!(counts.written, 2);
        assert_eq!(counts.skipped, 0);
        assert_eq!(counts.failed, 1);
        assert_eq!(counts.total(), 3);
    }

    #[test]
    fn test_counts_add() {
        let mut a = TileCounts {
            written: 1,
            skipped: 2,
            failed: 0,
        };
        a.add(TileCounts {
            written: 3,
            skipped: 0,
            failed: 1,
        });
        assert_eq!(a.total(), 7);
    }

    #[test]
    fn test_no_progress_as_trait_object() {
        let progress: SharedProgress = Arc::new(NoProgress);
        progress.stage_started("level 3", 10);
        progress.tile_finished(TileOutcome::Skipped);
        progress.stage_finished();
    }
}
