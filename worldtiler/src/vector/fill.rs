//! Interior fill for tiles no boundary passes through.
//!
//! Each tile row is scanned along its center latitude. The longitudes where
//! the boundary-crossing rings cut that parallel are sorted, and a tile whose
//! center longitude has an odd number of cuts to its west lies inside the
//! polygon (even-odd rule). Holes take part in the count, so tiles inside a
//! large hole stay empty.

use std::collections::BTreeSet;

use crate::coord::{TileAddress, TileGrid, TileRange};

use super::geometry::{ring_crossings, Coord};

/// Tiles of `range` whose centers lie inside the polygon bounded by `rings`.
pub fn interior_tiles(grid: &TileGrid, range: &TileRange, rings: &[Vec<Coord>]) -> BTreeSet<TileAddress> {
    let mut inside = BTreeSet::new();
    if rings.is_empty() {
        return inside;
    }

    let mut cuts = Vec::new();
    for row in range.min_row..=range.max_row {
        let (center_lat, _) = grid.sector_for(range.level, row, range.min_col).center();
        cuts.clear();
        for ring in rings {
            ring_crossings(ring, center_lat, &mut cuts);
        }
        if cuts.len() < 2 {
            continue;
        }
        cuts.sort_by(f64::total_cmp);

        for col in range.min_col..=range.max_col {
            let (_, center_lon) = grid.sector_for(range.level, row, col).center();
            let west = cuts.partition_point(|&x| x < center_lon);
            if west % 2 == 1 {
                inside.insert(TileAddress::new(range.level, row, col));
            }
        }
    }

    inside
}
