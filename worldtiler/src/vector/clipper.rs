//! Streams feature vertices through the tile grid.

use std::collections::BTreeMap;

use crate::coord::{TileAddress, TileGrid, TileRange};

use super::edge::{clip_segment, point_at, snap};
use super::geometry::{Coord, Feature, ShapeKind};
use super::record::{FragmentArena, TileRecord};
use super::traverse::tiles_between;
use super::VectorError;

/// Fragments of one feature at one level.
#[derive(Debug)]
pub struct FeatureClip {
    pub shape_id: usize,
    pub records: BTreeMap<TileAddress, Vec<TileRecord>>,
    /// Rings whose vertices fall in more than one tile.
    pub crossing_rings: Vec<Vec<Coord>>,
    /// Tiles covered by the feature's bounding box.
    pub range: Option<TileRange>,
    /// Segments that could not be clipped cleanly.
    pub problems: Vec<VectorError>,
}

/// Clips features against the tiles of one level.
#[derive(Debug, Clone, Copy)]
pub struct ShapeClipper<'a> {
    grid: &'a TileGrid,
    level: u32,
}

impl<'a> ShapeClipper<'a> {
    pub fn new(grid: &'a TileGrid, level: u32) -> Self {
        Self { grid, level }
    }

    pub fn grid(&self) -> &TileGrid {
        self.grid
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    /// Splits `feature` into per-tile fragments.
    pub fn clip(&self, feature: &Feature) -> FeatureClip {
        let mut arena = FragmentArena::new(feature.id, feature.attributes.clone());
        let mut problems = Vec::new();
        let mut crossing_rings = Vec::new();

        match &feature.kind {
            ShapeKind::Polygon(rings) => {
                for (part, ring) in rings.iter().enumerate() {
                    arena.begin_part(part, Some(ring.role()));
                    self.stream(&mut arena, feature.id, ring.points(), &mut problems);
                    if self.spans_tiles(ring.points()) {
                        crossing_rings.push(ring.points().to_vec());
                    }
                }
            }
            ShapeKind::Line(parts) => {
                for (part, points) in parts.iter().enumerate() {
                    arena.begin_part(part, None);
                    self.stream(&mut arena, feature.id, points, &mut problems);
                }
            }
            ShapeKind::Point(p) => {
                arena.begin_part(0, None);
                arena.continue_shape(self.tile_of(*p), *p);
            }
            ShapeKind::MultiPoint(points) => {
                for (part, p) in points.iter().enumerate() {
                    arena.begin_part(part, None);
                    arena.continue_shape(self.tile_of(*p), *p);
                }
            }
        }

        FeatureClip {
            shape_id: feature.id,
            records: arena.into_records(),
            crossing_rings,
            range: feature
                .bounds()
                .map(|b| self.grid.tiles_in_sector(&b, self.level)),
            problems,
        }
    }

    /// Tile containing `p`, boundary points belonging to the tile whose
    /// minimum edge they lie on.
    pub fn tile_of(&self, p: Coord) -> TileAddress {
        self.grid.address_of(p.y, p.x, self.level)
    }

    fn spans_tiles(&self, points: &[Coord]) -> bool {
        let mut tiles = points.iter().map(|p| self.tile_of(*p));
        match tiles.next() {
            Some(first) => tiles.any(|t| t != first),
            None => false,
        }
    }

    fn stream(
        &self,
        arena: &mut FragmentArena,
        shape_id: usize,
        points: &[Coord],
        problems: &mut Vec<VectorError>,
    ) {
        let Some((&first, rest)) = points.split_first() else {
            return;
        };
        let mut prev = first;
        let mut prev_tile = self.tile_of(prev);
        arena.continue_shape(prev_tile, prev);

        for &p in rest {
            let tile = self.tile_of(p);
            if tile != prev_tile {
                let from = self.grid.sector_of(&prev_tile);
                let exit = match clip_segment(prev, p, &from) {
                    Some((_, leave)) => point_at(prev, p, leave, &from),
                    None => snap(p, &from),
                };
                arena.exit_shape(prev_tile, exit);

                for (row, col) in tiles_between(self.grid, self.level, prev, p) {
                    let between = TileAddress::new(self.level, row, col);
                    if let Err(reason) = self.cross(arena, between, prev, p) {
                        problems.push(VectorError::DegenerateGeometry {
                            shape_id,
                            tile: between,
                            reason,
                        });
                    }
                }

                let to = self.grid.sector_of(&tile);
                let entry = match clip_segment(prev, p, &to) {
                    Some((enter, _)) => point_at(prev, p, enter, &to),
                    None => snap(prev, &to),
                };
                arena.enter_shape(tile, entry);
            }
            arena.continue_shape(tile, p);
            prev = p;
            prev_tile = tile;
        }
    }

    /// Adds the fragment of `a`→`b` inside `tile`. A segment that only
    /// grazes a tile corner leaves nothing there.
    fn cross(&self, arena: &mut FragmentArena, tile: TileAddress, a: Coord, b: Coord) -> Result<(), String> {
        let sector = self.grid.sector_of(&tile);
        let (enter, leave) = clip_segment(a, b, &sector)
            .ok_or_else(|| "segment misses the tile it was traversed through".to_string())?;
        let from = point_at(a, b, enter, &sector);
        let to = point_at(a, b, leave, &sector);
        if from != to {
            arena.cross_shape(tile, from, to);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::geometry::{Attributes, Ring, RingRole};

    fn is_ring(record: &TileRecord) -> bool {
        matches!(record.role, Some(RingRole::Outer | RingRole::Hole))
    }

    fn grid() -> TileGrid {
        TileGrid::new(36.0).unwrap()
    }

    fn line(points: Vec<Coord>) -> Feature {
        Feature {
            id: 1,
            kind: ShapeKind::Line(vec![points]),
            attributes: Attributes::default(),
        }
    }

    #[test]
    fn test_line_split_at_tile_boundary() {
        let grid = grid();
        let clip = ShapeClipper::new(&grid, 0)
            .clip(&line(vec![Coord::new(-10.0, 0.0), Coord::new(10.0, 0.0)]));

        assert_eq!(clip.records.len(), 2);
        let west = &clip.records[&TileAddress::new(0, 2, 4)];
        let east = &clip.records[&TileAddress::new(0, 2, 5)];
        assert_eq!(west.len(), 1);
        assert_eq!(east.len(), 1);
        assert_eq!(west[0].points, vec![Coord::new(-10.0, 0.0), Coord::new(0.0, 0.0)]);
        assert_eq!(east[0].points, vec![Coord::new(0.0, 0.0), Coord::new(10.0, 0.0)]);
        assert!(clip.problems.is_empty());
    }

    #[test]
    fn test_long_segment_crosses_intermediate_tiles() {
        let grid = grid();
        let clip = ShapeClipper::new(&grid, 0)
            .clip(&line(vec![Coord::new(-20.0, 0.0), Coord::new(130.0, 0.0)]));

        assert_eq!(clip.records.len(), 5);
        let middle = &clip.records[&TileAddress::new(0, 2, 6)][0];
        assert!(middle.is_boundary());
        assert_eq!(middle.points, vec![Coord::new(36.0, 0.0), Coord::new(72.0, 0.0)]);
    }

    #[test]
    fn test_ring_inside_one_tile_is_not_crossing() {
        let grid = grid();
        let ring = Ring::new(
            vec![
                Coord::new(1.0, 1.0),
                Coord::new(5.0, 1.0),
                Coord::new(5.0, 5.0),
                Coord::new(1.0, 5.0),
            ],
            RingRole::Outer,
        )
        .unwrap();
        let feature = Feature {
            id: 0,
            kind: ShapeKind::Polygon(vec![ring.clone()]),
            attributes: Attributes::default(),
        };
        let clip = ShapeClipper::new(&grid, 0).clip(&feature);

        assert!(clip.crossing_rings.is_empty());
        let records = &clip.records[&TileAddress::new(0, 2, 5)];
        assert_eq!(records.len(), 1);
        assert!(records[0].is_self_contained());
        assert!(is_ring(&records[0]));
        assert_eq!(records[0].points, ring.points());
    }

    #[test]
    fn test_corner_touches_are_not_degenerate() {
        // Edges starting on grid lines graze neighbouring tile corners.
        let grid = TileGrid::new(10.0).unwrap();
        let ring = Ring::new(
            vec![
                Coord::new(20.0, 0.0),
                Coord::new(40.0, 20.0),
                Coord::new(20.0, 40.0),
                Coord::new(0.0, 20.0),
            ],
            RingRole::Outer,
        )
        .unwrap();
        let feature = Feature {
            id: 3,
            kind: ShapeKind::Polygon(vec![ring]),
            attributes: Attributes::default(),
        };
        let clip = ShapeClipper::new(&grid, 0).clip(&feature);

        assert!(clip.problems.is_empty(), "{:?}", clip.problems);
        assert_eq!(clip.crossing_rings.len(), 1);
    }

    #[test]
    fn test_points_assigned_to_tiles() {
        let grid = grid();
        let feature = Feature {
            id: 2,
            kind: ShapeKind::MultiPoint(vec![Coord::new(-10.0, 0.0), Coord::new(10.0, 0.0)]),
            attributes: Attributes::default(),
        };
        let clip = ShapeClipper::new(&grid, 0).clip(&feature);
        assert_eq!(clip.records.len(), 2);
    }
}
