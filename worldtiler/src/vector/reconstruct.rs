//! Turns a feature's per-tile fragments into finished tile geometry.

use std::collections::BTreeMap;

use crate::coord::{Sector, TileAddress, TileGrid};

use super::clipper::FeatureClip;
use super::fill::interior_tiles;
use super::geometry::{point_in_ring, signed_area, Attributes, Coord, Feature, RingRole, ShapeKind};
use super::record::TileRecord;
use super::stitch::{join_orphans, stitch_boundary};
use super::VectorError;

/// Finished records of one feature, grouped by tile.
#[derive(Debug, Default)]
pub struct FeatureTiles {
    pub tiles: BTreeMap<TileAddress, Vec<TileRecord>>,
    pub problems: Vec<VectorError>,
}

/// Closes polygon rings, attaches holes and fills interior tiles.
///
/// Line and point fragments pass through unchanged apart from dropping
/// line pieces that collapsed to a single point.
pub fn reconstruct(grid: &TileGrid, clip: FeatureClip, feature: &Feature) -> FeatureTiles {
    let attributes = &feature.attributes;
    let mut out = FeatureTiles {
        tiles: BTreeMap::new(),
        problems: clip.problems,
    };

    if !matches!(feature.kind, ShapeKind::Polygon(_)) {
        let min_points = if matches!(feature.kind, ShapeKind::Line(_)) { 2 } else { 1 };
        for (tile, records) in clip.records {
            let kept: Vec<TileRecord> = records
                .into_iter()
                .filter(|r| r.points.len() >= min_points)
                .collect();
            if !kept.is_empty() {
                out.tiles.insert(tile, kept);
            }
        }
        return out;
    }

    let interior = match &clip.range {
        Some(range) => interior_tiles(grid, range, &clip.crossing_rings),
        None => Default::default(),
    };

    for (tile, records) in clip.records {
        let sector = grid.sector_of(&tile);
        let filled = interior.contains(&tile);
        match close_tile(&sector, records, filled, clip.shape_id, attributes) {
            Ok(polygons) if !polygons.is_empty() => {
                out.tiles.insert(tile, polygons);
            }
            Ok(_) => {}
            Err(reason) => out.problems.push(VectorError::DegenerateGeometry {
                shape_id: clip.shape_id,
                tile,
                reason,
            }),
        }
    }

    for tile in interior {
        out.tiles.entry(tile).or_insert_with(|| {
            vec![full_sector(&grid.sector_of(&tile), clip.shape_id, attributes)]
        });
    }

    out
}

/// Builds the closed polygons of one feature in one tile.
fn close_tile(
    sector: &Sector,
    records: Vec<TileRecord>,
    filled: bool,
    shape_id: usize,
    attributes: &Attributes,
) -> Result<Vec<TileRecord>, String> {
    let min_area = 1e-12 * sector.delta_lat() * sector.delta_lon();
    let records = join_orphans(records);

    let mut boundary: Vec<Vec<Coord>> = Vec::new();
    let mut outers: Vec<TileRecord> = Vec::new();
    let mut holes: Vec<(Vec<Coord>, bool)> = Vec::new();

    for record in records {
        if record.is_boundary() {
            if distinct_points(&record.points) >= 2 {
                boundary.push(record.points);
            }
        } else if record.is_self_contained() {
            match record.role {
                Some(RingRole::Hole) => holes.push((record.points, false)),
                _ => outers.push(record),
            }
        } else {
            return Err(format!(
                "ring part {} leaves the tile without returning",
                record.part
            ));
        }
    }

    let has_boundary = !boundary.is_empty();
    for ring in stitch_boundary(sector, &boundary)? {
        let area = signed_area(&ring);
        if area.abs() <= min_area {
            continue;
        }
        if area < 0.0 {
            outers.push(closed_record(ring, shape_id, attributes));
        } else {
            holes.push((ring, true));
        }
    }

    if filled && !has_boundary {
        outers.push(full_sector(sector, shape_id, attributes));
    }

    for (hole, from_boundary) in holes {
        let Some(&probe) = hole.first() else { continue };
        let host = outers
            .iter_mut()
            .filter(|o| point_in_ring(probe, &o.points))
            .min_by(|a, b| signed_area(&a.points).abs().total_cmp(&signed_area(&b.points).abs()));
        match host {
            Some(outer) => outer.holes.push(hole),
            None if from_boundary => {
                let mut square = full_sector(sector, shape_id, attributes);
                square.holes.push(hole);
                outers.push(square);
            }
            None => return Err("hole lies outside every outer ring".to_string()),
        }
    }

    Ok(outers)
}

fn distinct_points(points: &[Coord]) -> usize {
    let mut count = 0;
    for (i, p) in points.iter().enumerate() {
        if !points[..i].contains(p) {
            count += 1;
        }
    }
    count
}

fn closed_record(points: Vec<Coord>, shape_id: usize, attributes: &Attributes) -> TileRecord {
    TileRecord {
        shape_id,
        part: 0,
        role: Some(RingRole::Outer),
        points,
        entered: true,
        exited: true,
        attributes: attributes.clone(),
        holes: Vec::new(),
    }
}

/// The whole tile as a clockwise ring.
fn full_sector(sector: &Sector, shape_id: usize, attributes: &Attributes) -> TileRecord {
    let nw = Coord::new(sector.min_lon, sector.max_lat);
    let ring = vec![
        nw,
        Coord::new(sector.max_lon, sector.max_lat),
        Coord::new(sector.max_lon, sector.min_lat),
        Coord::new(sector.min_lon, sector.min_lat),
        nw,
    ];
    closed_record(ring, shape_id, attributes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::clipper::ShapeClipper;
    use crate::vector::geometry::Ring;

    fn polygon(rings: Vec<(Vec<(f64, f64)>, RingRole)>) -> Feature {
        Feature {
            id: 9,
            kind: ShapeKind::Polygon(
                rings
                    .into_iter()
                    .map(|(pts, role)| {
                        Ring::new(pts.into_iter().map(|(x, y)| Coord::new(x, y)).collect(), role).unwrap()
                    })
                    .collect(),
            ),
            attributes: Attributes::default(),
        }
    }

    fn run(grid: &TileGrid, level: u32, feature: &Feature) -> FeatureTiles {
        let clip = ShapeClipper::new(grid, level).clip(feature);
        reconstruct(grid, clip, feature)
    }

    #[test]
    fn test_polygon_inside_one_tile_unchanged() {
        let grid = TileGrid::new(36.0).unwrap();
        let feature = polygon(vec![(
            vec![(1.0, 1.0), (5.0, 1.0), (5.0, 5.0), (1.0, 5.0)],
            RingRole::Outer,
        )]);
        let result = run(&grid, 0, &feature);

        assert!(result.problems.is_empty());
        assert_eq!(result.tiles.len(), 1);
        let records = &result.tiles[&TileAddress::new(0, 2, 5)];
        assert_eq!(records.len(), 1);
        let ShapeKind::Polygon(rings) = &feature.kind else { unreachable!() };
        assert_eq!(records[0].points, rings[0].points());
        assert!(!records[0].points.contains(&Coord::new(0.0, 18.0)));
    }

    #[test]
    fn test_polygon_crossing_left_and_right_edges() {
        let grid = TileGrid::new(36.0).unwrap();
        // Spans columns 4..=6 in row 2, crossing both edges of column 5.
        let feature = polygon(vec![(
            vec![(-10.0, -5.0), (46.0, -5.0), (46.0, 5.0), (-10.0, 5.0)],
            RingRole::Outer,
        )]);
        let result = run(&grid, 0, &feature);
        assert!(result.problems.is_empty(), "{:?}", result.problems);
        assert_eq!(result.tiles.len(), 3);

        let middle = &result.tiles[&TileAddress::new(0, 2, 5)];
        assert_eq!(middle.len(), 1);
        let ring = &middle[0].points;
        assert_eq!(ring.first(), ring.last());
        for (x, y) in [(0.0, 5.0), (36.0, 5.0), (36.0, -5.0), (0.0, -5.0)] {
            assert!(ring.contains(&Coord::new(x, y)), "missing edge point ({}, {})", x, y);
        }
        assert!((signed_area(ring).abs() - 360.0).abs() < 1e-9);
    }

    #[test]
    fn test_large_polygon_fills_interior_tile() {
        let grid = TileGrid::new(10.0).unwrap();
        let feature = polygon(vec![(
            vec![(0.5, 0.5), (29.5, 0.5), (29.5, 29.5), (0.5, 29.5)],
            RingRole::Outer,
        )]);
        let result = run(&grid, 0, &feature);
        assert!(result.problems.is_empty());
        assert_eq!(result.tiles.len(), 9);

        let center = grid.address_of(15.0, 15.0, 0);
        let records = &result.tiles[&center];
        assert_eq!(records.len(), 1);
        assert_eq!(
            records[0].points,
            vec![
                Coord::new(10.0, 20.0),
                Coord::new(20.0, 20.0),
                Coord::new(20.0, 10.0),
                Coord::new(10.0, 10.0),
                Coord::new(10.0, 20.0),
            ]
        );
    }

    #[test]
    fn test_contained_hole_attached() {
        let grid = TileGrid::new(10.0).unwrap();
        let feature = polygon(vec![
            (vec![(0.5, 0.5), (29.5, 0.5), (29.5, 29.5), (0.5, 29.5)], RingRole::Outer),
            (vec![(12.0, 12.0), (18.0, 12.0), (18.0, 18.0), (12.0, 18.0)], RingRole::Hole),
        ]);
        let result = run(&grid, 0, &feature);
        assert!(result.problems.is_empty());

        let center = grid.address_of(15.0, 15.0, 0);
        let records = &result.tiles[&center];
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].holes.len(), 1);
        assert_eq!(records[0].points.len(), 5);
    }

    #[test]
    fn test_hole_crossing_tiles_is_stitched() {
        let grid = TileGrid::new(10.0).unwrap();
        let feature = polygon(vec![
            (vec![(0.5, 0.5), (29.5, 0.5), (29.5, 29.5), (0.5, 29.5)], RingRole::Outer),
            (vec![(12.0, 12.0), (25.0, 12.0), (25.0, 18.0), (12.0, 18.0)], RingRole::Hole),
        ]);
        let result = run(&grid, 0, &feature);
        assert!(result.problems.is_empty(), "{:?}", result.problems);

        let center = grid.address_of(15.0, 15.0, 0);
        let records = &result.tiles[&center];
        assert_eq!(records.len(), 1);
        assert!(records[0].holes.is_empty());
        // 100 square degrees minus the 8x6 part of the hole.
        assert!((signed_area(&records[0].points).abs() - 52.0).abs() < 1e-9);
    }

    #[test]
    fn test_line_fragments_pass_through() {
        let grid = TileGrid::new(36.0).unwrap();
        let feature = Feature {
            id: 4,
            kind: ShapeKind::Line(vec![vec![Coord::new(-10.0, 0.0), Coord::new(10.0, 0.0)]]),
            attributes: Attributes::default(),
        };
        let result = run(&grid, 0, &feature);
        assert_eq!(result.tiles.len(), 2);
        for records in result.tiles.values() {
            assert_eq!(records.len(), 1);
            assert_eq!(records[0].points.len(), 2);
            assert!(records[0].points.iter().any(|p| p.x == 0.0));
            assert!(records[0].holes.is_empty());
        }
    }
}
