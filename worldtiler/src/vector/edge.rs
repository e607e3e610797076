//! Segment/tile-edge intersection.
//!
//! Liang–Barsky clipping against a tile sector. Edge points are snapped onto
//! the edge they cross so that fragments from neighbouring tiles share
//! bit-identical boundary coordinates.

use crate::coord::Sector;

use super::geometry::Coord;

/// Relative snapping tolerance, scaled by the sector size.
const SNAP_EPSILON: f64 = 1e-9;

/// Side of a tile sector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    West,
    East,
    South,
    North,
}

/// Parameter along a segment where it meets a sector edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Crossing {
    pub t: f64,
    /// `None` when the endpoint itself lies inside the sector.
    pub edge: Option<Edge>,
}

/// Clips segment `a`→`b` against the closed sector.
///
/// Returns the entering and leaving crossings, or `None` when the segment
/// misses the sector.
pub fn clip_segment(a: Coord, b: Coord, sector: &Sector) -> Option<(Crossing, Crossing)> {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let mut enter = Crossing { t: 0.0, edge: None };
    let mut leave = Crossing { t: 1.0, edge: None };

    let checks = [
        (-dx, a.x - sector.min_lon, Edge::West),
        (dx, sector.max_lon - a.x, Edge::East),
        (-dy, a.y - sector.min_lat, Edge::South),
        (dy, sector.max_lat - a.y, Edge::North),
    ];

    for (p, q, edge) in checks {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            if r > leave.t {
                return None;
            }
            if r > enter.t {
                enter = Crossing {
                    t: r,
                    edge: Some(edge),
                };
            }
        } else {
            if r < enter.t {
                return None;
            }
            if r < leave.t {
                leave = Crossing {
                    t: r,
                    edge: Some(edge),
                };
            }
        }
    }

    Some((enter, leave))
}

/// Point on `a`→`b` at `crossing`, snapped onto the sector boundary.
pub fn point_at(a: Coord, b: Coord, crossing: Crossing, sector: &Sector) -> Coord {
    let mut p = if crossing.t <= 0.0 {
        a
    } else if crossing.t >= 1.0 {
        b
    } else {
        Coord::new(
            a.x + (b.x - a.x) * crossing.t,
            a.y + (b.y - a.y) * crossing.t,
        )
    };

    match crossing.edge {
        Some(Edge::West) => p.x = sector.min_lon,
        Some(Edge::East) => p.x = sector.max_lon,
        Some(Edge::South) => p.y = sector.min_lat,
        Some(Edge::North) => p.y = sector.max_lat,
        None => {}
    }

    snap(p, sector)
}

/// Pulls coordinates within tolerance of an edge exactly onto it and clamps
/// the rest into the sector.
pub fn snap(mut p: Coord, sector: &Sector) -> Coord {
    let eps = SNAP_EPSILON * sector.delta_lon().max(sector.delta_lat());
    for edge in [sector.min_lon, sector.max_lon] {
        if (p.x - edge).abs() <= eps {
            p.x = edge;
        }
    }
    for edge in [sector.min_lat, sector.max_lat] {
        if (p.y - edge).abs() <= eps {
            p.y = edge;
        }
    }
    p.x = p.x.clamp(sector.min_lon, sector.max_lon);
    p.y = p.y.clamp(sector.min_lat, sector.max_lat);
    p
}

#[cfg(test)]
mod tests {
    use super::*;

    fn on_boundary(p: Coord, sector: &Sector) -> bool {
        p.x == sector.min_lon || p.x == sector.max_lon || p.y == sector.min_lat || p.y == sector.max_lat
    }

    fn unit() -> Sector {
        Sector::new(0.0, 0.0, 10.0, 10.0).unwrap()
    }

    #[test]
    fn test_clip_crossing_segment() {
        let (enter, leave) = clip_segment(Coord::new(-5.0, 5.0), Coord::new(15.0, 5.0), &unit()).unwrap();
        assert_eq!(enter.edge, Some(Edge::West));
        assert_eq!(leave.edge, Some(Edge::East));
        assert!((enter.t - 0.25).abs() < 1e-12);
        assert!((leave.t - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_clip_inside_segment_has_no_edges() {
        let (enter, leave) = clip_segment(Coord::new(1.0, 1.0), Coord::new(2.0, 3.0), &unit()).unwrap();
        assert_eq!(enter.edge, None);
        assert_eq!(leave.edge, None);
    }

    #[test]
    fn test_clip_miss() {
        assert!(clip_segment(Coord::new(-5.0, -5.0), Coord::new(-1.0, 20.0), &unit()).is_none());
        assert!(clip_segment(Coord::new(11.0, 0.0), Coord::new(11.0, 10.0), &unit()).is_none());
    }

    #[test]
    fn test_point_snapped_to_edge() {
        let a = Coord::new(-3.3, 1.1);
        let b = Coord::new(7.7, 2.9);
        let (enter, _) = clip_segment(a, b, &unit()).unwrap();
        let p = point_at(a, b, enter, &unit());
        assert_eq!(p.x, 0.0);
        assert!(on_boundary(p, &unit()));
    }

    #[test]
    fn test_corner_crossing_snaps_both_axes() {
        let a = Coord::new(-5.0, -5.0);
        let b = Coord::new(5.0, 5.0);
        let (enter, _) = clip_segment(a, b, &unit()).unwrap();
        let p = point_at(a, b, enter, &unit());
        assert_eq!(p, Coord::new(0.0, 0.0));
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_clipped_points_stay_in_sector(
                ax in -20.0f64..30.0,
                ay in -20.0f64..30.0,
                bx in -20.0f64..30.0,
                by in -20.0f64..30.0,
            ) {
                let (a, b) = (Coord::new(ax, ay), Coord::new(bx, by));
                let sector = unit();
                if let Some((enter, leave)) = clip_segment(a, b, &sector) {
                    prop_assert!(enter.t <= leave.t);
                    for crossing in [enter, leave] {
                        let p = point_at(a, b, crossing, &sector);
                        prop_assert!(sector.contains(p.y, p.x), "{:?} outside", p);
                        if crossing.edge.is_some() {
                            prop_assert!(on_boundary(p, &sector));
                        }
                    }
                }
            }
        }
    }
}
