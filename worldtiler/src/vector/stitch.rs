//! Reconnects boundary-crossing ring fragments inside one tile.
//!
//! Polygon interiors lie to the right of travel, so the region of a tile
//! covered by a polygon is bounded by its fragments plus the stretches of
//! tile boundary walked clockwise from each exit point to the next entry
//! point.

use std::f64::consts::TAU;

use crate::coord::Sector;

use super::geometry::Coord;
use super::record::TileRecord;

const ANGLE_EPSILON: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Entry,
    Exit,
}

/// A fragment end on the tile boundary.
#[derive(Debug, Clone, Copy)]
struct EntryExitPoint {
    angle: f64,
    kind: Kind,
    fragment: usize,
}

/// Joins the fragment a ring ends in with the one it started in.
///
/// A ring that starts inside a tile and leaves it ends back in the same
/// tile; the trailing entered-not-exited fragment continues into the
/// leading exited-not-entered one.
pub fn join_orphans(records: Vec<TileRecord>) -> Vec<TileRecord> {
    let mut out: Vec<TileRecord> = Vec::with_capacity(records.len());
    let mut heads: Vec<TileRecord> = Vec::new();

    for record in records {
        if record.role.is_some() && !record.entered && record.exited {
            heads.push(record);
        } else {
            out.push(record);
        }
    }

    for head in heads {
        let tail = out.iter_mut().find(|r| {
            r.part == head.part && r.role.is_some() && r.entered && !r.exited && r.last() == head.first()
        });
        match tail {
            Some(tail) => {
                for &p in head.points.iter().skip(1) {
                    tail.push(p);
                }
                tail.exited = true;
            }
            None => out.push(head),
        }
    }

    out
}

/// Angle of `p` about the sector center, clockwise from north in `[0, 2π)`.
fn clockwise_angle(p: Coord, sector: &Sector) -> f64 {
    let (lat, lon) = sector.center();
    let a = (p.x - lon).atan2(p.y - lat);
    if a < 0.0 {
        a + TAU
    } else {
        a
    }
}

/// Sector corners in clockwise order starting from north-east.
fn corners(sector: &Sector) -> [(f64, Coord); 4] {
    sector.corners().map(|(lat, lon)| {
        let c = Coord::new(lon, lat);
        (clockwise_angle(c, sector), c)
    })
}

/// Corners passed walking clockwise from angle `from` to angle `to`.
fn corners_between(sector: &Sector, from: f64, to: f64) -> Vec<Coord> {
    let mut passed: Vec<(f64, Coord)> = corners(sector)
        .into_iter()
        .filter_map(|(angle, c)| {
            let mut offset = angle - from;
            if offset <= 0.0 {
                offset += TAU;
            }
            let mut span = to - from;
            if span < 0.0 {
                span += TAU;
            }
            (offset < span).then_some((offset, c))
        })
        .collect();
    passed.sort_by(|a, b| a.0.total_cmp(&b.0));
    passed.into_iter().map(|(_, c)| c).collect()
}

/// Closes boundary fragments of one tile into rings.
///
/// Every fragment must start and end on the sector boundary. Returns closed
/// rings, first point repeated as last, or a reason when the entry and exit
/// points cannot be paired.
pub fn stitch_boundary(sector: &Sector, fragments: &[Vec<Coord>]) -> Result<Vec<Vec<Coord>>, String> {
    if fragments.is_empty() {
        return Ok(Vec::new());
    }

    let mut events = Vec::with_capacity(fragments.len() * 2);
    for (i, fragment) in fragments.iter().enumerate() {
        let (Some(&first), Some(&last)) = (fragment.first(), fragment.last()) else {
            return Err(format!("fragment {} is empty", i));
        };
        events.push(EntryExitPoint {
            angle: clockwise_angle(first, sector),
            kind: Kind::Entry,
            fragment: i,
        });
        events.push(EntryExitPoint {
            angle: clockwise_angle(last, sector),
            kind: Kind::Exit,
            fragment: i,
        });
    }
    events.sort_by(|a, b| a.angle.total_cmp(&b.angle));
    enforce_alternation(&mut events);

    // next[f] = (fragment entered after f exits, exit angle, entry angle)
    let n = events.len();
    let mut next: Vec<Option<(usize, f64, f64)>> = vec![None; fragments.len()];
    for i in 0..n {
        let exit = events[i];
        if exit.kind != Kind::Exit {
            continue;
        }
        let entry = events[(i + 1) % n];
        if entry.kind != Kind::Entry {
            return Err(format!(
                "boundary points do not alternate at angle {:.6}",
                exit.angle
            ));
        }
        next[exit.fragment] = Some((entry.fragment, exit.angle, entry.angle));
    }

    let mut used = vec![false; fragments.len()];
    let mut rings = Vec::new();

    for start in 0..fragments.len() {
        if used[start] {
            continue;
        }
        let mut ring: Vec<Coord> = Vec::new();
        let mut current = start;
        let mut closed = false;

        for _ in 0..=fragments.len() {
            used[current] = true;
            extend(&mut ring, &fragments[current]);
            let Some((following, exit_angle, entry_angle)) = next[current] else {
                return Err(format!("fragment {} has no following entry point", current));
            };
            if (entry_angle - exit_angle).abs() > ANGLE_EPSILON {
                for corner in corners_between(sector, exit_angle, entry_angle) {
                    extend(&mut ring, &[corner]);
                }
            }
            if following == start {
                closed = true;
                break;
            }
            if used[following] {
                return Err(format!("fragment {} is reached twice", following));
            }
            current = following;
        }

        if !closed {
            return Err(format!("chain starting at fragment {} never closes", start));
        }
        if let Some(&first) = ring.first() {
            extend(&mut ring, &[first]);
        }
        rings.push(ring);
    }

    Ok(rings)
}

/// Swaps equal-angle neighbours so exits and entries alternate, following
/// whichever parity most exits already sit on.
fn enforce_alternation(events: &mut [EntryExitPoint]) {
    let even_exits = events
        .iter()
        .step_by(2)
        .filter(|e| e.kind == Kind::Exit)
        .count();
    let odd_exits = events
        .iter()
        .skip(1)
        .step_by(2)
        .filter(|e| e.kind == Kind::Exit)
        .count();
    let exit_parity = if even_exits >= odd_exits { 0 } else { 1 };

    for i in 0..events.len().saturating_sub(1) {
        let want = if i % 2 == exit_parity {
            Kind::Exit
        } else {
            Kind::Entry
        };
        if events[i].kind != want
            && events[i + 1].kind == want
            && (events[i + 1].angle - events[i].angle).abs() <= ANGLE_EPSILON
        {
            events.swap(i, i + 1);
        }
    }
}

fn extend(ring: &mut Vec<Coord>, points: &[Coord]) {
    for &p in points {
        if ring.last() != Some(&p) {
            ring.push(p);
        }
    }
}
