//! Feature geometry resolved at ingestion.
//!
//! Coordinates are `x` = longitude, `y` = latitude, in degrees. Rings are
//! closed and oriented so the polygon interior is always to the right of
//! travel: outer rings clockwise, holes counter-clockwise.

use std::sync::Arc;

use shapefile::dbase::FieldValue;

use crate::coord::Sector;

/// A longitude/latitude position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coord {
    pub x: f64,
    pub y: f64,
}

impl Coord {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Exact equality or within `eps` on both axes.
    pub fn near(&self, other: &Coord, eps: f64) -> bool {
        (self.x - other.x).abs() <= eps && (self.y - other.y).abs() <= eps
    }
}

/// Whether a ring bounds the polygon or cuts a hole into it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RingRole {
    Outer,
    Hole,
}

/// A closed, oriented polygon ring.
#[derive(Debug, Clone, PartialEq)]
pub struct Ring {
    points: Vec<Coord>,
    role: RingRole,
}

impl Ring {
    /// Closes, de-duplicates and orients `points`.
    ///
    /// Returns `None` when fewer than three distinct vertices remain.
    pub fn new(points: Vec<Coord>, role: RingRole) -> Option<Self> {
        let mut points = dedup(points);
        if points.len() > 1 && points.first() == points.last() {
            points.pop();
        }
        if points.len() < 3 {
            return None;
        }
        if let Some(&first) = points.first() {
            points.push(first);
        }
        let area = signed_area(&points);
        if area == 0.0 {
            return None;
        }
        let clockwise = area < 0.0;
        if clockwise != (role == RingRole::Outer) {
            points.reverse();
        }
        Some(Self { points, role })
    }

    /// Vertices, first repeated as last.
    pub fn points(&self) -> &[Coord] {
        &self.points
    }

    pub fn role(&self) -> RingRole {
        self.role
    }
}

/// Ordered attribute snapshot of one source feature.
///
/// Cloning shares the snapshot; every fragment of a feature points at the
/// same field list.
#[derive(Debug, Clone, Default)]
pub struct Attributes(Arc<Vec<(String, FieldValue)>>);

impl Attributes {
    pub fn new(fields: Vec<(String, FieldValue)>) -> Self {
        Self(Arc::new(fields))
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, FieldValue)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether both handles share one snapshot.
    pub fn ptr_eq(&self, other: &Attributes) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Geometry of one feature, tagged at ingestion.
#[derive(Debug, Clone, PartialEq)]
pub enum ShapeKind {
    Polygon(Vec<Ring>),
    Line(Vec<Vec<Coord>>),
    Point(Coord),
    MultiPoint(Vec<Coord>),
}

impl ShapeKind {
    fn coords(&self) -> Box<dyn Iterator<Item = &Coord> + '_> {
        match self {
            ShapeKind::Polygon(rings) => Box::new(rings.iter().flat_map(|r| r.points().iter())),
            ShapeKind::Line(parts) => Box::new(parts.iter().flatten()),
            ShapeKind::Point(p) => Box::new(std::iter::once(p)),
            ShapeKind::MultiPoint(points) => Box::new(points.iter()),
        }
    }
}

/// One source feature.
#[derive(Debug, Clone)]
pub struct Feature {
    /// Zero-based record number in the source.
    pub id: usize,
    pub kind: ShapeKind,
    pub attributes: Attributes,
}

impl Feature {
    /// Bounding box, or `None` for empty geometry.
    pub fn bounds(&self) -> Option<Sector> {
        let mut coords = self.kind.coords();
        let first = coords.next()?;
        let mut b = Sector {
            min_lat: first.y,
            min_lon: first.x,
            max_lat: first.y,
            max_lon: first.x,
        };
        for c in coords {
            b.min_lat = b.min_lat.min(c.y);
            b.max_lat = b.max_lat.max(c.y);
            b.min_lon = b.min_lon.min(c.x);
            b.max_lon = b.max_lon.max(c.x);
        }
        Some(b)
    }
}

/// Removes consecutive duplicate points.
pub fn dedup(mut points: Vec<Coord>) -> Vec<Coord> {
    points.dedup();
    points
}

/// Shoelace area; positive for counter-clockwise rings.
pub fn signed_area(points: &[Coord]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let mut sum = 0.0;
    for w in points.windows(2) {
        sum += w[0].x * w[1].y - w[1].x * w[0].y;
    }
    let (first, last) = (points[0], points[points.len() - 1]);
    if first != last {
        sum += last.x * first.y - first.x * last.y;
    }
    sum / 2.0
}

/// Even-odd point-in-polygon test against a closed ring.
pub fn point_in_ring(p: Coord, ring: &[Coord]) -> bool {
    let mut inside = false;
    for w in ring.windows(2) {
        let (a, b) = (w[0], w[1]);
        if (a.y > p.y) != (b.y > p.y) {
            let x = a.x + (p.y - a.y) / (b.y - a.y) * (b.x - a.x);
            if p.x < x {
                inside = !inside;
            }
        }
    }
    inside
}

/// Longitudes where a closed ring crosses the parallel `lat`.
///
/// Uses the half-open rule, so a vertex on the parallel counts once.
pub fn ring_crossings(ring: &[Coord], lat: f64, out: &mut Vec<f64>) {
    for w in ring.windows(2) {
        let (a, b) = (w[0], w[1]);
        if (a.y > lat) != (b.y > lat) {
            out.push(a.x + (lat - a.y) / (b.y - a.y) * (b.x - a.x));
        }
    }
}
