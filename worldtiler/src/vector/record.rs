//! Per-tile fragments and the arena that builds them.
//!
//! The clipper streams a feature's vertices through [`FragmentArena`], which
//! keeps the open fragment of each `(tile, part)` pair in an index instead of
//! a single "current" slot. Each operation is a small, self-contained state
//! transition and can be exercised on its own.

use std::collections::{BTreeMap, HashMap};

use crate::coord::TileAddress;

use super::geometry::{Attributes, Coord, RingRole};

/// One clipped piece of a feature inside one tile.
#[derive(Debug, Clone)]
pub struct TileRecord {
    /// Source feature id.
    pub shape_id: usize,
    /// Index of the ring or line part within the feature.
    pub part: usize,
    /// Ring role for polygon parts, `None` for lines and points.
    pub role: Option<RingRole>,
    pub points: Vec<Coord>,
    /// Crossed into the tile across its boundary.
    pub entered: bool,
    /// Crossed out of the tile across its boundary.
    pub exited: bool,
    pub attributes: Attributes,
    /// Holes attached to a closed outer ring.
    pub holes: Vec<Vec<Coord>>,
}

impl TileRecord {
    /// Appends `p` unless it repeats the last point.
    pub fn push(&mut self, p: Coord) {
        if self.points.last() != Some(&p) {
            self.points.push(p);
        }
    }

    /// Neither entered nor exited: the part never left this tile.
    pub fn is_self_contained(&self) -> bool {
        !self.entered && !self.exited
    }

    /// Both ends lie on the tile boundary.
    pub fn is_boundary(&self) -> bool {
        self.entered && self.exited
    }

    pub fn first(&self) -> Option<Coord> {
        self.points.first().copied()
    }

    pub fn last(&self) -> Option<Coord> {
        self.points.last().copied()
    }
}

/// Fragment state for one feature, keyed by tile and part.
#[derive(Debug)]
pub struct FragmentArena {
    shape_id: usize,
    attributes: Attributes,
    part: usize,
    role: Option<RingRole>,
    records: BTreeMap<TileAddress, Vec<TileRecord>>,
    open: HashMap<(TileAddress, usize), usize>,
}

impl FragmentArena {
    pub fn new(shape_id: usize, attributes: Attributes) -> Self {
        Self {
            shape_id,
            attributes,
            part: 0,
            role: None,
            records: BTreeMap::new(),
            open: HashMap::new(),
        }
    }

    /// Starts streaming a new part; later operations are keyed by it.
    pub fn begin_part(&mut self, part: usize, role: Option<RingRole>) {
        self.part = part;
        self.role = role;
    }

    /// Appends `p` to the open fragment of `tile`, opening an un-entered
    /// fragment when none exists.
    pub fn continue_shape(&mut self, tile: TileAddress, p: Coord) {
        match self.open_record(tile) {
            Some(record) => record.push(p),
            None => {
                self.open_new(tile, p, false);
            }
        }
    }

    /// Opens a fragment in `tile` that starts at the boundary point `edge`.
    pub fn enter_shape(&mut self, tile: TileAddress, edge: Coord) {
        self.open_new(tile, edge, true);
    }

    /// Appends the boundary point `edge` to the open fragment of `tile` and
    /// closes it.
    pub fn exit_shape(&mut self, tile: TileAddress, edge: Coord) {
        let index = match self.open.remove(&(tile, self.part)) {
            Some(index) => index,
            None => {
                // Leaving a tile that was never entered: start at the edge.
                let index = self.open_new(tile, edge, true);
                self.open.remove(&(tile, self.part));
                index
            }
        };
        if let Some(record) = self
            .records
            .get_mut(&tile)
            .and_then(|records| records.get_mut(index))
        {
            record.push(edge);
            record.exited = true;
        }
    }

    /// Records a two-point pass through `tile`, entered and exited.
    pub fn cross_shape(&mut self, tile: TileAddress, from: Coord, to: Coord) {
        let mut record = self.new_record(from, true);
        record.push(to);
        record.exited = true;
        self.records.entry(tile).or_default().push(record);
    }

    /// Number of tiles holding at least one fragment.
    pub fn tile_count(&self) -> usize {
        self.records.len()
    }

    /// Finished fragments grouped by tile.
    pub fn into_records(self) -> BTreeMap<TileAddress, Vec<TileRecord>> {
        self.records
    }

    fn open_record(&mut self, tile: TileAddress) -> Option<&mut TileRecord> {
        let index = *self.open.get(&(tile, self.part))?;
        self.records.get_mut(&tile)?.get_mut(index)
    }

    fn open_new(&mut self, tile: TileAddress, p: Coord, entered: bool) -> usize {
        let record = self.new_record(p, entered);
        let records = self.records.entry(tile).or_default();
        records.push(record);
        let index = records.len() - 1;
        self.open.insert((tile, self.part), index);
        index
    }

    fn new_record(&self, p: Coord, entered: bool) -> TileRecord {
        TileRecord {
            shape_id: self.shape_id,
            part: self.part,
            role: self.role,
            points: vec![p],
            entered,
            exited: false,
            attributes: self.attributes.clone(),
            holes: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tile(col: u32) -> TileAddress {
        TileAddress::new(0, 2, col)
    }

    #[test]
    fn test_continue_opens_unentered_fragment() {
        let mut arena = FragmentArena::new(3, Attributes::default());
        arena.begin_part(0, None);
        arena.continue_shape(tile(4), Coord::new(-10.0, 0.0));
        arena.continue_shape(tile(4), Coord::new(-5.0, 0.0));
        arena.continue_shape(tile(4), Coord::new(-5.0, 0.0));

        let records = arena.into_records();
        let rec = &records[&tile(4)][0];
        assert_eq!(rec.shape_id, 3);
        assert_eq!(rec.points.len(), 2);
        assert!(rec.is_self_contained());
    }

    #[test]
    fn test_exit_then_enter() {
        let mut arena = FragmentArena::new(0, Attributes::default());
        arena.begin_part(0, None);
        arena.continue_shape(tile(4), Coord::new(-10.0, 0.0));
        arena.exit_shape(tile(4), Coord::new(0.0, 0.0));
        arena.enter_shape(tile(5), Coord::new(0.0, 0.0));
        arena.continue_shape(tile(5), Coord::new(10.0, 0.0));

        let records = arena.into_records();
        let west = &records[&tile(4)][0];
        let east = &records[&tile(5)][0];
        assert!(!west.entered && west.exited);
        assert!(east.entered && !east.exited);
        assert_eq!(west.last(), east.first());
    }

    #[test]
    fn test_reentry_opens_second_fragment() {
        let mut arena = FragmentArena::new(0, Attributes::default());
        arena.begin_part(0, Some(RingRole::Outer));
        arena.continue_shape(tile(4), Coord::new(-10.0, 0.0));
        arena.exit_shape(tile(4), Coord::new(0.0, 0.0));
        arena.enter_shape(tile(4), Coord::new(0.0, 5.0));
        arena.continue_shape(tile(4), Coord::new(-10.0, 5.0));

        let records = arena.into_records();
        assert_eq!(records[&tile(4)].len(), 2);
        assert_eq!(records[&tile(4)][1].role, Some(RingRole::Outer));
    }

    #[test]
    fn test_parts_are_keyed_separately() {
        let mut arena = FragmentArena::new(0, Attributes::default());
        arena.begin_part(0, None);
        arena.continue_shape(tile(4), Coord::new(-10.0, 0.0));
        arena.begin_part(1, None);
        arena.continue_shape(tile(4), Coord::new(-20.0, 0.0));

        let records = arena.into_records();
        assert_eq!(records[&tile(4)].len(), 2);
        assert_eq!(records[&tile(4)][1].part, 1);
    }

    #[test]
    fn test_cross_shape_is_entered_and_exited() {
        let mut arena = FragmentArena::new(0, Attributes::default());
        arena.cross_shape(tile(6), Coord::new(0.0, 1.0), Coord::new(36.0, 2.0));
        assert_eq!(arena.tile_count(), 1);
        let records = arena.into_records();
        assert!(records[&tile(6)][0].is_boundary());
    }
}
