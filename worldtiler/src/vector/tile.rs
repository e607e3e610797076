//! Per-tile accumulator for clipped features.

use crate::coord::{Sector, TileAddress};

use super::geometry::Attributes;
use super::record::TileRecord;

/// Everything one tile received during a clipping pass.
#[derive(Debug, Clone)]
pub struct ShapefileTile {
    address: TileAddress,
    sector: Sector,
    records: Vec<TileRecord>,
}

/// Records of one source feature inside a tile.
#[derive(Debug)]
pub struct TileFeature<'a> {
    pub shape_id: usize,
    pub attributes: &'a Attributes,
    pub records: Vec<&'a TileRecord>,
}

impl ShapefileTile {
    pub fn new(address: TileAddress, sector: Sector) -> Self {
        Self {
            address,
            sector,
            records: Vec::new(),
        }
    }

    pub fn address(&self) -> TileAddress {
        self.address
    }

    pub fn sector(&self) -> &Sector {
        &self.sector
    }

    /// Adds the finished records of one feature.
    pub fn extend(&mut self, records: impl IntoIterator<Item = TileRecord>) {
        self.records.extend(records);
    }

    pub fn records(&self) -> &[TileRecord] {
        &self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records grouped by source feature, in the order features arrived.
    pub fn features(&self) -> Vec<TileFeature<'_>> {
        let mut features: Vec<TileFeature<'_>> = Vec::new();
        for record in &self.records {
            match features.last_mut() {
                Some(f) if f.shape_id == record.shape_id => f.records.push(record),
                _ => features.push(TileFeature {
                    shape_id: record.shape_id,
                    attributes: &record.attributes,
                    records: vec![record],
                }),
            }
        }
        features
    }
}
