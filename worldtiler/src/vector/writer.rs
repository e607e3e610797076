//! Per-tile shapefile archives.
//!
//! Each tile becomes `{level}/{row}/{row}_{col}.tgz`, a gzip tar holding the
//! `.shp`, `.shx`, `.dbf` and `.prj` of that tile's features. The archive is
//! assembled in a staging directory inside the output root and renamed into
//! place, so a destination is either complete or absent.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;
use shapefile::dbase::{self, Record, TableWriterBuilder};
use shapefile::{Multipoint, Point, Polygon, PolygonRing, Polyline};

use crate::coord::{tile_path, TileAddress};
use crate::output::persist;

use super::geometry::Coord;
use super::source::SourceKind;
use super::tile::{ShapefileTile, TileFeature};
use super::VectorError;

/// Extension of vector tile archives.
pub const ARCHIVE_EXTENSION: &str = "tgz";

/// Coordinate system written next to every tile.
pub const WGS84_PRJ: &str = "GEOGCS[\"GCS_WGS_1984\",DATUM[\"D_WGS_1984\",SPHEROID[\"WGS_1984\",6378137.0,298.257223563]],PRIMEM[\"Greenwich\",0.0],UNIT[\"Degree\",0.0174532925199433]]";

const MEMBERS: [&str; 4] = ["shp", "shx", "dbf", "prj"];

/// Writes tile archives below an output root.
#[derive(Debug, Clone)]
pub struct ArchiveWriter {
    root: PathBuf,
    kind: SourceKind,
    dbf_template: PathBuf,
}

impl ArchiveWriter {
    /// `dbf_template` supplies the attribute table layout copied into every
    /// tile.
    pub fn new(root: impl Into<PathBuf>, kind: SourceKind, dbf_template: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            kind,
            dbf_template: dbf_template.into(),
        }
    }

    /// Destination archive for `tile`.
    pub fn destination(&self, tile: &TileAddress) -> PathBuf {
        tile_path(&self.root, tile, ARCHIVE_EXTENSION)
    }

    /// Writes `tile`. Returns `false` without touching anything when the
    /// destination already exists.
    pub fn write(&self, tile: &ShapefileTile) -> Result<bool, VectorError> {
        let address = tile.address();
        let dest = self.destination(&address);
        if dest.exists() {
            return Ok(false);
        }

        fs::create_dir_all(&self.root).map_err(|e| VectorError::io(&self.root, e))?;
        let staging = tempfile::Builder::new()
            .prefix(".staging-")
            .tempdir_in(&self.root)
            .map_err(|e| VectorError::io(&self.root, e))?;

        let stem = format!("{:04}_{:04}", address.row, address.col);
        let member = |ext: &str| staging.path().join(format!("{}.{}", stem, ext));

        self.write_shapefile(&member("shp"), tile)?;
        fs::write(member("prj"), WGS84_PRJ).map_err(|e| VectorError::io(member("prj"), e))?;

        let archive = member(ARCHIVE_EXTENSION);
        bundle(&archive, &stem, staging.path()).map_err(|e| VectorError::Write {
            tile: address,
            reason: e.to_string(),
        })?;
        persist(&archive, &dest).map_err(|e| VectorError::io(&dest, e))?;
        Ok(true)
    }

    fn write_shapefile(&self, shp: &Path, tile: &ShapefileTile) -> Result<(), VectorError> {
        let address = tile.address();
        let write_err = |reason: String| VectorError::Write {
            tile: address,
            reason,
        };

        let template = dbase::Reader::from_path(&self.dbf_template).map_err(|e| VectorError::Source {
            path: self.dbf_template.clone(),
            reason: e.to_string(),
        })?;
        let table = TableWriterBuilder::from_reader(template);
        let mut writer = shapefile::Writer::from_path(shp, table).map_err(|e| write_err(e.to_string()))?;

        for feature in tile.features() {
            let record = to_record(&feature);
            let result = match self.kind {
                SourceKind::Polygon => writer.write_shape_and_record(&polygon(&feature), &record),
                SourceKind::Line => writer.write_shape_and_record(&polyline(&feature), &record),
                SourceKind::Point => match feature.records.first().and_then(|r| r.points.first()) {
                    Some(p) => writer.write_shape_and_record(&Point::new(p.x, p.y), &record),
                    None => continue,
                },
                SourceKind::MultiPoint => writer.write_shape_and_record(&multipoint(&feature), &record),
            };
            result.map_err(|e| write_err(format!("shape {}: {}", feature.shape_id, e)))?;
        }
        // Dropping the writer finalises the headers.
        drop(writer);
        Ok(())
    }
}

fn points(coords: &[Coord]) -> Vec<Point> {
    coords.iter().map(|c| Point::new(c.x, c.y)).collect()
}

fn polygon(feature: &TileFeature<'_>) -> Polygon {
    let mut rings = Vec::new();
    for record in &feature.records {
        rings.push(PolygonRing::Outer(points(&record.points)));
        for hole in &record.holes {
            rings.push(PolygonRing::Inner(points(hole)));
        }
    }
    Polygon::with_rings(rings)
}

fn polyline(feature: &TileFeature<'_>) -> Polyline {
    Polyline::with_parts(feature.records.iter().map(|r| points(&r.points)).collect())
}

fn multipoint(feature: &TileFeature<'_>) -> Multipoint {
    Multipoint::new(feature.records.iter().flat_map(|r| points(&r.points)).collect())
}

fn to_record(feature: &TileFeature<'_>) -> Record {
    let mut record = Record::default();
    for (name, value) in feature.attributes.iter() {
        record.insert(name.clone(), value.clone());
    }
    record
}

/// Packs the shapefile members in `dir` into a gzip tar at `archive`.
fn bundle(archive: &Path, stem: &str, dir: &Path) -> io::Result<()> {
    let file = File::create(archive)?;
    let mut tar = tar::Builder::new(GzEncoder::new(file, Compression::default()));
    for ext in MEMBERS {
        let name = format!("{}.{}", stem, ext);
        tar.append_path_with_name(dir.join(&name), &name)?;
    }
    tar.into_inner()?.finish()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::Sector;
    use crate::vector::geometry::Attributes;
    use crate::vector::record::TileRecord;
    use tempfile::TempDir;

    #[test]
    fn test_destination_uses_tile_layout() {
        let writer = ArchiveWriter::new("/out", SourceKind::Line, "/src/roads.dbf");
        assert_eq!(
            writer.destination(&TileAddress::new(3, 12, 40)),
            PathBuf::from("/out/3/0012/0012_0040.tgz")
        );
    }

    #[test]
    fn test_existing_destination_skipped() {
        let dir = TempDir::new().unwrap();
        let writer = ArchiveWriter::new(dir.path(), SourceKind::Line, dir.path().join("missing.dbf"));
        let address = TileAddress::new(0, 2, 5);
        let dest = writer.destination(&address);
        fs::create_dir_all(dest.parent().unwrap()).unwrap();
        fs::write(&dest, b"existing").unwrap();

        let mut tile = ShapefileTile::new(address, Sector::new(-18.0, 0.0, 18.0, 36.0).unwrap());
        tile.extend(vec![TileRecord {
            shape_id: 0,
            part: 0,
            role: None,
            points: vec![Coord::new(0.0, 0.0), Coord::new(10.0, 0.0)],
            entered: true,
            exited: false,
            attributes: Attributes::default(),
            holes: Vec::new(),
        }]);

        assert!(!writer.write(&tile).unwrap());
        assert_eq!(fs::read(&dest).unwrap(), b"existing");
    }

    #[test]
    fn test_bundle_contains_members() {
        let dir = TempDir::new().unwrap();
        for ext in MEMBERS {
            fs::write(dir.path().join(format!("0001_0002.{}", ext)), ext.as_bytes()).unwrap();
        }
        let archive = dir.path().join("0001_0002.tgz");
        bundle(&archive, "0001_0002", dir.path()).unwrap();

        let file = File::open(&archive).unwrap();
        let mut tar = tar::Archive::new(flate2::read::GzDecoder::new(file));
        let mut names: Vec<String> = tar
            .entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(
            names,
            vec!["0001_0002.dbf", "0001_0002.prj", "0001_0002.shp", "0001_0002.shx"]
        );
    }
}
