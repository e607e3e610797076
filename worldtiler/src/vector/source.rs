//! Shapefile input.
//!
//! Features are read once, converted into [`ShapeKind`] geometry with
//! normalised rings, and reused for every requested level.

use std::fs;
use std::path::{Path, PathBuf};

use shapefile::dbase::{self, FieldValue};
use shapefile::{PolygonRing, Shape};
use tracing::{debug, info, warn};

use super::geometry::{Attributes, Coord, Feature, Ring, RingRole, ShapeKind};
use super::VectorError;

/// Name dbase gives the record deletion marker column.
const DELETION_FLAG: &str = "DeletionFlag";

/// Geometry family shared by every feature of a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Polygon,
    Line,
    Point,
    MultiPoint,
}

impl SourceKind {
    fn of(kind: &ShapeKind) -> Self {
        match kind {
            ShapeKind::Polygon(_) => SourceKind::Polygon,
            ShapeKind::Line(_) => SourceKind::Line,
            ShapeKind::Point(_) => SourceKind::Point,
            ShapeKind::MultiPoint(_) => SourceKind::MultiPoint,
        }
    }
}

/// An opened shapefile in geographic coordinates.
#[derive(Debug)]
pub struct ShapefileSource {
    path: PathBuf,
    dbf_path: PathBuf,
    kind: Option<SourceKind>,
    field_names: Vec<String>,
    features: Vec<Feature>,
}

macro_rules! coords {
    ($points:expr) => {
        $points.iter().map(|p| Coord::new(p.x, p.y)).collect::<Vec<_>>()
    };
}

macro_rules! polygon_rings {
    ($polygon:expr) => {
        $polygon
            .rings()
            .iter()
            .filter_map(|ring| {
                let role = match ring {
                    PolygonRing::Outer(_) => RingRole::Outer,
                    PolygonRing::Inner(_) => RingRole::Hole,
                };
                Ring::new(coords!(ring.points()), role)
            })
            .collect::<Vec<_>>()
    };
}

impl ShapefileSource {
    /// Reads every feature of the shapefile at `path`.
    ///
    /// Fails when the file cannot be read, a record is corrupt, or the data
    /// is not in geographic coordinates.
    pub fn open(path: &Path) -> Result<Self, VectorError> {
        check_projection(path)?;

        let source_err = |reason: String| VectorError::Source {
            path: path.to_path_buf(),
            reason,
        };

        let dbf_path = path.with_extension("dbf");
        let field_names = read_field_names(&dbf_path)?;

        let mut reader = shapefile::Reader::from_path(path).map_err(|e| source_err(e.to_string()))?;

        let mut features = Vec::new();
        let mut kind = None;
        for (id, result) in reader.iter_shapes_and_records().enumerate() {
            let (shape, record) = result.map_err(|e| source_err(format!("record {}: {}", id, e)))?;
            let Some(geometry) = convert(shape).map_err(|reason| source_err(format!("record {}: {}", id, reason)))?
            else {
                debug!(shape_id = id, "Skipping null shape");
                continue;
            };

            let this_kind = SourceKind::of(&geometry);
            match kind {
                None => kind = Some(this_kind),
                Some(k) if k != this_kind => {
                    return Err(source_err(format!(
                        "record {} is {:?}, expected {:?}",
                        id, this_kind, k
                    )))
                }
                Some(_) => {}
            }

            let attributes = Attributes::new(
                field_names
                    .iter()
                    .map(|name| {
                        let value = record.get(name).cloned().unwrap_or(FieldValue::Character(None));
                        (name.clone(), value)
                    })
                    .collect(),
            );

            let feature = Feature {
                id,
                kind: geometry,
                attributes,
            };
            check_geographic_range(path, &feature)?;
            features.push(feature);
        }

        info!(
            path = %path.display(),
            features = features.len(),
            fields = field_names.len(),
            "Shapefile loaded"
        );

        Ok(Self {
            path: path.to_path_buf(),
            dbf_path,
            kind,
            field_names,
            features,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Attribute table whose layout output tiles copy.
    pub fn dbf_path(&self) -> &Path {
        &self.dbf_path
    }

    /// `None` when the source holds no features.
    pub fn kind(&self) -> Option<SourceKind> {
        self.kind
    }

    pub fn field_names(&self) -> &[String] {
        &self.field_names
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }
}

fn convert(shape: Shape) -> Result<Option<ShapeKind>, String> {
    let kind = match shape {
        Shape::NullShape => return Ok(None),
        Shape::Point(p) => ShapeKind::Point(Coord::new(p.x, p.y)),
        Shape::PointM(p) => ShapeKind::Point(Coord::new(p.x, p.y)),
        Shape::PointZ(p) => ShapeKind::Point(Coord::new(p.x, p.y)),
        Shape::Multipoint(m) => ShapeKind::MultiPoint(coords!(m.points())),
        Shape::MultipointM(m) => ShapeKind::MultiPoint(coords!(m.points())),
        Shape::MultipointZ(m) => ShapeKind::MultiPoint(coords!(m.points())),
        Shape::Polyline(l) => ShapeKind::Line(l.parts().iter().map(|part| coords!(part)).collect()),
        Shape::PolylineM(l) => ShapeKind::Line(l.parts().iter().map(|part| coords!(part)).collect()),
        Shape::PolylineZ(l) => ShapeKind::Line(l.parts().iter().map(|part| coords!(part)).collect()),
        Shape::Polygon(p) => ShapeKind::Polygon(polygon_rings!(p)),
        Shape::PolygonM(p) => ShapeKind::Polygon(polygon_rings!(p)),
        Shape::PolygonZ(p) => ShapeKind::Polygon(polygon_rings!(p)),
        Shape::Multipatch(_) => return Err("multipatch shapes are not supported".to_string()),
    };
    Ok(Some(kind))
}

fn read_field_names(dbf_path: &Path) -> Result<Vec<String>, VectorError> {
    let reader = dbase::Reader::from_path(dbf_path).map_err(|e| VectorError::Source {
        path: dbf_path.to_path_buf(),
        reason: e.to_string(),
    })?;
    Ok(reader
        .fields()
        .iter()
        .map(|f| f.name().to_string())
        .filter(|name| name != DELETION_FLAG)
        .collect())
}

/// Rejects projected sources. A missing `.prj` is assumed geographic.
fn check_projection(path: &Path) -> Result<(), VectorError> {
    let prj = path.with_extension("prj");
    let wkt = match fs::read_to_string(&prj) {
        Ok(wkt) => wkt,
        Err(_) => {
            warn!(path = %path.display(), "No .prj file, assuming geographic WGS84");
            return Ok(());
        }
    };
    let wkt = wkt.trim_start();
    if wkt.starts_with("PROJCS") {
        return Err(VectorError::Projection {
            path: path.to_path_buf(),
            reason: "projected coordinate system".to_string(),
        });
    }
    if !wkt.starts_with("GEOGCS") {
        warn!(path = %prj.display(), "Unrecognised .prj contents, assuming geographic");
    }
    Ok(())
}

fn check_geographic_range(path: &Path, feature: &Feature) -> Result<(), VectorError> {
    let Some(b) = feature.bounds() else {
        return Ok(());
    };
    let finite = [b.min_lat, b.min_lon, b.max_lat, b.max_lon].iter().all(|v| v.is_finite());
    if !finite || b.min_lon < -180.0 || b.max_lon > 180.0 || b.min_lat < -90.0 || b.max_lat > 90.0 {
        return Err(VectorError::Projection {
            path: path.to_path_buf(),
            reason: format!("feature {} has coordinates outside the geographic range", feature.id),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_projected_prj_rejected() {
        let dir = TempDir::new().unwrap();
        let shp = dir.path().join("roads.shp");
        fs::write(dir.path().join("roads.prj"), "PROJCS[\"WGS 84 / UTM zone 33N\"]").unwrap();
        let err = ShapefileSource::open(&shp).unwrap_err();
        assert!(matches!(err, VectorError::Projection { .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_missing_source_is_fatal() {
        let dir = TempDir::new().unwrap();
        let err = ShapefileSource::open(&dir.path().join("absent.shp")).unwrap_err();
        assert!(matches!(err, VectorError::Source { .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_convert_polygon_normalises_rings() {
        let polygon = shapefile::Polygon::new(PolygonRing::Outer(vec![
            shapefile::Point::new(0.0, 0.0),
            shapefile::Point::new(0.0, 1.0),
            shapefile::Point::new(1.0, 1.0),
            shapefile::Point::new(1.0, 0.0),
            shapefile::Point::new(0.0, 0.0),
        ]));
        let kind = convert(Shape::Polygon(polygon)).unwrap().unwrap();
        let ShapeKind::Polygon(rings) = kind else {
            panic!("expected polygon");
        };
        assert_eq!(rings.len(), 1);
        assert_eq!(rings[0].role(), RingRole::Outer);
    }

    #[test]
    fn test_convert_null_shape() {
        assert!(convert(Shape::NullShape).unwrap().is_none());
    }
}
