//! CRS transformation and nearest-neighbour warping via `proj4rs`.

use proj4rs::proj::Proj;
use proj4rs::transform::transform;

use super::dataset::{Crs, GeoTransform, MemoryDataset, RasterDataset};
use super::RasterError;
use crate::coord::{Sector, MAX_LAT, MAX_LON, MIN_LAT, MIN_LON};

const WGS84: &str = "+proj=longlat +datum=WGS84 +no_defs";
const WEB_MERCATOR: &str =
    "+proj=merc +a=6378137 +b=6378137 +lat_ts=0 +lon_0=0 +x_0=0 +y_0=0 +k=1 +units=m +no_defs";

/// Points sampled along each dataset edge when computing bounds.
const EDGE_SAMPLES: u32 = 32;

/// Transforms between WGS84 degrees and a dataset's CRS.
pub struct CrsTransformer {
    geographic: Proj,
    source: Proj,
    source_is_latlong: bool,
}

impl std::fmt::Debug for CrsTransformer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrsTransformer")
            .field("source_is_latlong", &self.source_is_latlong)
            .finish()
    }
}

impl CrsTransformer {
    /// Builds a transformer for `crs`.
    ///
    /// EPSG codes are resolved through the bundled CRS definitions.
    pub fn new(crs: &Crs) -> Result<Self, RasterError> {
        let definition = match crs {
            Crs::Geographic => WGS84.to_string(),
            Crs::Epsg(code) => proj_string_for_epsg(*code)
                .ok_or_else(|| RasterError::Reprojection(format!("EPSG:{} not supported", code)))?,
            Crs::Proj(s) if s.trim().is_empty() => {
                return Err(RasterError::Reprojection(
                    "source CRS is undefined".to_string(),
                ))
            }
            Crs::Proj(s) => s.clone(),
        };
        let source = Proj::from_proj_string(&definition)
            .map_err(|e| RasterError::Reprojection(format!("invalid projection '{}': {:?}", definition, e)))?;
        let geographic = Proj::from_proj_string(WGS84)
            .map_err(|e| RasterError::Reprojection(format!("invalid WGS84 definition: {:?}", e)))?;
        let source_is_latlong =
            definition.contains("+proj=longlat") || definition.contains("+proj=latlong");
        Ok(Self {
            geographic,
            source,
            source_is_latlong,
        })
    }

    /// WGS84 `(lon, lat)` degrees to source coordinates.
    pub fn to_source(&self, lon: f64, lat: f64) -> Result<(f64, f64), RasterError> {
        let mut point = (lon.to_radians(), lat.to_radians(), 0.0);
        transform(&self.geographic, &self.source, &mut point)
            .map_err(|e| RasterError::Reprojection(format!("({}, {}): {:?}", lon, lat, e)))?;
        if self.source_is_latlong {
            Ok((point.0.to_degrees(), point.1.to_degrees()))
        } else {
            Ok((point.0, point.1))
        }
    }

    /// Source coordinates to WGS84 `(lon, lat)` degrees.
    pub fn to_geographic(&self, x: f64, y: f64) -> Result<(f64, f64), RasterError> {
        let mut point = if self.source_is_latlong {
            (x.to_radians(), y.to_radians(), 0.0)
        } else {
            (x, y, 0.0)
        };
        transform(&self.source, &self.geographic, &mut point)
            .map_err(|e| RasterError::Reprojection(format!("({}, {}): {:?}", x, y, e)))?;
        Ok((point.0.to_degrees(), point.1.to_degrees()))
    }
}

/// Proj definition for an EPSG code.
///
/// Web Mercator is pinned to its spherical form; everything else comes from
/// the bundled definitions table.
fn proj_string_for_epsg(code: u16) -> Option<String> {
    match code {
        4326 => Some(WGS84.to_string()),
        3857 => Some(WEB_MERCATOR.to_string()),
        _ => crs_definitions::from_code(code).map(|def| def.proj4.to_string()),
    }
}

/// Geographic bounding box of a dataset, clamped to the globe.
///
/// Projected datasets are bounded by sampling points along every edge, so
/// curved edges are followed.
pub fn dataset_bounds(dataset: &dyn RasterDataset) -> Result<Sector, RasterError> {
    let gt = dataset.geo_transform();
    let (w, h) = (dataset.width() as f64, dataset.height() as f64);
    let transformer = if dataset.crs().is_geographic() {
        None
    } else {
        Some(CrsTransformer::new(dataset.crs())?)
    };

    let mut min_lat = f64::INFINITY;
    let mut min_lon = f64::INFINITY;
    let mut max_lat = f64::NEG_INFINITY;
    let mut max_lon = f64::NEG_INFINITY;
    for i in 0..=EDGE_SAMPLES {
        let t = i as f64 / EDGE_SAMPLES as f64;
        for (px, py) in [(t * w, 0.0), (t * w, h), (0.0, t * h), (w, t * h)] {
            let (x, y) = gt.apply(px, py);
            let (lon, lat) = match &transformer {
                Some(tr) => match tr.to_geographic(x, y) {
                    Ok(p) => p,
                    Err(_) => continue,
                },
                None => (x, y),
            };
            if !lon.is_finite() || !lat.is_finite() {
                continue;
            }
            min_lat = min_lat.min(lat);
            max_lat = max_lat.max(lat);
            min_lon = min_lon.min(lon);
            max_lon = max_lon.max(lon);
        }
    }

    if !min_lat.is_finite() || !min_lon.is_finite() {
        return Err(RasterError::Reprojection(
            "no dataset edge point could be transformed".to_string(),
        ));
    }
    Sector::new(
        min_lat.max(MIN_LAT),
        min_lon.max(MIN_LON),
        max_lat.min(MAX_LAT),
        max_lon.min(MAX_LON),
    )
    .map_err(|e| RasterError::InvalidArgument(e.to_string()))
}

/// Result of warping a projected source onto a geographic grid.
#[derive(Debug)]
pub(crate) struct WarpedTile {
    pub dataset: MemoryDataset,
    /// One flag per destination pixel: true where a source pixel was found.
    pub mask: Vec<bool>,
}

/// Reprojects `bands` of `source` into an in-memory geographic dataset
/// covering `sector` at `width` x `height`, nearest-neighbour.
pub(crate) fn warp(
    source: &mut dyn RasterDataset,
    bands: &[usize],
    sector: &Sector,
    width: u32,
    height: u32,
) -> Result<WarpedTile, RasterError> {
    let transformer = CrsTransformer::new(source.crs())?;
    let inverse = source.geo_transform().invert().ok_or_else(|| {
        RasterError::InvalidArgument("source geotransform is not invertible".to_string())
    })?;
    let band_types: Vec<_> = bands.iter().map(|&b| source.band_type(b)).collect();
    let target_gt = GeoTransform::for_sector(sector, width, height);
    let mut target = MemoryDataset::new(width, height, &band_types, target_gt, Crs::Geographic);
    let mut mask = vec![false; width as usize * height as usize];
    let (src_w, src_h) = (source.width() as f64, source.height() as f64);

    for dy in 0..height {
        for dx in 0..width {
            let (lon, lat) = target_gt.apply(dx as f64 + 0.5, dy as f64 + 0.5);
            let Ok((x, y)) = transformer.to_source(lon, lat) else {
                continue;
            };
            let (px, py) = inverse.apply(x, y);
            if !(px >= 0.0 && py >= 0.0 && px < src_w && py < src_h) {
                continue;
            }
            let (sx, sy) = (px.floor() as u32, py.floor() as u32);
            for (i, &band) in bands.iter().enumerate() {
                let value = source.read_sample(band, sx, sy)?;
                target.set(i, dx, dy, value);
            }
            mask[(dy * width + dx) as usize] = true;
        }
    }

    Ok(WarpedTile {
        dataset: target,
        mask,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::SampleType;

    #[test]
    fn test_geographic_round_trip() {
        let tr = CrsTransformer::new(&Crs::Geographic).unwrap();
        let (x, y) = tr.to_source(12.5, -33.0).unwrap();
        assert!((x - 12.5).abs() < 1e-9);
        assert!((y + 33.0).abs() < 1e-9);
    }

    #[test]
    fn test_web_mercator_forward_and_back() {
        let tr = CrsTransformer::new(&Crs::Epsg(3857)).unwrap();
        let (x, y) = tr.to_source(0.0, 0.0).unwrap();
        assert!(x.abs() < 1e-6);
        assert!(y.abs() < 1e-6);

        let (x, _) = tr.to_source(180.0, 0.0).unwrap();
        assert!((x - 20_037_508.342789244).abs() < 1.0);

        let (lon, lat) = tr.to_geographic(1_000_000.0, 2_000_000.0).unwrap();
        let (bx, by) = tr.to_source(lon, lat).unwrap();
        assert!((bx - 1_000_000.0).abs() < 1e-3);
        assert!((by - 2_000_000.0).abs() < 1e-3);
    }

    #[test]
    fn test_undefined_crs_is_rejected() {
        assert!(matches!(
            CrsTransformer::new(&Crs::Proj(String::new())),
            Err(RasterError::Reprojection(_))
        ));
    }

    #[test]
    fn test_bounds_of_geographic_dataset() {
        let gt = GeoTransform::north_up(-10.0, 50.0, 0.5, 0.5);
        let ds = MemoryDataset::new(40, 20, &[SampleType::U8], gt, Crs::Geographic);
        let bounds = dataset_bounds(&ds).unwrap();
        assert_eq!(bounds, Sector::new(40.0, -10.0, 50.0, 10.0).unwrap());
    }

    #[test]
    fn test_bounds_of_mercator_dataset() {
        // 1000 km square centred on the origin
        let gt = GeoTransform::north_up(-500_000.0, 500_000.0, 10_000.0, 10_000.0);
        let ds = MemoryDataset::new(100, 100, &[SampleType::U8], gt, Crs::Epsg(3857));
        let bounds = dataset_bounds(&ds).unwrap();
        assert!((bounds.max_lon - 4.4916).abs() < 1e-3);
        assert!((bounds.min_lon + 4.4916).abs() < 1e-3);
        assert!(bounds.max_lat > 4.4 && bounds.max_lat < 4.5);
    }

    #[test]
    fn test_warp_marks_covered_pixels() {
        // mercator source covering lon/lat roughly [-4.49, 4.49]
        let gt = GeoTransform::north_up(-500_000.0, 500_000.0, 10_000.0, 10_000.0);
        let mut ds = MemoryDataset::new(100, 100, &[SampleType::U8], gt, Crs::Epsg(3857));
        ds.fill_band(0, |_, _| 7.0);
        let sector = Sector::new(0.0, 0.0, 10.0, 10.0).unwrap();
        let warped = warp(&mut ds, &[0], &sector, 10, 10).unwrap();

        // bottom-left pixel (lon 0.5, lat 0.5) is inside the source
        assert!(warped.mask[(9 * 10) as usize]);
        // top-right pixel (lon 9.5, lat 9.5) is outside
        assert!(!warped.mask[9]);
        let mut out = warped.dataset;
        assert_eq!(out.read_sample(0, 0, 9).unwrap(), 7.0);
    }
}
