//! Tile sampling from a source dataset.
//!
//! Geographic sources are read directly through the affine geotransform.
//! Projected sources are first warped into an in-memory geographic dataset
//! at the target sector and size, then read the same way.

use tracing::{debug, trace};

use super::dataset::RasterDataset;
use super::reproject::warp;
use super::types::{DataRect, RasterTile, SampleType};
use super::RasterError;
use crate::coord::Sector;

/// What to sample: target sector, pixel size, band selection and alpha.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleRequest {
    pub sector: Sector,
    pub width: u32,
    pub height: u32,
    /// Zero-based band to extract; all bands when `None`.
    pub band: Option<usize>,
    /// Append a synthetic alpha band built from source coverage.
    pub alpha: bool,
    /// Overrides the nodata value the source declares.
    pub nodata: Option<f64>,
}

impl SampleRequest {
    pub fn new(sector: Sector, width: u32, height: u32) -> Self {
        Self {
            sector,
            width,
            height,
            band: None,
            alpha: false,
            nodata: None,
        }
    }

    pub fn with_band(mut self, band: Option<usize>) -> Self {
        self.band = band;
        self
    }

    pub fn with_alpha(mut self, alpha: bool) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn with_nodata(mut self, nodata: Option<f64>) -> Self {
        self.nodata = nodata;
        self
    }
}

/// Nearest-neighbour tile sampler.
pub struct RasterSampler;

impl RasterSampler {
    /// Samples `request.sector` from `dataset` into a new tile.
    ///
    /// Pixels the source does not cover (outside its extent, or equal to its
    /// nodata value on every band) are left uncovered; callers fill them with
    /// [`RasterTile::fill_outside`].
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` for zero-sized requests, sources without bands or
    ///   an out-of-range band selection
    /// - `UnsupportedRaster` when the selected bands differ in data type
    /// - `Read` / `Reprojection` when the source cannot be read or warped
    pub fn sample(
        dataset: &mut dyn RasterDataset,
        request: &SampleRequest,
    ) -> Result<RasterTile, RasterError> {
        let (width, height) = (request.width, request.height);
        if width == 0 || height == 0 {
            return Err(RasterError::InvalidArgument(format!(
                "tile size {}x{} is empty",
                width, height
            )));
        }

        let band_count = dataset.band_count();
        if band_count == 0 {
            return Err(RasterError::InvalidArgument(
                "source has no bands".to_string(),
            ));
        }
        let bands: Vec<usize> = match request.band {
            Some(b) if b < band_count => vec![b],
            Some(b) => {
                return Err(RasterError::InvalidArgument(format!(
                    "band {} out of range ({} bands)",
                    b, band_count
                )))
            }
            None => (0..band_count).collect(),
        };

        let sample_type = dataset.band_type(bands[0]);
        if bands.iter().any(|&b| dataset.band_type(b) != sample_type) {
            return Err(RasterError::UnsupportedRaster(
                "bands have mixed data types".to_string(),
            ));
        }

        let nodata = request.nodata.or_else(|| dataset.nodata());
        let palette = dataset.palette().cloned();

        let mut tile = if dataset.crs().is_geographic() {
            read_geographic(dataset, &bands, &request.sector, width, height, sample_type)?
        } else {
            debug!(
                crs = %dataset.crs(),
                sector = %request.sector,
                "Reprojecting source into geographic tile"
            );
            let warped = warp(dataset, &bands, &request.sector, width, height)?;
            let mut target = warped.dataset;
            let all: Vec<usize> = (0..bands.len()).collect();
            let mut tile =
                read_geographic(&mut target, &all, &request.sector, width, height, sample_type)?;
            let rect = mask_bounds(&warped.mask, width, height);
            tile.set_coverage(rect, Some(warped.mask));
            tile
        };

        if let Some(nodata) = nodata {
            mask_nodata(&mut tile, nodata);
        }
        tile.set_palette(palette);

        trace!(
            sector = %request.sector,
            data_rect = ?tile.data_rect(),
            "Sampled tile"
        );

        if request.alpha {
            tile = tile.with_alpha_band();
        }
        Ok(tile)
    }
}

/// Reads a geographic dataset into a tile covering `sector`.
fn read_geographic(
    dataset: &mut dyn RasterDataset,
    bands: &[usize],
    sector: &Sector,
    width: u32,
    height: u32,
    sample_type: SampleType,
) -> Result<RasterTile, RasterError> {
    let gt = dataset.geo_transform();
    let inverse = gt.invert().ok_or_else(|| {
        RasterError::InvalidArgument("source geotransform is not invertible".to_string())
    })?;
    let mut tile = RasterTile::new(width, height, bands.len(), sample_type);
    let (src_w, src_h) = (dataset.width(), dataset.height());
    let dlon = sector.delta_lon() / width as f64;
    let dlat = sector.delta_lat() / height as f64;

    if !gt.is_north_up() {
        return read_rotated(dataset, bands, sector, tile, &inverse);
    }

    // Source column for every destination column, and row for every row.
    let cols: Vec<Option<u32>> = (0..width)
        .map(|dx| {
            let lon = sector.min_lon + (dx as f64 + 0.5) * dlon;
            to_index(inverse.apply(lon, sector.max_lat).0, src_w)
        })
        .collect();
    let rows: Vec<Option<u32>> = (0..height)
        .map(|dy| {
            let lat = sector.max_lat - (dy as f64 + 0.5) * dlat;
            to_index(inverse.apply(sector.min_lon, lat).1, src_h)
        })
        .collect();

    let (Some(rect_x), Some(rect_y)) = (covered_span(&cols), covered_span(&rows)) else {
        return Ok(tile);
    };
    let rect = DataRect {
        x: rect_x.0,
        y: rect_y.0,
        width: rect_x.1 - rect_x.0 + 1,
        height: rect_y.1 - rect_y.0 + 1,
    };

    let x0 = cols.iter().flatten().copied().min().unwrap_or(0);
    let x1 = cols.iter().flatten().copied().max().unwrap_or(0);
    let span = x1 - x0 + 1;

    for dy in rect.y..rect.y + rect.height {
        let Some(sy) = rows[dy as usize] else {
            continue;
        };
        for (i, &band) in bands.iter().enumerate() {
            let line = dataset.read_window(band, x0, sy, span, 1)?;
            for dx in rect.x..rect.x + rect.width {
                if let Some(sx) = cols[dx as usize] {
                    tile.set(dx, dy, i, line[(sx - x0) as usize]);
                }
            }
        }
    }

    tile.set_coverage(Some(rect), None);
    Ok(tile)
}

/// Per-pixel read for sources with rotation or shear terms.
fn read_rotated(
    dataset: &mut dyn RasterDataset,
    bands: &[usize],
    sector: &Sector,
    mut tile: RasterTile,
    inverse: &super::GeoTransform,
) -> Result<RasterTile, RasterError> {
    let (width, height) = (tile.width(), tile.height());
    let (src_w, src_h) = (dataset.width(), dataset.height());
    let dlon = sector.delta_lon() / width as f64;
    let dlat = sector.delta_lat() / height as f64;
    let mut mask = vec![false; width as usize * height as usize];

    for dy in 0..height {
        let lat = sector.max_lat - (dy as f64 + 0.5) * dlat;
        for dx in 0..width {
            let lon = sector.min_lon + (dx as f64 + 0.5) * dlon;
            let (px, py) = inverse.apply(lon, lat);
            let (Some(sx), Some(sy)) = (to_index(px, src_w), to_index(py, src_h)) else {
                continue;
            };
            for (i, &band) in bands.iter().enumerate() {
                let value = dataset.read_sample(band, sx, sy)?;
                tile.set(dx, dy, i, value);
            }
            mask[(dy * width + dx) as usize] = true;
        }
    }

    let rect = mask_bounds(&mask, width, height);
    tile.set_coverage(rect, Some(mask));
    Ok(tile)
}

#[inline]
fn to_index(p: f64, len: u32) -> Option<u32> {
    if p >= 0.0 && p < len as f64 {
        Some(p.floor() as u32)
    } else {
        None
    }
}

/// First and last index holding a value.
fn covered_span(indices: &[Option<u32>]) -> Option<(u32, u32)> {
    let first = indices.iter().position(Option::is_some)?;
    let last = indices.iter().rposition(Option::is_some)?;
    Some((first as u32, last as u32))
}

/// Bounding rectangle of the set flags in a row-major mask.
fn mask_bounds(mask: &[bool], width: u32, height: u32) -> Option<DataRect> {
    let mut min_x = u32::MAX;
    let mut min_y = u32::MAX;
    let mut max_x = 0;
    let mut max_y = 0;
    let mut any = false;
    for y in 0..height {
        for x in 0..width {
            if mask[(y * width + x) as usize] {
                any = true;
                min_x = min_x.min(x);
                min_y = min_y.min(y);
                max_x = max_x.max(x);
                max_y = max_y.max(y);
            }
        }
    }
    any.then(|| DataRect {
        x: min_x,
        y: min_y,
        width: max_x - min_x + 1,
        height: max_y - min_y + 1,
    })
}

/// Marks pixels whose every band equals `nodata` as uncovered.
fn mask_nodata(tile: &mut RasterTile, nodata: f64) {
    let (width, height) = (tile.width(), tile.height());
    let mut mask = Vec::with_capacity(width as usize * height as usize);
    for y in 0..height {
        for x in 0..width {
            let covered =
                tile.is_covered(x, y) && !(0..tile.bands()).all(|b| tile.get(x, y, b) == nodata);
            mask.push(covered);
        }
    }
    let rect = mask_bounds(&mask, width, height);
    tile.set_coverage(rect, Some(mask));
}
