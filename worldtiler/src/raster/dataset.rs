//! Source raster datasets.
//!
//! A [`RasterDataset`] exposes georeferencing and band-window reads. Workers
//! never share a handle: each one asks a [`DatasetOpener`] for its own.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use super::types::{Palette, SampleType};
use super::RasterError;
use crate::coord::Sector;

/// Affine pixel-to-world transform, GDAL ordering:
/// `x = gt[0] + px * gt[1] + py * gt[2]`, `y = gt[3] + px * gt[4] + py * gt[5]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform(pub [f64; 6]);

impl GeoTransform {
    /// North-up transform with the given upper-left origin and pixel size.
    pub fn north_up(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        GeoTransform([origin_x, pixel_width, 0.0, origin_y, 0.0, -pixel_height])
    }

    /// Transform mapping a `width` x `height` grid exactly onto `sector`.
    pub fn for_sector(sector: &Sector, width: u32, height: u32) -> Self {
        Self::north_up(
            sector.min_lon,
            sector.max_lat,
            sector.delta_lon() / width as f64,
            sector.delta_lat() / height as f64,
        )
    }

    pub fn is_north_up(&self) -> bool {
        self.0[2] == 0.0 && self.0[4] == 0.0
    }

    /// Pixel coordinates to world coordinates.
    pub fn apply(&self, px: f64, py: f64) -> (f64, f64) {
        let g = &self.0;
        (g[0] + px * g[1] + py * g[2], g[3] + px * g[4] + py * g[5])
    }

    /// World-to-pixel transform, `None` for singular matrices.
    pub fn invert(&self) -> Option<GeoTransform> {
        let g = &self.0;
        let det = g[1] * g[5] - g[2] * g[4];
        if det == 0.0 || !det.is_finite() {
            return None;
        }
        let inv_det = 1.0 / det;
        let a = g[5] * inv_det;
        let b = -g[2] * inv_det;
        let d = -g[4] * inv_det;
        let e = g[1] * inv_det;
        Some(GeoTransform([
            -(a * g[0] + b * g[3]),
            a,
            b,
            -(d * g[0] + e * g[3]),
            d,
            e,
        ]))
    }
}

/// Coordinate reference system of a dataset.
#[derive(Debug, Clone, PartialEq)]
pub enum Crs {
    /// Longitude/latitude degrees (EPSG:4326 and equivalents).
    Geographic,
    /// Projected system identified by EPSG code.
    Epsg(u16),
    /// Projected system given as a proj string.
    Proj(String),
}

impl Crs {
    pub fn is_geographic(&self) -> bool {
        matches!(self, Crs::Geographic | Crs::Epsg(4326))
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Crs::Geographic => f.write_str("EPSG:4326"),
            Crs::Epsg(code) => write!(f, "EPSG:{}", code),
            Crs::Proj(s) => f.write_str(s),
        }
    }
}

impl FromStr for Crs {
    type Err = String;

    /// Accepts `EPSG:<code>` or a proj string starting with `+proj=`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(code) = s
            .strip_prefix("EPSG:")
            .or_else(|| s.strip_prefix("epsg:"))
        {
            let code: u16 = code
                .parse()
                .map_err(|_| format!("invalid EPSG code '{}'", code))?;
            return Ok(if code == 4326 {
                Crs::Geographic
            } else {
                Crs::Epsg(code)
            });
        }
        if s.starts_with("+proj=") {
            return Ok(if s.contains("+proj=longlat") || s.contains("+proj=latlong") {
                Crs::Geographic
            } else {
                Crs::Proj(s.to_string())
            });
        }
        Err(format!("unrecognized projection '{}'", s))
    }
}

/// A readable, georeferenced raster.
pub trait RasterDataset {
    fn width(&self) -> u32;

    fn height(&self) -> u32;

    fn band_count(&self) -> usize;

    /// Sample type of a zero-based band.
    fn band_type(&self, band: usize) -> SampleType;

    fn geo_transform(&self) -> GeoTransform;

    fn crs(&self) -> &Crs;

    /// Color table for indexed sources.
    fn palette(&self) -> Option<&Palette> {
        None
    }

    /// Source nodata sentinel, if declared.
    fn nodata(&self) -> Option<f64> {
        None
    }

    /// Reads a `w` x `h` window of one band starting at `(x, y)`, row-major.
    fn read_window(&mut self, band: usize, x: u32, y: u32, w: u32, h: u32)
        -> Result<Vec<f64>, RasterError>;

    /// Reads a single sample.
    fn read_sample(&mut self, band: usize, x: u32, y: u32) -> Result<f64, RasterError> {
        let v = self.read_window(band, x, y, 1, 1)?;
        v.first().copied().ok_or_else(|| RasterError::Read {
            path: PathBuf::new(),
            reason: format!("empty read at ({}, {})", x, y),
        })
    }
}

/// Produces a fresh dataset handle for each worker.
pub trait DatasetOpener: Send + Sync {
    fn open(&self) -> Result<Box<dyn RasterDataset>, RasterError>;

    /// Human-readable description for log messages.
    fn describe(&self) -> String;
}

/// One band held in memory as little-endian bytes.
#[derive(Debug, Clone, PartialEq)]
struct MemoryBand {
    sample_type: SampleType,
    data: Vec<u8>,
}

/// Fully in-memory dataset, used for reprojection targets and tests.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryDataset {
    width: u32,
    height: u32,
    bands: Vec<MemoryBand>,
    transform: GeoTransform,
    crs: Crs,
    palette: Option<Palette>,
    nodata: Option<f64>,
}

impl MemoryDataset {
    /// Creates a zero-filled dataset with one entry of `band_types` per band.
    pub fn new(
        width: u32,
        height: u32,
        band_types: &[SampleType],
        transform: GeoTransform,
        crs: Crs,
    ) -> Self {
        let pixels = width as usize * height as usize;
        let bands = band_types
            .iter()
            .map(|&sample_type| MemoryBand {
                sample_type,
                data: vec![0; pixels * sample_type.size()],
            })
            .collect();
        Self {
            width,
            height,
            bands,
            transform,
            crs,
            palette: None,
            nodata: None,
        }
    }

    pub fn with_palette(mut self, palette: Palette) -> Self {
        self.palette = Some(palette);
        self
    }

    pub fn with_nodata(mut self, nodata: f64) -> Self {
        self.nodata = Some(nodata);
        self
    }

    /// Writes one sample; out-of-range coordinates are ignored.
    pub fn set(&mut self, band: usize, x: u32, y: u32, value: f64) {
        if x >= self.width || y >= self.height {
            return;
        }
        let Some(b) = self.bands.get_mut(band) else {
            return;
        };
        let size = b.sample_type.size();
        let off = (y as usize * self.width as usize + x as usize) * size;
        b.sample_type
            .write(value, &mut b.data[off..off + size], super::ByteOrder::LittleEndian);
    }

    /// Fills a band from a generator of `(x, y) -> value`.
    pub fn fill_band(&mut self, band: usize, f: impl Fn(u32, u32) -> f64) {
        for y in 0..self.height {
            for x in 0..self.width {
                self.set(band, x, y, f(x, y));
            }
        }
    }

    fn get(&self, band: &MemoryBand, x: u32, y: u32) -> f64 {
        let size = band.sample_type.size();
        let off = (y as usize * self.width as usize + x as usize) * size;
        band.sample_type
            .read(&band.data[off..off + size], super::ByteOrder::LittleEndian)
    }
}

impl RasterDataset for MemoryDataset {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn band_count(&self) -> usize {
        self.bands.len()
    }

    fn band_type(&self, band: usize) -> SampleType {
        self.bands
            .get(band)
            .map(|b| b.sample_type)
            .unwrap_or(SampleType::U8)
    }

    fn geo_transform(&self) -> GeoTransform {
        self.transform
    }

    fn crs(&self) -> &Crs {
        &self.crs
    }

    fn palette(&self) -> Option<&Palette> {
        self.palette.as_ref()
    }

    fn nodata(&self) -> Option<f64> {
        self.nodata
    }

    fn read_window(
        &mut self,
        band: usize,
        x: u32,
        y: u32,
        w: u32,
        h: u32,
    ) -> Result<Vec<f64>, RasterError> {
        let b = self.bands.get(band).ok_or_else(|| {
            RasterError::InvalidArgument(format!(
                "band {} out of range ({} bands)",
                band,
                self.bands.len()
            ))
        })?;
        if x.saturating_add(w) > self.width || y.saturating_add(h) > self.height {
            return Err(RasterError::InvalidArgument(format!(
                "window {}x{} at ({}, {}) exceeds {}x{}",
                w, h, x, y, self.width, self.height
            )));
        }
        let mut out = Vec::with_capacity(w as usize * h as usize);
        for row in y..y + h {
            for col in x..x + w {
                out.push(self.get(b, col, row));
            }
        }
        Ok(out)
    }

    fn read_sample(&mut self, band: usize, x: u32, y: u32) -> Result<f64, RasterError> {
        match self.bands.get(band) {
            Some(b) if x < self.width && y < self.height => Ok(self.get(b, x, y)),
            _ => Err(RasterError::InvalidArgument(format!(
                "sample ({}, {}) of band {} out of range",
                x, y, band
            ))),
        }
    }
}

/// Opens GeoTIFF files, optionally overriding their declared CRS.
#[derive(Debug, Clone)]
pub struct GeoTiffOpener {
    path: PathBuf,
    crs_override: Option<Crs>,
}

impl GeoTiffOpener {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            crs_override: None,
        }
    }

    pub fn with_crs_override(mut self, crs: Option<Crs>) -> Self {
        self.crs_override = crs;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DatasetOpener for GeoTiffOpener {
    fn open(&self) -> Result<Box<dyn RasterDataset>, RasterError> {
        let mut dataset = super::geotiff::GeoTiffDataset::open(&self.path)?;
        if let Some(crs) = &self.crs_override {
            dataset.set_crs(crs.clone());
        }
        Ok(Box::new(dataset))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Hands out clones of an in-memory dataset.
#[derive(Debug, Clone)]
pub struct MemoryOpener {
    dataset: MemoryDataset,
}

impl MemoryOpener {
    pub fn new(dataset: MemoryDataset) -> Self {
        Self { dataset }
    }
}

impl DatasetOpener for MemoryOpener {
    fn open(&self) -> Result<Box<dyn RasterDataset>, RasterError> {
        Ok(Box::new(self.dataset.clone()))
    }

    fn describe(&self) -> String {
        format!("memory {}x{}", self.dataset.width, self.dataset.height)
    }
}
