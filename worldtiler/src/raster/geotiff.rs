//! GeoTIFF source reader.
//!
//! Reads georeferencing from the GeoTIFF tags and decodes strips or tiles on
//! demand, keeping a small cache of recently decoded chunks per handle.
//!
//! Supported layouts: chunky (pixel-interleaved) gray, gray+alpha, RGB,
//! RGBA, palette and multiband images with 8/16/32/64-bit samples.

use std::collections::{HashMap, VecDeque};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use tiff::decoder::{Decoder, DecodingResult};
use tiff::tags::Tag;
use tiff::{ColorType, TiffError};
use tracing::{debug, warn};

use super::dataset::{Crs, GeoTransform, RasterDataset};
use super::types::{Palette, SampleType};
use super::RasterError;

/// Decoded chunks kept per handle.
const CHUNK_CACHE_SIZE: usize = 32;

// GeoKey identifiers
const GT_MODEL_TYPE: u32 = 1024;
const GT_RASTER_TYPE: u32 = 1025;
const GEOGRAPHIC_TYPE: u32 = 2048;
const PROJECTED_CS_TYPE: u32 = 3072;

const MODEL_TYPE_PROJECTED: u32 = 1;
const MODEL_TYPE_GEOGRAPHIC: u32 = 2;
const RASTER_PIXEL_IS_POINT: u32 = 2;
const USER_DEFINED: u32 = 32767;

/// Lazily decoded GeoTIFF handle.
pub struct GeoTiffDataset {
    path: PathBuf,
    decoder: Decoder<BufReader<File>>,
    width: u32,
    height: u32,
    samples_per_pixel: usize,
    sample_type: SampleType,
    transform: GeoTransform,
    crs: Crs,
    palette: Option<Palette>,
    nodata: Option<f64>,
    chunk_width: u32,
    chunk_height: u32,
    chunks_across: u32,
    cache: HashMap<u32, Vec<f64>>,
    cache_order: VecDeque<u32>,
}

impl GeoTiffDataset {
    /// Opens a GeoTIFF and reads its georeferencing.
    ///
    /// # Errors
    ///
    /// `Read` for I/O or decode failures, `UnsupportedRaster` for layouts the
    /// sampler cannot handle (mixed band types, planar layout, 64-bit ints),
    /// `InvalidArgument` when the file carries no georeferencing.
    pub fn open(path: &Path) -> Result<Self, RasterError> {
        let read_err = |reason: String| RasterError::Read {
            path: path.to_path_buf(),
            reason,
        };

        let file = File::open(path).map_err(|e| read_err(e.to_string()))?;
        let mut decoder = Decoder::new(BufReader::new(file)).map_err(|e| tiff_error(path, e))?;

        let (width, height) = decoder.dimensions().map_err(|e| tiff_error(path, e))?;
        let color_type = decoder.colortype().map_err(|e| tiff_error(path, e))?;
        let (samples_per_pixel, bits) = band_layout(color_type)?;

        let planar = find_u32_vec(&mut decoder, Tag::PlanarConfiguration, path)?;
        if planar.is_some_and(|p| p.first() == Some(&2)) {
            return Err(RasterError::UnsupportedRaster(
                "planar (band-sequential) layout".to_string(),
            ));
        }

        let formats = find_u32_vec(&mut decoder, Tag::SampleFormat, path)?.unwrap_or_default();
        if formats.windows(2).any(|w| w[0] != w[1]) {
            return Err(RasterError::UnsupportedRaster(
                "bands have mixed data types".to_string(),
            ));
        }
        let sample_type = sample_type_for(bits, formats.first().copied().unwrap_or(1))?;

        let palette = if matches!(color_type, ColorType::Palette(_)) {
            find_u32_vec(&mut decoder, Tag::ColorMap, path)?
                .and_then(|map| Palette::from_tiff_color_map(&map))
        } else {
            None
        };

        let geo_keys = find_u32_vec(&mut decoder, Tag::GeoKeyDirectoryTag, path)?
            .map(|d| parse_geo_keys(&d))
            .unwrap_or_default();
        let transform = read_transform(&mut decoder, path, &geo_keys)?;
        let crs = crs_from_geo_keys(&geo_keys, path);

        let nodata = decoder
            .find_tag(Tag::GdalNodata)
            .map_err(|e| tiff_error(path, e))?
            .and_then(|v| v.into_string().ok())
            .and_then(|s| s.trim_matches(char::from(0)).trim().parse::<f64>().ok());

        let (chunk_width, chunk_height) = decoder.chunk_dimensions();
        let chunks_across = width.div_ceil(chunk_width.max(1));

        debug!(
            path = %path.display(),
            width,
            height,
            bands = samples_per_pixel,
            sample_type = %sample_type,
            crs = %crs,
            "Opened GeoTIFF"
        );

        Ok(Self {
            path: path.to_path_buf(),
            decoder,
            width,
            height,
            samples_per_pixel,
            sample_type,
            transform,
            crs,
            palette,
            nodata,
            chunk_width: chunk_width.max(1),
            chunk_height: chunk_height.max(1),
            chunks_across,
            cache: HashMap::new(),
            cache_order: VecDeque::new(),
        })
    }

    pub(crate) fn set_crs(&mut self, crs: Crs) {
        self.crs = crs;
    }

    /// Decoded samples of one chunk plus its row stride in pixels.
    fn chunk(&mut self, index: u32) -> Result<(&[f64], u32), RasterError> {
        if !self.cache.contains_key(&index) {
            let decoded = self
                .decoder
                .read_chunk(index)
                .map_err(|e| tiff_error(&self.path, e))?;
            let samples = decoding_result_to_f64(decoded);
            if self.cache_order.len() >= CHUNK_CACHE_SIZE {
                if let Some(old) = self.cache_order.pop_front() {
                    self.cache.remove(&old);
                }
            }
            self.cache_order.push_back(index);
            self.cache.insert(index, samples);
        }

        let (data_w, data_h) = self.decoder.chunk_data_dimensions(index);
        let spp = self.samples_per_pixel;
        let samples = match self.cache.get(&index) {
            Some(s) => s.as_slice(),
            None => {
                return Err(RasterError::Read {
                    path: self.path.clone(),
                    reason: format!("chunk {} missing from cache", index),
                })
            }
        };
        let stride = if samples.len() == (data_w * data_h) as usize * spp {
            data_w
        } else if samples.len() == (self.chunk_width * self.chunk_height) as usize * spp {
            self.chunk_width
        } else {
            return Err(RasterError::Read {
                path: self.path.clone(),
                reason: format!(
                    "chunk {} decoded to {} samples, expected {}x{}x{}",
                    index,
                    samples.len(),
                    data_w,
                    data_h,
                    spp
                ),
            });
        };
        Ok((samples, stride))
    }
}

impl RasterDataset for GeoTiffDataset {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn band_count(&self) -> usize {
        self.samples_per_pixel
    }

    fn band_type(&self, _band: usize) -> SampleType {
        self.sample_type
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
        if band >= self.samples_per_pixel {
            return Err(RasterError::InvalidArgument(format!(
                "band {} out of range ({} bands)",
                band, self.samples_per_pixel
            )));
        }
        if x.saturating_add(w) > self.width || y.saturating_add(h) > self.height {
            return Err(RasterError::InvalidArgument(format!(
                "window {}x{} at ({}, {}) exceeds {}x{}",
                w, h, x, y, self.width, self.height
            )));
        }

        let spp = self.samples_per_pixel;
        let (cw, ch, across) = (self.chunk_width, self.chunk_height, self.chunks_across);
        let mut out = vec![0.0; w as usize * h as usize];

        for cy in (y / ch)..=((y + h).saturating_sub(1) / ch) {
            for cx in (x / cw)..=((x + w).saturating_sub(1) / cw) {
                let index = cy * across + cx;
                let (samples, stride) = self.chunk(index)?;
                let row_start = (cy * ch).max(y);
                let row_end = ((cy + 1) * ch).min(y + h);
                let col_start = (cx * cw).max(x);
                let col_end = ((cx + 1) * cw).min(x + w);
                for row in row_start..row_end {
                    for col in col_start..col_end {
                        let local = ((row - cy * ch) * stride + (col - cx * cw)) as usize;
                        let value = samples.get(local * spp + band).copied().unwrap_or(0.0);
                        out[((row - y) * w + (col - x)) as usize] = value;
                    }
                }
            }
        }
        Ok(out)
    }
}

fn tiff_error(path: &Path, err: TiffError) -> RasterError {
    match err {
        TiffError::UnsupportedError(e) => RasterError::UnsupportedRaster(e.to_string()),
        other => RasterError::Read {
            path: path.to_path_buf(),
            reason: other.to_string(),
        },
    }
}

fn find_u32_vec(
    decoder: &mut Decoder<BufReader<File>>,
    tag: Tag,
    path: &Path,
) -> Result<Option<Vec<u32>>, RasterError> {
    match decoder.find_tag(tag).map_err(|e| tiff_error(path, e))? {
        Some(value) => value
            .into_u32_vec()
            .map(Some)
            .map_err(|e| tiff_error(path, e)),
        None => Ok(None),
    }
}

fn find_f64_vec(
    decoder: &mut Decoder<BufReader<File>>,
    tag: Tag,
    path: &Path,
) -> Result<Option<Vec<f64>>, RasterError> {
    match decoder.find_tag(tag).map_err(|e| tiff_error(path, e))? {
        Some(value) => value
            .into_f64_vec()
            .map(Some)
            .map_err(|e| tiff_error(path, e)),
        None => Ok(None),
    }
}

fn sample_type_for(bits: u8, format: u32) -> Result<SampleType, RasterError> {
    match (format, bits) {
        (1, 8) => Ok(SampleType::U8),
        (1, 16) => Ok(SampleType::U16),
        (1, 32) => Ok(SampleType::U32),
        (2, 16) => Ok(SampleType::I16),
        (2, 32) => Ok(SampleType::I32),
        (3, 32) => Ok(SampleType::F32),
        (3, 64) => Ok(SampleType::F64),
        _ => Err(RasterError::UnsupportedRaster(format!(
            "{}-bit samples with sample format {}",
            bits, format
        ))),
    }
}

fn decoding_result_to_f64(result: DecodingResult) -> Vec<f64> {
    match result {
        DecodingResult::U8(d) => d.into_iter().map(f64::from).collect(),
        DecodingResult::U16(d) => d.into_iter().map(f64::from).collect(),
        DecodingResult::U32(d) => d.into_iter().map(f64::from).collect(),
        DecodingResult::U64(d) => d.into_iter().map(|v| v as f64).collect(),
        DecodingResult::I8(d) => d.into_iter().map(f64::from).collect(),
        DecodingResult::I16(d) => d.into_iter().map(f64::from).collect(),
        DecodingResult::I32(d) => d.into_iter().map(f64::from).collect(),
        DecodingResult::I64(d) => d.into_iter().map(|v| v as f64).collect(),
        DecodingResult::F32(d) => d.into_iter().map(f64::from).collect(),
        DecodingResult::F64(d) => d,
    }
}

/// Parses a GeoKeyDirectory into `key id -> inline value`.
///
/// Keys stored in the double or ASCII parameter tags are skipped; none of
/// the keys used here live there.
fn parse_geo_keys(directory: &[u32]) -> HashMap<u32, u32> {
    let mut keys = HashMap::new();
    if directory.len() < 4 {
        return keys;
    }
    let count = directory[3] as usize;
    for entry in directory[4..].chunks_exact(4).take(count) {
        let (id, location, value) = (entry[0], entry[1], entry[3]);
        if location == 0 {
            keys.insert(id, value);
        }
    }
    keys
}

fn crs_from_geo_keys(keys: &HashMap<u32, u32>, path: &Path) -> Crs {
    match keys.get(&GT_MODEL_TYPE) {
        Some(&MODEL_TYPE_PROJECTED) => match keys.get(&PROJECTED_CS_TYPE) {
            Some(&code) if code != USER_DEFINED && code <= u16::MAX as u32 => Crs::Epsg(code as u16),
            other => {
                warn!(
                    path = %path.display(),
                    code = ?other,
                    "Projected GeoTIFF without a usable EPSG code, set raster.source_proj"
                );
                Crs::Proj(String::new())
            }
        },
        Some(&MODEL_TYPE_GEOGRAPHIC) => {
            if let Some(&code) = keys.get(&GEOGRAPHIC_TYPE) {
                if code != 4326 {
                    debug!(code, "Treating geographic datum as WGS84");
                }
            }
            Crs::Geographic
        }
        _ => {
            warn!(path = %path.display(), "GeoTIFF declares no model type, assuming EPSG:4326");
            Crs::Geographic
        }
    }
}

fn read_transform(
    decoder: &mut Decoder<BufReader<File>>,
    path: &Path,
    keys: &HashMap<u32, u32>,
) -> Result<GeoTransform, RasterError> {
    if let Some(m) = find_f64_vec(decoder, Tag::ModelTransformationTag, path)? {
        if m.len() >= 8 {
            return Ok(GeoTransform([m[3], m[0], m[1], m[7], m[4], m[5]]));
        }
    }

    let scale = find_f64_vec(decoder, Tag::ModelPixelScaleTag, path)?;
    let tiepoint = find_f64_vec(decoder, Tag::ModelTiepointTag, path)?;
    match (scale, tiepoint) {
        (Some(s), Some(t)) if s.len() >= 2 && t.len() >= 6 => {
            let (sx, sy) = (s[0], s[1]);
            let mut origin_x = t[3] - t[0] * sx;
            let mut origin_y = t[4] + t[1] * sy;
            if keys.get(&GT_RASTER_TYPE) == Some(&RASTER_PIXEL_IS_POINT) {
                origin_x -= sx * 0.5;
                origin_y += sy * 0.5;
            }
            Ok(GeoTransform::north_up(origin_x, origin_y, sx, sy))
        }
        _ => Err(RasterError::InvalidArgument(format!(
            "{} has no georeferencing tags",
            path.display()
        ))),
    }
}

/// Samples per pixel and bits per sample for a decoded color type.
fn band_layout(color_type: ColorType) -> Result<(usize, u8), RasterError> {
    match color_type {
        ColorType::Gray(b) | ColorType::Palette(b) => Ok((1, b)),
        ColorType::GrayA(b) => Ok((2, b)),
        ColorType::RGB(b) => Ok((3, b)),
        ColorType::RGBA(b) | ColorType::CMYK(b) => Ok((4, b)),
        other => Err(RasterError::UnsupportedRaster(format!(
            "color type {:?}",
            other
        ))),
    }
}
