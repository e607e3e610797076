//! Serializes `RunConfig` to the commented INI written by `init-config`.

use std::fmt::Display;
use std::path::Path;

use super::settings::RunConfig;

/// Converts a `RunConfig` to a commented INI string.
pub(super) fn to_config_string(config: &RunConfig) -> String {
    let source = path_or_empty(config.source.path.as_deref());
    let directory = path_or_empty(config.output.directory.as_deref());
    let levels = join(&config.pyramid.levels);
    let band = opt(config.raster.band);
    let nodata = opt(config.raster.nodata);
    let outside = config
        .raster
        .outside
        .as_deref()
        .map(join)
        .unwrap_or_default();
    let source_proj = opt(config.raster.source_proj.as_ref());
    let bil_nodata = opt(config.bil.nodata);

    format!(
        r#"[source]
; Source dataset: a GeoTIFF for raster runs, a .shp for vector runs
path = {}

[output]
; Root directory of the pyramid
directory = {}
; Tile format: jpg, png, dds, bmp, gif or bil
format = {}
; DDS block compression: bc1 (no alpha) or bc3 (alpha)
dds_compression = {}
; JPEG quality, 1-100
jpeg_quality = {}

[pyramid]
; Finest level sampled by raster runs; overviews go down to level 0
level = {}
; Levels clipped by vector runs, comma separated (e.g. 3, 4, 5)
levels = {}
; Edge of a level 0 tile in degrees
level_zero_tile_size = {}

[raster]
tile_width = {}
tile_height = {}
; Zero-based band to extract; empty for all bands
band = {}
; Append an alpha band marking source coverage
alpha = {}
; Source nodata value; empty to use the value the source declares
nodata = {}
; Per-band fill for pixels outside the source, comma separated
outside = {}
; Source projection override: EPSG:<code> or a proj string
source_proj = {}

[bil]
; Sample type: u8, i16, u16, i32, u32, f32 or f64
sample_type = {}
; Byte order: little or big
byte_order = {}
; Nodata sentinel used by overviews; empty for none
nodata = {}

[processing]
; Worker threads for raster sampling and overviews
threads = {}
"#,
        source,
        directory,
        config.output.format,
        config.output.dds_compression.to_string().to_lowercase(),
        config.output.jpeg_quality,
        config.pyramid.level,
        levels,
        config.pyramid.level_zero_tile_size,
        config.raster.tile_width,
        config.raster.tile_height,
        band,
        config.raster.alpha,
        nodata,
        outside,
        source_proj,
        config.bil.sample_type,
        config.bil.byte_order,
        bil_nodata,
        config.processing.threads,
    )
}

fn path_or_empty(path: Option<&Path>) -> String {
    path.map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn opt<T: Display>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn join<T: Display>(values: &[T]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
