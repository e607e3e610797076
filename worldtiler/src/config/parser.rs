//! INI parsing: the single place where INI key names map to `RunConfig`
//! fields.

use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;

use ini::{Ini, Properties};

use super::file::ConfigFileError;
use super::settings::RunConfig;

/// Parses an `Ini` into a `RunConfig`, starting from defaults and
/// overlaying the keys that are present and non-empty.
pub(super) fn parse_ini(ini: &Ini) -> Result<RunConfig, ConfigFileError> {
    let mut config = RunConfig::default();

    // [source]
    if let Some(section) = ini.section(Some("source")) {
        if let Some(v) = value(section, "path") {
            config.source.path = Some(expand_tilde(v));
        }
    }

    // [output]
    if let Some(section) = ini.section(Some("output")) {
        if let Some(v) = value(section, "directory") {
            config.output.directory = Some(expand_tilde(v));
        }
        if let Some(v) = value(section, "format") {
            config.output.format = parse("output", "format", v)?;
        }
        if let Some(v) = value(section, "dds_compression") {
            config.output.dds_compression = parse("output", "dds_compression", v)?;
        }
        if let Some(v) = value(section, "jpeg_quality") {
            config.output.jpeg_quality = parse("output", "jpeg_quality", v)?;
        }
    }

    // [pyramid]
    if let Some(section) = ini.section(Some("pyramid")) {
        if let Some(v) = value(section, "level") {
            config.pyramid.level = parse("pyramid", "level", v)?;
        }
        if let Some(v) = value(section, "levels") {
            config.pyramid.levels = parse_list("pyramid", "levels", v)?;
        }
        if let Some(v) = value(section, "level_zero_tile_size") {
            config.pyramid.level_zero_tile_size = parse("pyramid", "level_zero_tile_size", v)?;
        }
    }

    // [raster]
    if let Some(section) = ini.section(Some("raster")) {
        if let Some(v) = value(section, "tile_width") {
            config.raster.tile_width = parse("raster", "tile_width", v)?;
        }
        if let Some(v) = value(section, "tile_height") {
            config.raster.tile_height = parse("raster", "tile_height", v)?;
        }
        if let Some(v) = value(section, "band") {
            config.raster.band = Some(parse("raster", "band", v)?);
        }
        if let Some(v) = value(section, "alpha") {
            config.raster.alpha = parse_bool("raster", "alpha", v)?;
        }
        if let Some(v) = value(section, "nodata") {
            config.raster.nodata = Some(parse("raster", "nodata", v)?);
        }
        if let Some(v) = value(section, "outside") {
            config.raster.outside = Some(parse_list("raster", "outside", v)?);
        }
        if let Some(v) = value(section, "source_proj") {
            config.raster.source_proj = Some(parse("raster", "source_proj", v)?);
        }
    }

    // [bil]
    if let Some(section) = ini.section(Some("bil")) {
        if let Some(v) = value(section, "sample_type") {
            config.bil.sample_type = parse("bil", "sample_type", v)?;
        }
        if let Some(v) = value(section, "byte_order") {
            config.bil.byte_order = parse("bil", "byte_order", v)?;
        }
        if let Some(v) = value(section, "nodata") {
            config.bil.nodata = Some(parse("bil", "nodata", v)?);
        }
    }

    // [processing]
    if let Some(section) = ini.section(Some("processing")) {
        if let Some(v) = value(section, "threads") {
            config.processing.threads = parse("processing", "threads", v)?;
        }
    }

    Ok(config)
}

/// Trimmed value of `key`; empty values count as unset.
fn value<'a>(section: &'a Properties, key: &str) -> Option<&'a str> {
    section.get(key).map(str::trim).filter(|v| !v.is_empty())
}

fn parse<T>(section: &str, key: &str, v: &str) -> Result<T, ConfigFileError>
where
    T: FromStr,
    T::Err: Display,
{
    v.parse().map_err(|e: T::Err| ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: v.to_string(),
        reason: e.to_string(),
    })
}

/// Comma-separated list, e.g. `levels = 3, 4, 5`.
fn parse_list<T>(section: &str, key: &str, v: &str) -> Result<Vec<T>, ConfigFileError>
where
    T: FromStr,
    T::Err: Display,
{
    v.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| parse(section, key, item))
        .collect()
}

fn parse_bool(section: &str, key: &str, v: &str) -> Result<bool, ConfigFileError> {
    match v.to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" | "on" => Ok(true),
        "false" | "no" | "0" | "off" => Ok(false),
        _ => Err(ConfigFileError::InvalidValue {
            section: section.to_string(),
            key: key.to_string(),
            value: v.to_string(),
            reason: "must be true or false".to_string(),
        }),
    }
}

/// Expands a leading `~` to the home directory.
pub(super) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dds::DdsFormat;
    use crate::raster::{ByteOrder, Crs, SampleType};
    use crate::texture::TileFormat;

    fn parse_str(content: &str) -> Result<RunConfig, ConfigFileError> {
        let ini = Ini::load_from_str(content).unwrap();
        parse_ini(&ini)
    }

    #[test]
    fn test_empty_ini_gives_defaults() {
        assert_eq!(parse_str("").unwrap(), RunConfig::default());
    }

    #[test]
    fn test_full_config() {
        let config = parse_str(
            r#"
[source]
path = /data/dem.tif

[output]
directory = /data/pyramid
format = dds
dds_compression = bc3
jpeg_quality = 80

[pyramid]
level = 7
levels = 3, 4,5
level_zero_tile_size = 20

[raster]
tile_width = 256
tile_height = 128
band = 2
alpha = yes
nodata = -9999
outside = 0,0,0
source_proj = EPSG:32633

[bil]
sample_type = f32
byte_order = big
nodata = -32768

[processing]
threads = 3
"#,
        )
        .unwrap();

        assert_eq!(config.source.path, Some(PathBuf::from("/data/dem.tif")));
        assert_eq!(config.output.directory, Some(PathBuf::from("/data/pyramid")));
        assert_eq!(config.tile_format(), TileFormat::Dds(DdsFormat::BC3));
        assert_eq!(config.output.jpeg_quality, 80);
        assert_eq!(config.pyramid.level, 7);
        assert_eq!(config.pyramid.levels, vec![3, 4, 5]);
        assert_eq!(config.pyramid.level_zero_tile_size, 20.0);
        assert_eq!((config.raster.tile_width, config.raster.tile_height), (256, 128));
        assert_eq!(config.raster.band, Some(2));
        assert!(config.raster.alpha);
        assert_eq!(config.raster.nodata, Some(-9999.0));
        assert_eq!(config.raster.outside, Some(vec![0.0, 0.0, 0.0]));
        assert_eq!(config.raster.source_proj, Some(Crs::Epsg(32633)));
        assert_eq!(config.bil.sample_type, SampleType::F32);
        assert_eq!(config.bil.byte_order, ByteOrder::BigEndian);
        assert_eq!(config.bil.nodata, Some(-32768.0));
        assert_eq!(config.processing.threads, 3);
    }

    #[test]
    fn test_empty_values_keep_defaults() {
        let config = parse_str("[raster]\nnodata =\nsource_proj =\n").unwrap();
        assert_eq!(config.raster.nodata, None);
        assert_eq!(config.raster.source_proj, None);
    }

    #[test]
    fn test_invalid_format_names_key() {
        match parse_str("[output]\nformat = tif\n") {
            Err(ConfigFileError::InvalidValue {
                section, key, value, ..
            }) => {
                assert_eq!(section, "output");
                assert_eq!(key, "format");
                assert_eq!(value, "tif");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_invalid_list_item() {
        assert!(parse_str("[pyramid]\nlevels = 3, x\n").is_err());
    }

    #[test]
    fn test_invalid_bool() {
        assert!(parse_str("[raster]\nalpha = maybe\n").is_err());
    }

    #[test]
    fn test_expand_tilde() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_tilde("~/tiles"), home.join("tiles"));
        }
        assert_eq!(expand_tilde("/abs"), PathBuf::from("/abs"));
    }
}
