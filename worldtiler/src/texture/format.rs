//! Output tile formats.

use std::fmt;
use std::str::FromStr;

use crate::dds::DdsFormat;

use super::TextureError;

/// File format of every tile in a pyramid.
///
/// One format is used per run; the extension doubles as the file suffix in
/// the pyramid layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum TileFormat {
    Jpeg,
    #[default]
    Png,
    Bmp,
    Gif,
    Dds(DdsFormat),
    /// Raw row-major samples.
    Bil,
}

impl TileFormat {
    pub fn extension(self) -> &'static str {
        match self {
            TileFormat::Jpeg => "jpg",
            TileFormat::Png => "png",
            TileFormat::Bmp => "bmp",
            TileFormat::Gif => "gif",
            TileFormat::Dds(_) => "dds",
            TileFormat::Bil => "bil",
        }
    }

    /// Whether tiles are 8-bit color images rather than raw samples.
    pub fn is_image(self) -> bool {
        !matches!(self, TileFormat::Bil)
    }

    /// Returns the format with `compression` applied when it is DDS.
    pub fn with_dds_compression(self, compression: DdsFormat) -> Self {
        match self {
            TileFormat::Dds(_) => TileFormat::Dds(compression),
            other => other,
        }
    }
}

impl fmt::Display for TileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for TileFormat {
    type Err = TextureError;

    /// Parses an extension; DDS defaults to BC1.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Ok(TileFormat::Jpeg),
            "png" => Ok(TileFormat::Png),
            "bmp" => Ok(TileFormat::Bmp),
            "gif" => Ok(TileFormat::Gif),
            "dds" => Ok(TileFormat::Dds(DdsFormat::BC1)),
            "bil" => Ok(TileFormat::Bil),
            other => Err(TextureError::UnsupportedFormat(other.to_string())),
        }
    }
}
