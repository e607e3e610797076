//! Output path naming for pyramid tiles.
//!
//! Layout: `{level}/{row:04}/{row:04}_{col:04}.{ext}`
//!
//! Examples:
//! - `0/0002/0002_0005.png`
//! - `7/0311/0311_0642.bil`

use std::path::{Path, PathBuf};

use super::{CoordError, TileAddress};

/// Path of a tile relative to the pyramid root.
pub fn tile_relative_path(tile: &TileAddress, ext: &str) -> PathBuf {
    PathBuf::from(tile.level.to_string())
        .join(format!("{:04}", tile.row))
        .join(format!("{:04}_{:04}.{}", tile.row, tile.col, ext))
}

/// Absolute path of a tile below `root`.
pub fn tile_path(root: &Path, tile: &TileAddress, ext: &str) -> PathBuf {
    root.join(tile_relative_path(tile, ext))
}

/// Parses a `{row}_{col}.{ext}` file name at `level`.
///
/// The extension must match `ext` exactly.
pub fn parse_tile_name(level: u32, file_name: &str, ext: &str) -> Result<TileAddress, CoordError> {
    let invalid = || CoordError::InvalidTileName(file_name.to_string());

    let stem = file_name
        .strip_suffix(ext)
        .and_then(|s| s.strip_suffix('.'))
        .ok_or_else(invalid)?;
    let (row, col) = stem.split_once('_').ok_or_else(invalid)?;
    if row.is_empty() || col.is_empty() {
        return Err(invalid());
    }
    let row = row.parse::<u32>().map_err(|_| invalid())?;
    let col = col.parse::<u32>().map_err(|_| invalid())?;
    Ok(TileAddress::new(level, row, col))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_path_layout() {
        let path = tile_relative_path(&TileAddress::new(3, 12, 345), "jpg");
        assert_eq!(path, PathBuf::from("3/0012/0012_0345.jpg"));
    }

    #[test]
    fn test_wide_indices_are_not_truncated() {
        let path = tile_relative_path(&TileAddress::new(12, 12345, 3), "bil");
        assert_eq!(path, PathBuf::from("12/12345/12345_0003.bil"));
    }

    #[test]
    fn test_parse_tile_name() {
        let tile = parse_tile_name(5, "0012_0345.png", "png").unwrap();
        assert_eq!(tile, TileAddress::new(5, 12, 345));
    }

    #[test]
    fn test_parse_tile_name_rejects_other_extension() {
        assert!(parse_tile_name(5, "0012_0345.png", "jpg").is_err());
    }

    #[test]
    fn test_parse_tile_name_rejects_garbage() {
        assert!(parse_tile_name(1, "tileset.json", "json").is_err());
        assert!(parse_tile_name(1, "_0001.png", "png").is_err());
        assert!(parse_tile_name(1, "12-34.png", "png").is_err());
        assert!(parse_tile_name(1, "aa_bb.png", "png").is_err());
    }

    #[test]
    fn test_round_trip_through_name() {
        let tile = TileAddress::new(9, 77, 1024);
        let path = tile_relative_path(&tile, "tgz");
        let name = path.file_name().unwrap().to_str().unwrap();
        assert_eq!(parse_tile_name(9, name, "tgz").unwrap(), tile);
    }
}
