//! Tile file writing.
//!
//! Tiles are written to a temporary sibling and renamed into place, so a
//! destination is either complete or absent. Interrupted runs resume by
//! skipping destinations that exist.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Temporary sibling used while `path` is being written.
fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Writes `data` to `path`, creating parent directories.
pub fn write_atomic(path: &Path, data: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let temp = temp_path(path);
    if let Err(e) = fs::write(&temp, data) {
        let _ = fs::remove_file(&temp);
        return Err(e);
    }
    fs::rename(&temp, path)
}

/// Moves a finished temporary file into place.
pub fn persist(temp: &Path, path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::rename(temp, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_atomic_creates_parents() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("3").join("0001").join("0001_0002.png");
        write_atomic(&path, b"tile").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"tile");
        assert!(!temp_path(&path).exists());
    }

    #[test]
    fn test_write_atomic_replaces_existing() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a.bil");
        write_atomic(&path, b"old").unwrap();
        write_atomic(&path, b"new").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"new");
    }

    #[test]
    fn test_temp_path_keeps_extension_visible() {
        let path = Path::new("/t/0/0000/0000_0001.jpg");
        assert_eq!(temp_path(path), PathBuf::from("/t/0/0000/0000_0001.jpg.tmp"));
    }

    #[test]
    fn test_persist_moves_file() {
        let temp = TempDir::new().unwrap();
        let from = temp.path().join("staged");
        fs::write(&from, b"x").unwrap();
        let to = temp.path().join("1").join("0000").join("0000_0000.tgz");
        persist(&from, &to).unwrap();
        assert!(to.exists());
        assert!(!from.exists());
    }
}
