//! Init command - write a default configuration file.

use std::path::PathBuf;

use worldtiler::config::config_file_path;
use worldtiler::RunConfig;

use crate::error::CliError;

/// Run the init-config command.
///
/// An existing file is left untouched.
pub fn run(path: Option<PathBuf>) -> Result<(), CliError> {
    let path = path.unwrap_or_else(config_file_path);
    if path.exists() {
        println!("Configuration file already exists: {}", path.display());
        return Ok(());
    }

    RunConfig::default().save_to(&path)?;

    println!("Configuration file: {}", path.display());
    println!();
    println!("Edit this file to set defaults for raster, overview and vector runs.");
    println!("CLI arguments override config file values when specified.");
    Ok(())
}
