//! Run configuration.
//!
//! A [`RunConfig`] is loaded from `~/.worldtiler/config.ini` (or a file
//! given on the command line), overridden by CLI flags and then checked with
//! [`RunConfig::validate`]. Keys left empty keep their defaults.
//!
//! # Example
//!
//! ```
//! use worldtiler::config::RunConfig;
//!
//! let mut config = RunConfig::default();
//! config.pyramid.level = 5;
//! config.validate().unwrap();
//! ```

mod file;
mod parser;
mod settings;
mod writer;

pub use file::{config_directory, config_file_path, ConfigFileError};
pub use settings::{
    default_threads, OutputSettings, ProcessingSettings, PyramidSettings, RasterSettings,
    RunConfig, SourceSettings, DEFAULT_JPEG_QUALITY, DEFAULT_TILE_SIZE, MAX_TILE_SIZE,
};
