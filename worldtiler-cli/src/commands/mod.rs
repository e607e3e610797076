//! CLI command implementations.

pub mod common;
pub mod init;
pub mod overview;
pub mod raster;
pub mod vector;
