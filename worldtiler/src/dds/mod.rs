//! DDS (DirectDraw Surface) tile codec with BC1/BC3 block compression.
//!
//! # Format Details
//!
//! ## BC1 (DXT1)
//!
//! - 8 bytes per 4×4 block: two RGB565 endpoints and 2-bit indices
//! - Opaque, or 1-bit alpha when `color0 <= color1`
//!
//! ## BC3 (DXT5)
//!
//! - 16 bytes per 4×4 block: an interpolated alpha block followed by a BC1
//!   color block
//!
//! Tiles are written with an optional box-filtered mipmap chain and can be
//! decoded back to RGBA so DDS levels can feed overview generation.

mod block;
mod codec;
mod header;

pub use codec::{DdsDecoder, DdsEncoder};
pub use header::{DdsHeader, DDS_HEADER_SIZE};

use std::fmt;

/// Block compression format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DdsFormat {
    /// BC1/DXT1, no alpha or 1-bit alpha
    BC1,
    /// BC3/DXT5, 8-bit interpolated alpha
    BC3,
}

impl DdsFormat {
    /// Compressed bytes per 4×4 block.
    pub fn block_size(self) -> usize {
        match self {
            DdsFormat::BC1 => 8,
            DdsFormat::BC3 => 16,
        }
    }

    pub fn fourcc(self) -> [u8; 4] {
        match self {
            DdsFormat::BC1 => *b"DXT1",
            DdsFormat::BC3 => *b"DXT5",
        }
    }

    pub fn from_fourcc(fourcc: &[u8; 4]) -> Option<Self> {
        match fourcc {
            b"DXT1" => Some(DdsFormat::BC1),
            b"DXT5" => Some(DdsFormat::BC3),
            _ => None,
        }
    }

    /// Compressed size of one `width` x `height` surface.
    pub fn surface_size(self, width: u32, height: u32) -> usize {
        width.div_ceil(4) as usize * height.div_ceil(4) as usize * self.block_size()
    }
}

impl fmt::Display for DdsFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DdsFormat::BC1 => write!(f, "BC1"),
            DdsFormat::BC3 => write!(f, "BC3"),
        }
    }
}

impl std::str::FromStr for DdsFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bc1" | "dxt1" => Ok(DdsFormat::BC1),
            "bc3" | "dxt5" => Ok(DdsFormat::BC3),
            other => Err(format!("unknown DDS compression '{}'", other)),
        }
    }
}

/// Errors that can occur during DDS encoding or decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DdsError {
    /// Width or height is zero
    InvalidDimensions(u32, u32),
    /// Unsupported pixel format or feature
    UnsupportedFormat(String),
    /// File is shorter than its header claims
    Truncated { expected: usize, actual: usize },
    /// Header magic or size fields are wrong
    InvalidHeader(String),
}

impl fmt::Display for DdsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DdsError::InvalidDimensions(w, h) => write!(f, "Invalid dimensions: {}×{}", w, h),
            DdsError::UnsupportedFormat(msg) => write!(f, "Unsupported format: {}", msg),
            DdsError::Truncated { expected, actual } => {
                write!(f, "Truncated DDS data: expected {} bytes, got {}", expected, actual)
            }
            DdsError::InvalidHeader(msg) => write!(f, "Invalid DDS header: {}", msg),
        }
    }
}

impl std::error::Error for DdsError {}
