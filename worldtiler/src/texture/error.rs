//! Error types for tile encoding and decoding.

use std::fmt;

use crate::dds::DdsError;
use crate::raster::RasterError;

/// Errors that can occur while encoding or decoding tile files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextureError {
    /// Image dimensions are invalid for the codec.
    InvalidDimensions {
        width: u32,
        height: u32,
        reason: String,
    },
    /// Encoding operation failed.
    EncodingFailed(String),
    /// Tile file could not be decoded.
    DecodingFailed(String),
    /// Unsupported tile format or band layout.
    UnsupportedFormat(String),
    /// Invalid codec configuration.
    InvalidConfig(String),
}

impl fmt::Display for TextureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TextureError::InvalidDimensions {
                width,
                height,
                reason,
            } => {
                write!(f, "Invalid dimensions {}×{}: {}", width, height, reason)
            }
            TextureError::EncodingFailed(msg) => write!(f, "Encoding failed: {}", msg),
            TextureError::DecodingFailed(msg) => write!(f, "Decoding failed: {}", msg),
            TextureError::UnsupportedFormat(msg) => write!(f, "Unsupported format: {}", msg),
            TextureError::InvalidConfig(msg) => write!(f, "Invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for TextureError {}

impl From<DdsError> for TextureError {
    fn from(err: DdsError) -> Self {
        match err {
            DdsError::InvalidDimensions(w, h) => TextureError::InvalidDimensions {
                width: w,
                height: h,
                reason: "Invalid for DDS encoding".to_string(),
            },
            DdsError::UnsupportedFormat(msg) => TextureError::UnsupportedFormat(msg),
            err @ (DdsError::Truncated { .. } | DdsError::InvalidHeader(_)) => {
                TextureError::DecodingFailed(err.to_string())
            }
        }
    }
}

impl From<RasterError> for TextureError {
    fn from(err: RasterError) -> Self {
        TextureError::EncodingFailed(err.to_string())
    }
}

impl From<image::ImageError> for TextureError {
    fn from(err: image::ImageError) -> Self {
        match err {
            image::ImageError::Decoding(e) => TextureError::DecodingFailed(e.to_string()),
            image::ImageError::Unsupported(e) => TextureError::UnsupportedFormat(e.to_string()),
            other => TextureError::EncodingFailed(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_texture_error_display_invalid_dimensions() {
        let err = TextureError::InvalidDimensions {
            width: 100,
            height: 200,
            reason: "expected 512 bytes".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid dimensions 100×200: expected 512 bytes"
        );
    }

    #[test]
    fn test_texture_error_display_decoding_failed() {
        let err = TextureError::DecodingFailed("bad magic".to_string());
        assert_eq!(err.to_string(), "Decoding failed: bad magic");
    }

    #[test]
    fn test_texture_error_from_dds_error() {
        let tex_err: TextureError = DdsError::InvalidDimensions(0, 0).into();
        assert!(matches!(tex_err, TextureError::InvalidDimensions { .. }));

        let tex_err: TextureError = DdsError::Truncated {
            expected: 136,
            actual: 130,
        }
        .into();
        assert!(matches!(tex_err, TextureError::DecodingFailed(_)));
    }

    #[test]
    fn test_texture_error_from_raster_error() {
        let tex_err: TextureError = RasterError::InvalidArgument("u16".to_string()).into();
        assert!(matches!(tex_err, TextureError::EncodingFailed(_)));
    }
}
