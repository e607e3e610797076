//! Tile file codecs.
//!
//! Every tile written to or read from a pyramid goes through a
//! [`TileCodec`], so samplers and the overview builder never deal with file
//! formats directly.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │ raster run/overview │
//! │                     │
//! │  Box<dyn TileCodec> │
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │     TileCodec       │ (trait)
//! └──────────┬──────────┘
//!            │
//!     ┌──────┼──────────┐
//!     ▼      ▼          ▼
//! ┌───────┐ ┌────────┐ ┌────────┐
//! │ Image │ │DdsTile │ │  Bil   │
//! │ Codec │ │ Codec  │ │ Codec  │
//! └───────┘ └────────┘ └────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use worldtiler::texture::{CodecSettings, TileFormat};
//!
//! let codec = CodecSettings::new(TileFormat::Png, 512, 512).build().unwrap();
//! assert_eq!(codec.extension(), "png");
//! ```
//!
//! Image and DDS codecs decode to 8-bit RGBA and treat a fully transparent
//! black pixel as nodata. BIL tiles decode to one band in the configured
//! sample type with the configured sentinel as nodata.

mod bil;
mod codec;
mod dds;
mod error;
mod format;
mod image_codec;

pub use bil::{BilCodec, BilLayout};
pub use codec::{CodecSettings, TileCodec};
pub use dds::DdsTileCodec;
pub use error::TextureError;
pub use format::TileFormat;
pub use image_codec::ImageCodec;
