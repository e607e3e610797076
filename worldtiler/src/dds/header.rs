//! DDS file header: 4-byte magic plus the 124-byte `DDS_HEADER`.

use super::{DdsError, DdsFormat};

/// Magic plus header, in bytes.
pub const DDS_HEADER_SIZE: usize = 128;

const DDSD_CAPS: u32 = 0x1;
const DDSD_HEIGHT: u32 = 0x2;
const DDSD_WIDTH: u32 = 0x4;
const DDSD_PIXELFORMAT: u32 = 0x1000;
const DDSD_MIPMAPCOUNT: u32 = 0x20000;
const DDSD_LINEARSIZE: u32 = 0x80000;
const DDPF_FOURCC: u32 = 0x4;
const DDSCAPS_COMPLEX: u32 = 0x8;
const DDSCAPS_TEXTURE: u32 = 0x1000;
const DDSCAPS_MIPMAP: u32 = 0x400000;

// Byte offsets from the start of the file.
const OFFSET_HEIGHT: usize = 12;
const OFFSET_WIDTH: usize = 16;
const OFFSET_MIPMAPS: usize = 28;
const OFFSET_PF_FLAGS: usize = 80;
const OFFSET_FOURCC: usize = 84;

/// The fields of a DDS header this crate reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DdsHeader {
    pub width: u32,
    pub height: u32,
    pub mipmap_count: u32,
    pub format: DdsFormat,
}

impl DdsHeader {
    pub fn new(width: u32, height: u32, mipmap_count: u32, format: DdsFormat) -> Self {
        Self {
            width,
            height,
            mipmap_count: mipmap_count.max(1),
            format,
        }
    }

    /// Serializes magic and header, little-endian.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut flags = DDSD_CAPS | DDSD_HEIGHT | DDSD_WIDTH | DDSD_PIXELFORMAT | DDSD_LINEARSIZE;
        let mut caps = DDSCAPS_TEXTURE;
        if self.mipmap_count > 1 {
            flags |= DDSD_MIPMAPCOUNT;
            caps |= DDSCAPS_COMPLEX | DDSCAPS_MIPMAP;
        }
        let linear_size = self.format.surface_size(self.width, self.height) as u32;

        let mut out = Vec::with_capacity(DDS_HEADER_SIZE);
        out.extend_from_slice(b"DDS ");
        for v in [
            124,
            flags,
            self.height,
            self.width,
            linear_size,
            0,
            self.mipmap_count,
        ] {
            out.extend_from_slice(&u32::to_le_bytes(v));
        }
        out.extend_from_slice(&[0u8; 44]);
        // pixel format: size, flags, fourcc, then five unused masks
        out.extend_from_slice(&32u32.to_le_bytes());
        out.extend_from_slice(&DDPF_FOURCC.to_le_bytes());
        out.extend_from_slice(&self.format.fourcc());
        out.extend_from_slice(&[0u8; 20]);
        out.extend_from_slice(&caps.to_le_bytes());
        out.extend_from_slice(&[0u8; 16]);
        out
    }

    /// Parses the header at the front of `data`.
    pub fn parse(data: &[u8]) -> Result<Self, DdsError> {
        if data.len() < DDS_HEADER_SIZE {
            return Err(DdsError::Truncated {
                expected: DDS_HEADER_SIZE,
                actual: data.len(),
            });
        }
        if &data[0..4] != b"DDS " {
            return Err(DdsError::InvalidHeader("missing 'DDS ' magic".to_string()));
        }
        if read_u32(data, 4) != 124 {
            return Err(DdsError::InvalidHeader("header size is not 124".to_string()));
        }
        if read_u32(data, OFFSET_PF_FLAGS) & DDPF_FOURCC == 0 {
            return Err(DdsError::UnsupportedFormat(
                "uncompressed pixel format".to_string(),
            ));
        }
        let mut fourcc = [0u8; 4];
        fourcc.copy_from_slice(&data[OFFSET_FOURCC..OFFSET_FOURCC + 4]);
        let format = DdsFormat::from_fourcc(&fourcc).ok_or_else(|| {
            DdsError::UnsupportedFormat(format!("fourcc {}", String::from_utf8_lossy(&fourcc)))
        })?;

        Ok(Self::new(
            read_u32(data, OFFSET_WIDTH),
            read_u32(data, OFFSET_HEIGHT),
            read_u32(data, OFFSET_MIPMAPS),
            format,
        ))
    }
}

fn read_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_is_128_bytes() {
        let header = DdsHeader::new(256, 256, 1, DdsFormat::BC1);
        assert_eq!(header.to_bytes().len(), DDS_HEADER_SIZE);
    }

    #[test]
    fn test_header_fields() {
        let bytes = DdsHeader::new(512, 256, 1, DdsFormat::BC3).to_bytes();
        assert_eq!(&bytes[0..4], b"DDS ");
        assert_eq!(read_u32(&bytes, OFFSET_WIDTH), 512);
        assert_eq!(read_u32(&bytes, OFFSET_HEIGHT), 256);
        assert_eq!(&bytes[OFFSET_FOURCC..OFFSET_FOURCC + 4], b"DXT5");
        // linear size of the top surface
        assert_eq!(read_u32(&bytes, 20), 128 * 64 * 16);
    }

    #[test]
    fn test_mipmap_flags() {
        let single = DdsHeader::new(64, 64, 1, DdsFormat::BC1).to_bytes();
        let chain = DdsHeader::new(64, 64, 7, DdsFormat::BC1).to_bytes();
        assert_eq!(read_u32(&single, 8) & DDSD_MIPMAPCOUNT, 0);
        assert_ne!(read_u32(&chain, 8) & DDSD_MIPMAPCOUNT, 0);
        assert_ne!(read_u32(&chain, 108) & DDSCAPS_MIPMAP, 0);
    }

    #[test]
    fn test_parse_round_trip() {
        let header = DdsHeader::new(128, 64, 3, DdsFormat::BC3);
        assert_eq!(DdsHeader::parse(&header.to_bytes()).unwrap(), header);
    }

    #[test]
    fn test_parse_rejects_bad_magic() {
        let mut bytes = DdsHeader::new(4, 4, 1, DdsFormat::BC1).to_bytes();
        bytes[0] = b'X';
        assert!(matches!(
            DdsHeader::parse(&bytes),
            Err(DdsError::InvalidHeader(_))
        ));
    }

    #[test]
    fn test_parse_rejects_short_input() {
        assert!(matches!(
            DdsHeader::parse(&[0u8; 10]),
            Err(DdsError::Truncated { .. })
        ));
    }
}
