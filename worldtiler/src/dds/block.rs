//! BC1 and BC3 block encoding and decoding.
//!
//! Endpoints are chosen from the block's color bounding box. Blocks with any
//! pixel under half alpha use BC1's three-color mode so transparent areas
//! survive compression.

/// 16 RGBA pixels in row-major order.
pub(crate) type Block = [[u8; 4]; 16];

const ALPHA_THRESHOLD: u8 = 128;

/// RGB888 to packed RGB565.
pub(crate) fn pack_rgb565(r: u8, g: u8, b: u8) -> u16 {
    ((r as u16 >> 3) << 11) | ((g as u16 >> 2) << 5) | (b as u16 >> 3)
}

/// Packed RGB565 to RGB888, replicating high bits into the low ones.
pub(crate) fn unpack_rgb565(c: u16) -> [u8; 3] {
    let r = (c >> 11) & 0x1F;
    let g = (c >> 5) & 0x3F;
    let b = c & 0x1F;
    [
        ((r << 3) | (r >> 2)) as u8,
        ((g << 2) | (g >> 4)) as u8,
        ((b << 3) | (b >> 2)) as u8,
    ]
}

/// Weighted blend `(wa * a + wb * b) / (wa + wb)` per channel.
fn blend(a: [u8; 3], b: [u8; 3], wa: u16, wb: u16) -> [u8; 3] {
    let mix = |x: u8, y: u8| ((wa * x as u16 + wb * y as u16) / (wa + wb)) as u8;
    [mix(a[0], b[0]), mix(a[1], b[1]), mix(a[2], b[2])]
}

/// Squared distance with green weighted highest.
fn distance(p: &[u8; 4], c: &[u8; 3]) -> u32 {
    let dr = (p[0] as i32 - c[0] as i32) * 3;
    let dg = (p[1] as i32 - c[1] as i32) * 6;
    let db = p[2] as i32 - c[2] as i32;
    (dr * dr + dg * dg + db * db) as u32
}

/// Four-entry color palette for a pair of endpoints.
fn color_palette(c0: u16, c1: u16, four_color: bool) -> [[u8; 4]; 4] {
    let (a, b) = (unpack_rgb565(c0), unpack_rgb565(c1));
    let opaque = |c: [u8; 3]| [c[0], c[1], c[2], 255];
    if four_color {
        [
            opaque(a),
            opaque(b),
            opaque(blend(a, b, 2, 1)),
            opaque(blend(a, b, 1, 2)),
        ]
    } else {
        [opaque(a), opaque(b), opaque(blend(a, b, 1, 1)), [0, 0, 0, 0]]
    }
}

/// Encodes the color half of a block. `allow_transparency` selects BC1
/// three-color mode when the block has transparent pixels.
pub(crate) fn encode_color(pixels: &Block, allow_transparency: bool) -> [u8; 8] {
    let transparent = allow_transparency && pixels.iter().any(|p| p[3] < ALPHA_THRESHOLD);

    let mut lo = [255u8; 3];
    let mut hi = [0u8; 3];
    for p in pixels.iter().filter(|p| !transparent || p[3] >= ALPHA_THRESHOLD) {
        for c in 0..3 {
            lo[c] = lo[c].min(p[c]);
            hi[c] = hi[c].max(p[c]);
        }
    }
    if lo[0] > hi[0] {
        // every pixel transparent
        lo = [0; 3];
        hi = [0; 3];
    }
    let max = pack_rgb565(hi[0], hi[1], hi[2]);
    let min = pack_rgb565(lo[0], lo[1], lo[2]);

    // c0 > c1 selects four-color mode, c0 <= c1 three-color + transparent.
    let (c0, c1) = if transparent { (min, max) } else { (max, min) };
    let palette = color_palette(c0, c1, !transparent && c0 > c1);
    let candidates = if transparent { 3 } else { 4 };

    let mut indices = 0u32;
    for (i, p) in pixels.iter().enumerate() {
        let index = if transparent && p[3] < ALPHA_THRESHOLD {
            3
        } else {
            let mut best = 0;
            let mut best_dist = u32::MAX;
            for (idx, entry) in palette.iter().take(candidates).enumerate() {
                let d = distance(p, &[entry[0], entry[1], entry[2]]);
                if d < best_dist {
                    best_dist = d;
                    best = idx as u32;
                }
            }
            best
        };
        indices |= index << (i * 2);
    }

    let mut out = [0u8; 8];
    out[0..2].copy_from_slice(&c0.to_le_bytes());
    out[2..4].copy_from_slice(&c1.to_le_bytes());
    out[4..8].copy_from_slice(&indices.to_le_bytes());
    out
}

/// Decodes a color block. BC3 color blocks are always four-color.
pub(crate) fn decode_color(data: &[u8], force_four_color: bool) -> Block {
    let c0 = u16::from_le_bytes([data[0], data[1]]);
    let c1 = u16::from_le_bytes([data[2], data[3]]);
    let indices = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
    let palette = color_palette(c0, c1, force_four_color || c0 > c1);

    let mut out = [[0u8; 4]; 16];
    for (i, px) in out.iter_mut().enumerate() {
        *px = palette[((indices >> (i * 2)) & 0x3) as usize];
    }
    out
}

fn alpha_palette(a0: u8, a1: u8) -> [u8; 8] {
    let (x, y) = (a0 as u16, a1 as u16);
    let mut p = [a0, a1, 0, 0, 0, 0, 0, 0];
    if a0 > a1 {
        for i in 1..7u16 {
            p[i as usize + 1] = (((7 - i) * x + i * y) / 7) as u8;
        }
    } else {
        for i in 1..5u16 {
            p[i as usize + 1] = (((5 - i) * x + i * y) / 5) as u8;
        }
        p[6] = 0;
        p[7] = 255;
    }
    p
}

/// Encodes the alpha half of a BC3 block.
pub(crate) fn encode_alpha(pixels: &Block) -> [u8; 8] {
    let a0 = pixels.iter().map(|p| p[3]).max().unwrap_or(255);
    let a1 = pixels.iter().map(|p| p[3]).min().unwrap_or(255);
    let palette = alpha_palette(a0, a1);

    let mut bits = 0u64;
    for (i, p) in pixels.iter().enumerate() {
        let best = palette
            .iter()
            .enumerate()
            .min_by_key(|&(_, &v)| (p[3] as i16 - v as i16).unsigned_abs())
            .map(|(idx, _)| idx as u64)
            .unwrap_or(0);
        bits |= best << (i * 3);
    }

    let mut out = [0u8; 8];
    out[0] = a0;
    out[1] = a1;
    out[2..8].copy_from_slice(&bits.to_le_bytes()[0..6]);
    out
}

/// Decodes a BC3 alpha block into the alpha channel of `pixels`.
pub(crate) fn decode_alpha(data: &[u8], pixels: &mut Block) {
    let palette = alpha_palette(data[0], data[1]);
    let mut raw = [0u8; 8];
    raw[0..6].copy_from_slice(&data[2..8]);
    let bits = u64::from_le_bytes(raw);
    for (i, px) in pixels.iter_mut().enumerate() {
        px[3] = palette[((bits >> (i * 3)) & 0x7) as usize];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgb565_extremes() {
        assert_eq!(pack_rgb565(0, 0, 0), 0);
        assert_eq!(pack_rgb565(255, 255, 255), 0xFFFF);
        assert_eq!(unpack_rgb565(0xFFFF), [255, 255, 255]);
        assert_eq!(unpack_rgb565(pack_rgb565(255, 0, 0)), [255, 0, 0]);
    }

    #[test]
    fn test_solid_color_survives_bc1() {
        let block = [[255, 0, 0, 255]; 16];
        let decoded = decode_color(&encode_color(&block, true), false);
        assert!(decoded.iter().all(|p| *p == [255, 0, 0, 255]));
    }

    #[test]
    fn test_transparent_pixels_survive_bc1() {
        let mut block = [[0, 255, 0, 255]; 16];
        block[5] = [0, 0, 0, 0];
        let decoded = decode_color(&encode_color(&block, true), false);
        assert_eq!(decoded[5][3], 0);
        assert_eq!(decoded[0], [0, 255, 0, 255]);
    }

    #[test]
    fn test_fully_transparent_block() {
        let block = [[0, 0, 0, 0]; 16];
        let decoded = decode_color(&encode_color(&block, true), false);
        assert!(decoded.iter().all(|p| p[3] == 0));
    }

    #[test]
    fn test_two_color_block_keeps_both_colors() {
        let mut block = [[0, 0, 0, 255]; 16];
        for p in block.iter_mut().skip(8) {
            *p = [255, 255, 255, 255];
        }
        let decoded = decode_color(&encode_color(&block, false), true);
        assert_eq!(decoded[0], [0, 0, 0, 255]);
        assert_eq!(decoded[15], [255, 255, 255, 255]);
    }

    #[test]
    fn test_alpha_block_round_trip() {
        let mut block = [[10, 20, 30, 255]; 16];
        block[0][3] = 0;
        block[1][3] = 128;
        let encoded = encode_alpha(&block);
        let mut decoded = [[0u8; 4]; 16];
        decode_alpha(&encoded, &mut decoded);
        assert_eq!(decoded[0][3], 0);
        assert_eq!(decoded[15][3], 255);
        assert!((decoded[1][3] as i16 - 128).abs() <= 19);
    }

    #[test]
    fn test_constant_alpha_block() {
        let block = [[0, 0, 0, 77]; 16];
        let mut decoded = [[0u8; 4]; 16];
        decode_alpha(&encode_alpha(&block), &mut decoded);
        assert!(decoded.iter().all(|p| p[3] == 77));
    }
}
