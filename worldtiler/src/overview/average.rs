//! Nodata-aware 2×2 averaging.

use crate::raster::{DataRect, RasterTile};

/// Four child tiles laid out as they appear in the parent.
pub struct ChildMosaic<'a> {
    pub top_left: &'a RasterTile,
    pub top_right: &'a RasterTile,
    pub bottom_left: &'a RasterTile,
    pub bottom_right: &'a RasterTile,
}

impl<'a> ChildMosaic<'a> {
    fn child(&self, right: bool, bottom: bool) -> &'a RasterTile {
        match (right, bottom) {
            (false, false) => self.top_left,
            (true, false) => self.top_right,
            (false, true) => self.bottom_left,
            (true, true) => self.bottom_right,
        }
    }
}

/// Halves a 2×2 mosaic into one tile the size of a child.
///
/// Each parent pixel averages a 2×2 block of the mosaic. If any of the four
/// source pixels equals `nodata` on every band, the parent pixel is
/// `nodata`. Integer samples round to nearest.
///
/// All four children must share dimensions, band count and sample type;
/// the top-left child defines them.
pub fn average_mosaic(mosaic: &ChildMosaic<'_>, nodata: Option<&[f64]>) -> RasterTile {
    let reference = mosaic.top_left;
    let (width, height) = (reference.width(), reference.height());
    let bands = reference.bands();
    let sample_type = reference.sample_type();

    let mut parent = RasterTile::new(width, height, bands, sample_type);
    let mut block: [Vec<f64>; 4] = Default::default();

    for py in 0..height {
        for px in 0..width {
            for (i, (dx, dy)) in [(0, 0), (1, 0), (0, 1), (1, 1)].into_iter().enumerate() {
                let mx = px * 2 + dx;
                let my = py * 2 + dy;
                let child = mosaic.child(mx >= width, my >= height);
                block[i] = child.pixel(mx % width, my % height);
            }

            let is_nodata = nodata.is_some_and(|nd| block.iter().any(|p| p.as_slice() == nd));
            for band in 0..bands {
                let value = match nodata {
                    Some(nd) if is_nodata => nd[band],
                    _ => {
                        let mean = block.iter().map(|p| p[band]).sum::<f64>() / 4.0;
                        if sample_type.is_float() {
                            mean
                        } else {
                            mean.round()
                        }
                    }
                };
                parent.set(px, py, band, value);
            }
        }
    }

    parent.set_coverage(
        Some(DataRect {
            x: 0,
            y: 0,
            width,
            height,
        }),
        None,
    );
    parent
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::SampleType;

    fn solid(values: &[f64]) -> RasterTile {
        RasterTile::filled(4, 4, SampleType::U8, values)
    }

    #[test]
    fn test_solid_quadrants() {
        let red = solid(&[255.0, 0.0, 0.0, 255.0]);
        let green = solid(&[0.0, 255.0, 0.0, 255.0]);
        let blue = solid(&[0.0, 0.0, 255.0, 255.0]);
        let yellow = solid(&[255.0, 255.0, 0.0, 255.0]);
        let mosaic = ChildMosaic {
            top_left: &red,
            top_right: &green,
            bottom_left: &blue,
            bottom_right: &yellow,
        };
        let parent = average_mosaic(&mosaic, Some(&[0.0; 4]));
        assert_eq!(parent.pixel(0, 0), red.pixel(0, 0));
        assert_eq!(parent.pixel(3, 0), green.pixel(0, 0));
        assert_eq!(parent.pixel(0, 3), blue.pixel(0, 0));
        assert_eq!(parent.pixel(3, 3), yellow.pixel(0, 0));
        assert_eq!(parent.pixel(1, 1), red.pixel(0, 0));
    }

    #[test]
    fn test_mean_rounds_for_integers() {
        let mut tile = RasterTile::filled(2, 2, SampleType::I16, &[10.0]);
        tile.set(1, 1, 0, 13.0);
        let mosaic = ChildMosaic {
            top_left: &tile,
            top_right: &tile,
            bottom_left: &tile,
            bottom_right: &tile,
        };
        let parent = average_mosaic(&mosaic, None);
        // (10 + 10 + 10 + 13) / 4 = 10.75
        assert_eq!(parent.get(0, 0, 0), 11.0);
    }

    #[test]
    fn test_float_mean_is_exact() {
        let mut tile = RasterTile::filled(2, 2, SampleType::F32, &[1.0]);
        tile.set(0, 0, 0, 2.0);
        let mosaic = ChildMosaic {
            top_left: &tile,
            top_right: &tile,
            bottom_left: &tile,
            bottom_right: &tile,
        };
        let parent = average_mosaic(&mosaic, Some(&[-9999.0]));
        assert_eq!(parent.get(0, 0, 0), 1.25);
    }

    #[test]
    fn test_one_nodata_sample_poisons_block() {
        let mut tile = RasterTile::filled(2, 2, SampleType::I16, &[100.0]);
        tile.set(1, 0, 0, -32768.0);
        let mosaic = ChildMosaic {
            top_left: &tile,
            top_right: &tile,
            bottom_left: &tile,
            bottom_right: &tile,
        };
        let parent = average_mosaic(&mosaic, Some(&[-32768.0]));
        assert_eq!(parent.get(0, 0, 0), -32768.0);
    }

    #[test]
    fn test_all_nodata_children() {
        let empty = RasterTile::filled(2, 2, SampleType::I16, &[-1.0]);
        let mosaic = ChildMosaic {
            top_left: &empty,
            top_right: &empty,
            bottom_left: &empty,
            bottom_right: &empty,
        };
        let parent = average_mosaic(&mosaic, Some(&[-1.0]));
        for y in 0..2 {
            for x in 0..2 {
                assert_eq!(parent.get(x, y, 0), -1.0);
            }
        }
    }

    #[test]
    fn test_nodata_needs_every_band() {
        // Black but opaque is data; only transparent black is nodata.
        let mut tile = solid(&[0.0, 0.0, 0.0, 255.0]);
        tile.set(0, 0, 3, 0.0);
        let opaque = solid(&[0.0, 0.0, 0.0, 255.0]);
        let mosaic = ChildMosaic {
            top_left: &tile,
            top_right: &opaque,
            bottom_left: &opaque,
            bottom_right: &opaque,
        };
        let parent = average_mosaic(&mosaic, Some(&[0.0; 4]));
        assert_eq!(parent.pixel(0, 0), vec![0.0; 4]);
        assert_eq!(parent.pixel(1, 0), vec![0.0, 0.0, 0.0, 255.0]);
        assert_eq!(parent.pixel(2, 0), vec![0.0, 0.0, 0.0, 255.0]);
    }
}
