use image::{imageops, RgbaImage};

use crate::pagination::geometry::BitmapMetrics;

/// An immutable RGBA raster plus the scale it was captured at.
///
/// `scale` is device pixels per logical CSS pixel (the capture's device pixel ratio).
#[derive(Debug, Clone)]
pub struct Bitmap {
    pixels: RgbaImage,
    scale: f64,
}

impl Bitmap {
    pub fn new(pixels: RgbaImage, scale: f64) -> Self {
        Bitmap { pixels, scale }
    }

    pub fn pixel_width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn pixel_height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn metrics(&self) -> BitmapMetrics {
        BitmapMetrics {
            pixel_width: self.pixel_width(),
            pixel_height: self.pixel_height(),
            scale: self.scale,
        }
    }

    /// Copies rows `[source_y, source_y + height)` at full width.
    ///
    /// The range is clipped to the bitmap, so callers must pass ranges from a page plan
    /// computed for this bitmap's own metrics.
    pub fn band(&self, source_y: u32, height: u32) -> RgbaImage {
        imageops::crop_imm(&self.pixels, 0, source_y, self.pixel_width(), height).to_image()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    /// Each row is filled with its own index in the red channel.
    fn make_row_indexed(width: u32, height: u32) -> Bitmap {
        let pixels = RgbaImage::from_fn(width, height, |_, y| Rgba([y as u8, 0, 0, 255]));
        Bitmap::new(pixels, 2.0)
    }

    #[test]
    fn test_metrics_mirror_buffer() {
        let bitmap = make_row_indexed(4, 30);
        let metrics = bitmap.metrics();
        assert_eq!(metrics.pixel_width, 4);
        assert_eq!(metrics.pixel_height, 30);
        assert_eq!(metrics.scale, 2.0);
    }

    #[test]
    fn test_band_copies_requested_rows() {
        let bitmap = make_row_indexed(3, 20);
        let band = bitmap.band(5, 4);
        assert_eq!(band.dimensions(), (3, 4));
        for y in 0..4 {
            assert_eq!(band.get_pixel(0, y).0[0], 5 + y as u8);
            assert_eq!(band.get_pixel(2, y).0[0], 5 + y as u8);
        }
    }

    #[test]
    fn test_band_at_bottom_edge() {
        let bitmap = make_row_indexed(2, 10);
        let band = bitmap.band(7, 3);
        assert_eq!(band.height(), 3);
        assert_eq!(band.get_pixel(1, 2).0[0], 9);
    }
}
