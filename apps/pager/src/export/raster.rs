//! Snapshot rasterizer — turns an already-rendered PNG/JPEG snapshot into a `Bitmap`.
//!
//! The browser captures the resume; this side only decodes and resamples. Decoding is
//! CPU-bound, so it runs inside `tokio::task::spawn_blocking`.

use async_trait::async_trait;
use bytes::Bytes;
use image::imageops::{self, FilterType};
use tracing::debug;

use crate::export::{ExportError, Rasterizer};
use crate::pagination::Bitmap;

/// Default for `MAX_BITMAP_PIXELS`: 50 megapixels, 200 MB as RGBA.
pub const DEFAULT_MAX_BITMAP_PIXELS: u64 = 50_000_000;

pub struct SnapshotRasterizer {
    /// Largest bitmap, decoded or resampled, this rasterizer will produce.
    max_pixels: u64,
}

impl SnapshotRasterizer {
    pub fn new(max_pixels: u64) -> Self {
        SnapshotRasterizer { max_pixels }
    }
}

impl Default for SnapshotRasterizer {
    fn default() -> Self {
        SnapshotRasterizer::new(DEFAULT_MAX_BITMAP_PIXELS)
    }
}

#[async_trait]
impl Rasterizer for SnapshotRasterizer {
    async fn rasterize(
        &self,
        content: Bytes,
        target_width_px: Option<u32>,
        target_height_px: Option<u32>,
        scale: f64,
    ) -> Result<Bitmap, ExportError> {
        if !scale.is_finite() || scale <= 0.0 {
            return Err(ExportError::InvalidRequest(format!(
                "scale must be a positive finite number, got {scale}"
            )));
        }
        if content.is_empty() {
            return Err(ExportError::InvalidRequest("snapshot is empty".to_string()));
        }

        let max_pixels = self.max_pixels;
        tokio::task::spawn_blocking(move || {
            decode_snapshot(&content, target_width_px, target_height_px, scale, max_pixels)
        })
        .await?
    }
}

/// Decodes `content` and resamples it to `target × scale` device pixels.
///
/// Targets are logical pixels. Without a target width the decoded size is kept; without a
/// target height the aspect ratio decides it. Both the decoded and the resampled size
/// must stay within `max_pixels`; the check runs before any resize allocates.
pub(crate) fn decode_snapshot(
    content: &[u8],
    target_width_px: Option<u32>,
    target_height_px: Option<u32>,
    scale: f64,
    max_pixels: u64,
) -> Result<Bitmap, ExportError> {
    let decoded = image::load_from_memory(content)?.to_rgba8();
    let (src_w, src_h) = decoded.dimensions();
    check_pixel_budget(src_w, src_h, max_pixels)?;

    let device_w = match target_width_px {
        Some(w) => to_device_px(w, scale)?,
        None => src_w,
    };
    let device_h = match target_height_px {
        Some(h) => to_device_px(h, scale)?,
        None if device_w == src_w => src_h,
        None => ((src_h as f64 * device_w as f64 / src_w as f64).round() as u32).max(1),
    };

    check_pixel_budget(device_w, device_h, max_pixels)?;
    debug!(src_w, src_h, device_w, device_h, scale, "Decoded snapshot");

    let pixels = if (device_w, device_h) == (src_w, src_h) {
        decoded
    } else {
        imageops::resize(&decoded, device_w, device_h, FilterType::Lanczos3)
    };
    Ok(Bitmap::new(pixels, scale))
}

fn check_pixel_budget(width: u32, height: u32, max_pixels: u64) -> Result<(), ExportError> {
    let pixels = width as u64 * height as u64;
    if pixels > max_pixels {
        return Err(ExportError::InvalidRequest(format!(
            "bitmap of {width}x{height} exceeds the {max_pixels} pixel budget"
        )));
    }
    Ok(())
}

fn to_device_px(logical: u32, scale: f64) -> Result<u32, ExportError> {
    let device = (logical as f64 * scale).round();
    if device < 1.0 || device > u32::MAX as f64 {
        return Err(ExportError::InvalidRequest(format!(
            "target of {logical}px at scale {scale} is not a usable size"
        )));
    }
    Ok(device as u32)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::{ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;

    const BUDGET: u64 = DEFAULT_MAX_BITMAP_PIXELS;

    pub(crate) fn encode_png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_fn(width, height, |x, y| Rgba([x as u8, y as u8, 0, 255]));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_decode_keeps_native_size_without_target() {
        let png = encode_png(20, 50);
        let bitmap = decode_snapshot(&png, None, None, 2.0, BUDGET).unwrap();
        assert_eq!(bitmap.pixel_width(), 20);
        assert_eq!(bitmap.pixel_height(), 50);
        assert_eq!(bitmap.scale(), 2.0);
    }

    #[test]
    fn test_decode_resamples_to_target_width_keeping_aspect() {
        let png = encode_png(20, 50);
        // 20 logical px at 2x = 40 device px; height follows: 100
        let bitmap = decode_snapshot(&png, Some(20), None, 2.0, BUDGET).unwrap();
        assert_eq!(bitmap.pixel_width(), 40);
        assert_eq!(bitmap.pixel_height(), 100);
    }

    #[test]
    fn test_decode_honours_explicit_target_height() {
        let png = encode_png(20, 50);
        let bitmap = decode_snapshot(&png, Some(10), Some(30), 1.0, BUDGET).unwrap();
        assert_eq!((bitmap.pixel_width(), bitmap.pixel_height()), (10, 30));
    }

    #[test]
    fn test_decode_garbage_is_decode_error() {
        let garbage = b"definitely not a png";
        let err = decode_snapshot(garbage, None, None, 1.0, BUDGET).unwrap_err();
        assert!(matches!(err, ExportError::Decode(_)));
    }

    #[test]
    fn test_zero_target_width_rejected() {
        let png = encode_png(4, 4);
        let err = decode_snapshot(&png, Some(0), None, 1.0, BUDGET).unwrap_err();
        assert!(matches!(err, ExportError::InvalidRequest(_)));
    }

    #[test]
    fn test_oversized_resample_target_rejected_before_resize() {
        // 20 000 logical px wide from a 1x100 source would be 20 000 x 2 000 000.
        let png = encode_png(1, 100);
        let err = decode_snapshot(&png, Some(20_000), None, 1.0, BUDGET).unwrap_err();
        assert!(matches!(err, ExportError::InvalidRequest(_)));
    }

    #[test]
    fn test_huge_scale_counts_against_budget() {
        let png = encode_png(4, 4);
        let err = decode_snapshot(&png, Some(100), None, 1_000.0, BUDGET).unwrap_err();
        assert!(matches!(err, ExportError::InvalidRequest(_)));
    }

    #[test]
    fn test_decoded_size_counts_against_budget() {
        let png = encode_png(20, 50);
        let err = decode_snapshot(&png, None, None, 1.0, 999).unwrap_err();
        assert!(matches!(err, ExportError::InvalidRequest(_)));
        assert!(decode_snapshot(&png, None, None, 1.0, 1000).is_ok());
    }

    #[tokio::test]
    async fn test_rasterizer_rejects_bad_scale() {
        let err = SnapshotRasterizer::default()
            .rasterize(Bytes::from(encode_png(4, 4)), None, None, 0.0)
            .await
            .unwrap_err();
        assert!(matches!(err, ExportError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_rasterizer_decodes_png() {
        let bitmap = SnapshotRasterizer::default()
            .rasterize(Bytes::from(encode_png(8, 16)), None, None, 1.0)
            .await
            .unwrap();
        assert_eq!(bitmap.metrics().pixel_height, 16);
    }
}
